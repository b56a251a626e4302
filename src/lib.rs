//! Sky map viewer core.
//!
//! Projects galaxy and pulsar catalogs onto a Mollweide all-sky map in
//! equatorial or galactic coordinates, indexes the projected points for fast
//! picking, and selects regions of the sky by lasso, polygon, magnifier or
//! the credible region of a gravitational-wave posterior (a HEALPix RING
//! probability map or a set of posterior samples).

pub mod catalog;
pub mod config;
pub mod credible;
pub mod error;
pub mod export;
pub mod geom;
pub mod grid;
pub mod healpix;
pub mod ingest;
pub mod selection;

pub use catalog::{Filters, PointKind, ProjectedPoint, Sample, SkyPoint};
pub use config::ViewConfig;
pub use credible::{CredibleRegion, HealpixMap, HistogramPosterior, Posterior};
pub use error::{Result, SkyError};
pub use grid::SpatialGrid;
pub use selection::{Mode, ViewEvent, ViewState};
