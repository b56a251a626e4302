pub mod frames;
pub mod mollweide;
pub mod polygon;

pub use frames::{Frame, equatorial_to_galactic};
pub use mollweide::{Canvas, Projector};
