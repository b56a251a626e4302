use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::Filters;
use crate::error::{Result, SkyError};
use crate::geom::{Canvas, Projector};
use crate::grid;

/// Tunables for the viewer core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Canvas width in pixels.
    pub width: f64,
    /// Canvas height in pixels.
    pub height: f64,
    /// Blank margin above and below the projected ellipse, pixels.
    pub padding: f64,
    /// Spatial grid bucket size, pixels.
    pub grid_cell: f64,
    /// Click and hover pick radius, pixels.
    pub pick_radius: f64,
    /// A polygon closes when released this close to its first vertex.
    pub polygon_close_radius: f64,
    /// Lasso paths shorter than this are treated as a single click.
    pub lasso_min_vertices: usize,
    /// Magnifier lens radius, pixels.
    pub lens_radius: f64,
    /// Magnifier zoom factor.
    pub lens_zoom: f64,
    /// Posterior histogram bin size, pixels.
    pub histogram_resolution: f64,
    /// Newton-Raphson iteration cap for the Mollweide auxiliary angle.
    pub newton_iterations: usize,
    /// Newton step size below which iteration stops early.
    pub newton_tolerance: f64,
    /// Credible level applied when a posterior is first activated.
    pub credible_level: f64,
    pub filters: Filters,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 400.0,
            padding: 20.0,
            grid_cell: 20.0,
            pick_radius: 15.0,
            polygon_close_radius: 10.0,
            lasso_min_vertices: 5,
            lens_radius: 60.0,
            lens_zoom: 2.5,
            histogram_resolution: 10.0,
            newton_iterations: 10,
            newton_tolerance: 1e-12,
            credible_level: 0.95,
            filters: Filters::default(),
        }
    }
}

impl ViewConfig {
    /// Load overrides from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject geometry that cannot produce a usable canvas, grid or lens.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("grid_cell", self.grid_cell),
            ("histogram_resolution", self.histogram_resolution),
            ("lens_zoom", self.lens_zoom),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SkyError::invalid_config(field, value));
            }
        }

        let non_negative = [
            ("padding", self.padding),
            ("pick_radius", self.pick_radius),
            ("polygon_close_radius", self.polygon_close_radius),
            ("lens_radius", self.lens_radius),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SkyError::invalid_config(field, value));
            }
        }
        if 2.0 * self.padding >= self.height {
            return Err(SkyError::invalid_config("padding", self.padding));
        }

        for (field, cell) in [
            ("grid_cell", self.grid_cell),
            ("histogram_resolution", self.histogram_resolution),
        ] {
            if grid::cell_dims(self.width, self.height, cell).is_none() {
                return Err(SkyError::invalid_config(field, cell));
            }
        }
        Ok(())
    }

    pub fn canvas(&self) -> Canvas {
        Canvas::new(self.width, self.height, self.padding)
    }

    pub fn projector(&self) -> Projector {
        Projector::with_solver(self.canvas(), self.newton_iterations, self.newton_tolerance)
    }

    /// Effective pick radius under the magnifier lens.
    pub fn lens_pick_radius(&self) -> f64 {
        self.lens_radius / self.lens_zoom
    }
}
