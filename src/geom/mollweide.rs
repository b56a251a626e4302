//! Mollweide (equal-area pseudocylindrical) projection onto a pixel canvas.
//!
//! The map is displayed mirrored, east to the left, as seen from inside the
//! celestial sphere. The auxiliary angle is found by Newton-Raphson on
//! `2θ + sin 2θ = π sin φ`.

use std::f64::consts::{FRAC_PI_2, PI, SQRT_2};

/// Added to the Newton derivative so it never divides by exactly zero.
const DERIVATIVE_EPS: f64 = 1e-12;
/// Latitudes this close to a pole (radians) are snapped to θ = ±π/2.
const POLE_SNAP: f64 = 1e-10;

/// Pixel dimensions of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64, padding: f64) -> Self {
        Self {
            width,
            height,
            padding,
        }
    }

    /// Pixels per unit of the normalized Mollweide plane.
    pub fn scale(&self) -> f64 {
        (self.height - 2.0 * self.padding) / (2.0 * SQRT_2)
    }
}

/// Forward Mollweide projector bound to a canvas.
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    canvas: Canvas,
    scale: f64,
    max_iterations: usize,
    tolerance: f64,
}

impl Projector {
    pub fn new(canvas: Canvas) -> Self {
        Self::with_solver(canvas, 10, 1e-12)
    }

    /// Projector with explicit Newton iteration cap and step tolerance.
    pub fn with_solver(canvas: Canvas, max_iterations: usize, tolerance: f64) -> Self {
        Self {
            canvas,
            scale: canvas.scale(),
            max_iterations,
            tolerance,
        }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Project (lon, lat) in degrees to canvas pixels, with `center_lon`
    /// placed on the vertical centre line.
    ///
    /// `y` grows downward.
    pub fn project(&self, lon: f64, lat: f64, center_lon: f64) -> (f64, f64) {
        let lambda = -wrap_longitude(lon - center_lon).to_radians();
        let theta = self.auxiliary_angle(lat.to_radians());

        let x = (2.0 * SQRT_2 / PI) * lambda * theta.cos();
        let y = SQRT_2 * theta.sin();

        (
            x * self.scale + self.canvas.width / 2.0,
            -(y * self.scale) + self.canvas.height / 2.0,
        )
    }

    /// Solve `2θ + sin 2θ = π sin φ` for θ.
    ///
    /// Stops once the Newton step is below the tolerance; otherwise the
    /// value after the last iteration is returned as-is.
    pub fn auxiliary_angle(&self, phi: f64) -> f64 {
        if phi.abs() >= FRAC_PI_2 - POLE_SNAP {
            return phi.signum() * FRAC_PI_2;
        }

        let target = PI * phi.sin();
        let mut theta = phi;
        for _ in 0..self.max_iterations {
            let f = 2.0 * theta + (2.0 * theta).sin() - target;
            let fprime = 2.0 + 2.0 * (2.0 * theta).cos() + DERIVATIVE_EPS;
            let step = f / fprime;
            theta -= step;
            if step.abs() < self.tolerance {
                break;
            }
        }
        theta
    }
}

/// Wrap a longitude difference in degrees into `(-180, 180]`.
pub fn wrap_longitude(mut deg: f64) -> f64 {
    if !deg.is_finite() {
        return deg;
    }
    deg = deg.rem_euclid(360.0);
    if deg > 180.0 { deg - 360.0 } else { deg }
}
