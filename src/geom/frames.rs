//! Celestial reference frames used for display.
//!
//! Catalog positions are always stored in equatorial (J2000) coordinates.
//! The galactic frame is derived on demand for display and is never
//! converted back.

use serde::{Deserialize, Serialize};

/// Right ascension of the north galactic pole (J2000), degrees.
pub const RA_NGP: f64 = 192.85948;
/// Declination of the north galactic pole (J2000), degrees.
pub const DEC_NGP: f64 = 27.12825;
/// Galactic longitude of the north celestial pole, degrees.
pub const L_NCP: f64 = 122.93192;

/// Coordinate frame in which points are laid out on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frame {
    #[default]
    Equatorial,
    Galactic,
}

impl Frame {
    /// Map an equatorial position (degrees) to this frame's (lon, lat).
    pub fn display_coords(self, ra: f64, dec: f64) -> (f64, f64) {
        match self {
            Frame::Equatorial => (ra, dec),
            Frame::Galactic => equatorial_to_galactic(ra, dec),
        }
    }

    /// Longitude placed at the centre of the map after a frame switch.
    pub fn default_center(self) -> f64 {
        match self {
            Frame::Equatorial => 180.0,
            Frame::Galactic => 0.0,
        }
    }
}

/// Convert equatorial (RA, Dec) in degrees to galactic (l, b) in degrees.
///
/// `l` is normalized into `[0, 360)`. Inputs are not validated: NaN in
/// gives NaN out.
pub fn equatorial_to_galactic(ra: f64, dec: f64) -> (f64, f64) {
    let ra_ngp = RA_NGP.to_radians();
    let dec_ngp = DEC_NGP.to_radians();
    let l_ncp = L_NCP.to_radians();

    let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
    let (sin_dngp, cos_dngp) = dec_ngp.sin_cos();
    let dra = ra.to_radians() - ra_ngp;
    let (sin_dra, cos_dra) = dra.sin_cos();

    let sin_b = sin_dngp * sin_dec + cos_dngp * cos_dec * cos_dra;
    let b = sin_b.asin();

    let y = cos_dec * sin_dra;
    let x = cos_dngp * sin_dec - sin_dngp * cos_dec * cos_dra;
    let l = (l_ncp - y.atan2(x)).to_degrees();

    (normalize_degrees(l), b.to_degrees())
}

/// Wrap an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
