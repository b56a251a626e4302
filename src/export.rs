//! Selection export and summary statistics.

use std::borrow::Cow;
use std::io::{self, Write};

use crate::catalog::SkyPoint;

pub const CSV_HEADER: &str = "id,ra,dec,dist,mass,type";

/// Quote a field if it contains a separator, quote or line break.
fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

/// Write points as CSV with columns `id,ra,dec,dist,mass,type`.
///
/// Coordinates are always the original equatorial values. Pulsars report
/// zero distance and mass. Ids are quoted when needed.
pub fn write_csv<'a, W: Write>(
    w: &mut W,
    points: impl IntoIterator<Item = &'a SkyPoint>,
) -> io::Result<usize> {
    writeln!(w, "{CSV_HEADER}")?;
    let mut n = 0;
    for p in points {
        writeln!(
            w,
            "{},{},{},{},{},{}",
            csv_field(&p.id),
            p.ra,
            p.dec,
            p.dist(),
            p.mass(),
            p.type_name()
        )?;
        n += 1;
    }
    Ok(n)
}

/// Fixed-range histogram normalized to a probability density.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityHistogram {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<usize>,
    /// `counts[i] / (total * bin_width)`.
    pub density: Vec<f64>,
}

impl DensityHistogram {
    /// Bin `values` into `bins` equal-width bins over `[min, max)`.
    ///
    /// Values outside the range are counted in the total but land in no bin.
    pub fn compute(values: impl IntoIterator<Item = f64>, min: f64, max: f64, bins: usize) -> Self {
        let step = (max - min) / bins as f64;
        let mut counts = vec![0usize; bins];
        let mut total = 0usize;
        for v in values {
            total += 1;
            let b = ((v - min) / step).floor();
            if b >= 0.0 && (b as usize) < bins {
                counts[b as usize] += 1;
            }
        }

        let norm = total.max(1) as f64 * step;
        let density = counts.iter().map(|&c| c as f64 / norm).collect();
        Self {
            min,
            max,
            counts,
            density,
        }
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.counts.len() as f64
    }
}

/// Distance and mass densities of the visible galaxies and of the selected
/// subset, binned identically so they can be overlaid.
#[derive(Debug, Clone, PartialEq)]
pub struct GalaxyHistograms {
    pub dist_all: DensityHistogram,
    pub dist_selected: DensityHistogram,
    pub mass_all: DensityHistogram,
    pub mass_selected: DensityHistogram,
}
