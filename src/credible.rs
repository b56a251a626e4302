//! Credible regions over sky probability maps.
//!
//! A credible region at level `L` is the set of cells with the highest
//! probability whose summed mass first reaches `L`. The descending sort and
//! running sum are computed once when a map is activated; changing the level
//! only repeats the threshold search.
//!
//! Two interchangeable representations feed it:
//! - [`HealpixMap`]: per-sky-pixel probabilities in HEALPix RING order,
//!   uniform in solid angle, looked up by (RA, Dec).
//! - [`HistogramPosterior`]: a screen-space histogram of posterior samples at
//!   a fixed pixel resolution, looked up by projected (x, y).

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::catalog::Sample;
use crate::error::{Result, SkyError};
use crate::geom::{Frame, Projector};
use crate::grid;
use crate::healpix;

/// Sorted probabilities with their running sum, cached per map.
#[derive(Debug, Clone, Default)]
pub struct CredibleRegion {
    /// Probabilities in descending order.
    sorted: Vec<f64>,
    /// `cumulative[i]` = sum of `sorted[..=i]`.
    cumulative: Vec<f64>,
}

impl CredibleRegion {
    /// Build from any cell -> probability mapping. Zero cells are dropped.
    pub fn from_probabilities(probs: impl IntoIterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = probs.into_iter().filter(|&p| p > 0.0).collect();
        sorted.sort_by(|a, b| b.total_cmp(a));

        let mut sum = 0.0;
        let cumulative = sorted
            .iter()
            .map(|&p| {
                sum += p;
                sum
            })
            .collect();

        Self { sorted, cumulative }
    }

    /// Total mass held by nonzero cells.
    pub fn total(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Number of nonzero cells.
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Smallest probability still inside the `level` credible region.
    ///
    /// Returns 0 (every nonzero cell) when `level >= 1` or when the map's
    /// total mass never reaches `level`.
    pub fn threshold(&self, level: f64) -> f64 {
        if level >= 1.0 {
            return 0.0;
        }
        // Running sum is non-decreasing, so the first index reaching the
        // level is a partition point.
        let idx = self.cumulative.partition_point(|&c| c < level);
        match self.sorted.get(idx) {
            Some(&p) => p,
            None => {
                log::warn!(
                    "credible level {level} not reached (total mass {}); including all cells",
                    self.total()
                );
                0.0
            }
        }
    }

    /// Number of cells inside the region at `level`, boundary ties included.
    pub fn region_size(&self, level: f64) -> usize {
        let threshold = self.threshold(level);
        self.sorted.partition_point(|&p| contains(p, threshold))
    }

    /// Probability mass inside the region at `level`.
    pub fn region_mass(&self, level: f64) -> f64 {
        match self.region_size(level) {
            0 => 0.0,
            n => self.cumulative[n - 1],
        }
    }
}

/// Membership predicate: a cell is inside iff it is nonzero and at or above
/// the threshold.
pub fn contains(prob: f64, threshold: f64) -> bool {
    prob > 0.0 && prob >= threshold
}

/// One nonzero pixel of a HEALPix map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealpixPixel {
    pub ipix: u64,
    pub ra: f64,
    pub dec: f64,
    pub prob: f64,
}

/// Pre-structured sparse map as produced by an external loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredMap {
    pub nside: u64,
    pub pixels: Vec<HealpixPixel>,
}

/// Probability per HEALPix RING pixel.
#[derive(Debug, Clone)]
pub struct HealpixMap {
    nside: u64,
    probs: Vec<f64>,
    pixels: Vec<HealpixPixel>,
    region: CredibleRegion,
}

/// Largest nside kept as a dense array (~201M pixels, 1.6 GB of `f64`).
pub const MAX_DENSE_NSIDE: u64 = 1 << 12;

impl HealpixMap {
    /// Build from a flat RING-ordered array; length must be `12 * nside^2`.
    ///
    /// Pixel centres are derived with [`healpix::pix2ang_ring`].
    pub fn from_dense(probs: Vec<f64>) -> Result<Self> {
        let nside = healpix::nside_from_npix(probs.len())?;
        let pixels = probs
            .iter()
            .enumerate()
            .filter(|(_, p)| **p > 0.0)
            .map(|(ipix, &prob)| {
                let (ra, dec) = healpix::pix2radec_ring(nside, ipix as u64);
                HealpixPixel {
                    ipix: ipix as u64,
                    ra,
                    dec,
                    prob,
                }
            })
            .collect();
        Ok(Self::assemble(nside, probs, pixels))
    }

    /// Build from a sparse list of pixels that already carry coordinates.
    pub fn from_structured(map: StructuredMap) -> Result<Self> {
        let npix = healpix::checked_npix(map.nside).filter(|_| map.nside <= MAX_DENSE_NSIDE);
        let Some(npix) = npix else {
            log::warn!("rejecting structured map with nside {}", map.nside);
            let n = usize::try_from(map.nside).unwrap_or(usize::MAX);
            let expected = n.saturating_mul(n).saturating_mul(12);
            return Err(SkyError::invalid_map(map.pixels.len(), expected));
        };
        let mut probs = vec![0.0; npix as usize];
        for px in &map.pixels {
            if px.ipix >= npix {
                return Err(SkyError::pixel_out_of_range(px.ipix, npix));
            }
            probs[px.ipix as usize] = px.prob;
        }
        let pixels = map.pixels.into_iter().filter(|p| p.prob > 0.0).collect();
        Ok(Self::assemble(map.nside, probs, pixels))
    }

    fn assemble(nside: u64, probs: Vec<f64>, pixels: Vec<HealpixPixel>) -> Self {
        let region = CredibleRegion::from_probabilities(probs.iter().copied());
        log::info!(
            "HEALPix map: nside={nside}, {} nonzero of {} pixels, total mass {:.4}",
            region.len(),
            probs.len(),
            region.total()
        );
        Self {
            nside,
            probs,
            pixels,
            region,
        }
    }

    pub fn nside(&self) -> u64 {
        self.nside
    }

    pub fn npix(&self) -> u64 {
        self.probs.len() as u64
    }

    /// Dense probability array in RING order.
    pub fn probabilities(&self) -> &[f64] {
        &self.probs
    }

    /// Nonzero pixels with their sky positions.
    pub fn pixels(&self) -> &[HealpixPixel] {
        &self.pixels
    }

    pub fn region(&self) -> &CredibleRegion {
        &self.region
    }

    /// Probability of the pixel containing (RA, Dec) in degrees.
    pub fn probability_at(&self, ra: f64, dec: f64) -> f64 {
        let ipix = healpix::ang2pix_ring_radec(self.nside, ra, dec);
        self.probs.get(ipix as usize).copied().unwrap_or(0.0)
    }

    /// Pixels inside the `level` credible region.
    pub fn region_pixels(&self, level: f64) -> Vec<u64> {
        let threshold = self.region.threshold(level);
        self.probs
            .iter()
            .enumerate()
            .filter(|(_, p)| contains(**p, threshold))
            .map(|(i, _)| i as u64)
            .collect()
    }

    /// Sky area of the `level` credible region in square degrees.
    pub fn region_area_deg2(&self, level: f64) -> f64 {
        self.region.region_size(level) as f64 * healpix::pixel_area_deg2(self.nside)
    }
}

/// Screen-space histogram of posterior samples.
///
/// Depends on the projection, so it keeps its samples and is rebuilt
/// whenever the frame, centre or canvas changes.
#[derive(Debug, Clone)]
pub struct HistogramPosterior {
    samples: Vec<Sample>,
    resolution: f64,
    /// Probability per bin, indexed `[row, col]`.
    bins: Array2<f64>,
    region: CredibleRegion,
}

impl HistogramPosterior {
    pub fn build(
        samples: Vec<Sample>,
        projector: &Projector,
        frame: Frame,
        center_lon: f64,
        resolution: f64,
    ) -> Self {
        let canvas = projector.canvas();
        let (cols, rows) =
            grid::cell_dims(canvas.width, canvas.height, resolution).unwrap_or_else(|| {
                log::warn!("posterior histogram: unusable bin size {resolution}");
                (0, 0)
            });
        let mut bins = Array2::<f64>::zeros((rows, cols));

        for s in &samples {
            let (lon, lat) = frame.display_coords(s.ra, s.dec);
            let (x, y) = projector.project(lon, lat, center_lon);
            if let Some((r, c)) = bin_of(x, y, resolution, rows, cols) {
                bins[[r, c]] += 1.0;
            }
        }

        if !samples.is_empty() {
            let total = samples.len() as f64;
            bins.mapv_inplace(|v| v / total);
        }

        let region = CredibleRegion::from_probabilities(bins.iter().copied());
        log::debug!(
            "posterior histogram: {} samples into {rows}x{cols} bins, {} occupied",
            samples.len(),
            region.len()
        );

        Self {
            samples,
            resolution,
            bins,
            region,
        }
    }

    /// Re-bin the same samples under a new projection.
    pub fn rebuild(self, projector: &Projector, frame: Frame, center_lon: f64) -> Self {
        let resolution = self.resolution;
        Self::build(self.samples, projector, frame, center_lon, resolution)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn bins(&self) -> &Array2<f64> {
        &self.bins
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn region(&self) -> &CredibleRegion {
        &self.region
    }

    /// Probability of the bin under screen position (x, y), if on the grid.
    pub fn probability_at(&self, x: f64, y: f64) -> Option<f64> {
        let (rows, cols) = self.bins.dim();
        bin_of(x, y, self.resolution, rows, cols).map(|(r, c)| self.bins[[r, c]])
    }
}

fn bin_of(x: f64, y: f64, resolution: f64, rows: usize, cols: usize) -> Option<(usize, usize)> {
    let c = (x / resolution).floor();
    let r = (y / resolution).floor();
    if c >= 0.0 && r >= 0.0 && (c as usize) < cols && (r as usize) < rows {
        Some((r as usize, c as usize))
    } else {
        None
    }
}

/// The single active probability representation.
#[derive(Debug, Clone)]
pub enum Posterior {
    Healpix(HealpixMap),
    Histogram(HistogramPosterior),
}

impl Posterior {
    pub fn region(&self) -> &CredibleRegion {
        match self {
            Posterior::Healpix(map) => map.region(),
            Posterior::Histogram(hist) => hist.region(),
        }
    }

    pub fn threshold(&self, level: f64) -> f64 {
        self.region().threshold(level)
    }

    /// Probability for a point at sky position (ra, dec) drawn at (x, y).
    ///
    /// HEALPix maps use the sky position, histograms the screen position.
    pub fn probability_for(&self, ra: f64, dec: f64, x: f64, y: f64) -> Option<f64> {
        match self {
            Posterior::Healpix(map) => Some(map.probability_at(ra, dec)),
            Posterior::Histogram(hist) => hist.probability_at(x, y),
        }
    }
}
