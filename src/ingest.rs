//! Turning text and JSON inputs into catalog points, samples and maps.
//!
//! Ingestion is best-effort per row: a row that does not parse is dropped
//! and logged, and the batch continues. Structural problems (a map with the
//! wrong pixel count) abort the whole load.

use std::fs;
use std::path::Path;

use rand::Rng;
use serde::Deserialize;

use crate::catalog::{Sample, SkyPoint};
use crate::credible::{HealpixMap, StructuredMap};
use crate::error::{Result, SkyError};

/// Decode a compact sexagesimal identifier `HHMMSSCC±DDMMSST` into
/// (RA, Dec) degrees.
///
/// `CC` is hundredths of a second of time, `T` tenths of an arcsecond.
pub fn parse_sexagesimal_id(s: &str) -> Option<(f64, f64)> {
    let s = s.trim();
    let b = s.as_bytes();
    if b.len() != 16 || !s.is_ascii() {
        return None;
    }
    let sign = match b[8] {
        b'+' => 1.0,
        b'-' => -1.0,
        _ => return None,
    };
    if !b[..8].iter().chain(&b[9..]).all(u8::is_ascii_digit) {
        return None;
    }

    let num = |range: std::ops::Range<usize>| -> f64 {
        b[range].iter().fold(0.0, |acc, d| acc * 10.0 + (d - b'0') as f64)
    };

    let hours = num(0..2);
    let minutes = num(2..4);
    let seconds = num(4..6) + num(6..8) / 100.0;
    let ra = (hours + minutes / 60.0 + seconds / 3600.0) * 15.0;

    let degrees = num(9..11);
    let arcmin = num(11..13);
    let arcsec = num(13..15) + num(15..16) / 10.0;
    let dec = sign * (degrees + arcmin / 60.0 + arcsec / 3600.0);

    Some((ra, dec))
}

/// Outcome of a best-effort batch parse.
#[derive(Debug)]
pub struct Ingested<T> {
    pub items: Vec<T>,
    /// Rows dropped as malformed, with their errors.
    pub rejected: Vec<SkyError>,
}

/// Parse a whitespace-delimited galaxy catalog: `<id> <dist> <mass> ...`.
///
/// Lines that are blank or do not start with a digit are skipped silently
/// (headers, comments). Rows with an undecodable identifier or non-numeric
/// fields are rejected individually.
pub fn parse_galaxy_catalog(text: &str) -> Result<Ingested<SkyPoint>> {
    let mut items = Vec::new();
    let mut rejected = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if !line.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }

        let parsed = parse_sexagesimal_id(parts[0]).and_then(|(ra, dec)| {
            let dist = parts[1].parse::<f64>().ok()?;
            let mass = parts[2].parse::<f64>().ok()?;
            Some(SkyPoint::galaxy(parts[0], ra, dec, dist, mass))
        });

        match parsed {
            Some(point) => items.push(point),
            None => {
                log::debug!("dropping catalog line {}: {line}", lineno + 1);
                rejected.push(SkyError::malformed_coordinate(lineno + 1, line));
            }
        }
    }

    finish(items, rejected, "galaxies")
}

/// Parse posterior samples: the first two numbers on each line are (RA, Dec).
///
/// Separators may be spaces, tabs or commas. Lines must start with a digit
/// or a minus sign.
pub fn parse_samples(text: &str) -> Result<Ingested<Sample>> {
    let mut items = Vec::new();
    let mut rejected = Vec::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if !line.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            continue;
        }
        let mut fields = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty());
        let ra = fields.next().and_then(|f| f.parse::<f64>().ok());
        let dec = fields.next().and_then(|f| f.parse::<f64>().ok());
        match (ra, dec) {
            (Some(ra), Some(dec)) if !ra.is_nan() && !dec.is_nan() => {
                items.push(Sample { ra, dec })
            }
            _ => rejected.push(SkyError::malformed_coordinate(lineno + 1, line)),
        }
    }

    finish(items, rejected, "samples")
}

fn finish<T>(items: Vec<T>, rejected: Vec<SkyError>, what: &'static str) -> Result<Ingested<T>> {
    if items.is_empty() {
        return Err(SkyError::empty_result(what));
    }
    if rejected.is_empty() {
        log::info!("loaded {} {what}", items.len());
    } else {
        log::info!(
            "loaded {} {what}, dropped {} malformed rows",
            items.len(),
            rejected.len()
        );
    }
    Ok(Ingested { items, rejected })
}

#[derive(Deserialize)]
struct PulsarRecord {
    id: String,
    ra: f64,
    dec: f64,
    p0: f64,
}

/// Parse a JSON array of `{id, ra, dec, p0}` pulsar records.
pub fn parse_pulsars(json: &str) -> Result<Vec<SkyPoint>> {
    let records: Vec<PulsarRecord> = serde_json::from_str(json)?;
    Ok(records
        .into_iter()
        .map(|r| SkyPoint::pulsar(r.id, r.ra, r.dec, r.p0))
        .collect())
}

/// Parse a probability map from text.
///
/// Accepts a structured JSON map (`{"nside": .., "pixels": [..]}`), a JSON
/// array of probabilities, or whitespace-separated numbers in RING order.
pub fn parse_probability_map(text: &str) -> Result<HealpixMap> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') {
        let map: StructuredMap = serde_json::from_str(trimmed)?;
        return HealpixMap::from_structured(map);
    }
    if trimmed.starts_with('[') {
        let probs: Vec<f64> = serde_json::from_str(trimmed)?;
        return HealpixMap::from_dense(probs);
    }

    let mut probs = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        for field in line.split_whitespace() {
            let p = field
                .parse::<f64>()
                .map_err(|_| SkyError::malformed_probability(lineno + 1, field))?;
            probs.push(p);
        }
    }
    HealpixMap::from_dense(probs)
}

pub fn load_galaxy_catalog(path: &Path) -> Result<Ingested<SkyPoint>> {
    parse_galaxy_catalog(&fs::read_to_string(path)?)
}

pub fn load_samples(path: &Path) -> Result<Ingested<Sample>> {
    parse_samples(&fs::read_to_string(path)?)
}

pub fn load_pulsars(path: &Path) -> Result<Vec<SkyPoint>> {
    parse_pulsars(&fs::read_to_string(path)?)
}

pub fn load_probability_map(path: &Path) -> Result<HealpixMap> {
    parse_probability_map(&fs::read_to_string(path)?)
}

/// Synthetic galaxies uniform on the sphere.
///
/// Distances fall in [5, 500) Mpc and log masses in [6, 10.5).
pub fn mock_catalog<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<SkyPoint> {
    (0..n)
        .map(|i| {
            let ra = rng.random::<f64>() * 360.0;
            let dec = (rng.random::<f64>() * 2.0 - 1.0).asin().to_degrees();
            let dist = rng.random::<f64>() * 495.0 + 5.0;
            let mass = rng.random::<f64>() * 4.5 + 6.0;
            SkyPoint::galaxy(format!("mock-{i}"), ra, dec, dist, mass)
        })
        .collect()
}
