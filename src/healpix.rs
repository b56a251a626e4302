//! HEALPix (Hierarchical Equal Area isoLatitude Pixelisation), RING scheme.
//!
//! Pixels are numbered ring by ring from the north pole. The sphere splits
//! into a north polar cap (`cos θ > 2/3`), an equatorial belt and a south
//! polar cap. Pixel lookups must agree exactly with externally produced
//! maps, so every float-to-integer conversion below truncates toward zero
//! at the same points as the reference C++ implementation.
//!
//! Angles follow the HEALPix convention: `theta` is colatitude in `[0, π]`,
//! `phi` is longitude in `[0, 2π)`.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::error::{Result, SkyError};

/// Largest nside HEALPix defines (order 29).
pub const NSIDE_MAX: u64 = 1 << 29;

/// Total number of pixels for a given nside: 12 * nside^2.
///
/// `nside` must be in `1..=NSIDE_MAX`; use [`checked_npix`] for untrusted input.
pub fn npix(nside: u64) -> u64 {
    debug_assert!(nside <= NSIDE_MAX, "nside {nside} above {NSIDE_MAX}");
    12 * nside * nside
}

/// Pixel count for an untrusted nside, `None` outside `1..=NSIDE_MAX`.
pub fn checked_npix(nside: u64) -> Option<u64> {
    if nside == 0 || nside > NSIDE_MAX {
        return None;
    }
    12u64.checked_mul(nside)?.checked_mul(nside)
}

/// Number of pixels in the north polar cap: 2 * nside * (nside - 1).
fn ncap(nside: u64) -> u64 {
    2 * nside * (nside - 1)
}

/// Solid angle of one pixel in square degrees.
pub fn pixel_area_deg2(nside: u64) -> f64 {
    let sr = 4.0 * PI / npix(nside) as f64;
    sr * (180.0 / PI) * (180.0 / PI)
}

/// Infer nside from a flat map length.
///
/// The length must be exactly `12 * nside^2` for some `nside >= 1`.
pub fn nside_from_npix(len: usize) -> Result<u64> {
    let nside = (len as f64 / 12.0).sqrt().round() as u64;
    let nside = nside.max(1);
    let expected = npix(nside) as usize;
    if expected != len {
        return Err(SkyError::invalid_map(len, expected));
    }
    Ok(nside)
}

/// Convert (RA, Dec) in degrees to HEALPix (theta, phi) in radians.
pub fn radec_to_ang(ra: f64, dec: f64) -> (f64, f64) {
    ((90.0 - dec).to_radians(), ra.to_radians())
}

/// Convert HEALPix (theta, phi) in radians to (RA, Dec) in degrees.
pub fn ang_to_radec(theta: f64, phi: f64) -> (f64, f64) {
    (phi.to_degrees(), 90.0 - theta.to_degrees())
}

/// RING pixel containing the direction (theta, phi).
pub fn ang2pix_ring(nside: u64, theta: f64, phi: f64) -> u64 {
    let z = theta.cos();
    let za = z.abs();
    // tt in [0, 4): which quarter of the sphere, in units of π/2.
    let tt = (phi / FRAC_PI_2).rem_euclid(4.0);
    let ns = nside as i64;

    if za <= 2.0 / 3.0 {
        let nl4 = 4 * ns;
        let temp1 = nside as f64 * (0.5 + tt);
        let temp2 = nside as f64 * z * 0.75;
        // Both operands are non-negative, so `as` truncation equals floor.
        let jp = (temp1 - temp2) as i64;
        let jm = (temp1 + temp2) as i64;

        // Ring number counted from z = 2/3, in [1, 2*nside + 1].
        let ir = ns + 1 + jp - jm;
        let kshift = 1 - (ir & 1);
        let ip = (jp + jm - ns + kshift + 1) / 2;
        let ip = ip.rem_euclid(nl4);

        (ncap(nside) as i64 + (ir - 1) * nl4 + ip) as u64
    } else {
        let tp = tt - tt.floor();
        let tmp = nside as f64 * (3.0 * (1.0 - za)).sqrt();
        let jp = (tp * tmp) as i64;
        let jm = ((1.0 - tp) * tmp) as i64;

        // Ring number counted from the closest pole.
        let ir = jp + jm + 1;
        let ip = (tt * ir as f64) as i64;
        let ip = ip.rem_euclid(4 * ir);

        if z > 0.0 {
            (2 * ir * (ir - 1) + ip) as u64
        } else {
            (npix(nside) as i64 - 2 * ir * (ir + 1) + ip) as u64
        }
    }
}

/// RING pixel containing (RA, Dec) in degrees.
pub fn ang2pix_ring_radec(nside: u64, ra: f64, dec: f64) -> u64 {
    let (theta, phi) = radec_to_ang(ra, dec);
    ang2pix_ring(nside, theta, phi)
}

/// Centre (theta, phi) of a RING pixel.
///
/// `ipix` must be below `npix(nside)`.
pub fn pix2ang_ring(nside: u64, ipix: u64) -> (f64, f64) {
    let npix = npix(nside);
    debug_assert!(ipix < npix, "pixel {ipix} out of range for npix = {npix}");
    let ncap = ncap(nside);
    let fact2 = 4.0 / npix as f64;

    let (z, phi) = if ipix < ncap {
        let iring = (1 + isqrt(1 + 2 * ipix)) >> 1;
        let iphi = ipix + 1 - 2 * iring * (iring - 1);
        let z = 1.0 - (iring * iring) as f64 * fact2;
        let phi = (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64;
        (z, phi)
    } else if ipix < npix - ncap {
        let nl4 = 4 * nside;
        let ip = ipix - ncap;
        let tmp = ip / nl4;
        let iring = tmp + nside;
        let iphi = ip - nl4 * tmp + 1;
        // Rings alternate between pixel centres on and off the phi = 0 meridian.
        let fodd = if (iring + nside) & 1 == 1 { 1.0 } else { 0.5 };
        let fact1 = 2.0 * nside as f64 * fact2;
        let z = (2.0 * nside as f64 - iring as f64) * fact1;
        let phi = (iphi as f64 - fodd) * FRAC_PI_2 / nside as f64;
        (z, phi)
    } else {
        let ip = npix - ipix;
        let iring = (1 + isqrt(2 * ip - 1)) >> 1;
        let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
        let z = (iring * iring) as f64 * fact2 - 1.0;
        let phi = (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64;
        (z, phi)
    };

    (z.clamp(-1.0, 1.0).acos(), phi.rem_euclid(TAU))
}

/// Centre of a RING pixel as (RA, Dec) in degrees.
pub fn pix2radec_ring(nside: u64, ipix: u64) -> (f64, f64) {
    let (theta, phi) = pix2ang_ring(nside, ipix);
    ang_to_radec(theta, phi)
}

/// Integer square root (floor).
fn isqrt(v: u64) -> u64 {
    let mut r = (v as f64).sqrt() as u64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npix_values() {
        assert_eq!(npix(1), 12);
        assert_eq!(npix(2), 48);
        assert_eq!(npix(4), 192);
        assert_eq!(npix(64), 49152);
    }

    #[test]
    fn pixel_area_sum() {
        for nside in [1, 2, 8, 32] {
            let total = pixel_area_deg2(nside) * npix(nside) as f64;
            assert!(
                (total - 41252.96).abs() < 0.01,
                "nside {nside}: total={total}"
            );
        }
    }

    #[test]
    fn checked_npix_bounds() {
        assert_eq!(checked_npix(0), None);
        assert_eq!(checked_npix(4), Some(192));
        assert_eq!(checked_npix(NSIDE_MAX), Some(12 << 58));
        assert_eq!(checked_npix(NSIDE_MAX + 1), None);
        assert_eq!(checked_npix(1 << 32), None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn pix2ang_rejects_pixel_past_end() {
        pix2ang_ring(2, npix(2));
    }

    #[test]
    fn nside_inference() {
        assert_eq!(nside_from_npix(12).unwrap(), 1);
        assert_eq!(nside_from_npix(192).unwrap(), 4);
        assert_eq!(nside_from_npix(3072).unwrap(), 16);
    }

    #[test]
    fn nside_inference_rejects_bad_lengths() {
        match nside_from_npix(100) {
            Err(SkyError::InvalidMap { actual, expected }) => {
                assert_eq!(actual, 100);
                assert_eq!(expected, 108);
            }
            other => panic!("expected InvalidMap, got {other:?}"),
        }
        assert!(nside_from_npix(0).is_err());
        assert!(nside_from_npix(193).is_err());
    }

    #[test]
    fn roundtrip_all_pixels() {
        for nside in [1, 2, 3, 4, 8, 16, 32] {
            for ipix in 0..npix(nside) {
                let (theta, phi) = pix2ang_ring(nside, ipix);
                assert!((0.0..=PI).contains(&theta));
                assert!((0.0..TAU).contains(&phi));
                let back = ang2pix_ring(nside, theta, phi);
                assert_eq!(back, ipix, "nside {nside}: {ipix} -> ({theta}, {phi}) -> {back}");
            }
        }
    }

    #[test]
    fn nside1_reference_pixels() {
        // nside = 1: 4 north cap pixels, 4 equatorial, 4 south.
        assert_eq!(ang2pix_ring(1, 0.0, 0.0), 0);
        assert_eq!(ang2pix_ring(1, PI / 2.0, 0.0), 4);
        assert_eq!(ang2pix_ring(1, PI, 0.0), 8);
        let (theta, phi) = pix2ang_ring(1, 0);
        assert!((theta - (2.0f64 / 3.0).acos()).abs() < 1e-12);
        assert!((phi - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn ring_order_runs_north_to_south() {
        let nside = 8;
        let mut last_theta = -1.0;
        for ipix in 0..npix(nside) {
            let (theta, _) = pix2ang_ring(nside, ipix);
            assert!(theta >= last_theta - 1e-12, "pixel {ipix} went north");
            last_theta = theta;
        }
    }

    #[test]
    fn poles_and_wraparound() {
        for nside in [1, 4, 16] {
            let n = npix(nside);
            assert!(ang2pix_ring(nside, 0.0, 0.0) < 4);
            assert!(ang2pix_ring(nside, PI, 0.0) >= n - 4);
            // phi = 2π is the same meridian as phi = 0.
            let a = ang2pix_ring(nside, 1.0, 0.0);
            let b = ang2pix_ring(nside, 1.0, TAU);
            assert_eq!(a, b);
            // Negative longitudes wrap.
            let c = ang2pix_ring(nside, 1.0, -0.1);
            let d = ang2pix_ring(nside, 1.0, TAU - 0.1);
            assert_eq!(c, d);
        }
    }

    #[test]
    fn radec_helpers() {
        let (theta, phi) = radec_to_ang(90.0, 0.0);
        assert!((theta - PI / 2.0).abs() < 1e-12);
        assert!((phi - PI / 2.0).abs() < 1e-12);
        let (ra, dec) = ang_to_radec(theta, phi);
        assert!((ra - 90.0).abs() < 1e-12);
        assert!(dec.abs() < 1e-12);
    }

    #[test]
    fn all_pixels_covered() {
        let nside = 4;
        let mut seen = vec![false; npix(nside) as usize];
        let n = 400;
        for i in 0..n {
            let phi = TAU * i as f64 / n as f64;
            for j in 0..n {
                let theta = PI * j as f64 / (n - 1) as f64;
                seen[ang2pix_ring(nside, theta, phi) as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn isqrt_exact() {
        for v in 0..2000u64 {
            let r = isqrt(v);
            assert!(r * r <= v && (r + 1) * (r + 1) > v, "isqrt({v}) = {r}");
        }
    }
}
