//! Bin lookup shared by seeding and truncation.
//!
//! All lookups are total: out-of-range values are wrapped or clamped the
//! way fixed-width hardware would, never rejected.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use std::f64::consts::{PI, TAU};

/// Finds the bin of `value` given the interior boundaries of a binning.
///
/// Bins are half-open `[lo, hi)`: a value exactly on a boundary belongs to
/// the upper bin. Values below the first boundary land in bin 0 and values
/// at or above the last boundary land in the last bin, so the result is
/// always in `0..=edges.len()`.
#[inline]
#[must_use]
pub fn bin_of(interior_edges: &[f64], value: f64) -> usize {
    interior_edges.partition_point(|&edge| edge <= value)
}

/// Uniform binning of `[min, max]` into `bins` bins, clamping outside values.
#[inline]
#[must_use]
pub fn uniform_bin(value: f64, min: f64, max: f64, bins: usize) -> usize {
    if bins == 0 {
        return 0;
    }
    let width = (max - min) / bins as f64;
    let clamped = if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    };
    (((clamped - min) / width) as usize).min(bins - 1)
}

/// Wraps `value` into `[lo, lo + period)`.
#[inline]
#[must_use]
pub fn wrap_into(value: f64, lo: f64, period: f64) -> f64 {
    let wrapped = lo + (value - lo).rem_euclid(period);
    // rem_euclid can round up to exactly `period` for tiny negative offsets.
    if wrapped >= lo + period {
        lo
    } else {
        wrapped
    }
}

/// Wraps an angle into `[-pi, pi)`.
#[inline]
#[must_use]
pub fn wrap_to_pi(angle: f64) -> f64 {
    wrap_into(angle, -PI, TAU)
}

/// Steps `index` by `offset` positions around a ring of `len` bins.
#[inline]
#[must_use]
pub fn circular_step(index: usize, offset: isize, len: usize) -> usize {
    debug_assert!(len > 0);
    let len = len as isize;
    (index as isize + offset).rem_euclid(len) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bin_of_edge_goes_to_upper_bin() {
        let edges = [1.0, 2.0, 3.0];
        assert_eq!(bin_of(&edges, 0.999), 0);
        assert_eq!(bin_of(&edges, 1.0), 1);
        assert_eq!(bin_of(&edges, 1.5), 1);
        assert_eq!(bin_of(&edges, 2.0), 2);
        assert_eq!(bin_of(&edges, 3.0), 3);
    }

    #[test]
    fn test_bin_of_clamps() {
        let edges = [1.0, 2.0];
        assert_eq!(bin_of(&edges, -100.0), 0);
        assert_eq!(bin_of(&edges, 100.0), 2);
        assert_eq!(bin_of(&[], 5.0), 0);
    }

    #[test]
    fn test_uniform_bin() {
        assert_eq!(uniform_bin(0.0, 0.0, 1.0, 4), 0);
        assert_eq!(uniform_bin(0.25, 0.0, 1.0, 4), 1);
        assert_eq!(uniform_bin(0.99, 0.0, 1.0, 4), 3);
        // max itself and beyond clamp into the last bin
        assert_eq!(uniform_bin(1.0, 0.0, 1.0, 4), 3);
        assert_eq!(uniform_bin(7.0, 0.0, 1.0, 4), 3);
        assert_eq!(uniform_bin(-7.0, 0.0, 1.0, 4), 0);
        assert_eq!(uniform_bin(f64::NAN, 0.0, 1.0, 4), 0);
    }

    #[test]
    fn test_wrap_into() {
        assert_relative_eq!(wrap_into(TAU + 0.5, 0.0, TAU), 0.5, epsilon = 1e-12);
        assert_relative_eq!(wrap_into(-0.5, 0.0, TAU), TAU - 0.5, epsilon = 1e-12);
        assert_relative_eq!(wrap_into(0.0, 0.0, TAU), 0.0);
        let w = wrap_into(-1e-18, 0.0, TAU);
        assert!((0.0..TAU).contains(&w));
    }

    #[test]
    fn test_wrap_to_pi() {
        assert_relative_eq!(wrap_to_pi(PI), -PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_to_pi(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_to_pi(0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_circular_step() {
        assert_eq!(circular_step(0, -1, 8), 7);
        assert_eq!(circular_step(7, 1, 8), 0);
        assert_eq!(circular_step(3, 2, 8), 5);
        assert_eq!(circular_step(0, -9, 8), 7);
    }
}
