//! Histogram seeding configuration.
//!
//! [`ClusterAlgoParams`] is the plain, deserializable parameter set.
//! [`ClusterAlgoConfig`] is the validated, immutable form the seeding
//! algorithm borrows for every event.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc
)]

use crate::bin_key::MAX_RINGS;
use crate::binning::{bin_of, uniform_bin, wrap_into};
use crate::error::ConfigError;
use std::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Integer 1D convolution kernel: `out = (sum w_k * in_k) >> shift`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmearingKernel {
    /// Odd number of weights, centred on the bin being computed.
    pub weights: Vec<u32>,
    /// Right shift applied to the weighted sum.
    pub shift: u32,
}

impl Default for SmearingKernel {
    fn default() -> Self {
        Self {
            weights: vec![1, 2, 1],
            shift: 2,
        }
    }
}

/// Integer 2D convolution kernel, rows indexed by ring offset and columns
/// by phi offset.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmearingKernel2d {
    /// Odd × odd weight matrix.
    pub weights: Vec<Vec<u32>>,
    /// Right shift applied to the weighted sum.
    pub shift: u32,
}

impl Default for SmearingKernel2d {
    fn default() -> Self {
        Self {
            weights: vec![vec![1, 2, 1], vec![2, 4, 2], vec![1, 2, 1]],
            shift: 4,
        }
    }
}

/// Ring-dependent maxima threshold `constant + linear*ring + quadratic*ring^2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MaximaThreshold {
    /// Ring-independent term.
    pub constant: u64,
    /// Coefficient of the ring index.
    pub linear: u64,
    /// Coefficient of the squared ring index.
    pub quadratic: u64,
}

impl Default for MaximaThreshold {
    fn default() -> Self {
        Self::flat(16)
    }
}

impl MaximaThreshold {
    /// Same threshold in every ring.
    #[must_use]
    pub fn flat(value: u64) -> Self {
        Self {
            constant: value,
            linear: 0,
            quadratic: 0,
        }
    }

    /// Threshold for `ring`.
    #[must_use]
    pub fn at(&self, ring: usize) -> u64 {
        let ring = ring as u64;
        self.constant
            .saturating_add(self.linear.saturating_mul(ring))
            .saturating_add(self.quadratic.saturating_mul(ring.saturating_mul(ring)))
    }
}

/// Raw seeding parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClusterAlgoParams {
    /// Lower edge of the first r/z ring.
    pub roz_min: f64,
    /// Upper edge of the last r/z ring.
    pub roz_max: f64,
    /// Number of r/z rings (at most 64).
    pub rings: usize,
    /// Per-ring phi edges, `phi_bins + 1` ascending values each. The span of
    /// a table is the azimuthal period of its ring.
    pub phi_edges: Vec<Vec<f64>>,
    /// Kernel of the azimuthal smearing step.
    pub smearing_kernel_1d: SmearingKernel,
    /// Kernel of the ring × azimuth smearing step.
    pub smearing_kernel_2d: SmearingKernel2d,
    /// Per-bin area correction multipliers, ring-major.
    pub area_normalization: Vec<u32>,
    /// Right shift applied after the area correction multiply.
    pub area_normalization_shift: u32,
    /// Maxima threshold.
    pub threshold: MaximaThreshold,
}

impl Default for ClusterAlgoParams {
    fn default() -> Self {
        Self::uniform(42, 216)
    }
}

impl ClusterAlgoParams {
    /// Uniform binning: `rings` rings over the default r/z range, each split
    /// into `phi_bins` equal bins over `[0, 2pi)`. Area correction is unity.
    #[must_use]
    pub fn uniform(rings: usize, phi_bins: usize) -> Self {
        Self {
            roz_min: 0.076,
            roz_max: 0.58,
            rings,
            phi_edges: vec![uniform_edges(0.0, TAU, phi_bins); rings],
            smearing_kernel_1d: SmearingKernel::default(),
            smearing_kernel_2d: SmearingKernel2d::default(),
            area_normalization: vec![1; rings * phi_bins],
            area_normalization_shift: 0,
            threshold: MaximaThreshold::default(),
        }
    }

    /// Sets the r/z range.
    #[must_use]
    pub fn with_roz_range(mut self, roz_min: f64, roz_max: f64) -> Self {
        self.roz_min = roz_min;
        self.roz_max = roz_max;
        self
    }

    /// Replaces the per-ring phi edge tables.
    #[must_use]
    pub fn with_phi_edges(mut self, phi_edges: Vec<Vec<f64>>) -> Self {
        self.phi_edges = phi_edges;
        self
    }

    /// Sets the azimuthal smearing kernel.
    #[must_use]
    pub fn with_kernel_1d(mut self, weights: Vec<u32>, shift: u32) -> Self {
        self.smearing_kernel_1d = SmearingKernel { weights, shift };
        self
    }

    /// Sets the 2D smearing kernel.
    #[must_use]
    pub fn with_kernel_2d(mut self, weights: Vec<Vec<u32>>, shift: u32) -> Self {
        self.smearing_kernel_2d = SmearingKernel2d { weights, shift };
        self
    }

    /// Sets the area correction table.
    #[must_use]
    pub fn with_area_normalization(mut self, table: Vec<u32>, shift: u32) -> Self {
        self.area_normalization = table;
        self.area_normalization_shift = shift;
        self
    }

    /// Derives the area correction from the phi edge tables.
    ///
    /// Each bin gets `round(2^shift * narrowest_width / width)`, so the
    /// narrowest bin is left unscaled and wider bins are scaled down.
    /// Shifts above 31 are clamped to 31 so the factors fit in 32 bits.
    #[must_use]
    pub fn with_area_normalization_from_edges(mut self, shift: u32) -> Self {
        let shift = shift.min(31);
        let widths: Vec<f64> = self
            .phi_edges
            .iter()
            .flat_map(|edges| edges.windows(2).map(|w| w[1] - w[0]))
            .collect();
        let narrowest = widths.iter().copied().fold(f64::INFINITY, f64::min);
        let unit = f64::from(1u32 << shift);
        self.area_normalization = widths
            .iter()
            .map(|&w| (unit * narrowest / w).round() as u32)
            .collect();
        self.area_normalization_shift = shift;
        self
    }

    /// Sets the maxima threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: MaximaThreshold) -> Self {
        self.threshold = threshold;
        self
    }
}

/// `bins + 1` equally spaced edges over `[lo, hi]`.
#[must_use]
pub fn uniform_edges(lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    let width = (hi - lo) / bins as f64;
    (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect()
}

/// Validated seeding configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "ClusterAlgoParams", into = "ClusterAlgoParams")
)]
pub struct ClusterAlgoConfig {
    params: ClusterAlgoParams,
    phi_bins: usize,
}

impl Default for ClusterAlgoConfig {
    fn default() -> Self {
        let params = ClusterAlgoParams::default();
        let phi_bins = params.phi_edges[0].len() - 1;
        Self { params, phi_bins }
    }
}

impl TryFrom<ClusterAlgoParams> for ClusterAlgoConfig {
    type Error = ConfigError;

    fn try_from(params: ClusterAlgoParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

impl From<ClusterAlgoConfig> for ClusterAlgoParams {
    fn from(config: ClusterAlgoConfig) -> Self {
        config.params
    }
}

impl ClusterAlgoConfig {
    /// Validates `params`.
    pub fn new(params: ClusterAlgoParams) -> Result<Self, ConfigError> {
        let phi_bins = validate(&params)?;
        Ok(Self { params, phi_bins })
    }

    /// Underlying parameters.
    #[must_use]
    pub fn params(&self) -> &ClusterAlgoParams {
        &self.params
    }

    /// Number of r/z rings.
    #[inline]
    #[must_use]
    pub fn rings(&self) -> usize {
        self.params.rings
    }

    /// Number of phi bins in every ring.
    #[inline]
    #[must_use]
    pub fn phi_bins(&self) -> usize {
        self.phi_bins
    }

    /// Ring containing `r_over_z`, clamped into the configured range.
    #[inline]
    #[must_use]
    pub fn ring_of(&self, r_over_z: f64) -> usize {
        uniform_bin(
            r_over_z,
            self.params.roz_min,
            self.params.roz_max,
            self.params.rings,
        )
    }

    /// Centre of a ring in r/z.
    #[must_use]
    pub fn ring_centre(&self, ring: usize) -> f64 {
        let width = (self.params.roz_max - self.params.roz_min) / self.params.rings as f64;
        self.params.roz_min + width * (ring as f64 + 0.5)
    }

    /// `(lower edge, period)` of a ring's azimuthal range.
    #[inline]
    #[must_use]
    pub fn phi_span(&self, ring: usize) -> (f64, f64) {
        let edges = &self.params.phi_edges[ring];
        (edges[0], edges[edges.len() - 1] - edges[0])
    }

    /// Wraps `phi` into the ring's range and returns `(phi_bin, wrapped_phi)`.
    ///
    /// Bins are half-open, so a value on an edge goes to the upper bin.
    #[must_use]
    pub fn phi_bin_of(&self, ring: usize, phi: f64) -> (usize, f64) {
        let edges = &self.params.phi_edges[ring];
        let (lo, period) = self.phi_span(ring);
        let wrapped = if phi.is_nan() {
            lo
        } else {
            wrap_into(phi, lo, period)
        };
        (bin_of(&edges[1..edges.len() - 1], wrapped), wrapped)
    }

    /// Centre of a phi bin.
    #[must_use]
    pub fn phi_bin_centre(&self, ring: usize, phi_bin: usize) -> f64 {
        let edges = &self.params.phi_edges[ring];
        0.5 * (edges[phi_bin] + edges[phi_bin + 1])
    }

    /// Azimuthal smearing kernel.
    #[inline]
    #[must_use]
    pub fn kernel_1d(&self) -> &SmearingKernel {
        &self.params.smearing_kernel_1d
    }

    /// 2D smearing kernel.
    #[inline]
    #[must_use]
    pub fn kernel_2d(&self) -> &SmearingKernel2d {
        &self.params.smearing_kernel_2d
    }

    /// Area correction multiplier of a bin.
    #[inline]
    #[must_use]
    pub fn area_normalization(&self, ring: usize, phi_bin: usize) -> u32 {
        self.params.area_normalization[ring * self.phi_bins + phi_bin]
    }

    /// Right shift following the area correction.
    #[inline]
    #[must_use]
    pub fn area_normalization_shift(&self) -> u32 {
        self.params.area_normalization_shift
    }

    /// Maxima threshold of a ring.
    #[inline]
    #[must_use]
    pub fn threshold(&self, ring: usize) -> u64 {
        self.params.threshold.at(ring)
    }
}

fn validate(params: &ClusterAlgoParams) -> Result<usize, ConfigError> {
    if params.rings == 0 || params.rings > MAX_RINGS {
        return Err(ConfigError::RingCountOutOfRange {
            rings: params.rings,
            max: MAX_RINGS,
        });
    }
    if !(params.roz_min.is_finite() && params.roz_max.is_finite())
        || params.roz_min >= params.roz_max
    {
        return Err(ConfigError::InvalidRozRange {
            min: params.roz_min,
            max: params.roz_max,
        });
    }
    if params.phi_edges.len() != params.rings {
        return Err(ConfigError::TableSizeMismatch {
            table: "phi_edges",
            expected: params.rings,
            found: params.phi_edges.len(),
        });
    }

    let phi_bins = params.phi_edges[0].len().saturating_sub(1);
    for (ring, edges) in params.phi_edges.iter().enumerate() {
        if edges.len() < 2 {
            return Err(ConfigError::TooFewPhiEdges {
                ring,
                min: 2,
                found: edges.len(),
            });
        }
        if edges.len() - 1 != phi_bins {
            return Err(ConfigError::PhiBinCountMismatch {
                ring,
                expected: phi_bins,
                found: edges.len() - 1,
            });
        }
        if !strictly_ascending(edges) {
            return Err(ConfigError::UnsortedPhiEdges { ring });
        }
    }

    let k1 = &params.smearing_kernel_1d;
    if k1.weights.len() % 2 == 0 {
        return Err(ConfigError::InvalidKernel {
            name: "1D smearing",
            reason: "needs an odd, non-zero number of weights",
        });
    }
    let k2 = &params.smearing_kernel_2d;
    if k2.weights.len() % 2 == 0 {
        return Err(ConfigError::InvalidKernel {
            name: "2D smearing",
            reason: "needs an odd, non-zero number of rows",
        });
    }
    let columns = k2.weights[0].len();
    if columns % 2 == 0 || k2.weights.iter().any(|row| row.len() != columns) {
        return Err(ConfigError::InvalidKernel {
            name: "2D smearing",
            reason: "rows must share an odd, non-zero length",
        });
    }
    for (name, shift) in [
        ("1D smearing", k1.shift),
        ("2D smearing", k2.shift),
        ("area normalization", params.area_normalization_shift),
    ] {
        if shift >= 64 {
            return Err(ConfigError::ShiftOutOfRange { name, shift });
        }
    }

    if params.area_normalization.len() != params.rings * phi_bins {
        return Err(ConfigError::TableSizeMismatch {
            table: "area_normalization",
            expected: params.rings * phi_bins,
            found: params.area_normalization.len(),
        });
    }

    Ok(phi_bins)
}

pub(crate) fn strictly_ascending(edges: &[f64]) -> bool {
    edges.iter().all(|e| e.is_finite()) && edges.windows(2).all(|w| w[0] < w[1])
}
