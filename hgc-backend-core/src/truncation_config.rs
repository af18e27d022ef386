//! Stage-1 truncation configuration.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc
)]

use crate::bin_key::{BinLayout, MAX_PHI_BITS, MAX_RINGS};
use crate::binning::{bin_of, uniform_bin, wrap_to_pi};
use crate::cluster_config::strictly_ascending;
use crate::error::ConfigError;
use std::f64::consts::{FRAC_PI_3, TAU};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Capacity table used by the stage-1 firmware for its 42 r/z bins.
const DEFAULT_MAX_TCS_PER_BIN: [u32; 42] = [
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 8, 8, 8, 8,
    8, 8, 8, 8, 8, 8, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
];

/// Raw truncation parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Stage1TruncationParams {
    /// When false every cell is forwarded.
    pub do_truncate: bool,
    /// Lower r/z clamp.
    pub roz_min: f64,
    /// Upper r/z clamp.
    pub roz_max: f64,
    /// Number of uniform r/z bins (at most 64).
    pub roz_bins: usize,
    /// Capacity of every bin of a ring.
    pub max_tcs_per_bin: Vec<u32>,
    /// Per-ring interior phi boundaries in the sector frame.
    pub phi_edges: Vec<Vec<f64>>,
    /// Width of the phi field in packed bin keys.
    pub phi_bits: u32,
    /// Number of azimuthal sectors the endcap is read out in.
    pub sector_count: u32,
    /// Azimuth of the lower edge of sector 0.
    pub sector_phi_offset: f64,
}

impl Default for Stage1TruncationParams {
    fn default() -> Self {
        Self {
            do_truncate: true,
            roz_min: 0.076,
            roz_max: 0.58,
            roz_bins: DEFAULT_MAX_TCS_PER_BIN.len(),
            max_tcs_per_bin: DEFAULT_MAX_TCS_PER_BIN.to_vec(),
            // one boundary splitting the 120 degree sector in half
            phi_edges: vec![vec![FRAC_PI_3]; DEFAULT_MAX_TCS_PER_BIN.len()],
            phi_bits: 1,
            sector_count: 3,
            sector_phi_offset: 0.0,
        }
    }
}

impl Stage1TruncationParams {
    /// `roz_bins` rings with capacity `max_tcs` each and `phi_edges` shared by
    /// all rings; `phi_bits` is sized to fit.
    #[must_use]
    pub fn uniform(roz_bins: usize, max_tcs: u32, phi_edges: &[f64]) -> Self {
        let bins = phi_edges.len() + 1;
        Self {
            roz_bins,
            max_tcs_per_bin: vec![max_tcs; roz_bins],
            phi_edges: vec![phi_edges.to_vec(); roz_bins],
            phi_bits: bins.next_power_of_two().trailing_zeros().max(1),
            ..Self::default()
        }
    }

    /// Enables or disables truncation.
    #[must_use]
    pub fn with_truncation(mut self, do_truncate: bool) -> Self {
        self.do_truncate = do_truncate;
        self
    }

    /// Sets the r/z range.
    #[must_use]
    pub fn with_roz_range(mut self, roz_min: f64, roz_max: f64) -> Self {
        self.roz_min = roz_min;
        self.roz_max = roz_max;
        self
    }

    /// Replaces the capacity table.
    #[must_use]
    pub fn with_max_tcs_per_bin(mut self, max_tcs_per_bin: Vec<u32>) -> Self {
        self.max_tcs_per_bin = max_tcs_per_bin;
        self
    }

    /// Sets the sector layout.
    #[must_use]
    pub fn with_sectors(mut self, sector_count: u32, sector_phi_offset: f64) -> Self {
        self.sector_count = sector_count;
        self.sector_phi_offset = sector_phi_offset;
        self
    }
}

/// Validated truncation configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Stage1TruncationParams", into = "Stage1TruncationParams")
)]
pub struct Stage1TruncationConfig {
    params: Stage1TruncationParams,
    layout: BinLayout,
}

impl Default for Stage1TruncationConfig {
    fn default() -> Self {
        let params = Stage1TruncationParams::default();
        let layout = BinLayout::new(params.phi_bits);
        Self { params, layout }
    }
}

impl TryFrom<Stage1TruncationParams> for Stage1TruncationConfig {
    type Error = ConfigError;

    fn try_from(params: Stage1TruncationParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

impl From<Stage1TruncationConfig> for Stage1TruncationParams {
    fn from(config: Stage1TruncationConfig) -> Self {
        config.params
    }
}

impl Stage1TruncationConfig {
    /// Validates `params`.
    pub fn new(params: Stage1TruncationParams) -> Result<Self, ConfigError> {
        validate(&params)?;
        let layout = BinLayout::new(params.phi_bits);
        Ok(Self { params, layout })
    }

    /// Underlying parameters.
    #[must_use]
    pub fn params(&self) -> &Stage1TruncationParams {
        &self.params
    }

    /// Whether truncation is applied.
    #[inline]
    #[must_use]
    pub fn do_truncate(&self) -> bool {
        self.params.do_truncate
    }

    /// Packed key layout.
    #[inline]
    #[must_use]
    pub fn layout(&self) -> BinLayout {
        self.layout
    }

    /// Number of r/z bins.
    #[inline]
    #[must_use]
    pub fn roz_bins(&self) -> usize {
        self.params.roz_bins
    }

    /// r/z bin of a cell, clamped into range.
    #[inline]
    #[must_use]
    pub fn roz_bin(&self, r_over_z: f64) -> usize {
        uniform_bin(
            r_over_z,
            self.params.roz_min,
            self.params.roz_max,
            self.params.roz_bins,
        )
    }

    /// Phi bin of an already rotated azimuth within `roz_bin`.
    #[inline]
    #[must_use]
    pub fn phi_bin(&self, roz_bin: usize, phi: f64) -> usize {
        bin_of(&self.params.phi_edges[roz_bin], phi)
    }

    /// Rotates `phi` into the local frame of `sector`, in `[-pi, pi)`.
    ///
    /// Sector indices beyond the configured count wrap around.
    #[must_use]
    pub fn rotated_phi(&self, phi: f64, sector: u32) -> f64 {
        let sector = sector % self.params.sector_count;
        let offset = self.params.sector_phi_offset
            + f64::from(sector) * TAU / f64::from(self.params.sector_count);
        wrap_to_pi(phi - offset)
    }

    /// Capacity of every bin in `roz_bin`.
    #[inline]
    #[must_use]
    pub fn max_tcs_per_bin(&self, roz_bin: usize) -> usize {
        self.params.max_tcs_per_bin[roz_bin] as usize
    }
}

fn validate(params: &Stage1TruncationParams) -> Result<(), ConfigError> {
    if params.roz_bins == 0 || params.roz_bins > MAX_RINGS {
        return Err(ConfigError::RingCountOutOfRange {
            rings: params.roz_bins,
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
    if params.max_tcs_per_bin.is_empty() {
        return Err(ConfigError::EmptyCapacityTable);
    }
    if params.max_tcs_per_bin.len() != params.roz_bins {
        return Err(ConfigError::TableSizeMismatch {
            table: "max_tcs_per_bin",
            expected: params.roz_bins,
            found: params.max_tcs_per_bin.len(),
        });
    }
    if params.phi_edges.len() != params.roz_bins {
        return Err(ConfigError::TableSizeMismatch {
            table: "phi_edges",
            expected: params.roz_bins,
            found: params.phi_edges.len(),
        });
    }
    if params.phi_bits == 0 || params.phi_bits > MAX_PHI_BITS {
        return Err(ConfigError::PhiBitsOutOfRange(params.phi_bits));
    }
    let capacity = BinLayout::new(params.phi_bits).phi_capacity();
    for (ring, edges) in params.phi_edges.iter().enumerate() {
        if !strictly_ascending(edges) {
            return Err(ConfigError::UnsortedPhiEdges { ring });
        }
        if edges.len() + 1 > capacity {
            return Err(ConfigError::PhiBinsExceedKeyField {
                ring,
                bins: edges.len() + 1,
                phi_bits: params.phi_bits,
            });
        }
    }
    if params.sector_count == 0 {
        return Err(ConfigError::NoSectors);
    }
    if !params.sector_phi_offset.is_finite() {
        return Err(ConfigError::NonFinite("sector_phi_offset"));
    }
    Ok(())
}
