//! Error types for hgc-backend-core.

use thiserror::Error;

/// Result type alias for hgc-backend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration rejected at construction time.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Reasons a configuration is rejected.
///
/// These are only ever produced while building a
/// [`ClusterAlgoConfig`](crate::ClusterAlgoConfig) or a
/// [`Stage1TruncationConfig`](crate::Stage1TruncationConfig); the per-event
/// algorithms assume a validated configuration and never fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Ring count is zero or does not fit the 6-bit ring field.
    #[error("ring count {rings} out of range (1..={max})")]
    RingCountOutOfRange { rings: usize, max: usize },

    /// r/z range is empty or not finite.
    #[error("invalid r/z range: [{min}, {max}]")]
    InvalidRozRange { min: f64, max: f64 },

    /// Per-ring table length does not match the ring count.
    #[error("{table} has {found} entries, expected {expected}")]
    TableSizeMismatch {
        table: &'static str,
        expected: usize,
        found: usize,
    },

    /// Phi edge table of a ring has too few entries.
    #[error("ring {ring}: phi edge table needs at least {min} entries, found {found}")]
    TooFewPhiEdges { ring: usize, min: usize, found: usize },

    /// Rings disagree on the number of phi bins.
    #[error("ring {ring}: {found} phi bins, expected {expected}")]
    PhiBinCountMismatch {
        ring: usize,
        expected: usize,
        found: usize,
    },

    /// Phi edges are not strictly ascending or not finite.
    #[error("ring {ring}: phi edges must be finite and strictly ascending")]
    UnsortedPhiEdges { ring: usize },

    /// Number of phi bins in a ring does not fit the packed phi field.
    #[error("ring {ring}: {bins} phi bins do not fit in {phi_bits} bits")]
    PhiBinsExceedKeyField {
        ring: usize,
        bins: usize,
        phi_bits: u32,
    },

    /// Phi field width out of range.
    #[error("phi field width {0} out of range (1..=26)")]
    PhiBitsOutOfRange(u32),

    /// Smearing kernel is empty, even-sized or ragged.
    #[error("invalid {name} kernel: {reason}")]
    InvalidKernel {
        name: &'static str,
        reason: &'static str,
    },

    /// Fixed-point shift would discard the whole word.
    #[error("{name} shift {shift} must be below 64")]
    ShiftOutOfRange { name: &'static str, shift: u32 },

    /// Capacity table is empty.
    #[error("max cells per bin table is empty")]
    EmptyCapacityTable,

    /// No sectors configured.
    #[error("sector count must be at least 1")]
    NoSectors,

    /// A scalar parameter is NaN or infinite.
    #[error("{0} must be finite")]
    NonFinite(&'static str),
}
