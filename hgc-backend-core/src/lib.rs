//! hgc-backend-core: Core data model and configuration for the HGCal
//! level-1 trigger backend emulator.
//!
//! This crate provides the trigger-cell and histogram records, the packed
//! bin key used by the stage-1 firmware, the shared binning rules and the
//! validated algorithm configurations.
//!

pub mod bin_key;
pub mod binning;
pub mod cluster_config;
pub mod error;
pub mod histogram;
pub mod trigger_cell;
pub mod truncation_config;

pub use bin_key::{BinLayout, PackedBin, MAX_RINGS, RING_BITS, RING_MASK};
pub use cluster_config::{
    uniform_edges, ClusterAlgoConfig, ClusterAlgoParams, MaximaThreshold, SmearingKernel,
    SmearingKernel2d,
};
pub use error::{ConfigError, Error, Result};
pub use histogram::{Histogram, HistogramCell};
pub use trigger_cell::{total_energy, TriggerCell};
pub use truncation_config::{Stage1TruncationConfig, Stage1TruncationParams};
