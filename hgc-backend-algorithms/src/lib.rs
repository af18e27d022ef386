//! hgc-backend-algorithms: Trigger backend algorithms.
//!
//! This crate provides:
//! - **Histo-Seeding** - (r/z × phi) histogram smearing and local-maximum search
//! - **Stage-1 Truncation** - per-bin capping of trigger cells with a pluggable ranking
//! - **Pipeline** - truncation and seeding per event, parallel over event batches
//!
#![warn(missing_docs)]

mod processing;
pub mod ranking;
mod seeding;
mod truncation;

pub use processing::{BackendPipeline, EventResult, SeedingInput};
pub use ranking::{ArrivalOrder, CellRanking, EnergyDescending};
pub use seeding::{HistoSeeding, NEIGHBOUR_MASK};
pub use truncation::{
    round_up_to_multiple_of_four, Stage1Truncation, TruncationState, TruncationSummary,
};

// Re-export core types used in the public API
pub use hgc_backend_core::{
    ClusterAlgoConfig, Histogram, HistogramCell, Stage1TruncationConfig, TriggerCell,
};
