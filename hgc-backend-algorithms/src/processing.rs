//! Per-event pipeline combining truncation and seeding.

use crate::ranking::{CellRanking, EnergyDescending};
use crate::seeding::HistoSeeding;
use crate::truncation::{Stage1Truncation, TruncationState, TruncationSummary};
use hgc_backend_core::{ClusterAlgoConfig, HistogramCell, Stage1TruncationConfig, TriggerCell};
use log::debug;
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which trigger cells feed the seeding stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SeedingInput {
    /// The full event, before truncation.
    Raw,
    /// The cells surviving stage-1 truncation.
    #[default]
    Truncated,
}

/// Output of one event.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventResult {
    /// Seeds in (ring, phi) order.
    pub seeds: Vec<HistogramCell>,
    /// Truncation counters.
    pub truncation: TruncationSummary,
}

/// Truncation followed by seeding, sharing read-only configuration.
pub struct BackendPipeline<'c, R = EnergyDescending> {
    seeding: HistoSeeding<'c>,
    truncation_config: &'c Stage1TruncationConfig,
    truncation: Stage1Truncation<R>,
    input: SeedingInput,
}

impl<'c> BackendPipeline<'c> {
    /// Pipeline with energy-descending truncation feeding seeding.
    #[must_use]
    pub fn new(
        cluster_config: &'c ClusterAlgoConfig,
        truncation_config: &'c Stage1TruncationConfig,
    ) -> Self {
        Self {
            seeding: HistoSeeding::new(cluster_config),
            truncation_config,
            truncation: Stage1Truncation::new(),
            input: SeedingInput::default(),
        }
    }
}

impl<'c, R: CellRanking> BackendPipeline<'c, R> {
    /// Replaces the truncation ranking strategy.
    pub fn with_ranking<S: CellRanking>(self, ranking: S) -> BackendPipeline<'c, S> {
        BackendPipeline {
            seeding: self.seeding,
            truncation_config: self.truncation_config,
            truncation: Stage1Truncation::with_ranking(ranking),
            input: self.input,
        }
    }

    /// Chooses what the seeding stage sees.
    #[must_use]
    pub fn with_seeding_input(mut self, input: SeedingInput) -> Self {
        self.input = input;
        self
    }

    /// Seeding input in use.
    pub fn seeding_input(&self) -> SeedingInput {
        self.input
    }

    /// Processes one event.
    pub fn process_event(&self, cells: &[TriggerCell]) -> EventResult {
        let mut state = TruncationState::with_capacity(cells.len());
        let mut kept = Vec::with_capacity(cells.len());
        self.process_event_with(cells, &mut state, &mut kept)
    }

    /// Processes one event reusing caller-owned buffers.
    pub fn process_event_with<'a>(
        &self,
        cells: &'a [TriggerCell],
        state: &mut TruncationState,
        kept: &mut Vec<&'a TriggerCell>,
    ) -> EventResult {
        let truncation =
            self.truncation
                .run_with_state(cells, self.truncation_config, state, kept);
        let seeds = match self.input {
            SeedingInput::Raw => self.seeding.run_seeding(cells),
            SeedingInput::Truncated => self.seeding.run_seeding(kept.iter().copied()),
        };
        EventResult { seeds, truncation }
    }

    /// Processes a batch of independent events in parallel, one task per
    /// event. Results keep the event order.
    pub fn process_events(&self, events: &[Vec<TriggerCell>]) -> Vec<EventResult> {
        let results: Vec<EventResult> = events
            .par_iter()
            .map_init(TruncationState::default, |state, event| {
                let mut kept = Vec::with_capacity(event.len());
                self.process_event_with(event, state, &mut kept)
            })
            .collect();
        debug!(
            "processed {} events, {} seeds",
            results.len(),
            results.iter().map(|r| r.seeds.len()).sum::<usize>()
        );
        results
    }
}
