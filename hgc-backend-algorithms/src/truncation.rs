//! Stage-1 truncation.
//!
//! Trigger cells are binned in (r/z, phi) within their sector frame, and
//! each bin forwards at most the configured number of cells for its ring.
//! Survivors leave bin by bin in ascending packed-key order, ranked within
//! each bin.
#![allow(clippy::cast_possible_truncation)]

use crate::ranking::{CellRanking, EnergyDescending};
use hgc_backend_core::{PackedBin, Stage1TruncationConfig, TriggerCell};
use log::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Smallest multiple of four not below `n`.
///
/// The stage-1 link moves trigger cells in groups of four, so a bin holding
/// `n` cells occupies this many slots. Zero stays zero.
#[inline]
#[must_use]
pub fn round_up_to_multiple_of_four(n: usize) -> usize {
    n.div_ceil(4) * 4
}

/// Counters describing one truncation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TruncationSummary {
    /// Cells forwarded.
    pub kept: usize,
    /// Cells removed by truncation.
    pub dropped: usize,
    /// Bins holding at least one input cell.
    pub occupied_bins: usize,
    /// Link slots used by the forwarded cells, bin counts rounded up to
    /// multiples of four.
    pub link_slots: usize,
}

/// Scratch buffers reused across calls.
///
/// Holds no results: every call starts by clearing it.
#[derive(Debug, Default)]
pub struct TruncationState {
    entries: Vec<(PackedBin, usize)>,
}

impl TruncationState {
    /// Creates scratch space sized for `cells` trigger cells.
    #[must_use]
    pub fn with_capacity(cells: usize) -> Self {
        Self {
            entries: Vec::with_capacity(cells),
        }
    }
}

/// Stage-1 truncation with an injected ranking strategy.
#[derive(Debug, Clone, Default)]
pub struct Stage1Truncation<R = EnergyDescending> {
    ranking: R,
}

impl Stage1Truncation {
    /// Truncation ranking cells by descending energy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: CellRanking> Stage1Truncation<R> {
    /// Truncation using `ranking` to choose survivors.
    pub fn with_ranking(ranking: R) -> Self {
        Self { ranking }
    }

    /// Ranking strategy in use.
    pub fn ranking(&self) -> &R {
        &self.ranking
    }

    /// Packed bin of a trigger cell.
    #[must_use]
    pub fn bin_of(&self, tc: &TriggerCell, config: &Stage1TruncationConfig) -> PackedBin {
        let roz_bin = config.roz_bin(tc.r_over_z);
        let phi = config.rotated_phi(tc.phi, u32::from(tc.sector));
        let phi_bin = config.phi_bin(roz_bin, phi);
        config.layout().pack(roz_bin as u32, phi_bin as u32)
    }

    /// Truncates one event into `tcs_out`, which is cleared first.
    ///
    /// With truncation disabled the output is the input, in input order.
    pub fn run<'a>(
        &self,
        tcs_in: &'a [TriggerCell],
        config: &Stage1TruncationConfig,
        tcs_out: &mut Vec<&'a TriggerCell>,
    ) -> TruncationSummary {
        let mut state = TruncationState::with_capacity(tcs_in.len());
        self.run_with_state(tcs_in, config, &mut state, tcs_out)
    }

    /// Same as [`run`](Self::run), reusing caller-owned scratch space.
    pub fn run_with_state<'a>(
        &self,
        tcs_in: &'a [TriggerCell],
        config: &Stage1TruncationConfig,
        state: &mut TruncationState,
        tcs_out: &mut Vec<&'a TriggerCell>,
    ) -> TruncationSummary {
        tcs_out.clear();
        state.entries.clear();
        state
            .entries
            .extend(tcs_in.iter().enumerate().map(|(i, tc)| (self.bin_of(tc, config), i)));
        // stable: cells of a bin stay in input order
        state.entries.sort_by_key(|&(key, _)| key);

        let layout = config.layout();
        let mut summary = TruncationSummary::default();
        let mut start = 0;
        while start < state.entries.len() {
            let key = state.entries[start].0;
            let len = state.entries[start..]
                .iter()
                .take_while(|(k, _)| *k == key)
                .count();
            let group = &state.entries[start..start + len];
            start += len;
            summary.occupied_bins += 1;

            if !config.do_truncate() {
                summary.kept += len;
                summary.link_slots += round_up_to_multiple_of_four(len);
                continue;
            }

            let (roz_bin, phi_bin) = layout.unpack(key);
            let capacity = config.max_tcs_per_bin(roz_bin as usize);
            let first = tcs_out.len();
            tcs_out.extend(group.iter().map(|&(_, i)| &tcs_in[i]));
            self.ranking.rank(&mut tcs_out[first..]);
            let kept = len.min(capacity);
            tcs_out.truncate(first + kept);

            if kept < len {
                trace!(
                    "bin (roz {roz_bin}, phi {phi_bin}): kept {kept} of {len} trigger cells"
                );
            }
            summary.kept += kept;
            summary.dropped += len - kept;
            summary.link_slots += round_up_to_multiple_of_four(kept);
        }

        if !config.do_truncate() {
            tcs_out.extend(tcs_in.iter());
        }

        debug!(
            "stage-1 truncation ({}): kept {} of {} trigger cells in {} bins",
            self.ranking.name(),
            summary.kept,
            tcs_in.len(),
            summary.occupied_bins
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::ArrivalOrder;
    use hgc_backend_core::Stage1TruncationParams;
    use std::f64::consts::PI;

    /// Four r/z bins of 0.1, phi split at 0.5 rad in the sector frame.
    fn config(max_tcs: u32) -> Stage1TruncationConfig {
        Stage1TruncationConfig::new(
            Stage1TruncationParams::uniform(4, max_tcs, &[0.5]).with_roz_range(0.0, 0.4),
        )
        .unwrap()
    }

    fn ids(cells: &[&TriggerCell]) -> Vec<u32> {
        cells.iter().map(|tc| tc.id).collect()
    }

    #[test]
    fn test_round_up_to_multiple_of_four() {
        let expected = [(0, 0), (1, 4), (2, 4), (3, 4), (4, 4), (5, 8), (7, 8), (8, 8), (9, 12)];
        for (n, rounded) in expected {
            assert_eq!(round_up_to_multiple_of_four(n), rounded, "n = {n}");
            assert_eq!(round_up_to_multiple_of_four(rounded), rounded);
        }
    }

    #[test]
    fn test_bin_of_uses_sector_frame() {
        let config = config(4);
        let truncation = Stage1Truncation::new();
        let layout = config.layout();
        // sector 1 cell at 2pi/3 + 0.1 sits at 0.1 in the sector frame
        let tc = TriggerCell::new(1, 0.15, 2.0 * PI / 3.0 + 0.1, 10).with_sector(1);
        assert_eq!(layout.unpack(truncation.bin_of(&tc, &config)), (1, 0));
        let tc = TriggerCell::new(2, 0.15, 0.6, 10);
        assert_eq!(layout.unpack(truncation.bin_of(&tc, &config)), (1, 1));
    }

    #[test]
    fn test_phi_on_edge_goes_to_upper_bin() {
        let config = config(4);
        let truncation = Stage1Truncation::new();
        // 0.5 survives the rotation into [-pi, pi) exactly
        let tc = TriggerCell::new(1, 0.05, 0.5, 10);
        assert_eq!(config.layout().unpack(truncation.bin_of(&tc, &config)), (0, 1));
        let tc = TriggerCell::new(2, 0.05, 0.499_999, 10);
        assert_eq!(config.layout().unpack(truncation.bin_of(&tc, &config)), (0, 0));
    }

    #[test]
    fn test_out_of_range_roz_is_clamped() {
        let config = config(4);
        let truncation = Stage1Truncation::new();
        let layout = config.layout();
        let low = TriggerCell::new(1, -3.0, 0.1, 10);
        let high = TriggerCell::new(2, 3.0, 0.1, 10);
        assert_eq!(layout.unpack(truncation.bin_of(&low, &config)).0, 0);
        assert_eq!(layout.unpack(truncation.bin_of(&high, &config)).0, 3);
    }

    #[test]
    fn test_output_is_bin_ordered_and_ranked() {
        let config = config(2);
        let truncation = Stage1Truncation::new();
        let cells = vec![
            TriggerCell::new(1, 0.35, 0.1, 5),
            TriggerCell::new(2, 0.05, 0.1, 1),
            TriggerCell::new(3, 0.05, 0.1, 9),
            TriggerCell::new(4, 0.05, 0.1, 4),
            TriggerCell::new(5, 0.05, 1.5, 7),
        ];
        let mut out = Vec::new();
        let summary = truncation.run(&cells, &config, &mut out);
        // (0,0): 3, 4 kept, 2 dropped; (0,1): 5; (3,0): 1
        assert_eq!(ids(&out), vec![3, 4, 5, 1]);
        assert_eq!(
            summary,
            TruncationSummary {
                kept: 4,
                dropped: 1,
                occupied_bins: 3,
                link_slots: 12,
            }
        );
    }

    #[test]
    fn test_arrival_order_keeps_first_cells() {
        let config = config(2);
        let truncation = Stage1Truncation::with_ranking(ArrivalOrder);
        let cells = vec![
            TriggerCell::new(1, 0.05, 0.1, 1),
            TriggerCell::new(2, 0.05, 0.1, 9),
            TriggerCell::new(3, 0.05, 0.1, 20),
        ];
        let mut out = Vec::new();
        truncation.run(&cells, &config, &mut out);
        assert_eq!(ids(&out), vec![1, 2]);
    }

    #[test]
    fn test_zero_capacity_drops_ring() {
        let config = config(0);
        let truncation = Stage1Truncation::new();
        let cells = vec![TriggerCell::new(1, 0.05, 0.1, 1)];
        let mut out = Vec::new();
        let summary = truncation.run(&cells, &config, &mut out);
        assert!(out.is_empty());
        assert_eq!(summary.dropped, 1);
        assert_eq!(summary.link_slots, 0);
    }

    #[test]
    fn test_state_reuse_gives_identical_results() {
        let config = config(1);
        let truncation = Stage1Truncation::new();
        let cells = vec![
            TriggerCell::new(1, 0.05, 0.1, 1),
            TriggerCell::new(2, 0.05, 0.1, 9),
        ];
        let mut state = TruncationState::default();
        let mut out = Vec::new();
        let first = truncation.run_with_state(&cells, &config, &mut state, &mut out);
        let first_ids = ids(&out);
        let second = truncation.run_with_state(&cells, &config, &mut state, &mut out);
        assert_eq!(first, second);
        assert_eq!(first_ids, ids(&out));
        assert_eq!(first_ids, vec![2]);
    }
}
