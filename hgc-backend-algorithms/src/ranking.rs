//! Ranking strategies deciding which trigger cells survive truncation.

use hgc_backend_core::TriggerCell;

/// Orders the cells of one truncation bin, best first.
///
/// Implementations must be deterministic: the same slice contents in the
/// same order must always produce the same ranking.
pub trait CellRanking: Send + Sync {
    /// Strategy name.
    fn name(&self) -> &'static str;

    /// Reorders `cells` in place, highest priority first.
    fn rank(&self, cells: &mut [&TriggerCell]);
}

/// Highest energy first; ties go to the lower geometry id, then to the
/// earlier cell in the input.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnergyDescending;

impl CellRanking for EnergyDescending {
    fn name(&self) -> &'static str {
        "EnergyDescending"
    }

    fn rank(&self, cells: &mut [&TriggerCell]) {
        // stable: equal (energy, id) keep input order
        cells.sort_by(|a, b| b.energy.cmp(&a.energy).then_with(|| a.id.cmp(&b.id)));
    }
}

/// No reordering: cells leave in the order they arrived, like an unsorted
/// FIFO link.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArrivalOrder;

impl CellRanking for ArrivalOrder {
    fn name(&self) -> &'static str {
        "ArrivalOrder"
    }

    fn rank(&self, _cells: &mut [&TriggerCell]) {}
}

impl<R: CellRanking + ?Sized> CellRanking for Box<R> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn rank(&self, cells: &mut [&TriggerCell]) {
        (**self).rank(cells);
    }
}

impl<R: CellRanking + ?Sized> CellRanking for &R {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn rank(&self, cells: &mut [&TriggerCell]) {
        (**self).rank(cells);
    }
}
