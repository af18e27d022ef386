//! Histogram cells and the (ring × phi) accumulation grid.
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use crate::binning::circular_step;
use crate::TriggerCell;
use std::ops::AddAssign;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One bin of the seeding histogram.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramCell {
    /// r/z ring index.
    pub ring: u32,
    /// Phi bin index within the ring.
    pub phi_bin: u32,
    /// Working energy, rewritten by each smearing and normalization step.
    pub energy: u64,
    /// Unprocessed sum of contributing trigger-cell energies.
    pub raw_energy: u64,
    /// Number of contributing trigger cells.
    pub n_cells: u32,
    /// Sum of `energy * phi` over contributing trigger cells.
    pub phi_sum: f64,
    /// Sum of `energy * r_over_z` over contributing trigger cells.
    pub r_over_z_sum: f64,
    /// Position in phi: bin centre, or refined seed position.
    pub phi: f64,
    /// Position in r/z: ring centre, or refined seed position.
    pub r_over_z: f64,
    /// Maximum candidate / final seed flag.
    pub is_maximum: bool,
}

impl HistogramCell {
    /// Creates an empty bin.
    #[must_use]
    pub fn new(ring: u32, phi_bin: u32) -> Self {
        Self {
            ring,
            phi_bin,
            ..Self::default()
        }
    }

    /// Creates a single-cell contribution to bin `(ring, phi_bin)`.
    ///
    /// `phi` is the cell's azimuth already wrapped into the ring's range.
    #[must_use]
    pub fn from_trigger_cell(tc: &TriggerCell, ring: u32, phi_bin: u32, phi: f64) -> Self {
        let energy = u64::from(tc.energy);
        let weight = f64::from(tc.energy);
        Self {
            ring,
            phi_bin,
            energy,
            raw_energy: energy,
            n_cells: 1,
            phi_sum: weight * phi,
            r_over_z_sum: weight * tc.r_over_z,
            phi,
            r_over_z: tc.r_over_z,
            is_maximum: false,
        }
    }

    /// Energy-weighted position of the raw contributions, if any.
    #[must_use]
    pub fn raw_centroid(&self) -> Option<(f64, f64)> {
        if self.raw_energy == 0 {
            return None;
        }
        let w = self.raw_energy as f64;
        Some((self.phi_sum / w, self.r_over_z_sum / w))
    }
}

impl AddAssign<&HistogramCell> for HistogramCell {
    fn add_assign(&mut self, other: &HistogramCell) {
        self.energy = self.energy.saturating_add(other.energy);
        self.raw_energy = self.raw_energy.saturating_add(other.raw_energy);
        self.n_cells = self.n_cells.saturating_add(other.n_cells);
        self.phi_sum += other.phi_sum;
        self.r_over_z_sum += other.r_over_z_sum;
    }
}

/// Complete ring-major grid of histogram cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    rings: usize,
    phi_bins: usize,
    cells: Vec<HistogramCell>,
}

impl Histogram {
    /// Creates an empty grid, every bin at zero energy.
    #[must_use]
    pub fn new(rings: usize, phi_bins: usize) -> Self {
        let mut cells = Vec::with_capacity(rings * phi_bins);
        for ring in 0..rings {
            for phi_bin in 0..phi_bins {
                cells.push(HistogramCell::new(ring as u32, phi_bin as u32));
            }
        }
        Self {
            rings,
            phi_bins,
            cells,
        }
    }

    /// Number of r/z rings.
    #[inline]
    #[must_use]
    pub fn rings(&self) -> usize {
        self.rings
    }

    /// Number of phi bins per ring.
    #[inline]
    #[must_use]
    pub fn phi_bins(&self) -> usize {
        self.phi_bins
    }

    /// Flat index of a bin.
    #[inline]
    #[must_use]
    pub fn index(&self, ring: usize, phi_bin: usize) -> usize {
        ring * self.phi_bins + phi_bin
    }

    /// Index of the bin `ring_offset` rings and `phi_offset` phi bins away,
    /// wrapping in phi. `None` past the first or last ring.
    #[must_use]
    pub fn neighbour_index(
        &self,
        ring: usize,
        phi_bin: usize,
        ring_offset: isize,
        phi_offset: isize,
    ) -> Option<usize> {
        let ring = ring.checked_add_signed(ring_offset)?;
        if ring >= self.rings {
            return None;
        }
        Some(self.index(ring, circular_step(phi_bin, phi_offset, self.phi_bins)))
    }

    /// Bin at `(ring, phi_bin)`.
    #[inline]
    #[must_use]
    pub fn cell(&self, ring: usize, phi_bin: usize) -> &HistogramCell {
        &self.cells[self.index(ring, phi_bin)]
    }

    /// Mutable bin at `(ring, phi_bin)`.
    #[inline]
    pub fn cell_mut(&mut self, ring: usize, phi_bin: usize) -> &mut HistogramCell {
        let idx = self.index(ring, phi_bin);
        &mut self.cells[idx]
    }

    /// All bins in ring-major order.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[HistogramCell] {
        &self.cells
    }

    /// All bins, mutably.
    #[inline]
    pub fn cells_mut(&mut self) -> &mut [HistogramCell] {
        &mut self.cells
    }

    /// Sum of raw accumulated energy over the grid.
    #[must_use]
    pub fn total_raw_energy(&self) -> u64 {
        self.cells.iter().map(|c| c.raw_energy).sum()
    }

    /// Bins currently flagged as maxima, in ring-major order.
    pub fn maxima(&self) -> impl Iterator<Item = &HistogramCell> {
        self.cells.iter().filter(|c| c.is_maximum)
    }

    /// Consumes the grid, keeping only the flagged maxima.
    #[must_use]
    pub fn into_maxima(self) -> Vec<HistogramCell> {
        self.cells.into_iter().filter(|c| c.is_maximum).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_histogram_layout() {
        let histo = Histogram::new(3, 4);
        assert_eq!(histo.cells().len(), 12);
        let cell = histo.cell(2, 1);
        assert_eq!((cell.ring, cell.phi_bin), (2, 1));
        assert_eq!(histo.index(2, 1), 9);
        assert_eq!(histo.total_raw_energy(), 0);
    }

    #[test]
    fn test_neighbour_index_wraps_phi_not_rings() {
        let histo = Histogram::new(3, 4);
        assert_eq!(histo.neighbour_index(1, 0, 0, -1), Some(histo.index(1, 3)));
        assert_eq!(histo.neighbour_index(1, 3, 1, 1), Some(histo.index(2, 0)));
        assert_eq!(histo.neighbour_index(0, 0, -1, 0), None);
        assert_eq!(histo.neighbour_index(2, 0, 1, 0), None);
    }

    #[test]
    fn test_accumulate_and_centroid() {
        let a = TriggerCell::new(1, 0.2, 1.0, 10);
        let b = TriggerCell::new(2, 0.4, 2.0, 30);
        let mut bin = HistogramCell::new(0, 0);
        bin += &HistogramCell::from_trigger_cell(&a, 0, 0, a.phi);
        bin += &HistogramCell::from_trigger_cell(&b, 0, 0, b.phi);

        assert_eq!(bin.raw_energy, 40);
        assert_eq!(bin.energy, 40);
        assert_eq!(bin.n_cells, 2);
        let (phi, roz) = bin.raw_centroid().unwrap();
        assert_relative_eq!(phi, 1.75, epsilon = 1e-12);
        assert_relative_eq!(roz, 0.35, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_bin_has_no_centroid() {
        assert!(HistogramCell::new(0, 0).raw_centroid().is_none());
    }

    #[test]
    fn test_into_maxima() {
        let mut histo = Histogram::new(2, 2);
        histo.cell_mut(1, 0).is_maximum = true;
        assert_eq!(histo.maxima().count(), 1);
        let seeds = histo.into_maxima();
        assert_eq!(seeds.len(), 1);
        assert_eq!((seeds[0].ring, seeds[0].phi_bin), (1, 0));
    }
}
