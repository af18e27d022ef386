//! Histogram-based seed finding.
//!
//! Trigger cells are accumulated in a (r/z ring × phi bin) histogram which
//! is smeared, area-normalized and searched for local maxima. Each step
//! rewrites the working energy of the histogram in place:
//!
//! 1. aggregation into per-cell histogram contributions
//! 2. materialization of the full grid
//! 3. 1D smearing along phi (circular)
//! 4. area normalization
//! 5. 2D smearing across rings and phi
//! 6. threshold
//! 7. local maxima
//! 8. energy-weighted seed position
//!
//! All integer arithmetic saturates, like the fixed-width firmware.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]

use hgc_backend_core::binning::{circular_step, wrap_into};
use hgc_backend_core::{ClusterAlgoConfig, Histogram, HistogramCell, TriggerCell};
use log::{debug, trace};

/// Bins compared against a maximum candidate, as `(ring, phi)` offsets.
///
/// Phi offsets wrap around the ring; ring offsets past the first or last
/// ring are skipped.
pub const NEIGHBOUR_MASK: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Histogram seeding stage.
///
/// Borrows its configuration; one instance can serve any number of events,
/// concurrently.
#[derive(Debug, Clone, Copy)]
pub struct HistoSeeding<'c> {
    config: &'c ClusterAlgoConfig,
}

impl<'c> HistoSeeding<'c> {
    /// Creates a seeding stage for `config`.
    #[must_use]
    pub fn new(config: &'c ClusterAlgoConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &'c ClusterAlgoConfig {
        self.config
    }

    /// Runs the full pipeline and returns the seeds in (ring, phi) order.
    ///
    /// Accepts any iterator over trigger cells, so both a raw event and the
    /// output of stage-1 truncation can be fed directly.
    pub fn run_seeding<'a, I>(&self, trigger_cells: I) -> Vec<HistogramCell>
    where
        I: IntoIterator<Item = &'a TriggerCell>,
    {
        let seeds = self.build_histogram(trigger_cells).into_maxima();
        debug!("histo seeding: {} seeds", seeds.len());
        seeds
    }

    /// Runs the full pipeline and returns the processed histogram, with the
    /// seeds flagged as maxima.
    pub fn build_histogram<'a, I>(&self, trigger_cells: I) -> Histogram
    where
        I: IntoIterator<Item = &'a TriggerCell>,
    {
        let mut histogram = self.aggregate(trigger_cells);
        self.smear_histogram_1d(&mut histogram);
        self.normalize_area(&mut histogram);
        self.smear_histogram_2d(&mut histogram);
        self.threshold_maxima_finder(&mut histogram);
        self.local_maxima_finder(&mut histogram);
        self.calculate_average_position(&mut histogram);
        histogram
    }

    /// Aggregation and materialization only: the raw energy grid.
    pub fn aggregate<'a, I>(&self, trigger_cells: I) -> Histogram
    where
        I: IntoIterator<Item = &'a TriggerCell>,
    {
        let cells = self.trigger_cells_to_histogram_cells(trigger_cells);
        self.make_histogram(&cells)
    }

    /// Maps every trigger cell to a single-cell contribution to its bin.
    pub fn trigger_cells_to_histogram_cells<'a, I>(&self, trigger_cells: I) -> Vec<HistogramCell>
    where
        I: IntoIterator<Item = &'a TriggerCell>,
    {
        trigger_cells
            .into_iter()
            .map(|tc| {
                let ring = self.config.ring_of(tc.r_over_z);
                let (phi_bin, phi) = self.config.phi_bin_of(ring, tc.phi);
                HistogramCell::from_trigger_cell(tc, ring as u32, phi_bin as u32, phi)
            })
            .collect()
    }

    /// Sums contributions into a complete grid. Empty bins sit at their
    /// geometric centre with zero energy.
    #[must_use]
    pub fn make_histogram(&self, contributions: &[HistogramCell]) -> Histogram {
        let mut histogram = Histogram::new(self.config.rings(), self.config.phi_bins());
        for cell in histogram.cells_mut() {
            let (ring, phi_bin) = (cell.ring as usize, cell.phi_bin as usize);
            cell.phi = self.config.phi_bin_centre(ring, phi_bin);
            cell.r_over_z = self.config.ring_centre(ring);
        }
        for contribution in contributions {
            *histogram.cell_mut(contribution.ring as usize, contribution.phi_bin as usize) +=
                contribution;
        }
        trace!(
            "histogram filled from {} trigger cells, raw energy {}",
            contributions.len(),
            histogram.total_raw_energy()
        );
        histogram
    }

    fn smear_histogram_1d(&self, histogram: &mut Histogram) {
        let kernel = self.config.kernel_1d();
        let half = (kernel.weights.len() / 2) as isize;
        let phi_bins = histogram.phi_bins();
        let mut row = Vec::with_capacity(phi_bins);

        for ring in 0..histogram.rings() {
            row.clear();
            row.extend((0..phi_bins).map(|p| histogram.cell(ring, p).energy));
            for phi_bin in 0..phi_bins {
                let sum = kernel
                    .weights
                    .iter()
                    .enumerate()
                    .fold(0u64, |acc, (k, &weight)| {
                        let src = circular_step(phi_bin, k as isize - half, phi_bins);
                        acc.saturating_add(u64::from(weight).saturating_mul(row[src]))
                    });
                histogram.cell_mut(ring, phi_bin).energy = sum >> kernel.shift;
            }
        }
    }

    fn normalize_area(&self, histogram: &mut Histogram) {
        let shift = self.config.area_normalization_shift();
        for cell in histogram.cells_mut() {
            let factor = self
                .config
                .area_normalization(cell.ring as usize, cell.phi_bin as usize);
            cell.energy = cell.energy.saturating_mul(u64::from(factor)) >> shift;
        }
    }

    fn smear_histogram_2d(&self, histogram: &mut Histogram) {
        let kernel = self.config.kernel_2d();
        let ring_half = (kernel.weights.len() / 2) as isize;
        let phi_half = (kernel.weights[0].len() / 2) as isize;
        let source: Vec<u64> = histogram.cells().iter().map(|c| c.energy).collect();

        for ring in 0..histogram.rings() {
            for phi_bin in 0..histogram.phi_bins() {
                let mut sum = 0u64;
                for (i, row) in kernel.weights.iter().enumerate() {
                    for (j, &weight) in row.iter().enumerate() {
                        let Some(src) = histogram.neighbour_index(
                            ring,
                            phi_bin,
                            i as isize - ring_half,
                            j as isize - phi_half,
                        ) else {
                            continue;
                        };
                        sum = sum.saturating_add(u64::from(weight).saturating_mul(source[src]));
                    }
                }
                histogram.cell_mut(ring, phi_bin).energy = sum >> kernel.shift;
            }
        }
    }

    fn threshold_maxima_finder(&self, histogram: &mut Histogram) {
        for cell in histogram.cells_mut() {
            cell.is_maximum =
                cell.energy > 0 && cell.energy >= self.config.threshold(cell.ring as usize);
        }
    }

    /// Keeps candidates not exceeded by any bin of [`NEIGHBOUR_MASK`].
    ///
    /// Runs in two passes. The first drops candidates with a strictly
    /// higher neighbour. The second resolves equal energies among the
    /// remaining candidates in favour of the lower (ring, phi) bin, so
    /// each plateau keeps exactly one seed.
    fn local_maxima_finder(&self, histogram: &mut Histogram) {
        let grid: &Histogram = histogram;
        let energies: Vec<u64> = grid.cells().iter().map(|c| c.energy).collect();
        let phi_bins = grid.phi_bins();
        let neighbours = |idx: usize| {
            let (ring, phi_bin) = (idx / phi_bins, idx % phi_bins);
            NEIGHBOUR_MASK
                .iter()
                .filter_map(move |&(dr, dp)| grid.neighbour_index(ring, phi_bin, dr, dp))
        };

        let unbeaten: Vec<bool> = grid
            .cells()
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                cell.is_maximum && neighbours(idx).all(|n| energies[n] <= energies[idx])
            })
            .collect();

        let seeds: Vec<bool> = (0..energies.len())
            .map(|idx| {
                unbeaten[idx]
                    && !neighbours(idx)
                        .any(|n| n < idx && unbeaten[n] && energies[n] == energies[idx])
            })
            .collect();

        for (cell, seed) in histogram.cells_mut().iter_mut().zip(seeds) {
            cell.is_maximum = seed;
        }
    }

    /// Replaces each maximum's position with the energy-weighted mean of the
    /// raw contributions in its neighbourhood.
    fn calculate_average_position(&self, histogram: &mut Histogram) {
        let phi_bins = histogram.phi_bins();
        let maxima: Vec<usize> = histogram
            .cells()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_maximum)
            .map(|(idx, _)| idx)
            .collect();
        let mut window = Vec::with_capacity(NEIGHBOUR_MASK.len() + 1);

        for idx in maxima {
            let (ring, phi_bin) = (idx / phi_bins, idx % phi_bins);
            window.clear();
            window.push(idx);
            window.extend(
                NEIGHBOUR_MASK
                    .iter()
                    .filter_map(|&(dr, dp)| histogram.neighbour_index(ring, phi_bin, dr, dp)),
            );
            // narrow rings can fold the mask onto the same bin
            window.sort_unstable();
            window.dedup();

            let (lo, period) = self.config.phi_span(ring);
            let reference = histogram.cells()[idx].phi;
            let mut sum_energy = 0.0;
            let mut sum_dphi = 0.0;
            let mut sum_roz = 0.0;
            for &n in &window {
                let neighbour = &histogram.cells()[n];
                if let Some((phi, roz)) = neighbour.raw_centroid() {
                    let weight = neighbour.raw_energy as f64;
                    let dphi = wrap_into(phi - reference, -0.5 * period, period);
                    sum_energy += weight;
                    sum_dphi += weight * dphi;
                    sum_roz += weight * roz;
                }
            }

            if sum_energy > 0.0 {
                let seed = &mut histogram.cells_mut()[idx];
                seed.phi = wrap_into(reference + sum_dphi / sum_energy, lo, period);
                seed.r_over_z = sum_roz / sum_energy;
            }
        }
    }
}
