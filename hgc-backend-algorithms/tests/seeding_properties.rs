#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
use approx::assert_relative_eq;
use hgc_backend_algorithms::{HistoSeeding, HistogramCell};
use hgc_backend_core::{
    total_energy, uniform_edges, ClusterAlgoConfig, ClusterAlgoParams, MaximaThreshold,
    TriggerCell,
};
use std::f64::consts::TAU;

/// 8 rings of 0.1 in r/z, 16 phi bins, threshold 10.
fn config() -> ClusterAlgoConfig {
    ClusterAlgoConfig::new(
        ClusterAlgoParams::uniform(8, 16)
            .with_roz_range(0.0, 0.8)
            .with_threshold(MaximaThreshold::flat(10)),
    )
    .unwrap()
}

fn at_bin(config: &ClusterAlgoConfig, id: u32, ring: usize, phi_bin: usize, e: u32) -> TriggerCell {
    TriggerCell::new(
        id,
        config.ring_centre(ring),
        config.phi_bin_centre(ring, phi_bin),
        e,
    )
}

fn bins(seeds: &[HistogramCell]) -> Vec<(u32, u32)> {
    seeds.iter().map(|s| (s.ring, s.phi_bin)).collect()
}

/// Deterministic pseudo-random event, including cells outside the
/// configured r/z range and phi values outside [0, 2pi).
fn generate_cells(n: usize) -> Vec<TriggerCell> {
    let mut rng_seed: u64 = 12345;
    let mut rand = || {
        rng_seed = (rng_seed.wrapping_mul(1_103_515_245).wrapping_add(12345)) & 0x7fff_ffff;
        rng_seed
    };
    (0..n)
        .map(|i| {
            let roz = -0.1 + 1.1 * (rand() % 10_000) as f64 / 10_000.0;
            let phi = -7.0 + 14.0 * (rand() % 10_000) as f64 / 10_000.0;
            let energy = (rand() % 5_000) as u32;
            TriggerCell::new(i as u32, roz, phi, energy)
        })
        .collect()
}

#[test]
fn test_energy_conservation() {
    let config = config();
    let seeding = HistoSeeding::new(&config);
    for n in [0, 1, 17, 500] {
        let cells = generate_cells(n);
        let histogram = seeding.aggregate(&cells);
        assert_eq!(
            histogram.total_raw_energy(),
            total_energy(&cells),
            "energy mismatch for {} cells",
            n
        );
        let counted: u32 = histogram.cells().iter().map(|c| c.n_cells).sum();
        assert_eq!(counted as usize, n);
    }
}

#[test]
fn test_empty_input_gives_no_seeds() {
    let config = config();
    let seeding = HistoSeeding::new(&config);
    let seeds = seeding.run_seeding(&Vec::<TriggerCell>::new());
    assert!(seeds.is_empty());

    let histogram = seeding.build_histogram(std::iter::empty());
    assert_eq!(histogram.cells().len(), 8 * 16);
    assert!(histogram.cells().iter().all(|c| c.energy == 0));
}

#[test]
fn test_single_seed_isolation() {
    let config = config();
    let seeding = HistoSeeding::new(&config);
    let cells = vec![
        TriggerCell::new(1, 0.33, 2.0, 1000),
        // far away and below threshold after smearing
        TriggerCell::new(2, 0.75, 5.0, 20),
    ];
    let seeds = seeding.run_seeding(&cells);
    assert_eq!(bins(&seeds), vec![(3, 5)]);
    let seed = &seeds[0];
    assert!(seed.is_maximum);
    assert_eq!(seed.raw_energy, 1000);
    assert_relative_eq!(seed.phi, 2.0, epsilon = 1e-9);
    assert_relative_eq!(seed.r_over_z, 0.33, epsilon = 1e-9);
}

#[test]
fn test_seed_position_is_energy_weighted() {
    let config = config();
    let seeding = HistoSeeding::new(&config);
    let cells = vec![
        at_bin(&config, 1, 3, 5, 300),
        at_bin(&config, 2, 3, 6, 100),
    ];
    let seeds = seeding.run_seeding(&cells);
    assert_eq!(bins(&seeds), vec![(3, 5)]);
    let expected =
        (300.0 * config.phi_bin_centre(3, 5) + 100.0 * config.phi_bin_centre(3, 6)) / 400.0;
    assert_relative_eq!(seeds[0].phi, expected, epsilon = 1e-9);
}

#[test]
fn test_plateau_in_phi_picks_lower_bin() {
    let config = config();
    let seeding = HistoSeeding::new(&config);
    let cells = vec![
        at_bin(&config, 1, 4, 9, 400),
        at_bin(&config, 2, 4, 8, 400),
    ];
    let histogram = seeding.build_histogram(&cells);
    assert_eq!(histogram.cell(4, 8).energy, histogram.cell(4, 9).energy);

    for _ in 0..10 {
        let seeds = seeding.run_seeding(&cells);
        assert_eq!(bins(&seeds), vec![(4, 8)]);
    }
    let reversed: Vec<TriggerCell> = cells.iter().rev().copied().collect();
    assert_eq!(bins(&seeding.run_seeding(&reversed)), vec![(4, 8)]);
}

#[test]
fn test_plateau_across_rings_picks_lower_ring() {
    let config = config();
    let seeding = HistoSeeding::new(&config);
    let cells = vec![
        at_bin(&config, 1, 4, 5, 400),
        at_bin(&config, 2, 3, 5, 400),
    ];
    let histogram = seeding.build_histogram(&cells);
    assert_eq!(histogram.cell(3, 5).energy, histogram.cell(4, 5).energy);
    assert_eq!(bins(&seeding.run_seeding(&cells)), vec![(3, 5)]);
}

#[test]
fn test_plateau_across_phi_wrap_picks_bin_zero() {
    let config = config();
    let seeding = HistoSeeding::new(&config);
    let cells = vec![
        at_bin(&config, 1, 2, 15, 400),
        at_bin(&config, 2, 2, 0, 400),
    ];
    assert_eq!(bins(&seeding.run_seeding(&cells)), vec![(2, 0)]);
}

#[test]
fn test_threshold_depends_on_ring() {
    let config = ClusterAlgoConfig::new(
        ClusterAlgoParams::uniform(8, 16)
            .with_roz_range(0.0, 0.8)
            .with_threshold(MaximaThreshold {
                constant: 10,
                linear: 0,
                quadratic: 10,
            }),
    )
    .unwrap();
    let seeding = HistoSeeding::new(&config);
    // same deposit: 187 after smearing, passes in ring 1 (20), fails in ring 6 (370)
    let cells = vec![
        at_bin(&config, 1, 1, 3, 1000),
        at_bin(&config, 2, 6, 11, 1000),
    ];
    assert_eq!(bins(&seeding.run_seeding(&cells)), vec![(1, 3)]);
}

#[test]
fn test_phi_on_edge_goes_to_upper_bin() {
    let mut edges = vec![uniform_edges(0.0, TAU, 7); 2];
    edges[0] = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, TAU];
    let config = ClusterAlgoConfig::new(
        ClusterAlgoParams::uniform(2, 7)
            .with_roz_range(0.0, 0.2)
            .with_phi_edges(edges)
            .with_area_normalization_from_edges(8),
    )
    .unwrap();
    let seeding = HistoSeeding::new(&config);
    let cells = vec![
        TriggerCell::new(1, 0.05, 3.0, 10),
        TriggerCell::new(2, 0.05, 2.999_999, 10),
    ];
    let histogram = seeding.aggregate(&cells);
    assert_eq!(histogram.cell(0, 3).raw_energy, 10);
    assert_eq!(histogram.cell(0, 2).raw_energy, 10);
}

#[test]
fn test_seeds_from_truncated_references() {
    let config = config();
    let seeding = HistoSeeding::new(&config);
    let cells = vec![TriggerCell::new(1, 0.33, 2.0, 1000)];
    let refs: Vec<&TriggerCell> = cells.iter().collect();
    assert_eq!(
        seeding.run_seeding(refs.iter().copied()),
        seeding.run_seeding(&cells)
    );
}
