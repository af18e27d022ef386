//! hgc-backend CLI
//!
//! Runs the trigger backend (stage-1 truncation and histogram seeding) over
//! events stored as JSON.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::too_many_lines
)]

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use hgc_backend_algorithms::{BackendPipeline, CellRanking, EventResult, SeedingInput};
use hgc_backend_algorithms::{ArrivalOrder, EnergyDescending};
use hgc_backend_core::{
    ClusterAlgoConfig, ClusterAlgoParams, Stage1TruncationConfig, Stage1TruncationParams,
    TriggerCell,
};
use log::{debug, info};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Core(#[from] hgc_backend_core::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Cells fed to the seeding stage.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SeedingSource {
    /// Every trigger cell of the event
    Raw,
    /// Cells surviving stage-1 truncation
    Truncated,
}

impl From<SeedingSource> for SeedingInput {
    fn from(source: SeedingSource) -> Self {
        match source {
            SeedingSource::Raw => SeedingInput::Raw,
            SeedingSource::Truncated => SeedingInput::Truncated,
        }
    }
}

/// Truncation ranking selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Ranking {
    /// Highest energy first
    Energy,
    /// First arrived first
    Arrival,
}

impl Ranking {
    fn strategy(self) -> Box<dyn CellRanking> {
        match self {
            Ranking::Energy => Box::new(EnergyDescending),
            Ranking::Arrival => Box::new(ArrivalOrder),
        }
    }
}

/// Configuration file layout. Missing sections take their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BackendParams {
    seeding: ClusterAlgoParams,
    truncation: Stage1TruncationParams,
}

impl BackendParams {
    fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                debug!("reading configuration from {}", path.display());
                let reader = BufReader::new(File::open(path)?);
                Ok(serde_json::from_reader(reader)?)
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(self) -> hgc_backend_core::Result<(ClusterAlgoConfig, Stage1TruncationConfig)> {
        let seeding = ClusterAlgoConfig::new(self.seeding)?;
        let truncation = Stage1TruncationConfig::new(self.truncation)?;
        Ok((seeding, truncation))
    }
}

/// HGCal trigger backend emulator.
#[derive(Parser)]
#[command(name = "hgc-backend")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run truncation and seeding over a JSON event file
    Run {
        /// Configuration file (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Events file: a JSON array of events, each an array of trigger cells
        #[arg(short, long)]
        events: PathBuf,

        /// Output file for the per-event results; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Cells fed to seeding
        #[arg(long, value_enum, default_value = "truncated")]
        seeding_input: SeedingSource,

        /// Truncation ranking
        #[arg(long, value_enum, default_value = "energy")]
        ranking: Ranking,

        /// Worker threads (rayon default when omitted)
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Validate a configuration file and print its geometry
    CheckConfig {
        /// Configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Benchmark the pipeline on synthetic events
    Benchmark {
        /// Number of events per batch
        #[arg(short, long, default_value = "1000")]
        events: usize,

        /// Trigger cells per event
        #[arg(long, default_value = "400")]
        cells: usize,

        /// Number of iterations
        #[arg(short, long, default_value = "3")]
        iterations: usize,

        /// Configuration file (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn read_events(path: &Path) -> Result<Vec<Vec<TriggerCell>>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_results(path: Option<&Path>, results: &[EventResult]) -> Result<()> {
    match path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, results)?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, results)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

/// Deterministic synthetic events: cells spread over the whole detector
/// with a few hot spots per event.
fn generate_events(
    n_events: usize,
    n_cells: usize,
    config: &ClusterAlgoParams,
) -> Vec<Vec<TriggerCell>> {
    let mut rng_seed: u64 = 12345;
    let mut rand = || {
        rng_seed = (rng_seed.wrapping_mul(1_103_515_245).wrapping_add(12345)) & 0x7fff_ffff;
        rng_seed
    };
    let roz_span = config.roz_max - config.roz_min;

    (0..n_events)
        .map(|_| {
            let hot_roz = config.roz_min + roz_span * (rand() % 1000) as f64 / 1000.0;
            let hot_phi = std::f64::consts::TAU * (rand() % 1000) as f64 / 1000.0;
            (0..n_cells)
                .map(|i| {
                    let (roz, phi, energy) = if i % 4 == 0 {
                        let droz = roz_span * 0.02 * ((rand() % 200) as f64 / 100.0 - 1.0);
                        let dphi = 0.05 * ((rand() % 200) as f64 / 100.0 - 1.0);
                        (hot_roz + droz, hot_phi + dphi, 200 + (rand() % 800) as u32)
                    } else {
                        (
                            config.roz_min + roz_span * (rand() % 10_000) as f64 / 10_000.0,
                            std::f64::consts::TAU * (rand() % 10_000) as f64 / 10_000.0,
                            (rand() % 50) as u32,
                        )
                    };
                    TriggerCell::new(i as u32, roz, phi, energy)
                        .with_layer((rand() % 28) as u8 + 1)
                        .with_sector((rand() % 3) as u8)
                })
                .collect()
        })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            events,
            output,
            seeding_input,
            ranking,
            threads,
        } => {
            let (seeding, truncation) = BackendParams::load(config.as_deref())?.validate()?;
            let events = read_events(&events)?;
            info!(
                "{} events, {} trigger cells",
                events.len(),
                events.iter().map(Vec::len).sum::<usize>()
            );

            let pipeline = BackendPipeline::new(&seeding, &truncation)
                .with_ranking(ranking.strategy())
                .with_seeding_input(seeding_input.into());

            let start = Instant::now();
            let results = match threads {
                Some(n) => rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()?
                    .install(|| pipeline.process_events(&events)),
                None => pipeline.process_events(&events),
            };
            let elapsed = start.elapsed();

            write_results(output.as_deref(), &results)?;

            let seeds: usize = results.iter().map(|r| r.seeds.len()).sum();
            let kept: usize = results.iter().map(|r| r.truncation.kept).sum();
            let dropped: usize = results.iter().map(|r| r.truncation.dropped).sum();
            info!(
                "Processed {} events in {:.2}s: {} seeds, {} cells kept, {} dropped",
                results.len(),
                elapsed.as_secs_f64(),
                seeds,
                kept,
                dropped
            );
            if let Some(path) = output {
                info!("Results written to {}", path.display());
            }
        }

        Commands::CheckConfig { config } => {
            let (seeding, truncation) = BackendParams::load(Some(&config))?.validate()?;
            println!("Configuration: {}", config.display());
            println!(
                "Seeding: {} rings x {} phi bins, r/z [{}, {})",
                seeding.rings(),
                seeding.phi_bins(),
                seeding.params().roz_min,
                seeding.params().roz_max
            );
            println!(
                "Seeding kernels: 1D {:?} >> {}, 2D {:?} >> {}",
                seeding.kernel_1d().weights,
                seeding.kernel_1d().shift,
                seeding.kernel_2d().weights,
                seeding.kernel_2d().shift
            );
            println!(
                "Threshold: {} + {} * ring + {} * ring^2",
                seeding.params().threshold.constant,
                seeding.params().threshold.linear,
                seeding.params().threshold.quadratic
            );
            let params = truncation.params();
            println!(
                "Truncation: {}, {} r/z bins, {} phi bits, {} sectors",
                if truncation.do_truncate() { "enabled" } else { "disabled" },
                truncation.roz_bins(),
                truncation.layout().phi_bits(),
                params.sector_count
            );
            println!("Max trigger cells per bin: {:?}", params.max_tcs_per_bin);
        }

        Commands::Benchmark {
            events,
            cells,
            iterations,
            config,
        } => {
            let params = BackendParams::load(config.as_deref())?;
            let batch = generate_events(events, cells, &params.seeding);
            let (seeding, truncation) = params.validate()?;

            println!(
                "Benchmarking with {} events x {} cells, {} iterations",
                events, cells, iterations
            );
            println!(
                "{:<10} | {:<10} | {:<15} | {:<15} | {:<15} | {:<8}",
                "Ranking", "Input", "Mean Time (ms)", "Min Time (ms)", "Max Time (ms)", "Seeds"
            );
            println!("{:-<85}", "");

            let variants = [
                (Ranking::Energy, SeedingSource::Truncated),
                (Ranking::Energy, SeedingSource::Raw),
                (Ranking::Arrival, SeedingSource::Truncated),
            ];

            for (ranking, source) in variants {
                let pipeline = BackendPipeline::new(&seeding, &truncation)
                    .with_ranking(ranking.strategy())
                    .with_seeding_input(source.into());

                // Warmup
                let seeds: usize = pipeline
                    .process_events(&batch)
                    .iter()
                    .map(|r| r.seeds.len())
                    .sum();

                let mut times = Vec::with_capacity(iterations);
                for _ in 0..iterations {
                    let start = Instant::now();
                    let results = pipeline.process_events(&batch);
                    times.push(start.elapsed().as_secs_f64() * 1000.0);
                    debug!("iteration: {} results", results.len());
                }

                let min_time = times.iter().fold(f64::INFINITY, |a, &b| a.min(b));
                let max_time = times.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                let mean_time = times.iter().sum::<f64>() / times.len().max(1) as f64;

                println!(
                    "{:<10} | {:<10} | {:<15.2} | {:<15.2} | {:<15.2} | {:<8}",
                    format!("{:?}", ranking),
                    format!("{:?}", source),
                    mean_time,
                    min_time,
                    max_time,
                    seeds
                );
            }
        }
    }

    Ok(())
}
