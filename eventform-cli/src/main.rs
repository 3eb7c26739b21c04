//! eventform CLI
//!
//! Replays recorded strip hits through the event formation pipeline.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

mod replay;

use clap::{Parser, Subcommand, ValueEnum};
use eventform_core::{MatchPolicy, TieBreak};
use replay::{read_hits, replay, write_events_csv, ReplayConfig};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
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

    #[error("Config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] eventform_core::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Matching policy selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
    /// Pair clusters whose end times are close
    End,
    /// Pair clusters whose time spans overlap
    Overlap,
    /// End-time pairing, best candidate by smallest time difference
    MultiHit,
    /// End-time pairing, best candidate by largest weight
    MultiHitWeight,
}

impl From<Policy> for MatchPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::End => MatchPolicy::End,
            Policy::Overlap => MatchPolicy::Overlap,
            Policy::MultiHit => MatchPolicy::MultiHit {
                tie_break: TieBreak::SmallestDeltaTime,
            },
            Policy::MultiHitWeight => MatchPolicy::MultiHit {
                tie_break: TieBreak::LargestWeight,
            },
        }
    }
}

/// Streaming event formation for strip neutron detectors.
#[derive(Parser)]
#[command(name = "eventform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a hit file and write the formed events as CSV
    Replay {
        /// Input hit file (module,time,plane,coordinate,weight)
        input: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// JSON replay configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the matching policy
        #[arg(long, value_enum)]
        policy: Option<Policy>,

        /// Override the matcher time window (ticks)
        #[arg(long)]
        max_delta_time: Option<u64>,

        /// Override the number of hits per flush
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override the merger latency bound (ticks)
        #[arg(long)]
        merger_latency: Option<u64>,

        /// Print progress information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the default replay configuration as JSON
    Config,

    /// Show hit counts per module and plane
    Info {
        /// Input hit file
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            input,
            output,
            config,
            policy,
            max_delta_time,
            batch_size,
            merger_latency,
            verbose,
        } => {
            let mut config = match config {
                Some(path) => ReplayConfig::from_json_file(path)?,
                None => ReplayConfig::default(),
            };
            if let Some(policy) = policy {
                config.pipeline.matcher = config.pipeline.matcher.with_policy(policy.into());
            }
            if let Some(delta) = max_delta_time {
                config.pipeline.matcher = config.pipeline.matcher.with_max_delta_time(delta);
            }
            if let Some(size) = batch_size {
                config.batch_size = size;
            }
            if let Some(latency) = merger_latency {
                config.merger_latency = latency;
            }

            if verbose {
                eprintln!("Reading: {}", input.display());
                eprintln!("Planes: {:?}", config.pipeline.plane_ids());
                eprintln!("Policy: {}", config.pipeline.matcher.policy.name());
                eprintln!(
                    "Max delta time: {} ticks",
                    config.pipeline.matcher.max_delta_time
                );
                eprintln!("Batch size: {}", config.batch_size);
            }

            let start = Instant::now();
            let hits = read_file(&input)?;
            let out = replay(&config, &hits)?;
            let elapsed = start.elapsed();

            let mut writer = BufWriter::new(File::create(&output)?);
            write_events_csv(&mut writer, &out.events)?;

            let stats = &out.stats;
            println!(
                "Formed {} events ({} good, {} bad) from {} hits in {} module(s)",
                out.events.len(),
                stats.matching.events_good,
                stats.matching.events_bad,
                stats.hits_inserted,
                out.modules
            );
            if verbose {
                eprintln!("  {} clusters", stats.clustering.clusters);
                eprintln!(
                    "  {} clusters rejected ({} hits)",
                    stats.clustering.rejected_clusters, stats.clustering.rejected_hits
                );
                eprintln!("  {} unmatched clusters", stats.matching.unmatched_total());
                eprintln!("  {} hits on unknown planes", stats.hits_invalid_plane);
                eprintln!("  {} late events in merge", out.merge.late);
                eprintln!("Wrote: {}", output.display());
            }
            let secs = elapsed.as_secs_f64();
            if secs > 0.0 {
                println!(
                    "Time: {:.3}s ({:.0} hits/s)",
                    secs,
                    stats.hits_inserted as f64 / secs
                );
            }
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&ReplayConfig::default())?);
        }

        Commands::Info { input } => {
            let hits = read_file(&input)?;
            let mut counts: BTreeMap<(usize, u8), usize> = BTreeMap::new();
            for h in &hits {
                *counts.entry((h.module, h.hit.plane)).or_default() += 1;
            }

            println!("File: {}", input.display());
            println!("Hits: {}", hits.len());
            if let (Some(first), Some(last)) = (
                hits.iter().map(|h| h.hit.time).min(),
                hits.iter().map(|h| h.hit.time).max(),
            ) {
                println!("Time range: {} - {}", first, last);
            }
            for ((module, plane), count) in counts {
                println!("  module {} plane {}: {} hits", module, plane, count);
            }
        }
    }

    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<replay::ModuleHit>> {
    let file = File::open(path)?;
    read_hits(BufReader::new(file))
}
