//! Offline replay of recorded hits through per-module pipelines.
//!
//! Hit files are plain CSV with one hit per line:
//! `module,time,plane,coordinate,weight`. Blank lines, `#` comments and a
//! leading header line are skipped.

use crate::{CliError, Result};
use eventform_algorithms::{ChronoMerger, EventBuilder};
use eventform_core::{Event, Hit, MergeStats, MergerConfig, PipelineConfig, Stats};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Replay settings, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Pipeline used for every module.
    pub pipeline: PipelineConfig,
    /// Latency bound of the cross-module merge (ticks).
    pub merger_latency: u64,
    /// Hits handed to a pipeline between two flushes.
    pub batch_size: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            merger_latency: 10_000,
            batch_size: 4096,
        }
    }
}

impl ReplayConfig {
    /// Loads and validates a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config
            .pipeline
            .validate()
            .map_err(eventform_core::Error::from)?;
        Ok(config)
    }
}

/// A hit and the detector module that recorded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleHit {
    /// Module index.
    pub module: usize,
    /// The hit itself.
    pub hit: Hit,
}

/// Parses a CSV hit stream.
pub fn read_hits<R: BufRead>(reader: R) -> Result<Vec<ModuleHit>> {
    let mut hits = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || (idx == 0 && line.starts_with("module")) {
            continue;
        }
        hits.push(parse_line(line).map_err(|message| CliError::Parse {
            line: idx + 1,
            message,
        })?);
    }
    Ok(hits)
}

fn parse_line(line: &str) -> std::result::Result<ModuleHit, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [module, time, plane, coordinate, weight] = fields[..] else {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    };
    let parse_err = |name: &str, value: &str| format!("invalid {name} '{value}'");
    Ok(ModuleHit {
        module: module.parse().map_err(|_| parse_err("module", module))?,
        hit: Hit::new(
            time.parse().map_err(|_| parse_err("time", time))?,
            plane.parse().map_err(|_| parse_err("plane", plane))?,
            coordinate
                .parse()
                .map_err(|_| parse_err("coordinate", coordinate))?,
            weight.parse().map_err(|_| parse_err("weight", weight))?,
        ),
    })
}

/// Events produced by one module, grouped by flush.
#[derive(Debug, Clone)]
pub struct ModuleRun {
    /// Module id as read from the input.
    pub module: usize,
    /// Events drained after each flush, final full flush last.
    pub batches: Vec<Vec<Event>>,
    /// Pipeline totals.
    pub stats: Stats,
}

/// Feeds one module's hits through its own pipeline in batches.
pub fn run_module(
    config: &PipelineConfig,
    module: usize,
    hits: &[Hit],
    batch_size: usize,
) -> Result<ModuleRun> {
    let mut builder = EventBuilder::new(config)?;
    let mut batches = Vec::new();
    for chunk in hits.chunks(batch_size.max(1)) {
        builder.insert_many(chunk.iter().copied());
        builder.flush(false);
        batches.push(builder.drain_events().collect());
    }
    builder.flush(true);
    batches.push(builder.drain_events().collect());

    Ok(ModuleRun {
        module,
        batches,
        stats: *builder.stats(),
    })
}

/// Result of a full replay.
#[derive(Debug, Clone)]
pub struct ReplayOutput {
    /// Number of distinct modules seen in the input.
    pub modules: usize,
    /// Merged events in time order.
    pub events: Vec<Event>,
    /// Pipeline totals over all modules.
    pub stats: Stats,
    /// Merge counters.
    pub merge: MergeStats,
}

/// Replays hits: one pipeline per module in parallel, then a chrono merge
/// that interleaves the module streams flush by flush.
///
/// Module ids may be sparse; merger sources are assigned in ascending
/// module order.
pub fn replay(config: &ReplayConfig, hits: &[ModuleHit]) -> Result<ReplayOutput> {
    let mut per_module: BTreeMap<usize, Vec<Hit>> = BTreeMap::new();
    for h in hits {
        per_module.entry(h.module).or_default().push(h.hit);
    }
    let per_module: Vec<(usize, Vec<Hit>)> = per_module.into_iter().collect();
    let modules = per_module.len();

    let runs = per_module
        .par_iter()
        .map(|(module, hits)| run_module(&config.pipeline, *module, hits, config.batch_size))
        .collect::<Result<Vec<_>>>()?;

    let mut merger = ChronoMerger::new(MergerConfig::new(modules.max(1), config.merger_latency))?;
    let rounds = runs.iter().map(|r| r.batches.len()).max().unwrap_or(0);
    let mut events = Vec::new();
    for round in 0..rounds {
        for (source, run) in runs.iter().enumerate() {
            for event in run.batches.get(round).into_iter().flatten() {
                merger.ingest(source, *event)?;
            }
        }
        events.extend(merger.drain());
    }
    events.extend(merger.force_drain());

    let mut stats = Stats::default();
    for run in &runs {
        log::debug!(
            "module {}: {} hits, {} events",
            run.module,
            run.stats.hits_inserted,
            run.stats.matching.events()
        );
        stats += run.stats;
    }
    log::debug!(
        "replay: {} modules, {} events, {} late",
        modules,
        events.len(),
        merger.stats().late
    );

    Ok(ReplayOutput {
        modules,
        events,
        stats,
        merge: *merger.stats(),
    })
}

/// Writes events as CSV.
pub fn write_events_csv<W: Write>(writer: &mut W, events: &[Event]) -> Result<()> {
    writeln!(writer, "time,x,y,z,x_hits,y_hits,z_hits,good")?;
    for e in events {
        let (z, z_hits) = e
            .z
            .map_or((String::new(), 0), |z| (z.center.to_string(), z.hits_used));
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{}",
            e.time,
            e.x.center,
            e.y.center,
            z,
            e.x.hits_used,
            e.y.hits_used,
            z_hits,
            u8::from(e.good)
        )?;
    }
    writer.flush()?;
    Ok(())
}
