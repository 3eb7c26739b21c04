//! eventform-algorithms: Streaming engines for neutron event formation.
//!
//! This crate provides the bounded-latency stages of an event-formation
//! pipeline:
//! - **GapClusterer** - per-plane clustering on time and coordinate gaps
//! - **Matcher** - cross-plane coincidence matching (end, overlap, multi-hit)
//! - **EventBuilder** - per-pipeline orchestration from hits to events
//! - **ChronoMerger** - k-way merge of per-module event streams
//!
//! All engines are single-threaded, never block and only "wait" in terms of
//! observed data timestamps, so a replay of the same input yields the same
//! output.
#![warn(missing_docs)]

mod builder;
mod gap;
mod matcher;
mod merger;

pub use builder::EventBuilder;
pub use gap::GapClusterer;
pub use matcher::Matcher;
pub use merger::ChronoMerger;

// Re-export core types used at the engine boundaries
pub use eventform_core::{
    Cluster, Event, Hit, MatchPolicy, MatcherConfig, MergerConfig, PipelineConfig, Stats,
};
