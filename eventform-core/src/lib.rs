//! eventform-core: Core types for neutron detector event formation.
//!
//! This crate provides the data model shared by the streaming engines:
//! per-plane [`Hit`]s, per-plane [`Cluster`]s, reconstructed [`Event`]s,
//! the configuration surface and the statistics values.
//!

pub mod cluster;
pub mod config;
pub mod error;
pub mod event;
pub mod hit;
pub mod stats;

pub use cluster::{Cluster, ClusterHit};
pub use config::{
    CenterMode, GapClustererConfig, MatchPolicy, MatcherConfig, MergerConfig, PipelineConfig,
    PlaneConfig, TieBreak,
};
pub use error::{ConfigError, Error, MergeError, Result};
pub use event::{Event, ReducedHit};
pub use hit::{Hit, HitVector};
pub use stats::{ClusterStats, MatchStats, MergeStats, Stats};
