//! Configuration types for clustering, matching and merging.
//!
//! All values are fixed at construction time; engines copy what they need
//! and never expose a way to change it afterwards.

use crate::error::ConfigError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Gap thresholds for the per-plane clusterer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GapClustererConfig {
    /// Largest tolerated time gap (ticks) between consecutive hits of a run.
    /// Zero is legal and means hits must share a timestamp.
    pub max_time_gap: u64,
    /// Number of missing consecutive coordinates tolerated inside a run.
    pub max_coord_gap: u16,
    /// Runs with fewer hits are rejected. Zero behaves like one.
    pub min_cluster_size: usize,
}

impl Default for GapClustererConfig {
    fn default() -> Self {
        Self {
            max_time_gap: 200,
            max_coord_gap: 0,
            min_cluster_size: 1,
        }
    }
}

impl GapClustererConfig {
    /// Creates a clusterer configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum time gap.
    #[must_use]
    pub fn with_max_time_gap(mut self, gap: u64) -> Self {
        self.max_time_gap = gap;
        self
    }

    /// Sets the maximum coordinate gap.
    #[must_use]
    pub fn with_max_coord_gap(mut self, gap: u16) -> Self {
        self.max_coord_gap = gap;
        self
    }

    /// Sets the minimum cluster size.
    #[must_use]
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    /// Minimum size actually applied to runs.
    ///
    /// A run always holds at least one hit, so a configured zero cannot
    /// let an empty cluster through.
    #[inline]
    #[must_use]
    pub fn effective_min_cluster_size(&self) -> usize {
        self.min_cluster_size.max(1)
    }
}

/// How the coordinate centroid of a cluster is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CenterMode {
    /// Weight-averaged coordinate.
    #[default]
    Weighted,
    /// Plain arithmetic mean of coordinates.
    Unweighted,
}

/// Selection rule when several candidates satisfy the pairing predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TieBreak {
    /// Candidate whose end time is closest to the anchor's.
    #[default]
    SmallestDeltaTime,
    /// Candidate with the largest total weight.
    LargestWeight,
}

/// Pairing policy for cross-plane matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchPolicy {
    /// End times within `max_delta_time`; first candidate in pool order wins.
    #[default]
    End,
    /// Time ranges intersect; first candidate in pool order wins.
    Overlap,
    /// End times within `max_delta_time`; every candidate is scored and the
    /// best one by `tie_break` wins.
    MultiHit {
        /// Scoring rule among eligible candidates.
        tie_break: TieBreak,
    },
}

impl MatchPolicy {
    /// Short policy name for logs and reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::End => "end",
            Self::Overlap => "overlap",
            Self::MultiHit { .. } => "multi-hit",
        }
    }
}

/// Matcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatcherConfig {
    /// Coincidence window (ticks); also the latency bound before a cluster
    /// may be resolved.
    pub max_delta_time: u64,
    /// Pairing policy.
    pub policy: MatchPolicy,
    /// Centroid computation for the event projections.
    pub center_mode: CenterMode,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_delta_time: 500,
            policy: MatchPolicy::End,
            center_mode: CenterMode::Weighted,
        }
    }
}

impl MatcherConfig {
    /// Creates a matcher configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the coincidence window.
    #[must_use]
    pub fn with_max_delta_time(mut self, delta: u64) -> Self {
        self.max_delta_time = delta;
        self
    }

    /// Sets the pairing policy.
    #[must_use]
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the centroid mode.
    #[must_use]
    pub fn with_center_mode(mut self, mode: CenterMode) -> Self {
        self.center_mode = mode;
        self
    }
}

/// One plane of a pipeline and its clusterer thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlaneConfig {
    /// Plane identifier carried by the hits.
    pub plane: u8,
    /// Clusterer thresholds for this plane.
    #[cfg_attr(feature = "serde", serde(default))]
    pub clusterer: GapClustererConfig,
}

impl PlaneConfig {
    /// Creates a plane configuration.
    #[must_use]
    pub fn new(plane: u8, clusterer: GapClustererConfig) -> Self {
        Self { plane, clusterer }
    }
}

/// Full configuration of one event-formation pipeline.
///
/// `planes[0]` becomes the event's x projection, `planes[1]` its y
/// projection and the optional `planes[2]` its z projection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Participating planes, x first.
    pub planes: Vec<PlaneConfig>,
    /// Matcher settings.
    pub matcher: MatcherConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            planes: vec![
                PlaneConfig::new(0, GapClustererConfig::default()),
                PlaneConfig::new(1, GapClustererConfig::default()),
            ],
            matcher: MatcherConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Two-plane pipeline sharing one set of clusterer thresholds.
    #[must_use]
    pub fn two_plane(
        x_plane: u8,
        y_plane: u8,
        clusterer: GapClustererConfig,
        matcher: MatcherConfig,
    ) -> Self {
        Self {
            planes: vec![
                PlaneConfig::new(x_plane, clusterer),
                PlaneConfig::new(y_plane, clusterer),
            ],
            matcher,
        }
    }

    /// Adds a z plane.
    #[must_use]
    pub fn with_z_plane(mut self, plane: PlaneConfig) -> Self {
        self.planes.push(plane);
        self
    }

    /// Plane identifiers in x, y, z order.
    #[must_use]
    pub fn plane_ids(&self) -> Vec<u8> {
        self.planes.iter().map(|p| p.plane).collect()
    }

    /// Checks plane count and uniqueness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_planes(&self.plane_ids())
    }
}

/// Checks that a plane list names 2 or 3 distinct planes.
pub fn validate_planes(planes: &[u8]) -> Result<(), ConfigError> {
    if !(2..=3).contains(&planes.len()) {
        return Err(ConfigError::PlaneCount(planes.len()));
    }
    for (i, plane) in planes.iter().enumerate() {
        if planes[..i].contains(plane) {
            return Err(ConfigError::DuplicatePlane(*plane));
        }
    }
    Ok(())
}

/// Chrono merger settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MergerConfig {
    /// Number of independent input streams.
    pub sources: usize,
    /// Events older than the newest seen time by more than this are emitted.
    pub max_latency: u64,
}

impl MergerConfig {
    /// Creates a merger configuration.
    #[must_use]
    pub fn new(sources: usize, max_latency: u64) -> Self {
        Self {
            sources,
            max_latency,
        }
    }

    /// Rejects a merger without inputs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources == 0 {
            return Err(ConfigError::NoSources);
        }
        Ok(())
    }
}
