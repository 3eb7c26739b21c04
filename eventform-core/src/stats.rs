//! Statistics values returned by each engine call.
//!
//! Every engine returns the counts for one call; owners accumulate them
//! with `+=`. Nothing here is shared or global.

use std::ops::AddAssign;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of one clustering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterStats {
    /// Hits consumed by the pass.
    pub hits: usize,
    /// Clusters emitted.
    pub clusters: usize,
    /// Runs dropped for being below the minimum size.
    pub rejected_clusters: usize,
    /// Hits in those dropped runs.
    pub rejected_hits: usize,
}

impl AddAssign for ClusterStats {
    fn add_assign(&mut self, rhs: Self) {
        self.hits += rhs.hits;
        self.clusters += rhs.clusters;
        self.rejected_clusters += rhs.rejected_clusters;
        self.rejected_hits += rhs.rejected_hits;
    }
}

/// Outcome of one matching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchStats {
    /// Events with usable centres on every projection.
    pub events_good: usize,
    /// Events kept for traceability despite a degenerate centre.
    pub events_bad: usize,
    /// Clusters dropped without a partner, indexed x, y, z.
    pub unmatched: [usize; 3],
}

impl MatchStats {
    /// All events produced.
    #[must_use]
    pub fn events(&self) -> usize {
        self.events_good + self.events_bad
    }

    /// Unmatched clusters over all planes.
    #[must_use]
    pub fn unmatched_total(&self) -> usize {
        self.unmatched.iter().sum()
    }
}

impl AddAssign for MatchStats {
    fn add_assign(&mut self, rhs: Self) {
        self.events_good += rhs.events_good;
        self.events_bad += rhs.events_bad;
        for (acc, n) in self.unmatched.iter_mut().zip(rhs.unmatched) {
            *acc += n;
        }
    }
}

/// Running totals kept by an event builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stats {
    /// Hits accepted by `insert`.
    pub hits_inserted: usize,
    /// Hits dropped for carrying an unconfigured plane.
    pub hits_invalid_plane: usize,
    /// Pending hits thrown away by an explicit clear.
    pub hits_discarded: usize,
    /// Clustering totals over all planes.
    pub clustering: ClusterStats,
    /// Matching totals.
    pub matching: MatchStats,
}

impl AddAssign<ClusterStats> for Stats {
    fn add_assign(&mut self, rhs: ClusterStats) {
        self.clustering += rhs;
    }
}

impl AddAssign<MatchStats> for Stats {
    fn add_assign(&mut self, rhs: MatchStats) {
        self.matching += rhs;
    }
}

impl AddAssign for Stats {
    fn add_assign(&mut self, rhs: Self) {
        self.hits_inserted += rhs.hits_inserted;
        self.hits_invalid_plane += rhs.hits_invalid_plane;
        self.hits_discarded += rhs.hits_discarded;
        self.clustering += rhs.clustering;
        self.matching += rhs.matching;
    }
}

/// Chrono merger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MergeStats {
    /// Events accepted by `ingest`.
    pub ingested: usize,
    /// Events handed out by `drain`/`force_drain`.
    pub emitted: usize,
    /// Emitted events older than an event emitted before them.
    pub late: usize,
}
