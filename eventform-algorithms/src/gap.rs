//! Gap-based clustering of hits from a single plane.
//!
//! Hits are buffered by [`GapClusterer::insert`] and processed in one batch
//! by [`GapClusterer::cluster`]:
//! 1. Stable sort by time.
//! 2. Split into time runs wherever consecutive hits are more than
//!    `max_time_gap` apart.
//! 3. Inside each time run, stable sort by coordinate and split wherever
//!    consecutive distinct coordinates are more than `max_coord_gap + 1`
//!    apart.
//! 4. Coordinate runs with at least `min_cluster_size` hits become clusters;
//!    smaller runs are counted and dropped.
//!
//! Every buffered hit is consumed exactly once per pass.

use eventform_core::hit::{sort_by_time, HitVector};
use eventform_core::{Cluster, ClusterStats, GapClustererConfig, Hit};
use std::collections::VecDeque;

/// Per-plane gap clusterer.
#[derive(Debug, Clone)]
pub struct GapClusterer {
    plane: u8,
    config: GapClustererConfig,
    hits: HitVector,
    clusters: VecDeque<Cluster>,
}

impl GapClusterer {
    /// Creates a clusterer for one plane.
    #[must_use]
    pub fn new(plane: u8, config: GapClustererConfig) -> Self {
        Self {
            plane,
            config,
            hits: HitVector::new(),
            clusters: VecDeque::new(),
        }
    }

    /// Plane this clusterer serves.
    #[must_use]
    pub fn plane(&self) -> u8 {
        self.plane
    }

    /// Thresholds in use.
    #[must_use]
    pub fn config(&self) -> &GapClustererConfig {
        &self.config
    }

    /// Buffers one hit.
    #[inline]
    pub fn insert(&mut self, hit: Hit) {
        self.hits.push(hit);
    }

    /// Buffers a sequence of hits.
    pub fn insert_many<I: IntoIterator<Item = Hit>>(&mut self, hits: I) {
        self.hits.extend(hits);
    }

    /// Hits buffered and not yet clustered.
    #[must_use]
    pub fn pending_hits(&self) -> usize {
        self.hits.len()
    }

    /// Clusters every buffered hit and clears the buffer.
    ///
    /// New clusters are queued in non-decreasing `time_start` order.
    pub fn cluster(&mut self) -> ClusterStats {
        let mut hits = std::mem::take(&mut self.hits);
        let mut stats = ClusterStats {
            hits: hits.len(),
            ..ClusterStats::default()
        };
        if hits.is_empty() {
            return stats;
        }

        sort_by_time(&mut hits);

        let max_time_gap = self.config.max_time_gap;
        let max_coord_step = u32::from(self.config.max_coord_gap) + 1;
        let min_size = self.config.effective_min_cluster_size();

        let mut run = Vec::new();
        let mut formed = Vec::new();
        for time_run in hits.chunk_by(|a, b| b.time - a.time <= max_time_gap) {
            run.clear();
            run.extend_from_slice(time_run);
            run.sort_by_key(|h| h.coordinate);

            for coord_run in run.chunk_by(|a, b| {
                u32::from(b.coordinate) - u32::from(a.coordinate) <= max_coord_step
            }) {
                if coord_run.len() < min_size {
                    stats.rejected_clusters += 1;
                    stats.rejected_hits += coord_run.len();
                    log::trace!(
                        "plane {}: dropped run of {} hits (min {})",
                        self.plane,
                        coord_run.len(),
                        min_size
                    );
                    continue;
                }
                if let Some(cluster) = Cluster::from_hits(self.plane, coord_run) {
                    formed.push(cluster);
                }
            }

            // Coordinate runs of one time run come out in coordinate order.
            formed.sort_by_key(|c| c.time_start);
            stats.clusters += formed.len();
            self.clusters.extend(formed.drain(..));
        }

        log::debug!(
            "plane {}: {} hits -> {} clusters, {} runs rejected",
            self.plane,
            stats.hits,
            stats.clusters,
            stats.rejected_clusters
        );
        stats
    }

    /// End-of-run drain; the same pass as [`GapClusterer::cluster`] over
    /// whatever is still buffered.
    pub fn flush(&mut self) -> ClusterStats {
        self.cluster()
    }

    /// True if no clusters are queued for retrieval.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Queued clusters, oldest first.
    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    /// Hands out all queued clusters.
    pub fn take_clusters(&mut self) -> Vec<Cluster> {
        self.clusters.drain(..).collect()
    }
}
