//! Per-pipeline orchestration: hits in, events out.
//!
//! An [`EventBuilder`] owns one hit buffer and one [`GapClusterer`] per
//! plane plus a single [`Matcher`]. Hits live until the next flush; clusters
//! move into the matcher pools; events move into the output queue, which
//! the caller drains at its own pace.

use crate::gap::GapClusterer;
use crate::matcher::Matcher;
use eventform_core::error::Result;
use eventform_core::hit::{sort_by_time, HitVector};
use eventform_core::{ClusterStats, Event, Hit, MatchStats, PipelineConfig, Stats};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct PlaneSlot {
    plane: u8,
    hits: HitVector,
    clusterer: GapClusterer,
}

/// Event builder for one detector pipeline.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    slots: Vec<PlaneSlot>,
    matcher: Matcher,
    events: VecDeque<Event>,
    stats: Stats,
}

impl EventBuilder {
    /// Creates a builder from a validated pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let slots = config
            .planes
            .iter()
            .map(|p| PlaneSlot {
                plane: p.plane,
                hits: HitVector::new(),
                clusterer: GapClusterer::new(p.plane, p.clusterer),
            })
            .collect();
        let matcher = Matcher::new(config.matcher, &config.plane_ids())?;
        Ok(Self {
            slots,
            matcher,
            events: VecDeque::new(),
            stats: Stats::default(),
        })
    }

    /// Plane identifiers in x, y, z order.
    #[must_use]
    pub fn planes(&self) -> &[u8] {
        self.matcher.planes()
    }

    /// The matcher, for watermark and pool inspection.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Routes a hit to its plane buffer. Hits on other planes are counted
    /// and dropped.
    pub fn insert(&mut self, hit: Hit) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.plane == hit.plane) {
            slot.hits.push(hit);
            self.stats.hits_inserted += 1;
        } else {
            self.stats.hits_invalid_plane += 1;
            log::trace!("dropped hit on unconfigured plane {}", hit.plane);
        }
    }

    /// Inserts a sequence of hits.
    pub fn insert_many<I: IntoIterator<Item = Hit>>(&mut self, hits: I) {
        for hit in hits {
            self.insert(hit);
        }
    }

    /// Hits buffered across all planes.
    #[must_use]
    pub fn pending_hits(&self) -> usize {
        self.slots.iter().map(|s| s.hits.len()).sum()
    }

    /// Clusters all buffered hits and matches what the latency bound allows.
    ///
    /// With `full_flush` the clusterers are drained and the matcher is
    /// forced, leaving no state behind. Returns the counts for this call;
    /// running totals are in [`EventBuilder::stats`].
    pub fn flush(&mut self, full_flush: bool) -> Stats {
        let clustering = self.flush_clusterers(full_flush);
        let matching = self.match_clusters(full_flush);
        self.clear_hits();

        let mut delta = Stats::default();
        delta += clustering;
        delta += matching;
        delta
    }

    /// Sorts each plane's hits by time, clusters them and hands the clusters
    /// to the matcher without matching.
    pub fn flush_clusterers(&mut self, full_flush: bool) -> ClusterStats {
        let mut stats = ClusterStats::default();
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let mut hits = std::mem::take(&mut slot.hits);
            sort_by_time(&mut hits);
            slot.clusterer.insert_many(hits);
            // Either pass consumes the whole buffer.
            stats += if full_flush {
                slot.clusterer.flush()
            } else {
                slot.clusterer.cluster()
            };
            self.matcher
                .merge_index(idx, slot.clusterer.take_clusters());
        }
        self.stats += stats;
        stats
    }

    /// Runs the matcher and moves its events to the output queue.
    pub fn match_clusters(&mut self, force: bool) -> MatchStats {
        let stats = self.matcher.match_clusters(force);
        self.events.extend(self.matcher.drain_events());
        self.stats += stats;
        stats
    }

    /// Discards hits buffered since the last flush. Returns how many.
    pub fn clear_hits(&mut self) -> usize {
        let mut discarded = 0;
        for slot in &mut self.slots {
            discarded += slot.hits.len();
            slot.hits.clear();
        }
        self.stats.hits_discarded += discarded;
        discarded
    }

    /// Events waiting to be collected.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Removes the oldest queued event.
    pub fn pop_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Removes all queued events in production order.
    pub fn drain_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain(..)
    }

    /// Running totals since construction.
    #[must_use]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventform_core::{GapClustererConfig, MatcherConfig};

    fn builder() -> EventBuilder {
        let config = PipelineConfig::two_plane(
            0,
            1,
            GapClustererConfig::new()
                .with_max_time_gap(10)
                .with_min_cluster_size(1),
            MatcherConfig::new().with_max_delta_time(100),
        );
        EventBuilder::new(&config).unwrap()
    }

    #[test]
    fn test_invalid_plane_counted() {
        let mut b = builder();
        b.insert(Hit::new(0, 5, 1, 1));
        b.insert(Hit::new(0, 0, 1, 1));
        assert_eq!(b.stats().hits_invalid_plane, 1);
        assert_eq!(b.stats().hits_inserted, 1);
        assert_eq!(b.pending_hits(), 1);
    }

    #[test]
    fn test_full_flush_produces_event() {
        let mut b = builder();
        b.insert_many([
            Hit::new(1000, 0, 10, 2),
            Hit::new(1002, 0, 11, 2),
            Hit::new(1010, 1, 20, 5),
        ]);
        let delta = b.flush(true);
        assert_eq!(delta.clustering.clusters, 2);
        assert_eq!(delta.matching.events_good, 1);
        assert_eq!(b.pending_hits(), 0);

        let event = b.pop_event().unwrap();
        assert_eq!(event.time, 1000);
        assert!((event.x.center - 10.5).abs() < f64::EPSILON);
        assert!((event.y.center - 20.0).abs() < f64::EPSILON);
        assert!(b.pop_event().is_none());
    }

    #[test]
    fn test_partial_flush_holds_back_recent_clusters() {
        let mut b = builder();
        b.insert_many([Hit::new(1000, 0, 10, 1), Hit::new(1010, 1, 20, 1)]);
        let delta = b.flush(false);
        assert_eq!(delta.matching.events(), 0);
        assert_eq!(b.matcher().pool_len(0), 1);
        assert_eq!(b.matcher().pool_len(1), 1);

        b.flush(true);
        assert_eq!(b.drain_events().count(), 1);
        assert_eq!(b.stats().matching.events_good, 1);
    }

    #[test]
    fn test_full_clusterer_flush_counts_once() {
        let mut b = builder();
        b.insert_many([
            Hit::new(0, 0, 1, 1),
            Hit::new(1, 0, 2, 1),
            Hit::new(0, 1, 7, 1),
        ]);
        let stats = b.flush_clusterers(true);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.clusters, 2);
        assert_eq!(b.stats().clustering, stats);
    }

    #[test]
    fn test_clear_hits() {
        let mut b = builder();
        b.insert(Hit::new(0, 0, 1, 1));
        b.insert(Hit::new(0, 1, 1, 1));
        assert_eq!(b.clear_hits(), 2);
        assert_eq!(b.stats().hits_discarded, 2);
        assert_eq!(b.flush(true), Stats::default());
    }
}
