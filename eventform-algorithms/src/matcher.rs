//! Cross-plane coincidence matching.
//!
//! The matcher keeps one pool of unmatched clusters per plane and a
//! watermark per plane holding the newest cluster end time merged so far.
//! Clusters of the first plane (x) are the anchors: each anchor is paired
//! with a cluster of the second plane (y), and with a cluster of the third
//! plane (z) when one is configured and available.
//!
//! An anchor is resolved only once the y watermark has moved past
//! `time_end + max_delta_time`, so no later y cluster can still satisfy the
//! pairing predicate. The bound holds from the partner side too: a y or z
//! cluster is only consumed or aged out once the x watermark has moved past
//! its own `time_end + max_delta_time`. The z plane never gates an anchor;
//! a z partner is attached when one pairs, and a quiet z plane only means
//! events without z. A forced pass skips the wait and empties every pool.

use eventform_core::error::{Error, Result};
use eventform_core::{Cluster, Event, MatchPolicy, MatchStats, MatcherConfig, TieBreak};
use std::collections::VecDeque;

const ANCHOR: usize = 0;

/// Streaming coincidence matcher for 2 or 3 planes.
#[derive(Debug, Clone)]
pub struct Matcher {
    config: MatcherConfig,
    planes: Vec<u8>,
    pools: Vec<Vec<Cluster>>,
    watermarks: Vec<u64>,
    events: VecDeque<Event>,
}

impl Matcher {
    /// Creates a matcher over `planes` (x, y and optionally z).
    pub fn new(config: MatcherConfig, planes: &[u8]) -> Result<Self> {
        eventform_core::config::validate_planes(planes)?;
        Ok(Self {
            config,
            planes: planes.to_vec(),
            pools: vec![Vec::new(); planes.len()],
            watermarks: vec![0; planes.len()],
            events: VecDeque::new(),
        })
    }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Plane identifiers in x, y, z order.
    #[must_use]
    pub fn planes(&self) -> &[u8] {
        &self.planes
    }

    /// Newest cluster end time merged for `plane`.
    #[must_use]
    pub fn watermark(&self, plane: u8) -> Option<u64> {
        self.index_of(plane).map(|idx| self.watermarks[idx])
    }

    /// Unmatched clusters pooled for `plane`.
    #[must_use]
    pub fn pool_len(&self, plane: u8) -> usize {
        self.index_of(plane).map_or(0, |idx| self.pools[idx].len())
    }

    /// Adds newly formed clusters of one plane to its pool.
    pub fn merge(&mut self, plane: u8, clusters: Vec<Cluster>) -> Result<()> {
        let idx = self.index_of(plane).ok_or(Error::UnknownPlane(plane))?;
        self.merge_index(idx, clusters);
        Ok(())
    }

    pub(crate) fn merge_index(&mut self, idx: usize, clusters: Vec<Cluster>) {
        if clusters.is_empty() {
            return;
        }
        if let Some(newest) = clusters.iter().map(|c| c.time_end).max() {
            self.watermarks[idx] = self.watermarks[idx].max(newest);
        }
        let pool = &mut self.pools[idx];
        pool.extend(clusters);
        pool.sort_by_key(|c| c.time_start);
    }

    /// Resolves every cluster whose latency bound has passed, or every
    /// pooled cluster when `force` is set.
    ///
    /// Events are appended to the output queue in anchor pool order. The
    /// pass stops at the first anchor that still has to wait.
    pub fn match_clusters(&mut self, force: bool) -> MatchStats {
        let mut stats = MatchStats::default();

        let mut anchors = std::mem::take(&mut self.pools[ANCHOR]).into_iter();
        let mut waiting = Vec::new();
        for anchor in anchors.by_ref() {
            if !force && !self.anchor_resolvable(&anchor) {
                waiting.push(anchor);
                break;
            }

            let Some(y_pos) = self.select_partner(1, &anchor) else {
                log::trace!(
                    "plane {}: anchor cluster ending at {} has no partner",
                    self.planes[ANCHOR],
                    anchor.time_end
                );
                stats.unmatched[ANCHOR] += 1;
                continue;
            };
            let z_pos = if self.planes.len() > 2 {
                self.select_partner(2, &anchor)
            } else {
                None
            };

            let ready = force
                || (self.partner_ready(&self.pools[1][y_pos])
                    && z_pos.map_or(true, |pos| self.partner_ready(&self.pools[2][pos])));
            if !ready {
                waiting.push(anchor);
                break;
            }

            let y = self.pools[1].remove(y_pos);
            let z = z_pos.map(|pos| self.pools[2].remove(pos));
            let event = self.build_event(&anchor, &y, z.as_ref());
            if event.good {
                stats.events_good += 1;
            } else {
                stats.events_bad += 1;
            }
            self.events.push_back(event);
        }
        waiting.extend(anchors);
        self.pools[ANCHOR] = waiting;

        for idx in 1..self.planes.len() {
            stats.unmatched[idx] += self.age_out_partners(idx, force);
        }

        if stats.events() > 0 || stats.unmatched_total() > 0 {
            log::debug!(
                "{} matcher: {} events ({} bad), {} unmatched, pools {:?}",
                self.config.policy.name(),
                stats.events(),
                stats.events_bad,
                stats.unmatched_total(),
                self.pools.iter().map(Vec::len).collect::<Vec<_>>()
            );
        }
        stats
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

    fn index_of(&self, plane: u8) -> Option<usize> {
        self.planes.iter().position(|&p| p == plane)
    }

    fn horizon(&self, cluster: &Cluster) -> u64 {
        cluster.time_end.saturating_add(self.config.max_delta_time)
    }

    fn anchor_resolvable(&self, anchor: &Cluster) -> bool {
        self.watermarks[1] > self.horizon(anchor)
    }

    /// True once no later anchor can pair with `partner`.
    fn partner_ready(&self, partner: &Cluster) -> bool {
        self.watermarks[ANCHOR] > self.horizon(partner)
    }

    /// Pairing predicate of the configured policy.
    fn pairs(&self, anchor: &Cluster, candidate: &Cluster) -> bool {
        match self.config.policy {
            MatchPolicy::End | MatchPolicy::MultiHit { .. } => {
                anchor.end_delta(candidate) <= self.config.max_delta_time
            }
            MatchPolicy::Overlap => anchor.time_overlaps(candidate),
        }
    }

    /// Position in pool `idx` of the partner the policy picks for `anchor`.
    fn select_partner(&self, idx: usize, anchor: &Cluster) -> Option<usize> {
        let pool = &self.pools[idx];
        match self.config.policy {
            MatchPolicy::End | MatchPolicy::Overlap => {
                pool.iter().position(|c| self.pairs(anchor, c))
            }
            MatchPolicy::MultiHit { tie_break } => {
                let mut best: Option<(usize, u64)> = None;
                for (i, candidate) in pool.iter().enumerate() {
                    if !self.pairs(anchor, candidate) {
                        continue;
                    }
                    // Lower score wins; earlier pool position wins ties.
                    let score = match tie_break {
                        TieBreak::SmallestDeltaTime => anchor.end_delta(candidate),
                        TieBreak::LargestWeight => u64::MAX - candidate.weight_sum(),
                    };
                    if best.map_or(true, |(_, s)| score < s) {
                        best = Some((i, score));
                    }
                }
                best.map(|(i, _)| i)
            }
        }
    }

    fn build_event(&self, x: &Cluster, y: &Cluster, z: Option<&Cluster>) -> Event {
        let mode = self.config.center_mode;
        let time = z.map_or(x.time_start.min(y.time_start), |z| {
            x.time_start.min(y.time_start).min(z.time_start)
        });
        Event::new(x.reduce(mode), y.reduce(mode), z.map(|z| z.reduce(mode)), time)
    }

    /// Drops partner clusters that can no longer meet an anchor.
    fn age_out_partners(&mut self, idx: usize, force: bool) -> usize {
        let pool = std::mem::take(&mut self.pools[idx]);
        let mut kept = Vec::with_capacity(pool.len());
        let mut dropped = 0;
        for cluster in pool {
            let expired = force || self.partner_ready(&cluster);
            let still_wanted = self.pools[ANCHOR]
                .iter()
                .any(|anchor| self.pairs(anchor, &cluster));
            if expired && !still_wanted {
                log::trace!(
                    "plane {}: cluster ending at {} aged out unmatched",
                    self.planes[idx],
                    cluster.time_end
                );
                dropped += 1;
            } else {
                kept.push(cluster);
            }
        }
        self.pools[idx] = kept;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventform_core::Hit;

    fn cluster(plane: u8, start: u64, end: u64, coord: u16) -> Cluster {
        Cluster::from_hits(
            plane,
            &[Hit::new(start, plane, coord, 1), Hit::new(end, plane, coord, 1)],
        )
        .unwrap()
    }

    fn end_matcher(delta: u64) -> Matcher {
        Matcher::new(MatcherConfig::new().with_max_delta_time(delta), &[0, 1]).unwrap()
    }

    #[test]
    fn test_rejects_bad_planes() {
        assert!(Matcher::new(MatcherConfig::default(), &[0]).is_err());
        assert!(Matcher::new(MatcherConfig::default(), &[1, 1]).is_err());
    }

    #[test]
    fn test_merge_updates_watermark() {
        let mut m = end_matcher(100);
        m.merge(0, vec![cluster(0, 10, 50, 1), cluster(0, 20, 40, 2)])
            .unwrap();
        assert_eq!(m.watermark(0), Some(50));
        m.merge(0, vec![cluster(0, 5, 30, 3)]).unwrap();
        assert_eq!(m.watermark(0), Some(50));
        assert_eq!(m.pool_len(0), 3);
        assert!(matches!(
            m.merge(7, vec![cluster(7, 0, 1, 1)]),
            Err(Error::UnknownPlane(7))
        ));
    }

    #[test]
    fn test_empty_match_is_noop() {
        let mut m = end_matcher(100);
        assert_eq!(m.match_clusters(false), MatchStats::default());
        assert_eq!(m.watermark(0), Some(0));
        assert_eq!(m.watermark(1), Some(0));
        assert_eq!(m.pending_events(), 0);
    }

    #[test]
    fn test_waits_for_partner_watermark() {
        let mut m = end_matcher(100);
        m.merge(0, vec![cluster(0, 990, 1000, 1)]).unwrap();
        m.merge(1, vec![cluster(1, 1040, 1050, 1)]).unwrap();

        // y watermark 1050 has not passed 1100.
        let stats = m.match_clusters(false);
        assert_eq!(stats.events(), 0);
        assert_eq!(m.pool_len(0), 1);

        // The anchor could resolve, but x has not passed 1050 + 100.
        m.merge(1, vec![cluster(1, 1190, 1200, 9)]).unwrap();
        assert_eq!(m.match_clusters(false).events(), 0);
        assert_eq!(m.pool_len(1), 2);

        m.merge(0, vec![cluster(0, 1160, 1170, 2)]).unwrap();
        let stats = m.match_clusters(false);
        assert_eq!(stats.events_good, 1);
        let event = m.pop_event().unwrap();
        assert_eq!(event.time, 990);
        assert_eq!(m.pool_len(0), 1);
        assert_eq!(m.pool_len(1), 1);
    }

    #[test]
    fn test_partner_waits_for_anchor_watermark() {
        let mut m = end_matcher(100);
        m.merge(0, vec![cluster(0, 990, 1000, 1)]).unwrap();
        m.merge(1, vec![cluster(1, 1080, 1090, 2), cluster(1, 1240, 1250, 3)])
            .unwrap();
        assert_eq!(m.match_clusters(false).events(), 0);

        // x watermark 1190 is not past 1090 + 100 yet.
        m.merge(0, vec![cluster(0, 1185, 1190, 4)]).unwrap();
        assert_eq!(m.match_clusters(false).events(), 0);
        assert_eq!(m.pool_len(1), 2);

        m.merge(0, vec![cluster(0, 1191, 1191, 5)]).unwrap();
        assert_eq!(m.match_clusters(false).events(), 1);
        let event = m.pop_event().unwrap();
        assert!((event.y.center - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overlap_policy() {
        let config = MatcherConfig::new()
            .with_max_delta_time(10)
            .with_policy(MatchPolicy::Overlap);
        let mut m = Matcher::new(config, &[0, 1]).unwrap();
        m.merge(0, vec![cluster(0, 100, 200, 1)]).unwrap();
        m.merge(1, vec![cluster(1, 205, 300, 1), cluster(1, 150, 180, 2)])
            .unwrap();

        let stats = m.match_clusters(true);
        assert_eq!(stats.events(), 1);
        assert_eq!(stats.unmatched, [0, 1, 0]);
        let event = m.pop_event().unwrap();
        assert_eq!(event.time, 100);
        assert!((event.y.center - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_end_policy_takes_first_in_pool_order() {
        let mut m = end_matcher(100);
        m.merge(0, vec![cluster(0, 990, 1000, 1)]).unwrap();
        m.merge(1, vec![cluster(1, 900, 950, 3), cluster(1, 995, 1000, 4)])
            .unwrap();
        m.match_clusters(true);
        let event = m.pop_event().unwrap();
        assert!((event.y.center - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_multi_hit_smallest_delta() {
        let config = MatcherConfig::new()
            .with_max_delta_time(100)
            .with_policy(MatchPolicy::MultiHit {
                tie_break: TieBreak::SmallestDeltaTime,
            });
        let mut m = Matcher::new(config, &[0, 1]).unwrap();
        m.merge(0, vec![cluster(0, 990, 1000, 1)]).unwrap();
        m.merge(1, vec![cluster(1, 900, 950, 3), cluster(1, 995, 1010, 4)])
            .unwrap();
        let stats = m.match_clusters(true);
        assert_eq!(stats.unmatched, [0, 1, 0]);
        let event = m.pop_event().unwrap();
        assert!((event.y.center - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_multi_hit_largest_weight() {
        let config = MatcherConfig::new()
            .with_max_delta_time(100)
            .with_policy(MatchPolicy::MultiHit {
                tie_break: TieBreak::LargestWeight,
            });
        let mut m = Matcher::new(config, &[0, 1]).unwrap();
        m.merge(0, vec![cluster(0, 990, 1000, 1)]).unwrap();
        let heavy = Cluster::from_hits(
            1,
            &[Hit::new(940, 1, 3, 50), Hit::new(950, 1, 3, 50)],
        )
        .unwrap();
        m.merge(1, vec![heavy, cluster(1, 995, 1000, 4)]).unwrap();
        m.match_clusters(true);
        let event = m.pop_event().unwrap();
        assert!((event.y.center - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_third_plane_attached() {
        let mut m = Matcher::new(MatcherConfig::new().with_max_delta_time(50), &[0, 1, 2]).unwrap();
        m.merge(0, vec![cluster(0, 100, 110, 1)]).unwrap();
        m.merge(1, vec![cluster(1, 105, 120, 2)]).unwrap();
        m.merge(2, vec![cluster(2, 90, 130, 3)]).unwrap();

        // y is far enough ahead, but x has not passed the y and z bounds.
        m.merge(1, vec![cluster(1, 400, 500, 9)]).unwrap();
        assert_eq!(m.match_clusters(false).events(), 0);

        m.merge(0, vec![cluster(0, 400, 410, 8)]).unwrap();
        let stats = m.match_clusters(false);
        assert_eq!(stats.events(), 1);
        assert_eq!(stats.unmatched, [1, 0, 0]);
        let event = m.pop_event().unwrap();
        assert_eq!(event.time, 90);
        assert!(event.z.is_some());
        assert_eq!(event.hits_used(), 6);
    }

    #[test]
    fn test_quiet_third_plane_does_not_block() {
        let mut m = Matcher::new(MatcherConfig::new().with_max_delta_time(50), &[0, 1, 2]).unwrap();
        m.merge(0, vec![cluster(0, 100, 110, 1), cluster(0, 300, 310, 2)])
            .unwrap();
        m.merge(1, vec![cluster(1, 105, 120, 3), cluster(1, 400, 410, 4)])
            .unwrap();

        let stats = m.match_clusters(false);
        assert_eq!(stats.events_good, 1);
        assert_eq!(stats.unmatched, [1, 0, 0]);
        assert_eq!(m.watermark(2), Some(0));
        let event = m.pop_event().unwrap();
        assert!(event.z.is_none());
        assert_eq!(event.time, 100);
    }

    #[test]
    fn test_force_empties_pools() {
        let mut m = Matcher::new(MatcherConfig::new().with_max_delta_time(50), &[0, 1, 2]).unwrap();
        m.merge(0, vec![cluster(0, 100, 110, 1), cluster(0, 5000, 5010, 1)])
            .unwrap();
        m.merge(1, vec![cluster(1, 105, 120, 2)]).unwrap();
        m.merge(2, vec![cluster(2, 9000, 9100, 3)]).unwrap();

        let stats = m.match_clusters(true);
        assert_eq!(stats.events(), 1);
        assert_eq!(stats.unmatched, [1, 0, 1]);
        for plane in [0, 1, 2] {
            assert_eq!(m.pool_len(plane), 0);
        }
        assert!(m.pop_event().unwrap().z.is_none());
    }
}
