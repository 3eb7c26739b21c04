//! Per-plane cluster of hits.
#![allow(clippy::cast_precision_loss)]

use crate::config::CenterMode;
use crate::event::ReducedHit;
use crate::hit::Hit;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One hit as stored inside a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterHit {
    /// Strip or wire index.
    pub coordinate: u16,
    /// Collected charge.
    pub weight: u16,
    /// Timestamp in ticks.
    pub time: u64,
}

impl From<Hit> for ClusterHit {
    fn from(hit: Hit) -> Self {
        Self {
            coordinate: hit.coordinate,
            weight: hit.weight,
            time: hit.time,
        }
    }
}

/// Hits from one plane judged to come from the same interaction.
///
/// Invariants: `coordinate_start <= coordinate_end`,
/// `time_start <= time_end` and `hits` is sorted by coordinate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Plane the hits came from.
    pub plane: u8,
    /// Smallest coordinate.
    pub coordinate_start: u16,
    /// Largest coordinate.
    pub coordinate_end: u16,
    /// Earliest hit time.
    pub time_start: u64,
    /// Latest hit time.
    pub time_end: u64,
    /// Hits ordered by coordinate.
    pub hits: Vec<ClusterHit>,
}

impl Cluster {
    /// Builds a cluster from a non-empty run of hits.
    ///
    /// The hits are re-sorted by coordinate (stable, so equal coordinates
    /// keep their incoming order). Returns `None` for an empty run.
    #[must_use]
    pub fn from_hits(plane: u8, run: &[Hit]) -> Option<Self> {
        let first = run.first()?;
        let mut cluster = Self {
            plane,
            coordinate_start: first.coordinate,
            coordinate_end: first.coordinate,
            time_start: first.time,
            time_end: first.time,
            hits: Vec::with_capacity(run.len()),
        };
        for hit in run {
            cluster.coordinate_start = cluster.coordinate_start.min(hit.coordinate);
            cluster.coordinate_end = cluster.coordinate_end.max(hit.coordinate);
            cluster.time_start = cluster.time_start.min(hit.time);
            cluster.time_end = cluster.time_end.max(hit.time);
            cluster.hits.push(ClusterHit::from(*hit));
        }
        cluster.hits.sort_by_key(|h| h.coordinate);
        Some(cluster)
    }

    /// Number of hits in the cluster.
    #[inline]
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }

    /// Sum of hit weights.
    #[must_use]
    pub fn weight_sum(&self) -> u64 {
        self.hits.iter().map(|h| u64::from(h.weight)).sum()
    }

    /// Number of coordinates covered, gaps included.
    #[inline]
    #[must_use]
    pub fn coordinate_span_len(&self) -> u32 {
        u32::from(self.coordinate_end - self.coordinate_start) + 1
    }

    /// Duration between the first and last hit.
    #[inline]
    #[must_use]
    pub fn time_span(&self) -> u64 {
        self.time_end - self.time_start
    }

    /// Distance between the end times of two clusters.
    #[inline]
    #[must_use]
    pub fn end_delta(&self, other: &Self) -> u64 {
        self.time_end.abs_diff(other.time_end)
    }

    /// True if the closed time ranges intersect.
    #[inline]
    #[must_use]
    pub fn time_overlaps(&self, other: &Self) -> bool {
        self.time_start <= other.time_end && other.time_start <= self.time_end
    }

    /// Coordinate centroid.
    ///
    /// In weighted mode a cluster whose weights sum to zero yields NaN.
    #[must_use]
    pub fn center(&self, mode: CenterMode) -> f64 {
        match mode {
            CenterMode::Weighted => {
                let mut sum = 0.0;
                let mut total = 0.0;
                for h in &self.hits {
                    let w = f64::from(h.weight);
                    sum += f64::from(h.coordinate) * w;
                    total += w;
                }
                sum / total
            }
            CenterMode::Unweighted => {
                let sum: f64 = self.hits.iter().map(|h| f64::from(h.coordinate)).sum();
                sum / self.hits.len() as f64
            }
        }
    }

    /// Average hit time, weighted the same way as [`Cluster::center`].
    #[must_use]
    pub fn average_time(&self, mode: CenterMode) -> f64 {
        match mode {
            CenterMode::Weighted => {
                let mut sum = 0.0;
                let mut total = 0.0;
                for h in &self.hits {
                    let w = f64::from(h.weight);
                    sum += h.time as f64 * w;
                    total += w;
                }
                sum / total
            }
            CenterMode::Unweighted => {
                let sum: f64 = self.hits.iter().map(|h| h.time as f64).sum();
                sum / self.hits.len() as f64
            }
        }
    }

    /// Summary projection used inside an event.
    #[must_use]
    pub fn reduce(&self, mode: CenterMode) -> ReducedHit {
        ReducedHit::new(
            self.center(mode),
            self.coordinate_start,
            self.coordinate_end,
            self.average_time(mode),
            self.hit_count(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cluster(hits: &[(u64, u16, u16)]) -> Cluster {
        let hits: Vec<Hit> = hits
            .iter()
            .map(|&(t, c, w)| Hit::new(t, 0, c, w))
            .collect();
        Cluster::from_hits(0, &hits).unwrap()
    }

    #[test]
    fn test_from_hits_bounds_and_order() {
        let c = cluster(&[(10, 7, 1), (12, 5, 1), (11, 6, 1)]);
        assert_eq!(c.coordinate_start, 5);
        assert_eq!(c.coordinate_end, 7);
        assert_eq!(c.time_start, 10);
        assert_eq!(c.time_end, 12);
        assert_eq!(c.hit_count(), 3);
        let coords: Vec<u16> = c.hits.iter().map(|h| h.coordinate).collect();
        assert_eq!(coords, vec![5, 6, 7]);
        assert_eq!(c.coordinate_span_len(), 3);
        assert_eq!(c.time_span(), 2);
    }

    #[test]
    fn test_empty_run() {
        assert!(Cluster::from_hits(0, &[]).is_none());
    }

    #[test]
    fn test_weighted_center() {
        // (0*30 + 2*10) / 40 = 0.5
        let c = cluster(&[(0, 0, 30), (0, 2, 10)]);
        assert_relative_eq!(c.center(CenterMode::Weighted), 0.5);
        assert_relative_eq!(c.center(CenterMode::Unweighted), 1.0);
        assert_eq!(c.weight_sum(), 40);
    }

    #[test]
    fn test_zero_weight_center_is_not_finite() {
        let c = cluster(&[(0, 3, 0), (1, 4, 0)]);
        assert!(c.center(CenterMode::Weighted).is_nan());
        assert_relative_eq!(c.center(CenterMode::Unweighted), 3.5);
    }

    #[test]
    fn test_average_time() {
        let c = cluster(&[(100, 1, 1), (200, 2, 3)]);
        assert_relative_eq!(c.average_time(CenterMode::Weighted), 175.0);
        assert_relative_eq!(c.average_time(CenterMode::Unweighted), 150.0);
    }

    #[test]
    fn test_time_relations() {
        let a = cluster(&[(100, 1, 1), (200, 1, 1)]);
        let b = cluster(&[(200, 1, 1), (250, 1, 1)]);
        let c = cluster(&[(201, 1, 1), (260, 1, 1)]);
        assert!(a.time_overlaps(&b));
        assert!(!a.time_overlaps(&c));
        assert_eq!(a.end_delta(&c), 60);
    }
}
