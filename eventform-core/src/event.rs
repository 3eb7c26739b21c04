//! Reconstructed neutron events.
#![allow(clippy::cast_possible_truncation)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cluster summary carried by an event.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReducedHit {
    /// Coordinate centroid.
    pub center: f64,
    /// `center - coordinate_start`, truncated toward zero and clamped to
    /// the `i16` range.
    pub uncert_lower: i16,
    /// `coordinate_end - center`, truncated toward zero and clamped to the
    /// `i16` range.
    pub uncert_upper: i16,
    /// Average hit time.
    pub average_time: f64,
    /// Hits that contributed.
    pub hits_used: usize,
}

impl ReducedHit {
    /// Builds a projection from a centroid and the cluster's coordinate bounds.
    ///
    /// A NaN centre gives zero uncertainties. Clusters wider than
    /// `i16::MAX` strips report `i16::MAX`.
    #[must_use]
    pub fn new(
        center: f64,
        coordinate_start: u16,
        coordinate_end: u16,
        average_time: f64,
        hits_used: usize,
    ) -> Self {
        Self {
            center,
            uncert_lower: uncertainty(center - f64::from(coordinate_start)),
            uncert_upper: uncertainty(f64::from(coordinate_end) - center),
            average_time,
            hits_used,
        }
    }

    /// True if the centre is finite and non-negative.
    #[inline]
    #[must_use]
    pub fn is_center_good(&self) -> bool {
        self.center.is_finite() && self.center >= 0.0
    }
}

fn uncertainty(distance: f64) -> i16 {
    if distance.is_nan() {
        return 0;
    }
    distance
        .trunc()
        .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

/// A coincidence of clusters from two or three planes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Projection from the first configured plane.
    pub x: ReducedHit,
    /// Projection from the second configured plane.
    pub y: ReducedHit,
    /// Projection from the optional third plane.
    pub z: Option<ReducedHit>,
    /// Event time in ticks.
    pub time: u64,
    /// All projections have a usable centre.
    pub good: bool,
}

impl Event {
    /// Builds an event; `good` is derived from the projections.
    #[must_use]
    pub fn new(x: ReducedHit, y: ReducedHit, z: Option<ReducedHit>, time: u64) -> Self {
        let good = x.is_center_good()
            && y.is_center_good()
            && z.as_ref().map_or(true, ReducedHit::is_center_good);
        Self {
            x,
            y,
            z,
            time,
            good,
        }
    }

    /// Total hits across all projections.
    #[must_use]
    pub fn hits_used(&self) -> usize {
        self.x.hits_used + self.y.hits_used + self.z.map_or(0, |z| z.hits_used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduced_hit_uncertainties() {
        let r = ReducedHit::new(6.5, 5, 9, 100.0, 4);
        assert_eq!(r.uncert_lower, 1);
        assert_eq!(r.uncert_upper, 2);
        assert!(r.is_center_good());
    }

    #[test]
    fn test_wide_cluster_uncertainty_clamped() {
        let r = ReducedHit::new(0.0, 0, 40_000, 0.0, 2);
        assert_eq!(r.uncert_lower, 0);
        assert_eq!(r.uncert_upper, i16::MAX);

        let r = ReducedHit::new(65_000.0, 0, 65_000, 0.0, 2);
        assert_eq!(r.uncert_lower, i16::MAX);
        assert_eq!(r.uncert_upper, 0);

        assert_eq!(ReducedHit::new(f64::NAN, 0, 9, 0.0, 1).uncert_upper, 0);
    }

    #[test]
    fn test_bad_centers() {
        assert!(!ReducedHit::new(f64::NAN, 0, 1, 0.0, 2).is_center_good());
        assert!(!ReducedHit::new(f64::INFINITY, 0, 1, 0.0, 2).is_center_good());
        assert!(!ReducedHit::new(-0.5, 0, 1, 0.0, 2).is_center_good());
        assert!(ReducedHit::new(0.0, 0, 1, 0.0, 2).is_center_good());
    }

    #[test]
    fn test_event_good_flag() {
        let ok = ReducedHit::new(3.0, 2, 4, 10.0, 3);
        let bad = ReducedHit::new(f64::NAN, 2, 4, 10.0, 3);

        let event = Event::new(ok, ok, None, 10);
        assert!(event.good);
        assert_eq!(event.hits_used(), 6);

        assert!(!Event::new(ok, bad, None, 10).good);
        assert!(!Event::new(ok, ok, Some(bad), 10).good);
        assert!(Event::new(ok, ok, Some(ok), 10).good);
    }
}
