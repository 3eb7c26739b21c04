//! Hit type for per-plane position readout.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single timestamped, weighted position sample on one detector plane.
///
/// Produced by the readout parser; immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Timestamp in detector clock ticks.
    pub time: u64,
    /// Plane (axis) identifier.
    pub plane: u8,
    /// Strip or wire index along the plane.
    pub coordinate: u16,
    /// Collected charge or ADC value.
    pub weight: u16,
}

impl Hit {
    /// Creates a new hit.
    #[inline]
    #[must_use]
    pub fn new(time: u64, plane: u8, coordinate: u16, weight: u16) -> Self {
        Self {
            time,
            plane,
            coordinate,
            weight,
        }
    }

    /// Absolute time difference to another hit.
    #[inline]
    #[must_use]
    pub fn time_diff(&self, other: &Self) -> u64 {
        self.time.abs_diff(other.time)
    }
}

/// Owned buffer of hits for one plane.
pub type HitVector = Vec<Hit>;

/// Stable sort of a hit buffer by time; equal timestamps keep insertion order.
pub fn sort_by_time(hits: &mut [Hit]) {
    hits.sort_by_key(|hit| hit.time);
}
