//! Schedule optimizer
//!
//! Simulated-annealing search over start-time assignments for the burns
//! competing on one target date. The objective trades priority
//! satisfaction against conflict penalty, time-preference gap, and an
//! efficiency bonus for spreading burns across the day.
//!
//! The optimizer operates on a private copy of its candidate set and
//! never touches persistent state — the optimize stage writes the
//! schedule only on successful termination.

mod annealer;
mod objective;

pub use annealer::{anneal, AnnealOutcome};
pub use objective::Objective;

use crate::conflict::ScheduledBurn;
use crate::types::{BurnWindow, SlotTime, SLOTS_PER_HOUR};

/// A burn competing for a start time on the target date.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Everything the conflict detector needs, start slot ignored.
    pub burn: ScheduledBurn,
    /// Operator-supplied window bounding the start slot.
    pub window: BurnWindow,
}

impl Candidate {
    /// First legal start slot.
    pub fn min_slot(&self) -> u16 {
        u16::from(self.window.start_hour) * SLOTS_PER_HOUR
    }

    /// Last legal start slot (inclusive). The window bounds when a burn
    /// may start, not when it must finish.
    pub fn max_slot(&self) -> u16 {
        u16::from(self.window.end_hour) * SLOTS_PER_HOUR - 1
    }

    /// Whether `slot` is a legal assignment for this burn.
    pub fn admits(&self, slot: SlotTime) -> bool {
        (self.min_slot()..=self.max_slot()).contains(&slot.0)
    }

    /// Materialize this candidate at a start slot.
    pub fn at(&self, slot: SlotTime) -> ScheduledBurn {
        ScheduledBurn { start: slot, ..self.burn.clone() }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::{GeoPoint, StabilityClass};
    use uuid::Uuid;

    /// Candidate factory shared by the objective and annealer tests.
    pub fn candidate(
        id: u128,
        lat: f64,
        lon: f64,
        window: BurnWindow,
        priority: f64,
    ) -> Candidate {
        Candidate {
            burn: ScheduledBurn {
                id: Uuid::from_u128(id),
                centroid: GeoPoint::new(lat, lon),
                radius_m: 2_000.0,
                emission_rate_gs: 250.0,
                effective_height_m: 60.0,
                wind_ms: 3.0,
                stability: StabilityClass::D,
                start: SlotTime::from_hour(window.start_hour),
                duration_h: 2.0,
                priority,
            },
            window,
        }
    }

    #[test]
    fn slot_bounds_follow_the_window() {
        let c = candidate(1, 38.5, -121.7, BurnWindow::new(8, 16), 5.0);
        assert_eq!(c.min_slot(), 32);
        assert_eq!(c.max_slot(), 63);
        assert!(c.admits(SlotTime(32)));
        assert!(c.admits(SlotTime(63)));
        assert!(!c.admits(SlotTime(64)));
        assert!(!c.admits(SlotTime(31)));
    }
}
