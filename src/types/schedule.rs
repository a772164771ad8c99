//! Schedule and optimizer output types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Start times are discretized to 15-minute slots.
pub const SLOTS_PER_HOUR: u16 = 4;

/// A start time expressed as a 15-minute slot index within the day
/// (0 = midnight, 32 = 08:00, 95 = 23:45).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTime(pub u16);

impl SlotTime {
    pub fn from_hour(hour: u8) -> Self {
        Self(u16::from(hour) * SLOTS_PER_HOUR)
    }

    /// Fractional hour of day, e.g. slot 34 → 8.5.
    pub fn as_hours(&self) -> f64 {
        f64::from(self.0) / f64::from(SLOTS_PER_HOUR)
    }

    pub fn hour(&self) -> u8 {
        (self.0 / SLOTS_PER_HOUR) as u8
    }

    pub fn minute(&self) -> u8 {
        ((self.0 % SLOTS_PER_HOUR) * 15) as u8
    }
}

impl std::fmt::Display for SlotTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Why the annealer stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Converged,
    MaxIterationsReached,
    Aborted,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Converged => "converged",
            Self::MaxIterationsReached => "max_iterations_reached",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// One sampled point of the annealing trajectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnnealSample {
    pub iteration: u64,
    pub temperature: f64,
    pub score: f64,
}

/// A start-time assignment for every candidate burn on a target date.
///
/// Invariant: each assignment lies within that burn's window. `BTreeMap`
/// keeps iteration order deterministic for byte-identical reruns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub date: NaiveDate,
    pub assignments: BTreeMap<Uuid, SlotTime>,
    pub score: f64,
    pub iterations: u64,
    pub reheats: u32,
    pub termination: TerminationReason,
    pub history: Vec<AnnealSample>,
    pub created_at: i64,
}

impl Schedule {
    /// An empty schedule for a date with no candidates.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            assignments: BTreeMap::new(),
            score: 0.0,
            iterations: 0,
            reheats: 0,
            termination: TerminationReason::Converged,
            history: Vec::new(),
            created_at: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
