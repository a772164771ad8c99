//! Pairwise smoke conflict records

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How two burns interact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Footprints overlap but assigned times do not.
    Spatial,
    /// Times overlap but footprints stay apart.
    Temporal,
    /// Both overlap — plumes combine.
    Combined,
}

/// Discretized conflict severity.
///
/// Mapped from the continuous score: critical ≥ 0.8, high ≥ 0.6,
/// medium ≥ 0.3, low > 0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ConflictSeverity {
    /// Map a normalized score in (0, 1] to a severity band.
    /// Returns `None` for scores ≤ 0 (no conflict).
    pub fn from_score(score: f64) -> Option<Self> {
        if score >= 0.8 {
            Some(Self::Critical)
        } else if score >= 0.6 {
            Some(Self::High)
        } else if score >= 0.3 {
            Some(Self::Medium)
        } else if score > 0.0 {
            Some(Self::Low)
        } else {
            None
        }
    }

    /// Penalty weight used by the optimizer objective.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.75,
            Self::Critical => 1.0,
        }
    }
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A pair of burns whose plumes interact.
///
/// Canonical ordering invariant: `a < b` by uuid byte order, so a pair is
/// recorded exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub a: Uuid,
    pub b: Uuid,
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    /// Continuous score the severity was derived from.
    pub score: f64,
    /// Centroid-to-centroid distance, m.
    pub distance_m: f64,
    /// Hours the two burn intervals overlap.
    pub time_overlap_h: f64,
    /// Peak combined PM2.5 along the centroid line, µg/m³.
    pub peak_pm25: f64,
}

impl ConflictRecord {
    /// Construct with the canonical `a < b` ordering enforced.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: Uuid,
        b: Uuid,
        kind: ConflictKind,
        severity: ConflictSeverity,
        score: f64,
        distance_m: f64,
        time_overlap_h: f64,
        peak_pm25: f64,
    ) -> Self {
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        Self { a, b, kind, severity, score, distance_m, time_overlap_h, peak_pm25 }
    }

    /// Whether the given request participates in this conflict.
    pub fn involves(&self, id: Uuid) -> bool {
        self.a == id || self.b == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bands_match_thresholds() {
        assert_eq!(ConflictSeverity::from_score(0.85), Some(ConflictSeverity::Critical));
        assert_eq!(ConflictSeverity::from_score(0.8), Some(ConflictSeverity::Critical));
        assert_eq!(ConflictSeverity::from_score(0.7), Some(ConflictSeverity::High));
        assert_eq!(ConflictSeverity::from_score(0.45), Some(ConflictSeverity::Medium));
        assert_eq!(ConflictSeverity::from_score(0.1), Some(ConflictSeverity::Low));
        assert_eq!(ConflictSeverity::from_score(0.0), None);
        assert_eq!(ConflictSeverity::from_score(-0.5), None);
    }

    #[test]
    fn records_are_canonically_ordered() {
        let lo = Uuid::from_u128(1);
        let hi = Uuid::from_u128(2);
        let rec = ConflictRecord::new(
            hi,
            lo,
            ConflictKind::Combined,
            ConflictSeverity::High,
            0.7,
            1200.0,
            2.0,
            48.0,
        );
        assert_eq!(rec.a, lo);
        assert_eq!(rec.b, hi);
        assert!(rec.involves(lo));
        assert!(rec.involves(hi));
        assert!(!rec.involves(Uuid::from_u128(3)));
    }

    #[test]
    fn severity_ordering_is_ascending() {
        assert!(ConflictSeverity::Low < ConflictSeverity::Medium);
        assert!(ConflictSeverity::High < ConflictSeverity::Critical);
    }
}
