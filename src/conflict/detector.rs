//! Pairwise conflict detection and severity scoring

use tracing::debug;
use uuid::Uuid;

use crate::dispersion::plume;
use crate::error::PipelineError;
use crate::types::{
    ConflictKind, ConflictRecord, ConflictSeverity, GeoPoint, SlotTime, StabilityClass,
    PM25_THRESHOLD,
};

use super::grid::SpatialGrid;

/// Sample points along the centroid line when searching for the peak
/// combined concentration.
const COMBINED_SAMPLES: usize = 21;

/// A burn as the detector sees it: identity, geometry, plume physics,
/// and its assigned start time.
#[derive(Debug, Clone)]
pub struct ScheduledBurn {
    pub id: Uuid,
    pub centroid: GeoPoint,
    /// Smoke-interaction radius derived at validation, m.
    pub radius_m: f64,
    /// Emission rate from the dispersion result, g/s.
    pub emission_rate_gs: f64,
    /// Effective plume height, m.
    pub effective_height_m: f64,
    /// Wind speed from the assessed snapshot, m/s.
    pub wind_ms: f64,
    pub stability: StabilityClass,
    pub start: SlotTime,
    pub duration_h: f64,
    pub priority: f64,
}

impl ScheduledBurn {
    fn end_hours(&self) -> f64 {
        self.start.as_hours() + self.duration_h
    }

    /// Worst-case centerline concentration this burn contributes at a
    /// ground distance, µg/m³. Direction-agnostic (conservative).
    fn concentration_at(&self, distance_m: f64) -> f64 {
        plume::concentration_ugm3(
            self.emission_rate_gs,
            self.wind_ms,
            self.stability,
            self.effective_height_m,
            distance_m.max(1.0),
            0.0,
        )
    }
}

/// Hours of overlap between two burn intervals.
fn time_overlap_h(a: &ScheduledBurn, b: &ScheduledBurn) -> f64 {
    let start = a.start.as_hours().max(b.start.as_hours());
    let end = a.end_hours().min(b.end_hours());
    (end - start).max(0.0)
}

/// Peak combined PM2.5 at sample points on the line connecting the two
/// centroids, summing both contributions.
fn peak_combined_pm25(a: &ScheduledBurn, b: &ScheduledBurn, distance_m: f64) -> f64 {
    let mut peak = 0.0_f64;
    for i in 0..COMBINED_SAMPLES {
        let t = i as f64 / (COMBINED_SAMPLES - 1) as f64;
        let from_a = distance_m * t;
        let from_b = distance_m * (1.0 - t);
        let combined = a.concentration_at(from_a) + b.concentration_at(from_b);
        peak = peak.max(combined);
    }
    peak
}

/// Score a single pair of burns. Returns `None` when they do not
/// conflict at their current assignments.
///
/// Score: `0.4·proximity + 0.3·time_overlap + 0.3·pm25/threshold`, each
/// term normalized to [0, 1], then banded into a severity.
pub fn pair_conflict(a: &ScheduledBurn, b: &ScheduledBurn, slack_m: f64) -> Option<ConflictRecord> {
    let distance_m = a.centroid.distance_m(&b.centroid);
    let pair_bound = a.radius_m + b.radius_m + slack_m;
    if distance_m > pair_bound {
        return None;
    }

    let overlap_h = time_overlap_h(a, b);
    let footprints_touch = distance_m <= a.radius_m + b.radius_m;

    let kind = match (footprints_touch, overlap_h > 0.0) {
        (true, true) => ConflictKind::Combined,
        (true, false) => ConflictKind::Spatial,
        (false, true) => ConflictKind::Temporal,
        (false, false) => return None,
    };

    // Plumes only combine in the air when the burns overlap in time
    let peak_pm25 = if overlap_h > 0.0 {
        peak_combined_pm25(a, b, distance_m)
    } else {
        0.0
    };

    let proximity_norm = (1.0 - distance_m / pair_bound).clamp(0.0, 1.0);
    let time_norm = (overlap_h / 8.0).clamp(0.0, 1.0);
    let pm25_norm = (peak_pm25 / PM25_THRESHOLD).clamp(0.0, 1.0);
    let score = 0.4 * proximity_norm + 0.3 * time_norm + 0.3 * pm25_norm;

    let severity = ConflictSeverity::from_score(score)?;

    Some(ConflictRecord::new(
        a.id, b.id, kind, severity, score, distance_m, overlap_h, peak_pm25,
    ))
}

/// Index pairs whose footprints could interact regardless of assigned
/// times. Radii do not move with start slots, so this set is computed
/// once and re-scored as the optimizer shifts assignments.
pub fn candidate_pairs(burns: &[ScheduledBurn], slack_m: f64) -> Vec<(usize, usize)> {
    if burns.len() < 2 {
        return Vec::new();
    }

    let mut grid = SpatialGrid::new();
    for burn in burns {
        grid.insert(burn.centroid);
    }
    let max_radius = burns.iter().map(|b| b.radius_m).fold(0.0_f64, f64::max);

    let mut pairs = Vec::new();
    for (i, a) in burns.iter().enumerate() {
        // Gather with the largest possible partner radius so no pair is
        // missed, then filter by the true pairwise bound.
        let gather_radius = a.radius_m + max_radius + slack_m;
        for j in grid.within(&a.centroid, gather_radius) {
            if j <= i {
                continue;
            }
            let b = &burns[j];
            let distance = a.centroid.distance_m(&b.centroid);
            if distance <= a.radius_m + b.radius_m + slack_m {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Detect all pairwise conflicts among the scheduled burns.
///
/// Candidates are gathered from a 1 km grid within
/// `radius(A) + radius(B) + slack` of each centroid; each surviving pair
/// is scored and emitted with the canonical `a < b` ordering. Exceeding
/// `cap` fails with `Capacity` before any pairwise work.
pub fn detect(
    burns: &[ScheduledBurn],
    cap: usize,
    slack_m: f64,
) -> Result<Vec<ConflictRecord>, PipelineError> {
    if burns.len() > cap {
        return Err(PipelineError::Capacity { limit: cap });
    }

    let records: Vec<ConflictRecord> = candidate_pairs(burns, slack_m)
        .into_iter()
        .filter_map(|(i, j)| pair_conflict(&burns[i], &burns[j], slack_m))
        .collect();

    debug!(
        burns = burns.len(),
        conflicts = records.len(),
        "Conflict detection complete"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burn(id: u128, lat: f64, lon: f64, start_hour: u8, duration_h: f64) -> ScheduledBurn {
        ScheduledBurn {
            id: Uuid::from_u128(id),
            centroid: GeoPoint::new(lat, lon),
            radius_m: 2_000.0,
            emission_rate_gs: 250.0,
            effective_height_m: 60.0,
            wind_ms: 3.0,
            stability: StabilityClass::D,
            start: SlotTime::from_hour(start_hour),
            duration_h,
            priority: 5.0,
        }
    }

    #[test]
    fn close_simultaneous_burns_conflict() {
        // ~1.4 km apart, overlapping 9–12 / 10–13 windows
        let burns = vec![
            burn(1, 38.544, -121.740, 9, 3.0),
            burn(2, 38.556, -121.740, 10, 3.0),
        ];
        let records = detect(&burns, 500, 500.0).expect("detect");
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.kind, ConflictKind::Combined);
        assert!(rec.severity >= ConflictSeverity::Medium, "severity {:?}", rec.severity);
        assert!(rec.a < rec.b);
        assert!((rec.time_overlap_h - 2.0).abs() < 1e-9);
        assert!(rec.peak_pm25 > 0.0);
    }

    #[test]
    fn distant_burns_do_not_conflict() {
        let burns = vec![
            burn(1, 38.544, -121.740, 9, 3.0),
            burn(2, 39.2, -121.740, 9, 3.0), // ~73 km away
        ];
        let records = detect(&burns, 500, 500.0).expect("detect");
        assert!(records.is_empty());
    }

    #[test]
    fn disjoint_times_make_spatial_conflicts() {
        let burns = vec![
            burn(1, 38.544, -121.740, 8, 2.0),
            burn(2, 38.556, -121.740, 14, 2.0),
        ];
        let records = detect(&burns, 500, 500.0).expect("detect");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ConflictKind::Spatial);
        assert!(records[0].peak_pm25.abs() < f64::EPSILON);
    }

    #[test]
    fn cap_overflow_is_rejected() {
        let burns: Vec<ScheduledBurn> =
            (0..11).map(|i| burn(i, 38.5 + i as f64 * 0.01, -121.7, 9, 2.0)).collect();
        let err = detect(&burns, 10, 500.0).expect_err("over cap");
        assert_eq!(err, PipelineError::Capacity { limit: 10 });
    }

    #[test]
    fn single_burn_has_no_conflicts() {
        let burns = vec![burn(1, 38.544, -121.740, 9, 3.0)];
        assert!(detect(&burns, 500, 500.0).expect("detect").is_empty());
    }

    #[test]
    fn combined_peak_exceeds_single_contribution() {
        let a = burn(1, 38.544, -121.740, 9, 3.0);
        let b = burn(2, 38.550, -121.740, 9, 3.0);
        let d = a.centroid.distance_m(&b.centroid);
        let peak = peak_combined_pm25(&a, &b, d);
        let solo = a.concentration_at(d / 2.0);
        assert!(peak >= solo);
    }
}
