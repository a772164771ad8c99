//! Weather snapshot types and Pasquill stability classes

use serde::{Deserialize, Serialize};

/// Dimension of the weather condition fingerprint vector.
pub const WEATHER_FINGERPRINT_DIM: usize = 128;

/// Pasquill atmospheric stability class, A (very unstable) through
/// F (very stable). Selects the dispersion coefficient curves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StabilityClass {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl StabilityClass {
    /// All classes, unstable to stable.
    pub const ALL: [Self; 6] = [Self::A, Self::B, Self::C, Self::D, Self::E, Self::F];

    /// Index 0–5 for table lookups.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            "E" => Some(Self::E),
            "F" => Some(Self::F),
            _ => None,
        }
    }
}

impl std::fmt::Display for StabilityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
            Self::F => 'F',
        };
        write!(f, "{c}")
    }
}

/// Point-in-time atmospheric conditions at a location.
///
/// All numeric fields are finite after construction through the provider
/// facades; humidity is clamped to [0, 100] on ingest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_ms: f64,
    /// Degrees from north, clockwise.
    pub wind_dir_deg: f64,
    pub precip_prob_pct: f64,
    pub visibility_km: f64,
    pub stability: StabilityClass,
    /// Unix seconds.
    pub ts: i64,
}

impl WeatherSnapshot {
    /// Clamp out-of-range sensor values in place. Returns true if any
    /// field was adjusted.
    pub fn sanitize(&mut self) -> bool {
        let mut adjusted = false;
        if !(0.0..=100.0).contains(&self.humidity_pct) {
            self.humidity_pct = self.humidity_pct.clamp(0.0, 100.0);
            adjusted = true;
        }
        if self.wind_speed_ms < 0.0 {
            self.wind_speed_ms = 0.0;
            adjusted = true;
        }
        if !(-40.0..=49.0).contains(&self.temperature_c) {
            self.temperature_c = self.temperature_c.clamp(-40.0, 49.0);
            adjusted = true;
        }
        adjusted
    }

    /// Whether every numeric field is finite.
    pub fn is_finite(&self) -> bool {
        [
            self.temperature_c,
            self.humidity_pct,
            self.wind_speed_ms,
            self.wind_dir_deg,
            self.precip_prob_pct,
            self.visibility_km,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Conditions outside the safe-burn envelope require human approval.
    pub fn is_unsafe_for_burning(&self) -> bool {
        self.wind_speed_ms > 11.0
            || self.humidity_pct < 15.0
            || self.visibility_km < 3.0
            || self.precip_prob_pct > 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            temperature_c: 22.0,
            humidity_pct: 45.0,
            wind_speed_ms: 3.0,
            wind_dir_deg: 270.0,
            precip_prob_pct: 10.0,
            visibility_km: 16.0,
            stability: StabilityClass::D,
            ts: 1_767_225_600,
        }
    }

    #[test]
    fn calm_day_is_safe() {
        assert!(!snapshot().is_unsafe_for_burning());
    }

    #[test]
    fn high_wind_and_low_humidity_are_unsafe() {
        let mut snap = snapshot();
        snap.wind_speed_ms = 14.0;
        assert!(snap.is_unsafe_for_burning());

        let mut snap = snapshot();
        snap.humidity_pct = 10.0;
        assert!(snap.is_unsafe_for_burning());
    }

    #[test]
    fn sanitize_clamps_out_of_range_inputs() {
        let mut snap = snapshot();
        snap.humidity_pct = 130.0;
        snap.temperature_c = 60.0;
        assert!(snap.sanitize());
        assert!((snap.humidity_pct - 100.0).abs() < f64::EPSILON);
        assert!((snap.temperature_c - 49.0).abs() < f64::EPSILON);
        assert!(!snap.sanitize());
    }

    #[test]
    fn stability_class_ordering_and_index() {
        assert!(StabilityClass::A < StabilityClass::F);
        assert_eq!(StabilityClass::D.index(), 3);
        assert_eq!(StabilityClass::parse("e"), Some(StabilityClass::E));
        assert_eq!(StabilityClass::parse("G"), None);
    }
}
