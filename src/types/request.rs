//! Burn request intake types: field geometry, fuel, windows, contacts

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::RequestState;

// ============================================================================
// Geometry
// ============================================================================

/// Mean earth radius used for local distance/area math.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_m(&self, other: &Self) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }

    /// Initial bearing toward `other`, degrees clockwise from north.
    pub fn bearing_deg(&self, other: &Self) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        (y.atan2(x).to_degrees() + 360.0) % 360.0
    }
}

/// A closed polygon ring describing a field boundary.
///
/// The ring is stored closed (first vertex repeated last). Area and
/// centroid use a local equirectangular projection, which is accurate to
/// well under the ±20% acreage tolerance at field scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldPolygon {
    pub ring: Vec<GeoPoint>,
}

impl FieldPolygon {
    pub fn new(ring: Vec<GeoPoint>) -> Self {
        Self { ring }
    }

    /// Whether the ring is explicitly closed and has enough vertices.
    pub fn is_closed(&self) -> bool {
        self.ring.len() >= 4
            && self.ring.first().map(|p| (p.lat, p.lon)) == self.ring.last().map(|p| (p.lat, p.lon))
    }

    /// Vertices without the closing duplicate.
    fn open_ring(&self) -> &[GeoPoint] {
        if self.is_closed() {
            &self.ring[..self.ring.len() - 1]
        } else {
            &self.ring
        }
    }

    /// Centroid of the ring vertices.
    pub fn centroid(&self) -> GeoPoint {
        let pts = self.open_ring();
        if pts.is_empty() {
            return GeoPoint::new(0.0, 0.0);
        }
        let n = pts.len() as f64;
        let lat = pts.iter().map(|p| p.lat).sum::<f64>() / n;
        let lon = pts.iter().map(|p| p.lon).sum::<f64>() / n;
        GeoPoint::new(lat, lon)
    }

    /// Planar area in square meters via the shoelace formula on a local
    /// projection around the centroid.
    pub fn area_m2(&self) -> f64 {
        let pts = self.open_ring();
        if pts.len() < 3 {
            return 0.0;
        }
        let origin = self.centroid();
        let cos_lat = origin.lat.to_radians().cos().max(1e-9);
        let project = |p: &GeoPoint| {
            let x = (p.lon - origin.lon).to_radians() * EARTH_RADIUS_M * cos_lat;
            let y = (p.lat - origin.lat).to_radians() * EARTH_RADIUS_M;
            (x, y)
        };
        let mut sum = 0.0;
        for i in 0..pts.len() {
            let (x1, y1) = project(&pts[i]);
            let (x2, y2) = project(&pts[(i + 1) % pts.len()]);
            sum += x1 * y2 - x2 * y1;
        }
        (sum / 2.0).abs()
    }

    /// Area in acres.
    pub fn area_acres(&self) -> f64 {
        self.area_m2() / 4_046.856
    }

    /// Whether any two non-adjacent edges cross.
    pub fn is_self_intersecting(&self) -> bool {
        let pts = self.open_ring();
        let n = pts.len();
        if n < 4 {
            return false;
        }
        for i in 0..n {
            for j in (i + 1)..n {
                // Skip adjacent edges (share a vertex)
                if j == i || (j + 1) % n == i || (i + 1) % n == j {
                    continue;
                }
                let (a1, a2) = (&pts[i], &pts[(i + 1) % n]);
                let (b1, b2) = (&pts[j], &pts[(j + 1) % n]);
                if segments_intersect(a1, a2, b1, b2) {
                    return true;
                }
            }
        }
        false
    }
}

/// Proper segment intersection test via orientation signs.
fn segments_intersect(a1: &GeoPoint, a2: &GeoPoint, b1: &GeoPoint, b2: &GeoPoint) -> bool {
    fn orient(p: &GeoPoint, q: &GeoPoint, r: &GeoPoint) -> f64 {
        (q.lon - p.lon) * (r.lat - p.lat) - (q.lat - p.lat) * (r.lon - p.lon)
    }
    let d1 = orient(b1, b2, a1);
    let d2 = orient(b1, b2, a2);
    let d3 = orient(a1, a2, b1);
    let d4 = orient(a1, a2, b2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

// ============================================================================
// Fuel & intensity
// ============================================================================

/// Recognized crop fuel types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    WheatStubble,
    RiceStraw,
    CornStalks,
    OrchardPrunings,
    Grass,
}

impl FuelType {
    /// Parse from API/config strings.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wheat" | "wheat_stubble" => Some(Self::WheatStubble),
            "rice" | "rice_straw" => Some(Self::RiceStraw),
            "corn" | "corn_stalks" => Some(Self::CornStalks),
            "orchard" | "orchard_prunings" => Some(Self::OrchardPrunings),
            "grass" => Some(Self::Grass),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::WheatStubble => "Wheat Stubble",
            Self::RiceStraw => "Rice Straw",
            Self::CornStalks => "Corn Stalks",
            Self::OrchardPrunings => "Orchard Prunings",
            Self::Grass => "Grass",
        }
    }
}

impl std::fmt::Display for FuelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Burn intensity scales the emission rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BurnIntensity {
    Low,
    #[default]
    Moderate,
    High,
}

impl BurnIntensity {
    /// Emission multiplier relative to reference intensity 1.0.
    pub fn factor(&self) -> f64 {
        match self {
            Self::Low => 0.6,
            Self::Moderate => 1.0,
            Self::High => 1.5,
        }
    }
}

// ============================================================================
// Window & contact
// ============================================================================

/// Operator-supplied `[start_hour, end_hour)` range a burn may start in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BurnWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl BurnWindow {
    pub fn new(start_hour: u8, end_hour: u8) -> Self {
        Self { start_hour, end_hour }
    }

    /// `0 ≤ start < end ≤ 24`.
    pub fn is_valid(&self) -> bool {
        self.start_hour < self.end_hour && self.end_hour <= 24
    }

    pub fn hours(&self) -> u8 {
        self.end_hour.saturating_sub(self.start_hour)
    }

    /// Whether two windows share at least one hour.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_hour < other.end_hour && other.start_hour < self.end_hour
    }
}

impl std::fmt::Display for BurnWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:02}:00, {:02}:00)", self.start_hour, self.end_hour)
    }
}

/// How the operator wants to be notified.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    #[default]
    Sms,
    Broadcast,
}

// ============================================================================
// BurnRequest
// ============================================================================

/// An operator-submitted intent to burn a field.
///
/// Identity is assigned at validation. The request owns its dispersion
/// result and any conflict records that reference it; schedules reference
/// requests by id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnRequest {
    pub id: Uuid,
    pub farm_id: String,
    pub field_boundary: FieldPolygon,
    pub acres: f64,
    pub fuel: FuelType,
    pub intensity: BurnIntensity,
    pub burn_date: NaiveDate,
    pub window: BurnWindow,
    /// Priority score in [0, 10]; higher schedules earlier in its window.
    pub priority: f64,
    /// Derived maximum dispersion radius in meters (set after prediction).
    pub max_radius_m: f64,
    pub contact: ContactMethod,
    pub contact_handle: String,
    pub state: RequestState,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BurnRequest {
    /// Burn duration: 1 hour per 50 acres, clamped to [1, 8] hours.
    pub fn duration_hours(&self) -> f64 {
        (self.acres / 50.0).clamp(1.0, 8.0)
    }

    pub fn centroid(&self) -> GeoPoint {
        self.field_boundary.centroid()
    }

    /// Coarse smoke-interaction radius derived from field size and
    /// intensity, clamped to [500 m, 10 km]. This is the gathering
    /// radius for conflict candidates; the 35 µg/m³ boundary from the
    /// dispersion model is a separate, usually tighter figure.
    pub fn interaction_radius_m(&self) -> f64 {
        let field_radius = (self.field_boundary.area_m2() / std::f64::consts::PI).sqrt();
        (field_radius * 5.0 * self.intensity.factor().sqrt()).clamp(500.0, 10_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_ring(lat: f64, lon: f64, half_deg: f64) -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(lat - half_deg, lon - half_deg),
            GeoPoint::new(lat - half_deg, lon + half_deg),
            GeoPoint::new(lat + half_deg, lon + half_deg),
            GeoPoint::new(lat + half_deg, lon - half_deg),
            GeoPoint::new(lat - half_deg, lon - half_deg),
        ]
    }

    #[test]
    fn square_polygon_is_closed_and_simple() {
        let poly = FieldPolygon::new(square_ring(38.544, -121.740, 0.002));
        assert!(poly.is_closed());
        assert!(!poly.is_self_intersecting());
    }

    #[test]
    fn bowtie_polygon_self_intersects() {
        // Crossed quad: edges (0→1) and (2→3) intersect
        let poly = FieldPolygon::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(1.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(0.0, 0.0),
        ]);
        assert!(poly.is_self_intersecting());
    }

    #[test]
    fn area_of_known_square() {
        // ~0.004° × 0.004° square at 38.5°N: about 445m × 348m ≈ 155k m²
        let poly = FieldPolygon::new(square_ring(38.544, -121.740, 0.002));
        let area = poly.area_m2();
        assert!(area > 120_000.0 && area < 190_000.0, "area = {area}");
    }

    #[test]
    fn haversine_distance_sanity() {
        let a = GeoPoint::new(38.544, -121.740);
        let b = GeoPoint::new(38.544, -121.730);
        let d = a.distance_m(&b);
        // 0.01° of longitude at 38.5°N ≈ 870 m
        assert!(d > 800.0 && d < 950.0, "d = {d}");
    }

    #[test]
    fn window_validity_and_overlap() {
        assert!(BurnWindow::new(8, 16).is_valid());
        assert!(!BurnWindow::new(16, 8).is_valid());
        assert!(!BurnWindow::new(0, 25).is_valid());
        assert!(BurnWindow::new(9, 12).overlaps(&BurnWindow::new(10, 13)));
        assert!(!BurnWindow::new(9, 12).overlaps(&BurnWindow::new(12, 14)));
    }

    #[test]
    fn duration_scales_with_acreage() {
        let mut req = BurnRequest {
            id: Uuid::nil(),
            farm_id: "f1".into(),
            field_boundary: FieldPolygon::new(square_ring(38.5, -121.7, 0.002)),
            acres: 100.0,
            fuel: FuelType::WheatStubble,
            intensity: BurnIntensity::Moderate,
            burn_date: NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date"),
            window: BurnWindow::new(8, 16),
            priority: 5.0,
            max_radius_m: 0.0,
            contact: ContactMethod::Sms,
            contact_handle: "+15550100".into(),
            state: RequestState::Received,
            created_at: 0,
            updated_at: 0,
        };
        assert!((req.duration_hours() - 2.0).abs() < f64::EPSILON);
        req.acres = 10.0;
        assert!((req.duration_hours() - 1.0).abs() < f64::EPSILON);
        req.acres = 1000.0;
        assert!((req.duration_hours() - 8.0).abs() < f64::EPSILON);

        // Interaction radius: ~155k m² field → ~220 m field radius → ~1.1 km
        let radius = req.interaction_radius_m();
        assert!((1_000.0..1_300.0).contains(&radius), "radius = {radius}");
    }
}
