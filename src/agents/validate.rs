//! Stage A — Validate
//!
//! Pure checks on the submitted request: polygon well-formedness,
//! acreage consistency, window sanity, future date, priority range.
//! No external I/O. Budget: 200 ms.

use tracing::debug;

use crate::error::PipelineError;
use crate::types::BurnRequest;

use super::{StageContext, WorkingSet};

/// Acreage must agree with the polygon area within this tolerance.
const ACREAGE_TOLERANCE: f64 = 0.20;

/// Largest single burn accepted, acres.
const MAX_ACRES: f64 = 10_000.0;

pub async fn run(_ctx: &StageContext, ws: &mut WorkingSet) -> Result<(), PipelineError> {
    let fields = check(&ws.request);
    if !fields.is_empty() {
        return Err(PipelineError::Validation { fields });
    }

    // Normalization: clamp priority into range (bad values were already
    // rejected; this squares away float noise like 10.0000001 from
    // clients doing their own math) and derive the interaction radius
    ws.request.priority = ws.request.priority.clamp(0.0, 10.0);
    ws.request.max_radius_m = ws.request.interaction_radius_m();

    debug!(
        request_id = %ws.request.id,
        farm_id = %ws.request.farm_id,
        acres = ws.request.acres,
        fuel = %ws.request.fuel,
        "Request validated"
    );
    Ok(())
}

/// All failing field names, empty when the request is acceptable.
fn check(request: &BurnRequest) -> Vec<String> {
    let mut fields = Vec::new();

    if !request.field_boundary.is_closed() {
        fields.push("field_boundary: ring not closed".to_string());
    } else if request.field_boundary.is_self_intersecting() {
        fields.push("field_boundary: ring self-intersects".to_string());
    }

    if !(request.acres > 0.0 && request.acres <= MAX_ACRES) {
        fields.push(format!("acres: {} outside (0, {MAX_ACRES}]", request.acres));
    } else if request.field_boundary.is_closed() && !request.field_boundary.is_self_intersecting() {
        let polygon_acres = request.field_boundary.area_acres();
        if polygon_acres > 0.0 {
            let ratio = request.acres / polygon_acres;
            if !((1.0 - ACREAGE_TOLERANCE)..=(1.0 + ACREAGE_TOLERANCE)).contains(&ratio) {
                fields.push(format!(
                    "acres: {} inconsistent with polygon area {:.1}",
                    request.acres, polygon_acres
                ));
            }
        } else {
            fields.push("field_boundary: degenerate polygon".to_string());
        }
    }

    if !request.window.is_valid() {
        fields.push(format!("time_window: {} invalid", request.window));
    }

    let today = chrono::Utc::now().date_naive();
    if request.burn_date <= today {
        fields.push(format!("burn_date: {} is not in the future", request.burn_date));
    }

    if !(0.0..=10.0).contains(&request.priority) || !request.priority.is_finite() {
        fields.push(format!("priority_score: {} outside [0, 10]", request.priority));
    }

    if request.contact_handle.trim().is_empty() {
        fields.push("contact_method: empty contact handle".to_string());
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BurnIntensity, BurnWindow, ContactMethod, FieldPolygon, FuelType, GeoPoint, RequestState,
    };
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    /// Square ring around a point sized to the requested acreage.
    fn ring_for_acres(lat: f64, lon: f64, acres: f64) -> Vec<GeoPoint> {
        let side_m = (acres * 4_046.856).sqrt();
        let half_lat = side_m / 2.0 / 111_320.0;
        let half_lon = half_lat / lat.to_radians().cos();
        vec![
            GeoPoint::new(lat - half_lat, lon - half_lon),
            GeoPoint::new(lat - half_lat, lon + half_lon),
            GeoPoint::new(lat + half_lat, lon + half_lon),
            GeoPoint::new(lat + half_lat, lon - half_lon),
            GeoPoint::new(lat - half_lat, lon - half_lon),
        ]
    }

    fn request() -> BurnRequest {
        BurnRequest {
            id: Uuid::from_u128(1),
            farm_id: "f1".into(),
            field_boundary: FieldPolygon::new(ring_for_acres(38.544, -121.740, 100.0)),
            acres: 100.0,
            fuel: FuelType::WheatStubble,
            intensity: BurnIntensity::Moderate,
            burn_date: (Utc::now() + Duration::days(2)).date_naive(),
            window: BurnWindow::new(8, 16),
            priority: 7.0,
            max_radius_m: 0.0,
            contact: ContactMethod::Sms,
            contact_handle: "+15550100".into(),
            state: RequestState::Received,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn well_formed_request_passes() {
        assert!(check(&request()).is_empty());
    }

    #[test]
    fn open_ring_is_rejected() {
        let mut req = request();
        req.field_boundary.ring.pop();
        req.field_boundary.ring.pop();
        let fields = check(&req);
        assert!(fields.iter().any(|f| f.contains("field_boundary")), "{fields:?}");
    }

    #[test]
    fn acreage_inconsistent_with_polygon_is_rejected() {
        let mut req = request();
        req.acres = 400.0; // polygon encloses ~100
        let fields = check(&req);
        assert!(fields.iter().any(|f| f.contains("inconsistent")), "{fields:?}");
    }

    #[test]
    fn acreage_within_tolerance_passes() {
        let mut req = request();
        req.acres = 110.0; // +10%
        assert!(check(&req).is_empty());
    }

    #[test]
    fn past_date_is_rejected() {
        let mut req = request();
        req.burn_date = (Utc::now() - Duration::days(1)).date_naive();
        let fields = check(&req);
        assert!(fields.iter().any(|f| f.contains("burn_date")), "{fields:?}");
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut req = request();
        req.window = BurnWindow::new(16, 8);
        let fields = check(&req);
        assert!(fields.iter().any(|f| f.contains("time_window")), "{fields:?}");
    }

    #[test]
    fn out_of_range_priority_is_rejected() {
        let mut req = request();
        req.priority = 12.0;
        let fields = check(&req);
        assert!(fields.iter().any(|f| f.contains("priority_score")), "{fields:?}");
    }

    #[test]
    fn multiple_failures_are_all_reported() {
        let mut req = request();
        req.window = BurnWindow::new(16, 8);
        req.priority = -1.0;
        req.contact_handle = "  ".into();
        let fields = check(&req);
        assert!(fields.len() >= 3, "{fields:?}");
    }
}
