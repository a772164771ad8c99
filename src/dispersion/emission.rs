//! Emission rate calculation

/// Hectares per acre.
const HA_PER_ACRE: f64 = 0.404_686;

/// Calculate the sustained PM2.5 emission rate in g/s.
///
/// `fuel_factor_gs_ha` is the fuel table value: grams per hectare-minute
/// at reference intensity 1.0. A field burn consumes its fuel load as a
/// moving strip, so the sustained rate is the total load spread over the
/// burn duration rather than a per-area instantaneous flux:
///
/// `Q = hectares × factor × intensity / duration_minutes`
///
/// Guards: non-positive acreage or factor yields 0; duration is floored
/// at one hour.
pub fn emission_rate_gs(
    acres: f64,
    fuel_factor_gs_ha: f64,
    intensity_factor: f64,
    duration_hours: f64,
) -> f64 {
    if acres <= 0.0 || fuel_factor_gs_ha <= 0.0 || intensity_factor <= 0.0 {
        return 0.0;
    }
    let hectares = acres * HA_PER_ACRE;
    let duration_minutes = duration_hours.max(1.0) * 60.0;
    hectares * fuel_factor_gs_ha * intensity_factor / duration_minutes
}
