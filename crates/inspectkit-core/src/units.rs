//! Unit conversion utilities
//!
//! Positions are tracked in motor steps; operators and configuration speak
//! millimetres. Focus sweeps iterate in whole microns so repeated addition of
//! a fractional step never drifts.

/// Microns per millimetre
pub const MICRONS_PER_MM: f64 = 1000.0;

/// Convert millimetres to the nearest whole number of steps
///
/// * `mm` - Distance in millimetres
/// * `step_distance_mm` - Carriage travel per motor step
pub fn mm_to_steps(mm: f64, step_distance_mm: f64) -> i64 {
    debug_assert!(step_distance_mm > 0.0, "step distance must be positive");
    (mm / step_distance_mm).round() as i64
}

/// Largest logical position magnitude, in steps, a move may reach
pub const MAX_POSITION_STEPS: i64 = i32::MAX as i64;

/// Convert millimetres to steps, or `None` when `mm` is not finite or the
/// result lies beyond [`MAX_POSITION_STEPS`]
pub fn checked_mm_to_steps(mm: f64, step_distance_mm: f64) -> Option<i64> {
    let steps = (mm / step_distance_mm).round();
    if steps.is_finite() && steps.abs() <= MAX_POSITION_STEPS as f64 {
        Some(steps as i64)
    } else {
        None
    }
}

/// Convert steps to millimetres
pub fn steps_to_mm(steps: i64, step_distance_mm: f64) -> f64 {
    steps as f64 * step_distance_mm
}

/// Convert millimetres to the nearest whole micron
pub fn mm_to_microns(mm: f64) -> i64 {
    (mm * MICRONS_PER_MM).round() as i64
}

/// Convert microns to millimetres
pub fn microns_to_mm(microns: i64) -> f64 {
    microns as f64 / MICRONS_PER_MM
}
