//! Decimal precision helpers.
//!
//! Multipliers are shown and settled at two decimal places. Rounding and
//! flooring go through these helpers so every component agrees on the grid.

/// Default number of decimal places for multipliers.
pub const MULTIPLIER_PLACES: u32 = 2;

#[inline]
fn scale(places: u32) -> f64 {
    10f64.powi(places as i32)
}

/// Round half away from zero to `places` decimals.
#[inline]
pub fn round_to(value: f64, places: u32) -> f64 {
    let s = scale(places);
    (value * s).round() / s
}

/// Round toward negative infinity to `places` decimals.
///
/// A tiny epsilon absorbs representation error so `2.0000000000000004`
/// floors to `2.00` and `1.9999999999999998` does too.
#[inline]
pub fn floor_to(value: f64, places: u32) -> f64 {
    let s = scale(places);
    ((value * s) + 1e-9).floor() / s
}

/// Multiplier as submarine depth in metres (1.00x = 100 m).
#[inline]
pub fn depth_metres(multiplier: f64) -> u32 {
    (multiplier * 100.0 + 1e-9).floor().max(0.0) as u32
}

/// Depth in metres as a multiplier.
#[inline]
pub fn depth_to_multiplier(depth: u32) -> f64 {
    depth as f64 / 100.0
}
