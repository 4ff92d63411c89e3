//! Miscellaneous array helpers.

use ndarray::{Array, ArrayBase, Data, Dimension};

/// Largest finite value in an array, or 0.0 for an empty array.
pub fn max_value<S, D>(data: &ArrayBase<S, D>) -> f64
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    data.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max)
}

/// Scale an array into the 8-bit range.
///
/// Every value is multiplied by `255 / max(1, max_value)`, floored and cast to
/// `u8`. The `max(1, ..)` floor keeps all-zero (or sub-unit) data from being
/// divided by zero or blown up, so an all-zero input produces all-zero output.
/// Negative values clamp to 0.
///
/// Applying this to data that already spans `[0, 255]` in whole numbers is the
/// identity.
pub fn normalize_to_u8<S, D>(data: &ArrayBase<S, D>) -> Array<u8, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let max = max_value(data).max(1.0);
    // multiply before dividing so the maximum maps to exactly 255
    data.mapv(|v| (v * 255.0 / max).floor().clamp(0.0, 255.0) as u8)
}
