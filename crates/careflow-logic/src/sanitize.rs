//! Numeric sanitization for values leaving the kernel.
//!
//! Degenerate arithmetic (zero denominators, pathological parameter
//! combinations) must never reach downstream sums: NaN becomes 0 and
//! infinities become a large finite bound with the same sign.

/// Finite stand-in for ±∞ in returned results.
pub const SANITIZED_MAX: f64 = 1e12;

/// Map NaN → 0 and ±∞ → ±[`SANITIZED_MAX`]. Finite values pass through.
pub fn sanitize(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value.is_infinite() {
        SANITIZED_MAX.copysign(value)
    } else {
        value
    }
}

/// Division that returns `fallback` when the denominator is zero or the
/// quotient is not finite.
pub fn safe_div(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if denominator == 0.0 {
        return fallback;
    }
    let q = numerator / denominator;
    if q.is_finite() {
        q
    } else {
        fallback
    }
}

/// Clamp into [0, 1], treating NaN as 0.
pub fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
