//! Survival fractions and integer population updates.
//!
//! Every population in the model is an integer count that is only ever
//! multiplied by a survival fraction in `[0, 1]` and floored, or multiplied
//! by a non-negative growth factor and floored. The helpers here are the only
//! place counts cross into floating point and back.
//!
//! A fraction that is negative or NaN cannot come from a valid parameter set,
//! but kill terms are products of several externally supplied rates. Such a
//! fraction is clamped to zero and logged; it never aborts an update.

use tracing::warn;

/// Survival over `exposure_days` under a constant kill `rate` per day.
///
/// Returns `exp(-rate * exposure_days)` clamped to `[0, 1]`. A NaN or
/// non-positive hazard yields full survival; an infinite one yields none.
pub fn exposure_survival(rate: f64, exposure_days: f64) -> f64 {
    let hazard = rate * exposure_days;
    if hazard.is_nan() || hazard <= 0.0 {
        return 1.0;
    }
    (-hazard).exp().clamp(0.0, 1.0)
}

/// Clamp a probability to `[0, 1]`, mapping NaN to zero.
pub fn probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Surviving part of `count` under `survival`: `floor(count * survival)`.
///
/// A survival at or above one leaves the count untouched, so counts beyond
/// the exact range of `f64` are never perturbed by a no-op kill. Negative or
/// NaN survival is clamped to zero and logged.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn surviving(count: u64, survival: f64, population: &'static str) -> u64 {
    if count == 0 {
        return 0;
    }
    if survival.is_nan() || survival < 0.0 {
        warn!(
            population,
            count,
            survival,
            "negative survival fraction clamped to zero"
        );
        return 0;
    }
    if survival >= 1.0 {
        return count;
    }
    let survivors = (count as f64 * survival).floor();
    (survivors as u64).min(count)
}

/// Scaled `count`: `floor(count * factor)`, saturating at `u64::MAX`.
///
/// Negative or NaN factors are clamped to zero and logged.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scaled(count: u64, factor: f64, population: &'static str) -> u64 {
    if count == 0 {
        return 0;
    }
    if factor.is_nan() || factor < 0.0 {
        warn!(
            population,
            count,
            factor,
            "negative growth factor clamped to zero"
        );
        return 0;
    }
    // `as` saturates for values beyond u64::MAX.
    (count as f64 * factor).floor() as u64
}
