// Recent-form trend factor.

use super::Factor;
use crate::error::Degradation;
use crate::stats;

/// Number of most recent gameweeks considered.
pub const FORM_WINDOW: usize = 5;
/// Fewer scores than this give a neutral trend.
pub const MIN_FORM_SAMPLES: usize = 3;
pub const MAX_FORM_TREND: f64 = 0.2;

const SLOPE_WEIGHT: f64 = 0.7;
const RECENCY_WEIGHT: f64 = 0.3;
const SCALE: f64 = 0.1;

/// Trend of the last [`FORM_WINDOW`] scores (oldest first), in
/// `[-MAX_FORM_TREND, MAX_FORM_TREND]`.
///
/// Combines the least-squares slope with how far a recency-weighted mean sits
/// above the plain mean. Non-finite scores are ignored.
pub fn form_trend(recent_points: &[f64]) -> Factor {
    let finite: Vec<f64> = recent_points.iter().copied().filter(|p| p.is_finite()).collect();
    let window = &finite[finite.len().saturating_sub(FORM_WINDOW)..];

    if window.len() < MIN_FORM_SAMPLES {
        return Factor::neutral(Degradation::guard(
            "form_trend",
            format!("{} recent scores, need {MIN_FORM_SAMPLES}", window.len()),
        ));
    }

    let (Some(slope), Some(weighted), Some(mean)) = (
        stats::slope(window),
        stats::recency_weighted_mean(window),
        stats::mean(window),
    ) else {
        return Factor::neutral(Degradation::guard("form_trend", "degenerate score sequence"));
    };

    let combined = SLOPE_WEIGHT * slope + RECENCY_WEIGHT * (weighted - mean);
    Factor::value((combined * SCALE).clamp(-MAX_FORM_TREND, MAX_FORM_TREND))
}
