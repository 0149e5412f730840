// Recommendation engine: transfer tiers and chip timing.

pub mod chips;
pub mod transfers;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Urgency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    /// High above `high`, Medium above `medium`, else Low.
    pub fn from_score(score: f64, high: f64, medium: f64) -> Self {
        if score > high {
            Urgency::High
        } else if score > medium {
            Urgency::Medium
        } else {
            Urgency::Low
        }
    }

    /// One level up, saturating at High.
    pub fn raised(self) -> Self {
        match self {
            Urgency::Low => Urgency::Medium,
            Urgency::Medium | Urgency::High => Urgency::High,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Low => "Low",
            Urgency::Medium => "Medium",
            Urgency::High => "High",
        }
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Cut-offs used by [`transfers::classify_transfers`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransferThresholds {
    /// Price change below this marks a squad athlete as falling.
    pub price_drop: f64,
    pub price_rise: f64,
    /// Gameweeks in the fixture run window.
    pub fixture_run_span: u32,
    pub excellent_run: f64,
    pub good_run: f64,
    pub value_expected_points: f64,
    pub hot_form: f64,
    pub value_min_score: u32,
    pub value_limit: usize,
    pub keeper_expected_points: f64,
    pub points_per_price: f64,
    pub keeper_min_score: u32,
    pub keeper_limit: usize,
}

impl Default for TransferThresholds {
    fn default() -> Self {
        Self {
            price_drop: -0.2,
            price_rise: 0.1,
            fixture_run_span: 6,
            excellent_run: 0.3,
            good_run: 0.15,
            value_expected_points: 7.0,
            hot_form: 6.0,
            value_min_score: 2,
            value_limit: 10,
            keeper_expected_points: 8.0,
            points_per_price: 1.5,
            keeper_min_score: 3,
            keeper_limit: 5,
        }
    }
}

/// Cut-offs used by [`chips::analyze_chips`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChipThresholds {
    pub wildcard_high: f64,
    pub wildcard_medium: f64,
    /// Average difficulty at or above which a fixture run counts as hard.
    pub difficult_run: f64,
    pub difficult_run_span: u32,
    pub bench_high: f64,
    pub bench_medium: f64,
    /// Bench athletes with a double gameweek needed to raise urgency.
    pub bench_doubles: usize,
    pub triple_high: f64,
    pub triple_medium: f64,
    /// Squad athletes without a fixture needed for a free hit.
    pub free_hit_blanks: usize,
    /// Gameweeks searched when suggesting timing.
    pub timing_horizon: u32,
}

impl Default for ChipThresholds {
    fn default() -> Self {
        Self {
            wildcard_high: 6.0,
            wildcard_medium: 3.0,
            difficult_run: 3.5,
            difficult_run_span: 5,
            bench_high: 15.0,
            bench_medium: 10.0,
            bench_doubles: 2,
            triple_high: 8.0,
            triple_medium: 5.0,
            free_hit_blanks: 6,
            timing_horizon: 8,
        }
    }
}

/// All recommendation thresholds, as loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AdvisorThresholds {
    pub transfers: TransferThresholds,
    pub chips: ChipThresholds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_bands_are_exclusive() {
        assert_eq!(Urgency::from_score(6.0, 6.0, 3.0), Urgency::Medium);
        assert_eq!(Urgency::from_score(6.1, 6.0, 3.0), Urgency::High);
        assert_eq!(Urgency::from_score(3.0, 6.0, 3.0), Urgency::Low);
    }

    #[test]
    fn raising_saturates() {
        assert_eq!(Urgency::Low.raised(), Urgency::Medium);
        assert_eq!(Urgency::High.raised(), Urgency::High);
        assert_eq!(Urgency::Medium.label(), "Medium");
    }
}
