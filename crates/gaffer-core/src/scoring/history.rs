// Head-to-head history factor: how an athlete has scored against the
// upcoming opponent.

use super::Factor;
use crate::error::Degradation;
use crate::model::{Appearance, ClubId};
use crate::stats;

pub const MAX_HISTORY_BONUS: f64 = 0.15;

const BASE_WEIGHT: f64 = 0.10;
const VENUE_WEIGHT: f64 = 0.7;
const OVERALL_WEIGHT: f64 = 0.3;
/// Points per meeting that earn the full base bonus.
const POINTS_FOR_FULL_BASE: f64 = 10.0;
const CONSISTENCY_BONUS: f64 = 0.025;
const CONSISTENCY_MIN_MEAN: f64 = 5.0;
const CONSISTENCY_MAX_CV: f64 = 0.5;
const RECENCY_BONUS: f64 = 0.025;
const RECENCY_MIN_MEAN: f64 = 6.0;

/// The upcoming meeting the bonus is computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryContext {
    pub opponent: ClubId,
    pub is_home: bool,
    /// Round number of the upcoming gameweek.
    pub gameweek: u32,
    /// Rounds per season; the lookback spans two seasons.
    pub season_length: u32,
}

impl HistoryContext {
    fn window(&self) -> (i64, i64) {
        let upcoming = i64::from(self.gameweek);
        (upcoming - 2 * i64::from(self.season_length), upcoming)
    }
}

/// Bonus in `[0, MAX_HISTORY_BONUS]` from past meetings with the opponent.
///
/// The base rewards average points, weighting meetings at the same venue
/// 0.7 and all meetings 0.3. Consistent returns and strong recent meetings
/// each add a small extra.
pub fn history_bonus(history: &[Appearance], ctx: &HistoryContext) -> Factor {
    let (from, until) = ctx.window();
    let meetings: Vec<&Appearance> = history
        .iter()
        .filter(|a| {
            let round = i64::from(a.round);
            a.opponent == ctx.opponent && round >= from && round < until && a.points.is_finite()
        })
        .collect();

    if meetings.is_empty() {
        return Factor::neutral(Degradation::missing(
            "history_bonus",
            format!("no meetings with {} in the last two seasons", ctx.opponent),
        ));
    }

    let all: Vec<f64> = meetings.iter().map(|a| a.points).collect();
    let same_venue: Vec<f64> = meetings
        .iter()
        .filter(|a| a.was_home == ctx.is_home)
        .map(|a| a.points)
        .collect();

    let Some(overall) = stats::mean(&all) else {
        return Factor::neutral(Degradation::guard("history_bonus", "empty meeting average"));
    };
    let venue = stats::mean(&same_venue).unwrap_or(overall);
    let blended = VENUE_WEIGHT * venue + OVERALL_WEIGHT * overall;
    let mut bonus = (blended / POINTS_FOR_FULL_BASE).clamp(0.0, 1.0) * BASE_WEIGHT;

    if all.len() >= 2 && overall >= CONSISTENCY_MIN_MEAN {
        let cv = stats::std_dev(&all).and_then(|sd| stats::ratio(sd, overall));
        if cv.is_some_and(|cv| cv < CONSISTENCY_MAX_CV) {
            bonus += CONSISTENCY_BONUS;
        }
    }

    // Most recent meeting first.
    let mut by_recency = meetings.clone();
    by_recency.sort_by(|a, b| b.round.cmp(&a.round));
    let recent: Vec<f64> = by_recency.iter().map(|a| a.points).collect();
    if stats::inverse_rank_weighted_mean(&recent).is_some_and(|m| m >= RECENCY_MIN_MEAN) {
        bonus += RECENCY_BONUS;
    }

    Factor::value(bonus.clamp(0.0, MAX_HISTORY_BONUS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting(round: i32, opponent: u32, was_home: bool, points: f64) -> Appearance {
        Appearance {
            round,
            opponent: ClubId(opponent),
            was_home,
            points,
        }
    }

    fn ctx() -> HistoryContext {
        HistoryContext {
            opponent: ClubId(7),
            is_home: true,
            gameweek: 20,
            season_length: 38,
        }
    }

    #[test]
    fn no_meetings_is_zero() {
        let f = history_bonus(&[meeting(5, 3, true, 12.0)], &ctx());
        assert_eq!(f.value, 0.0);
        assert!(matches!(f.degradation, Some(Degradation::MissingData { .. })));
    }

    #[test]
    fn meetings_outside_lookback_are_ignored() {
        // 20 - 76 = -56 is the earliest round that counts; round 20 itself is
        // the upcoming match.
        let history = [meeting(-57, 7, true, 15.0), meeting(20, 7, true, 15.0)];
        assert_eq!(history_bonus(&history, &ctx()).value, 0.0);
    }

    #[test]
    fn strong_consistent_record_hits_the_cap() {
        let history = [
            meeting(-30, 7, true, 10.0),
            meeting(-10, 7, false, 9.0),
            meeting(3, 7, true, 11.0),
        ];
        // base: venue 10.5, overall 10 -> blended 10.35 -> 0.10
        // consistency: mean 10, small spread -> +0.025
        // recency: (11 + 9/2 + 10/3) / (11/6) > 6 -> +0.025
        let f = history_bonus(&history, &ctx());
        assert!((f.value - MAX_HISTORY_BONUS).abs() < 1e-9);
        assert!(f.degradation.is_none());
    }

    #[test]
    fn erratic_record_misses_the_consistency_extra() {
        let history = [
            meeting(-30, 7, true, 14.0),
            meeting(-10, 7, true, 2.0),
            meeting(3, 7, true, 8.0),
        ];
        // base: mean 8 at home and overall -> 0.08
        // consistency: mean 8 >= 5 but sd 4.9 gives cv 0.61 -> no extra
        // recency: (8 + 2/2 + 14/3) / (11/6) = 7.45 -> +0.025
        let f = history_bonus(&history, &ctx());
        assert!((f.value - 0.105).abs() < 1e-9);
        assert!(f.degradation.is_none());
    }

    #[test]
    fn venue_weighting_without_same_venue_meetings() {
        // Only away meetings: the venue mean falls back to the overall mean.
        let history = [meeting(10, 7, false, 4.0)];
        let f = history_bonus(&history, &ctx());
        assert!((f.value - 0.04).abs() < 1e-9);
    }
}
