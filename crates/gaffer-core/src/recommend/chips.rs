// Chip timing analysis: wildcard, bench boost, triple captain and free hit.
//
// Each unconsumed chip gets an urgency for the current gameweek and a
// suggested timing searched over the upcoming fixture list.

use serde::Serialize;
use tracing::{debug, warn};

use super::{ChipThresholds, Urgency};
use crate::model::{Athlete, AthleteIdx, Availability, Chip, ChipState, ClubId, Squad};
use crate::scoring::{fixture_bonus, rank_captains, CaptainWeights};
use crate::snapshot::Snapshot;
use crate::stats;

/// Fraction of the squad price expected back as points by an efficient squad.
const POINTS_PER_PRICE_TARGET: f64 = 0.5;
const EFFICIENCY_REASON_BELOW: f64 = 0.8;
const UNAVAILABLE_REASON_ABOVE: usize = 2;
const DIFFICULT_REASON_ABOVE: usize = 5;
const STRONG_BENCH_POINTS: f64 = 12.0;
const FAVOURABLE_BENCH_FIXTURES: f64 = 0.5;

/// When to play a chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum ChipTiming {
    /// This gameweek.
    Now,
    /// A specific upcoming gameweek.
    Gameweek { gameweek: u32 },
    /// Nothing within the horizon stands out.
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChipRecommendation {
    pub chip: Chip,
    pub urgency: Urgency,
    pub score: f64,
    pub reasons: Vec<String>,
    pub timing: ChipTiming,
}

/// Squad members resolved against the snapshot; unknown indices are dropped.
fn members<'a>(indices: &[AthleteIdx], snapshot: &'a Snapshot) -> Vec<&'a Athlete> {
    indices.iter().filter_map(|&idx| snapshot.get(idx)).collect()
}

/// First gameweek after `gameweek`, within the horizon, that satisfies `pred`.
fn first_upcoming(gameweek: u32, horizon: u32, mut pred: impl FnMut(u32) -> bool) -> Option<u32> {
    (gameweek.saturating_add(1)..=gameweek.saturating_add(horizon)).find(|&gw| pred(gw))
}

fn timing_for(urgency: Urgency, upcoming: Option<u32>) -> ChipTiming {
    match (urgency, upcoming) {
        (Urgency::High, _) => ChipTiming::Now,
        (_, Some(gameweek)) => ChipTiming::Gameweek { gameweek },
        (_, None) => ChipTiming::Hold,
    }
}

// ---------------------------------------------------------------------------
// Wildcard
// ---------------------------------------------------------------------------

fn difficult_runs(squad: &[&Athlete], from: u32, snapshot: &Snapshot, t: &ChipThresholds) -> usize {
    squad
        .iter()
        .filter(|a| {
            snapshot
                .fixtures()
                .average_difficulty(a.club, from, t.difficult_run_span)
                .is_some_and(|avg| avg >= t.difficult_run)
        })
        .count()
}

/// `min(1, total EP / (total price * 0.5))`; 1 when the squad has no price.
fn squad_efficiency(squad: &[&Athlete]) -> f64 {
    let points: f64 = squad
        .iter()
        .map(|a| a.expected_points)
        .filter(|p| p.is_finite())
        .sum();
    let price: f64 = squad.iter().map(|a| a.price).filter(|p| p.is_finite()).sum();
    match stats::ratio(points, price * POINTS_PER_PRICE_TARGET) {
        Some(eff) => eff.min(1.0),
        None => {
            debug!("squad efficiency: no price to compare against, treating as efficient");
            1.0
        }
    }
}

fn wildcard(
    squad: &[&Athlete],
    gameweek: u32,
    snapshot: &Snapshot,
    t: &ChipThresholds,
) -> ChipRecommendation {
    let unavailable = squad
        .iter()
        .filter(|a| a.status != Availability::Available)
        .count();
    let difficult = difficult_runs(squad, gameweek, snapshot, t);
    let efficiency = squad_efficiency(squad);

    let score = 2.0 * unavailable as f64 + difficult as f64 + 5.0 * (1.0 - efficiency);
    let urgency = Urgency::from_score(score, t.wildcard_high, t.wildcard_medium);

    let mut reasons = Vec::new();
    if unavailable > UNAVAILABLE_REASON_ABOVE {
        reasons.push(format!("{unavailable} players unavailable"));
    }
    if difficult > DIFFICULT_REASON_ABOVE {
        reasons.push(format!("{difficult} players with difficult fixtures"));
    }
    if efficiency < EFFICIENCY_REASON_BELOW {
        reasons.push("Squad value could be better spent".to_string());
    }

    let eased = first_upcoming(gameweek, t.timing_horizon, |gw| {
        difficult_runs(squad, gw, snapshot, t) < difficult
    });

    ChipRecommendation {
        chip: Chip::Wildcard,
        urgency,
        score,
        reasons,
        timing: timing_for(urgency, eased),
    }
}

// ---------------------------------------------------------------------------
// Bench boost
// ---------------------------------------------------------------------------

fn bench_doubles(bench: &[&Athlete], gameweek: u32, snapshot: &Snapshot) -> usize {
    bench
        .iter()
        .filter(|a| snapshot.fixtures().is_double(a.club, gameweek))
        .count()
}

fn bench_boost(
    bench: &[&Athlete],
    gameweek: u32,
    snapshot: &Snapshot,
    t: &ChipThresholds,
) -> ChipRecommendation {
    let expected: f64 = bench
        .iter()
        .map(|a| a.expected_points)
        .filter(|p| p.is_finite())
        .sum();
    let doubles = bench_doubles(bench, gameweek, snapshot);
    let fixtures: f64 = bench
        .iter()
        .map(|a| fixture_bonus(a.club, gameweek, snapshot.fixtures()).value)
        .sum();

    let mut urgency = Urgency::from_score(expected, t.bench_high, t.bench_medium);
    let mut reasons = Vec::new();
    if doubles > t.bench_doubles {
        urgency = urgency.raised();
        reasons.push(format!("{doubles} bench players have a double gameweek"));
    }
    if expected > STRONG_BENCH_POINTS {
        reasons.push(format!("Strong bench with {expected:.1} expected points"));
    }
    if fixtures > FAVOURABLE_BENCH_FIXTURES {
        reasons.push("Bench players have favourable fixtures".to_string());
    }

    // The upcoming gameweek where the most bench athletes play twice.
    let mut best: Option<(u32, usize)> = None;
    for gw in gameweek.saturating_add(1)..=gameweek.saturating_add(t.timing_horizon) {
        let n = bench_doubles(bench, gw, snapshot);
        if n > 0 && best.map_or(true, |(_, m)| n > m) {
            best = Some((gw, n));
        }
    }

    ChipRecommendation {
        chip: Chip::BenchBoost,
        urgency,
        score: expected,
        reasons,
        timing: timing_for(urgency, best.map(|(gw, _)| gw)),
    }
}

// ---------------------------------------------------------------------------
// Triple captain
// ---------------------------------------------------------------------------

/// Low with the reason when no captain can be ranked.
fn triple_captain(
    squad: &Squad,
    gameweek: u32,
    snapshot: &Snapshot,
    t: &ChipThresholds,
    weights: &CaptainWeights,
) -> ChipRecommendation {
    let ranking = match rank_captains(squad, gameweek, snapshot, weights) {
        Ok(ranking) => ranking,
        Err(e) => {
            warn!("triple captain: {e}");
            return ChipRecommendation {
                chip: Chip::TripleCaptain,
                urgency: Urgency::Low,
                score: 0.0,
                reasons: vec![format!("No captain could be ranked: {e}")],
                timing: ChipTiming::Hold,
            };
        }
    };
    let captain = ranking.captain;
    let club: Option<ClubId> = snapshot
        .index_of(captain.athlete)
        .and_then(|idx| snapshot.get(idx))
        .map(|a| a.club);

    let mut urgency = Urgency::from_score(captain.score, t.triple_high, t.triple_medium);
    let mut reasons = captain.reasons.clone();
    if club.is_some_and(|c| snapshot.fixtures().is_double(c, gameweek)) {
        urgency = Urgency::High;
        reasons.push("Captain has a double gameweek".to_string());
    }

    let upcoming = club.and_then(|c| {
        first_upcoming(gameweek, t.timing_horizon, |gw| snapshot.fixtures().is_double(c, gw))
    });

    ChipRecommendation {
        chip: Chip::TripleCaptain,
        urgency,
        score: captain.score,
        reasons,
        timing: timing_for(urgency, upcoming),
    }
}

// ---------------------------------------------------------------------------
// Free hit
// ---------------------------------------------------------------------------

fn blanks(squad: &[&Athlete], gameweek: u32, snapshot: &Snapshot) -> usize {
    squad
        .iter()
        .filter(|a| snapshot.fixtures().is_blank(a.club, gameweek))
        .count()
}

fn free_hit(
    squad: &[&Athlete],
    gameweek: u32,
    snapshot: &Snapshot,
    t: &ChipThresholds,
) -> ChipRecommendation {
    let without_fixture = blanks(squad, gameweek, snapshot);
    let heavy_blank = without_fixture > t.free_hit_blanks;

    let urgency = if heavy_blank { Urgency::High } else { Urgency::Low };
    let mut reasons = Vec::new();
    if heavy_blank {
        reasons.push(format!("{without_fixture} players have no fixture"));
    }

    // Past the last scheduled gameweek every club looks blank.
    let last = snapshot.fixtures().last_gameweek().unwrap_or(gameweek);
    let upcoming = first_upcoming(gameweek, t.timing_horizon, |gw| {
        gw <= last && blanks(squad, gw, snapshot) > t.free_hit_blanks
    });

    ChipRecommendation {
        chip: Chip::FreeHit,
        urgency,
        score: without_fixture as f64,
        reasons,
        timing: timing_for(urgency, upcoming),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// One recommendation per unconsumed chip, in [`Chip::ALL`] order.
///
/// When a chip is already active this gameweek, every other chip is reported
/// Low and never timed for now. Squad indices missing from the snapshot are
/// left out of every analysis.
pub fn analyze_chips(
    squad: &Squad,
    gameweek: u32,
    chips: &ChipState,
    snapshot: &Snapshot,
    thresholds: &ChipThresholds,
    weights: &CaptainWeights,
) -> Vec<ChipRecommendation> {
    let everyone = members(squad.picks(), snapshot);
    let bench = members(squad.bench(), snapshot);

    let mut out = Vec::new();
    for chip in chips.available() {
        let mut rec = match chip {
            Chip::Wildcard => wildcard(&everyone, gameweek, snapshot, thresholds),
            Chip::BenchBoost => bench_boost(&bench, gameweek, snapshot, thresholds),
            Chip::TripleCaptain => triple_captain(squad, gameweek, snapshot, thresholds, weights),
            Chip::FreeHit => free_hit(&everyone, gameweek, snapshot, thresholds),
        };

        if let Some(active) = chips.active.filter(|&a| a != chip) {
            rec.urgency = Urgency::Low;
            rec.reasons.push(format!("{active} is already active this gameweek"));
            if rec.timing == ChipTiming::Now {
                rec.timing = ChipTiming::Hold;
            }
        }

        debug!(
            "{}: {} (score {:.1}, {:?})",
            rec.chip,
            rec.urgency.label(),
            rec.score,
            rec.timing
        );
        out.push(rec);
    }
    out
}
