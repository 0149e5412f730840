// Captaincy scoring engine.
//
// score = EP * position multiplier
//            * (1 + fixture bonus + form trend + home bonus + history bonus)
//
// Every factor is computed independently and falls back to a neutral value
// with a recorded `Degradation` when its inputs are missing.

pub mod form;
pub mod history;

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Degradation, EngineError};
use crate::model::{Appearance, Athlete, AthleteId, AthleteIdx, ClubId, Position, Squad};
use crate::snapshot::{FixtureIndex, Snapshot};

pub use form::form_trend;
pub use history::{history_bonus, HistoryContext};

pub const MAX_FIXTURE_BONUS: f64 = 0.3;
const FIXTURE_BONUS_PER_STEP: f64 = 0.06;
const NUM_ALTERNATES: usize = 3;

// ---------------------------------------------------------------------------
// Factor
// ---------------------------------------------------------------------------

/// One additive scoring component, with the reason it was neutralised if so.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    pub value: f64,
    pub degradation: Option<Degradation>,
}

impl Factor {
    pub fn value(value: f64) -> Self {
        Self {
            value,
            degradation: None,
        }
    }

    pub fn neutral(degradation: Degradation) -> Self {
        Self {
            value: 0.0,
            degradation: Some(degradation),
        }
    }
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Tunable constants of the captain score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptainWeights {
    #[serde(rename = "GK")]
    pub goalkeeper: f64,
    #[serde(rename = "DEF")]
    pub defender: f64,
    #[serde(rename = "MID")]
    pub midfielder: f64,
    #[serde(rename = "FWD")]
    pub forward: f64,
    pub home_bonus: f64,
    /// Rounds per season, used for the two-season history lookback.
    pub season_length: u32,
}

impl Default for CaptainWeights {
    fn default() -> Self {
        Self {
            goalkeeper: 0.3,
            defender: 0.9,
            midfielder: 1.1,
            forward: 1.2,
            home_bonus: 0.1,
            season_length: 38,
        }
    }
}

impl CaptainWeights {
    pub fn multiplier(&self, position: Position) -> f64 {
        match position {
            Position::Goalkeeper => self.goalkeeper,
            Position::Defender => self.defender,
            Position::Midfielder => self.midfielder,
            Position::Forward => self.forward,
        }
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// A captaincy score with its factor breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptainScore {
    pub athlete: AthleteId,
    pub score: f64,
    pub expected_points: f64,
    pub position_multiplier: f64,
    pub fixture_bonus: f64,
    pub form_trend: f64,
    pub home_bonus: f64,
    pub history_bonus: f64,
    pub reasons: Vec<String>,
    /// Factors that fell back to their neutral value.
    pub degradations: Vec<Degradation>,
}

impl CaptainScore {
    /// Zero score for an athlete that could not be scored at all.
    fn degraded(athlete: AthleteId, degradation: Degradation) -> Self {
        Self {
            athlete,
            score: 0.0,
            expected_points: 0.0,
            position_multiplier: 0.0,
            fixture_bonus: 0.0,
            form_trend: 0.0,
            home_bonus: 0.0,
            history_bonus: 0.0,
            reasons: Vec::new(),
            degradations: vec![degradation],
        }
    }
}

/// Squad members ordered by captain score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptainRanking {
    pub captain: CaptainScore,
    pub vice_captain: CaptainScore,
    /// Up to three next-best choices.
    pub alternates: Vec<CaptainScore>,
}

/// Fixture bonus in `[0, MAX_FIXTURE_BONUS]` from the club's first fixture of
/// the gameweek: `(6 - difficulty) * 0.06`.
pub fn fixture_bonus(club: ClubId, gameweek: u32, fixtures: &FixtureIndex) -> Factor {
    match fixtures.for_club(club, gameweek).first() {
        Some(cf) => {
            let steps = 6.0 - f64::from(cf.difficulty);
            Factor::value((steps * FIXTURE_BONUS_PER_STEP).clamp(0.0, MAX_FIXTURE_BONUS))
        }
        None => Factor::neutral(Degradation::missing(
            "fixture_bonus",
            format!("{club} has no fixture in gameweek {gameweek}"),
        )),
    }
}

/// Score one athlete as captain for `gameweek`.
///
/// Fails with `MissingData` only when the athlete has no usable expected
/// points; every other gap degrades a single factor.
pub fn score_captain(
    athlete: &Athlete,
    gameweek: u32,
    fixtures: &FixtureIndex,
    history: &[Appearance],
    weights: &CaptainWeights,
) -> Result<CaptainScore, EngineError> {
    let ep = athlete.expected_points;
    if !ep.is_finite() {
        return Err(EngineError::MissingData {
            what: format!("expected points for {}", athlete.name),
        });
    }

    let mut degradations = Vec::new();
    let mut take = |factor: Factor| {
        if let Some(d) = factor.degradation {
            degradations.push(d);
        }
        factor.value
    };

    let sides = fixtures.for_club(athlete.club, gameweek);
    let fixture = take(fixture_bonus(athlete.club, gameweek, fixtures));
    let home = if sides.iter().any(|cf| cf.is_home) {
        weights.home_bonus
    } else {
        0.0
    };
    let trend = take(form_trend(&athlete.recent_points));
    let record = match sides.first() {
        Some(cf) => take(history_bonus(
            history,
            &HistoryContext {
                opponent: cf.opponent,
                is_home: cf.is_home,
                gameweek,
                season_length: weights.season_length,
            },
        )),
        // The missing fixture is already recorded by the fixture bonus.
        None => 0.0,
    };

    let multiplier = weights.multiplier(athlete.position);
    let score = ep * multiplier * (1.0 + fixture + trend + home + record);

    let mut reasons = Vec::new();
    if ep > 8.0 {
        reasons.push(format!("High expected points ({ep:.1})"));
    }
    if home > 0.0 {
        reasons.push("Playing at home".to_string());
    }
    if fixture > 0.15 {
        reasons.push("Favourable fixture".to_string());
    }
    if trend > 0.05 {
        reasons.push("Rising form".to_string());
    }
    if record > 0.05 {
        reasons.push("Strong record against this opponent".to_string());
    }
    if athlete.position.is_attacking() {
        reasons.push(format!("Attacking returns potential ({})", athlete.position));
    }

    for d in &degradations {
        debug!("{}: {} neutralised ({d:?})", athlete.name, d.factor());
    }

    Ok(CaptainScore {
        athlete: athlete.id,
        score,
        expected_points: ep,
        position_multiplier: multiplier,
        fixture_bonus: fixture,
        form_trend: trend,
        home_bonus: home,
        history_bonus: record,
        reasons,
        degradations,
    })
}

/// Rank every squad member as a captain candidate. Indices missing from the
/// snapshot are skipped.
pub fn rank_captains(
    squad: &Squad,
    gameweek: u32,
    snapshot: &Snapshot,
    weights: &CaptainWeights,
) -> Result<CaptainRanking, EngineError> {
    let members: Vec<(AthleteIdx, &Athlete)> = squad
        .picks()
        .iter()
        .filter_map(|&idx| match snapshot.get(idx) {
            Some(athlete) => Some((idx, athlete)),
            None => {
                warn!("captain ranking: athlete index {} is not in the snapshot; skipped", idx.0);
                None
            }
        })
        .collect();
    if members.len() < 2 {
        return Err(EngineError::invalid_squad(format!(
            "need at least 2 known athletes to pick a captain and vice, got {}",
            members.len()
        )));
    }

    let mut scores: Vec<CaptainScore> = members
        .par_iter()
        .map(|&(idx, athlete)| {
            let history = snapshot.history(idx);
            match score_captain(athlete, gameweek, snapshot.fixtures(), history, weights) {
                Ok(score) => Ok(score),
                Err(EngineError::MissingData { what }) => {
                    debug!("{} scored as 0: missing {what}", athlete.name);
                    Ok(CaptainScore::degraded(
                        athlete.id,
                        Degradation::missing("expected_points", what),
                    ))
                }
                Err(e) => Err(e),
            }
        })
        .collect::<Result<_, _>>()?;

    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.athlete.cmp(&b.athlete))
    });

    let mut ranked = scores.into_iter();
    let (Some(captain), Some(vice_captain)) = (ranked.next(), ranked.next()) else {
        return Err(EngineError::invalid_squad("fewer than 2 scored athletes"));
    };
    let alternates: Vec<CaptainScore> = ranked.take(NUM_ALTERNATES).collect();

    debug!(
        "captain {} ({:.2}), vice {} ({:.2})",
        captain.athlete, captain.score, vice_captain.athlete, vice_captain.score
    );

    Ok(CaptainRanking {
        captain,
        vice_captain,
        alternates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Availability, Fixture};

    fn athlete(id: u32, position: Position, club: u32, ep: f64) -> Athlete {
        Athlete {
            id: AthleteId(id),
            name: format!("A{id}"),
            position,
            club: ClubId(club),
            price: 8.0,
            status: Availability::Available,
            expected_points: ep,
            recent_points: vec![],
            price_change: 0.0,
            form: 0.0,
            set_piece_taker: false,
        }
    }

    fn fixtures() -> FixtureIndex {
        FixtureIndex::new(vec![Fixture {
            id: 1,
            gameweek: 10,
            home: ClubId(1),
            away: ClubId(2),
            home_difficulty: 2,
            away_difficulty: 4,
            kickoff: None,
        }])
    }

    #[test]
    fn home_forward_with_easy_fixture() {
        let a = athlete(1, Position::Forward, 1, 10.0);
        let s = score_captain(&a, 10, &fixtures(), &[], &CaptainWeights::default()).unwrap();

        // fixture (6 - 2) * 0.06 = 0.24, home 0.1, no form, no history
        assert!((s.fixture_bonus - 0.24).abs() < 1e-9);
        assert!((s.score - 10.0 * 1.2 * 1.34).abs() < 1e-9);
        assert_eq!(
            s.reasons,
            vec![
                "High expected points (10.0)",
                "Playing at home",
                "Favourable fixture",
                "Attacking returns potential (FWD)",
            ]
        );
        // Short form and empty history are both recorded.
        assert_eq!(s.degradations.len(), 2);
    }

    #[test]
    fn blank_gameweek_neutralises_fixture_factors() {
        let a = athlete(1, Position::Defender, 9, 5.0);
        let s = score_captain(&a, 10, &fixtures(), &[], &CaptainWeights::default()).unwrap();
        assert_eq!(s.fixture_bonus, 0.0);
        assert_eq!(s.home_bonus, 0.0);
        assert!((s.score - 5.0 * 0.9).abs() < 1e-9);
        assert!(s
            .degradations
            .iter()
            .any(|d| d.factor() == "fixture_bonus"));
    }

    #[test]
    fn non_finite_expected_points_is_missing_data() {
        let a = athlete(1, Position::Midfielder, 1, f64::NAN);
        let err = score_captain(&a, 10, &fixtures(), &[], &CaptainWeights::default()).unwrap_err();
        assert!(matches!(err, EngineError::MissingData { .. }));
    }

    #[test]
    fn ranking_orders_and_breaks_ties_by_id() {
        let mut snap = Snapshot::new(vec![], fixtures().fixtures().to_vec());
        let picks = vec![
            snap.add_athlete(athlete(5, Position::Midfielder, 2, 6.0), vec![]),
            snap.add_athlete(athlete(3, Position::Midfielder, 2, 6.0), vec![]),
            snap.add_athlete(athlete(9, Position::Forward, 1, 9.0), vec![]),
            snap.add_athlete(athlete(4, Position::Goalkeeper, 1, f64::NAN), vec![]),
        ];
        let ranking =
            rank_captains(&Squad::new(picks), 10, &snap, &CaptainWeights::default()).unwrap();

        assert_eq!(ranking.captain.athlete, AthleteId(9));
        assert_eq!(ranking.vice_captain.athlete, AthleteId(3));
        let rest: Vec<AthleteId> = ranking.alternates.iter().map(|s| s.athlete).collect();
        assert_eq!(rest, vec![AthleteId(5), AthleteId(4)]);
        assert_eq!(ranking.alternates[1].score, 0.0);
    }

    #[test]
    fn ranking_needs_two_athletes() {
        let mut snap = Snapshot::new(vec![], vec![]);
        let only = snap.add_athlete(athlete(1, Position::Forward, 1, 5.0), vec![]);
        let err = rank_captains(&Squad::new(vec![only]), 10, &snap, &CaptainWeights::default());
        assert!(matches!(err, Err(EngineError::InvalidSquad { .. })));
    }

    #[test]
    fn unknown_members_are_skipped() {
        let mut snap = Snapshot::new(vec![], fixtures().fixtures().to_vec());
        let striker = snap.add_athlete(athlete(1, Position::Forward, 1, 9.0), vec![]);
        let winger = snap.add_athlete(athlete(2, Position::Midfielder, 2, 5.0), vec![]);
        let weights = CaptainWeights::default();

        let squad = Squad::new(vec![striker, AthleteIdx(99), winger]);
        let ranking = rank_captains(&squad, 10, &snap, &weights).unwrap();
        assert_eq!(ranking.captain.athlete, AthleteId(1));
        assert_eq!(ranking.vice_captain.athlete, AthleteId(2));
        assert!(ranking.alternates.is_empty());

        // Only one member resolves, so no vice can be named.
        let squad = Squad::new(vec![striker, AthleteIdx(99)]);
        let err = rank_captains(&squad, 10, &snap, &weights);
        assert!(matches!(err, Err(EngineError::InvalidSquad { .. })));
    }
}
