// Squad composition rules and validation.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::EngineError;
use crate::model::{AthleteIdx, ClubId, Position};
use crate::snapshot::Snapshot;

/// Slack allowed when comparing a squad's total price against the budget.
pub const PRICE_TOLERANCE: f64 = 1e-6;

/// Required count of athletes per position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PositionQuotas {
    #[serde(rename = "GK")]
    pub goalkeepers: usize,
    #[serde(rename = "DEF")]
    pub defenders: usize,
    #[serde(rename = "MID")]
    pub midfielders: usize,
    #[serde(rename = "FWD")]
    pub forwards: usize,
}

impl Default for PositionQuotas {
    fn default() -> Self {
        Self {
            goalkeepers: 2,
            defenders: 5,
            midfielders: 5,
            forwards: 3,
        }
    }
}

impl PositionQuotas {
    pub fn get(&self, pos: Position) -> usize {
        match pos {
            Position::Goalkeeper => self.goalkeepers,
            Position::Defender => self.defenders,
            Position::Midfielder => self.midfielders,
            Position::Forward => self.forwards,
        }
    }

    pub fn total(&self) -> usize {
        Position::ALL.iter().map(|p| self.get(*p)).sum()
    }
}

/// The fixed rules every squad must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SquadRules {
    pub squad_size: usize,
    /// Maximum athletes from one club.
    pub club_cap: usize,
    pub quotas: PositionQuotas,
}

impl Default for SquadRules {
    fn default() -> Self {
        Self {
            squad_size: 15,
            club_cap: 3,
            quotas: PositionQuotas::default(),
        }
    }
}

/// Sum of current prices of the given athletes.
pub fn squad_value(picks: &[AthleteIdx], snapshot: &Snapshot) -> f64 {
    picks
        .iter()
        .filter_map(|&idx| snapshot.get(idx))
        .map(|a| a.price)
        .sum()
}

/// Check that `picks` form a valid squad: the right size, no duplicates,
/// exact position quotas, at most `club_cap` per club and total price within
/// `budget`. All four constraints must hold at once.
pub fn validate_squad(
    picks: &[AthleteIdx],
    snapshot: &Snapshot,
    budget: f64,
    rules: &SquadRules,
) -> Result<(), EngineError> {
    if picks.len() != rules.squad_size {
        return Err(EngineError::invalid_squad(format!(
            "expected {} athletes, got {}",
            rules.squad_size,
            picks.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut by_position: HashMap<Position, usize> = HashMap::new();
    let mut by_club: HashMap<ClubId, usize> = HashMap::new();

    for &idx in picks {
        if !seen.insert(idx) {
            return Err(EngineError::invalid_squad(format!(
                "athlete index {} appears twice",
                idx.0
            )));
        }
        let athlete = snapshot.get(idx).ok_or_else(|| {
            EngineError::invalid_squad(format!("athlete index {} is not in the snapshot", idx.0))
        })?;
        *by_position.entry(athlete.position).or_default() += 1;
        *by_club.entry(athlete.club).or_default() += 1;
    }

    for pos in Position::ALL {
        let have = by_position.get(&pos).copied().unwrap_or(0);
        let need = rules.quotas.get(pos);
        if have != need {
            return Err(EngineError::invalid_squad(format!(
                "{pos}: expected {need}, got {have}"
            )));
        }
    }

    if let Some((club, count)) = by_club
        .iter()
        .filter(|(_, n)| **n > rules.club_cap)
        .min_by_key(|(club, _)| **club)
    {
        return Err(EngineError::invalid_squad(format!(
            "{count} athletes from {club}, cap is {}",
            rules.club_cap
        )));
    }

    let value = squad_value(picks, snapshot);
    if value > budget + PRICE_TOLERANCE {
        return Err(EngineError::invalid_squad(format!(
            "squad value {value:.1} exceeds budget {budget:.1}"
        )));
    }

    Ok(())
}
