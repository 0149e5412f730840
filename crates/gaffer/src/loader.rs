// Snapshot assembly from a JSON file or the SQLite data store.
//
// Both sources produce `SnapshotData`, which may be overlaid with projections
// and is then frozen into the engines' `Snapshot`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use gaffer_core::{
    Appearance, Athlete, AthleteId, AthleteIdx, ChipState, Club, Fixture, Snapshot, Squad,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::db::Database;

/// An athlete with its appearance history, as stored in snapshot files.
#[derive(Debug, Clone, Deserialize)]
pub struct AthleteRecord {
    #[serde(flatten)]
    pub athlete: Athlete,
    #[serde(default)]
    pub history: Vec<Appearance>,
}

/// Raw snapshot contents before indexing.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotData {
    /// Gameweek being planned. Falls back to the command line or the data
    /// store when absent.
    #[serde(default)]
    pub gameweek: Option<u32>,
    /// Total budget; the league budget applies when absent.
    #[serde(default)]
    pub budget: Option<f64>,
    pub clubs: Vec<Club>,
    pub fixtures: Vec<Fixture>,
    pub athletes: Vec<AthleteRecord>,
    /// Current squad, starters first.
    pub squad: Vec<AthleteId>,
    #[serde(default)]
    pub chips: ChipState,
}

/// A frozen snapshot ready for the engines.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub snapshot: Snapshot,
    pub squad: Squad,
    pub chips: ChipState,
    pub gameweek: u32,
    pub budget: Option<f64>,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

pub fn from_json_str(text: &str) -> Result<SnapshotData> {
    serde_json::from_str(text).context("failed to parse snapshot JSON")
}

pub fn from_json_file(path: &Path) -> Result<SnapshotData> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot file {}", path.display()))?;
    from_json_str(&text).with_context(|| format!("in {}", path.display()))
}

/// Read everything the engines need from the data store. The planned
/// gameweek is the first with an unfinished fixture, else the one after the
/// latest picks. Chip usage is not recorded in the store.
pub fn from_database(db: &Database) -> Result<SnapshotData> {
    let clubs = db.clubs()?;
    let fixtures = db.fixtures()?;
    let athletes = db
        .athletes()?
        .into_iter()
        .map(|(athlete, history)| AthleteRecord { athlete, history })
        .collect();

    let picks = db.latest_picks()?;
    let gameweek = match db.next_gameweek()? {
        Some(gw) => Some(gw),
        None => picks.as_ref().map(|p| p.gameweek + 1),
    };
    let squad = picks.map(|p| p.athletes).unwrap_or_default();

    Ok(SnapshotData {
        gameweek,
        budget: None,
        clubs,
        fixtures,
        athletes,
        squad,
        chips: ChipState::default(),
    })
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

impl SnapshotData {
    /// Replace expected points with projected values. Returns how many
    /// athletes were updated.
    pub fn apply_projections(&mut self, projections: &HashMap<AthleteId, f64>) -> usize {
        let mut applied = 0;
        for record in &mut self.athletes {
            if let Some(&ep) = projections.get(&record.athlete.id) {
                record.athlete.expected_points = ep;
                applied += 1;
            }
        }
        debug!("applied {applied} of {} projections", projections.len());
        applied
    }

    /// Index everything into a `Snapshot`. `gameweek` overrides the stored
    /// gameweek.
    pub fn freeze(self, gameweek: Option<u32>) -> Result<LoadedSnapshot> {
        let Some(gameweek) = gameweek.or(self.gameweek) else {
            bail!("no gameweek given and none could be inferred from the data");
        };

        let mut snapshot = Snapshot::new(self.clubs, self.fixtures);
        for record in self.athletes {
            snapshot.add_athlete(record.athlete, record.history);
        }

        let mut picks = Vec::with_capacity(self.squad.len());
        for id in &self.squad {
            let Some(idx) = snapshot.index_of(*id) else {
                bail!("squad athlete {id} is not in the snapshot");
            };
            picks.push(idx);
        }

        info!(
            "snapshot for gameweek {gameweek}: {} athletes, {} fixtures, squad of {}",
            snapshot.len(),
            snapshot.fixtures().fixtures().len(),
            picks.len()
        );

        Ok(LoadedSnapshot {
            snapshot,
            squad: Squad::new(picks),
            chips: self.chips,
            gameweek,
            budget: self.budget,
        })
    }
}

impl LoadedSnapshot {
    /// Transfer candidates: every athlete outside the current squad, in id
    /// order, optionally without the unavailable ones.
    pub fn pool(&self, exclude_unavailable: bool) -> Vec<AthleteIdx> {
        let mut pool: Vec<AthleteIdx> = self
            .snapshot
            .athletes()
            .filter(|(idx, _)| !self.squad.contains(*idx))
            .filter(|(_, a)| !exclude_unavailable || a.status.is_available())
            .map(|(idx, _)| idx)
            .collect();
        pool.sort_by_key(|&idx| self.snapshot.athlete(idx).id);
        pool
    }

    /// Candidates for a full rebuild: the pool plus the current squad.
    pub fn rebuild_pool(&self, exclude_unavailable: bool) -> Vec<AthleteIdx> {
        let mut pool = self.pool(exclude_unavailable);
        pool.extend(self.squad.picks());
        pool.sort_by_key(|&idx| self.snapshot.athlete(idx).id);
        pool
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
