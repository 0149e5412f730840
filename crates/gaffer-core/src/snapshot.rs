// Immutable input snapshot: an arena of athletes addressed by stable indices,
// their appearance histories, clubs, and a per-club fixture index.

use std::collections::{BTreeMap, HashMap};

use crate::model::{
    Appearance, Athlete, AthleteId, AthleteIdx, Club, ClubFixture, ClubId, Fixture,
};

// ---------------------------------------------------------------------------
// FixtureIndex
// ---------------------------------------------------------------------------

/// Fixtures grouped by (club, gameweek). A club with two entries in one
/// gameweek has a double gameweek; a club with none has a blank.
#[derive(Debug, Clone, Default)]
pub struct FixtureIndex {
    fixtures: Vec<Fixture>,
    by_club: HashMap<(ClubId, u32), Vec<ClubFixture>>,
}

impl FixtureIndex {
    pub fn new(mut fixtures: Vec<Fixture>) -> Self {
        fixtures.sort_by_key(|f| (f.gameweek, f.id));

        let mut by_club: HashMap<(ClubId, u32), Vec<ClubFixture>> = HashMap::new();
        for f in &fixtures {
            for club in [f.home, f.away] {
                if let Some(side) = f.side_for(club) {
                    by_club.entry((club, f.gameweek)).or_default().push(side);
                }
            }
        }

        Self { fixtures, by_club }
    }

    /// All fixtures, ordered by gameweek then id.
    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    /// The club's fixtures in `gameweek`, in fixture id order.
    pub fn for_club(&self, club: ClubId, gameweek: u32) -> &[ClubFixture] {
        self.by_club
            .get(&(club, gameweek))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn count(&self, club: ClubId, gameweek: u32) -> usize {
        self.for_club(club, gameweek).len()
    }

    pub fn is_blank(&self, club: ClubId, gameweek: u32) -> bool {
        self.count(club, gameweek) == 0
    }

    pub fn is_double(&self, club: ClubId, gameweek: u32) -> bool {
        self.count(club, gameweek) >= 2
    }

    /// Mean difficulty of every fixture the club plays in
    /// `[from, from + span)`. `None` when the club has no fixture in the window.
    pub fn average_difficulty(&self, club: ClubId, from: u32, span: u32) -> Option<f64> {
        let difficulties: Vec<f64> = (from..from.saturating_add(span))
            .flat_map(|gw| self.for_club(club, gw))
            .map(|cf| f64::from(cf.difficulty))
            .collect();
        crate::stats::mean(&difficulties)
    }

    /// Last gameweek with any scheduled fixture.
    pub fn last_gameweek(&self) -> Option<u32> {
        self.fixtures.last().map(|f| f.gameweek)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything the engines read, built once by the data layer.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    athletes: Vec<Athlete>,
    histories: Vec<Vec<Appearance>>,
    by_id: HashMap<AthleteId, AthleteIdx>,
    clubs: BTreeMap<ClubId, Club>,
    fixtures: FixtureIndex,
}

impl Snapshot {
    pub fn new(clubs: Vec<Club>, fixtures: Vec<Fixture>) -> Self {
        Self {
            athletes: Vec::new(),
            histories: Vec::new(),
            by_id: HashMap::new(),
            clubs: clubs.into_iter().map(|c| (c.id, c)).collect(),
            fixtures: FixtureIndex::new(fixtures),
        }
    }

    /// Add an athlete with its appearance history and return its index.
    ///
    /// Adding an id that already exists replaces the record in place and
    /// returns the existing index. History is stored in round order.
    pub fn add_athlete(&mut self, athlete: Athlete, mut history: Vec<Appearance>) -> AthleteIdx {
        history.sort_by_key(|a| a.round);

        if let Some(&idx) = self.by_id.get(&athlete.id) {
            self.athletes[idx.0] = athlete;
            self.histories[idx.0] = history;
            return idx;
        }

        let idx = AthleteIdx(self.athletes.len());
        self.by_id.insert(athlete.id, idx);
        self.athletes.push(athlete);
        self.histories.push(history);
        idx
    }

    /// Panics if `idx` did not come from this snapshot.
    pub fn athlete(&self, idx: AthleteIdx) -> &Athlete {
        &self.athletes[idx.0]
    }

    pub fn get(&self, idx: AthleteIdx) -> Option<&Athlete> {
        self.athletes.get(idx.0)
    }

    /// Appearance history for the athlete, oldest first. Empty for unknown
    /// indices.
    pub fn history(&self, idx: AthleteIdx) -> &[Appearance] {
        self.histories.get(idx.0).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn index_of(&self, id: AthleteId) -> Option<AthleteIdx> {
        self.by_id.get(&id).copied()
    }

    pub fn athletes(&self) -> impl Iterator<Item = (AthleteIdx, &Athlete)> {
        self.athletes
            .iter()
            .enumerate()
            .map(|(i, a)| (AthleteIdx(i), a))
    }

    /// Every index in the arena, in insertion order.
    pub fn indices(&self) -> Vec<AthleteIdx> {
        (0..self.athletes.len()).map(AthleteIdx).collect()
    }

    pub fn len(&self) -> usize {
        self.athletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.athletes.is_empty()
    }

    pub fn club(&self, id: ClubId) -> Option<&Club> {
        self.clubs.get(&id)
    }

    pub fn clubs(&self) -> impl Iterator<Item = &Club> {
        self.clubs.values()
    }

    pub fn fixtures(&self) -> &FixtureIndex {
        &self.fixtures
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
