// Domain types: athletes, clubs, fixtures, squads and chips.
//
// Everything here is a read-only snapshot value. Engines borrow these types
// and return new derived values; they never mutate them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identity of an athlete in the external data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AthleteId(pub u32);

/// Identity of a club in the external data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClubId(pub u32);

/// Stable index into a [`Snapshot`](crate::snapshot::Snapshot)'s athlete arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AthleteIdx(pub usize);

impl fmt::Display for AthleteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ClubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "club {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Playing position. Each squad needs a fixed quota of every position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "GK")]
    Goalkeeper,
    #[serde(rename = "DEF")]
    Defender,
    #[serde(rename = "MID")]
    Midfielder,
    #[serde(rename = "FWD")]
    Forward,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Parse an abbreviation ("GK", "DEF", "MID", "FWD"). Also accepts the
    /// long forms and "GKP".
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GK" | "GKP" | "GOALKEEPER" => Some(Position::Goalkeeper),
            "DEF" | "DEFENDER" => Some(Position::Defender),
            "MID" | "MIDFIELDER" => Some(Position::Midfielder),
            "FWD" | "FORWARD" => Some(Position::Forward),
            _ => None,
        }
    }

    /// Map the data store's numeric element type (1-4) to a position.
    pub fn from_element_type(id: i64) -> Option<Self> {
        match id {
            1 => Some(Position::Goalkeeper),
            2 => Some(Position::Defender),
            3 => Some(Position::Midfielder),
            4 => Some(Position::Forward),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }

    /// Whether the position is expected to produce goals and assists.
    pub fn is_attacking(&self) -> bool {
        matches!(self, Position::Midfielder | Position::Forward)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Injured,
    Suspended,
    Doubtful,
}

impl Availability {
    /// Parse the data store's single-letter status code.
    pub fn from_status_code(code: &str) -> Option<Self> {
        match code.trim() {
            "a" => Some(Availability::Available),
            "i" => Some(Availability::Injured),
            "s" => Some(Availability::Suspended),
            "d" => Some(Availability::Doubtful),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

// ---------------------------------------------------------------------------
// Athlete / Club / Fixture / Appearance
// ---------------------------------------------------------------------------

/// A selectable athlete with price and performance attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Athlete {
    pub id: AthleteId,
    pub name: String,
    pub position: Position,
    pub club: ClubId,
    /// Current price in budget units (e.g. 7.5 for 7.5m).
    pub price: f64,
    pub status: Availability,
    /// Projected points for the upcoming gameweek.
    pub expected_points: f64,
    /// Points per gameweek, oldest first.
    #[serde(default)]
    pub recent_points: Vec<f64>,
    /// Price movement over the recent window; negative when falling.
    #[serde(default)]
    pub price_change: f64,
    /// Rolling average of recent points as published by the data source.
    #[serde(default)]
    pub form: f64,
    /// Takes penalties or direct set pieces.
    #[serde(default)]
    pub set_piece_taker: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Club {
    pub id: ClubId,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
}

/// A scheduled match. Difficulty ratings are ordinal, lower = easier, each
/// from the point of view of the named side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u32,
    pub gameweek: u32,
    pub home: ClubId,
    pub away: ClubId,
    pub home_difficulty: u8,
    pub away_difficulty: u8,
    #[serde(default)]
    pub kickoff: Option<DateTime<Utc>>,
}

/// One club's view of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClubFixture {
    pub fixture_id: u32,
    pub opponent: ClubId,
    pub is_home: bool,
    pub difficulty: u8,
}

impl Fixture {
    /// The fixture as seen by `club`, or `None` if the club does not play in it.
    pub fn side_for(&self, club: ClubId) -> Option<ClubFixture> {
        if self.home == club {
            Some(ClubFixture {
                fixture_id: self.id,
                opponent: self.away,
                is_home: true,
                difficulty: self.home_difficulty,
            })
        } else if self.away == club {
            Some(ClubFixture {
                fixture_id: self.id,
                opponent: self.home,
                is_home: false,
                difficulty: self.away_difficulty,
            })
        } else {
            None
        }
    }
}

/// A past match played by an athlete.
///
/// `round` is continuous across seasons: gameweek `g` of the current season
/// is round `g`, the same gameweek one season earlier is `g - season_length`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub round: i32,
    pub opponent: ClubId,
    pub was_home: bool,
    pub points: f64,
}

// ---------------------------------------------------------------------------
// Squad
// ---------------------------------------------------------------------------

/// Number of starters; picks after this index are the bench.
pub const STARTING_SLOTS: usize = 11;

/// An ordered squad of athletes. Order follows pick positions: the first
/// eleven start, the rest sit on the bench.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Squad {
    picks: Vec<AthleteIdx>,
}

impl Squad {
    pub fn new(picks: Vec<AthleteIdx>) -> Self {
        Self { picks }
    }

    pub fn picks(&self) -> &[AthleteIdx] {
        &self.picks
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn contains(&self, idx: AthleteIdx) -> bool {
        self.picks.contains(&idx)
    }

    pub fn starters(&self) -> &[AthleteIdx] {
        &self.picks[..self.picks.len().min(STARTING_SLOTS)]
    }

    pub fn bench(&self) -> &[AthleteIdx] {
        &self.picks[self.picks.len().min(STARTING_SLOTS)..]
    }
}

// ---------------------------------------------------------------------------
// Chips
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chip {
    Wildcard,
    BenchBoost,
    TripleCaptain,
    FreeHit,
}

impl Chip {
    pub const ALL: [Chip; 4] = [
        Chip::Wildcard,
        Chip::BenchBoost,
        Chip::TripleCaptain,
        Chip::FreeHit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Chip::Wildcard => "Wildcard",
            Chip::BenchBoost => "Bench Boost",
            Chip::TripleCaptain => "Triple Captain",
            Chip::FreeHit => "Free Hit",
        }
    }

    pub fn uses_per_season(&self) -> u8 {
        match self {
            Chip::Wildcard => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which chips are consumed. The wildcard flag covers the wildcard of the
/// current half of the season, giving two wildcards per season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChipState {
    #[serde(default)]
    pub wildcard: bool,
    #[serde(default)]
    pub bench_boost: bool,
    #[serde(default)]
    pub triple_captain: bool,
    #[serde(default)]
    pub free_hit: bool,
    /// Chip already played in the current gameweek. Only one chip may be
    /// active per gameweek.
    #[serde(default)]
    pub active: Option<Chip>,
}

impl ChipState {
    pub fn is_consumed(&self, chip: Chip) -> bool {
        match chip {
            Chip::Wildcard => self.wildcard,
            Chip::BenchBoost => self.bench_boost,
            Chip::TripleCaptain => self.triple_captain,
            Chip::FreeHit => self.free_hit,
        }
    }

    pub fn available(&self) -> impl Iterator<Item = Chip> + '_ {
        Chip::ALL.into_iter().filter(|c| !self.is_consumed(*c))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
