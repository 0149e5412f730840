// Read-only SQLite access to the season data store.
//
// The store is populated by an external fetcher; this module never creates or
// migrates tables. Layout: teams, players, fixtures, player_gameweek_stats and
// manager_picks.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use gaffer_core::{Appearance, Athlete, AthleteId, Availability, Club, ClubId, Fixture, Position};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, warn};

/// Price change since the previous deadline, in tenths as the upstream API
/// reports it. Optional in the store.
const PRICE_CHANGE_COLUMN: &str = "cost_change_event";

/// Set-piece order columns; first choice on any of them marks a taker.
/// Optional in the store.
const SET_PIECE_COLUMNS: [&str; 3] = [
    "penalties_order",
    "direct_freekicks_order",
    "corners_and_indirect_freekicks_order",
];

pub struct Database {
    conn: Mutex<Connection>,
}

/// Squad picks recorded for one gameweek, in pick order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picks {
    pub gameweek: u32,
    pub athletes: Vec<AthleteId>,
}

impl Database {
    /// Open an existing database at `path` without write access.
    pub fn open_read_only(path: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open database at {path}"))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("failed to set busy timeout")?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("database mutex poisoned"))
    }

    pub fn clubs(&self) -> Result<Vec<Club>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, short_name FROM teams ORDER BY id")
            .context("failed to prepare clubs query")?;

        let clubs = stmt
            .query_map([], |row| {
                Ok(Club {
                    id: ClubId(row.get(0)?),
                    name: row.get(1)?,
                    short_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })
            .context("failed to query teams")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team rows")?;

        Ok(clubs)
    }

    pub fn fixtures(&self) -> Result<Vec<Fixture>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, gameweek, home_team_id, away_team_id,
                        difficulty_home, difficulty_away, kickoff_time
                 FROM fixtures ORDER BY gameweek, id",
            )
            .context("failed to prepare fixtures query")?;

        let fixtures = stmt
            .query_map([], |row| {
                let kickoff: Option<String> = row.get(6)?;
                Ok(Fixture {
                    id: row.get(0)?,
                    gameweek: row.get(1)?,
                    home: ClubId(row.get(2)?),
                    away: ClubId(row.get(3)?),
                    home_difficulty: row.get(4)?,
                    away_difficulty: row.get(5)?,
                    kickoff: kickoff.as_deref().and_then(parse_kickoff),
                })
            })
            .context("failed to query fixtures")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map fixture rows")?;

        Ok(fixtures)
    }

    /// Earliest gameweek that still has an unfinished fixture.
    pub fn next_gameweek(&self) -> Result<Option<u32>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT MIN(gameweek) FROM fixtures WHERE finished IS NULL OR finished = 0",
            [],
            |row| row.get(0),
        )
        .context("failed to query next gameweek")
    }

    /// Every player with their per-gameweek history, ordered by id.
    ///
    /// Expected points default to the player's `form`; a projections overlay
    /// may replace them later. Players with an unknown position id are
    /// skipped. Price changes and set-piece duties come from the optional
    /// upstream columns and are neutral when the store lacks them.
    pub fn athletes(&self) -> Result<Vec<(Athlete, Vec<Appearance>)>> {
        let mut histories = self.appearances()?;

        let conn = self.conn()?;
        let columns = player_columns(&conn)?;

        let price_change = if columns.contains(PRICE_CHANGE_COLUMN) {
            PRICE_CHANGE_COLUMN.to_string()
        } else {
            warn!("players table has no {PRICE_CHANGE_COLUMN} column; price changes read as 0");
            "NULL".to_string()
        };
        let takers: Vec<String> = SET_PIECE_COLUMNS
            .iter()
            .filter(|c| columns.contains(**c))
            .map(|c| format!("COALESCE({c}, 0) = 1"))
            .collect();
        let set_piece = if takers.is_empty() {
            warn!("players table has no set-piece order columns; nobody is a set-piece taker");
            "NULL".to_string()
        } else {
            format!("({})", takers.join(" OR "))
        };

        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, web_name, team_id, position_id, now_cost, form, status,
                        {price_change}, {set_piece}
                 FROM players ORDER BY id"
            ))
            .context("failed to prepare players query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(PlayerRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    club: row.get(2)?,
                    position_id: row.get(3)?,
                    price: row.get(4)?,
                    form: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                    status: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    price_change: row.get::<_, Option<f64>>(7)?.map_or(0.0, |tenths| tenths / 10.0),
                    set_piece_taker: row.get::<_, Option<bool>>(8)?.unwrap_or(false),
                })
            })
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;

        let mut athletes = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(position) = Position::from_element_type(row.position_id) else {
                warn!(
                    "skipping player {} ({}): unknown position id {}",
                    row.id, row.name, row.position_id
                );
                continue;
            };
            let status = Availability::from_status_code(&row.status).unwrap_or_else(|| {
                debug!("player {} has status {:?}; treating as injured", row.id, row.status);
                Availability::Injured
            });

            let id = AthleteId(row.id);
            let history = histories.remove(&id).unwrap_or_default();
            let recent_points = history.iter().map(|a| a.points).collect();

            athletes.push((
                Athlete {
                    id,
                    name: row.name,
                    position,
                    club: ClubId(row.club),
                    price: row.price,
                    status,
                    expected_points: row.form,
                    recent_points,
                    price_change: row.price_change,
                    form: row.form,
                    set_piece_taker: row.set_piece_taker,
                },
                history,
            ));
        }

        Ok(athletes)
    }

    /// Per-player appearances, oldest first.
    fn appearances(&self) -> Result<HashMap<AthleteId, Vec<Appearance>>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT player_id, gameweek, points, opponent_team, was_home
                 FROM player_gameweek_stats ORDER BY player_id, gameweek",
            )
            .context("failed to prepare player_gameweek_stats query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, i32>(1)?,
                    row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                    row.get::<_, Value>(3)?,
                    row.get::<_, Option<bool>>(4)?.unwrap_or(false),
                ))
            })
            .context("failed to query player_gameweek_stats")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player_gameweek_stats rows")?;

        let mut out: HashMap<AthleteId, Vec<Appearance>> = HashMap::new();
        for (player, round, points, raw_opponent, was_home) in rows {
            let Some(opponent) = club_ref(&raw_opponent) else {
                debug!("player {player} round {round}: unreadable opponent {raw_opponent:?}");
                continue;
            };
            out.entry(AthleteId(player)).or_default().push(Appearance {
                round,
                opponent,
                was_home,
                points,
            });
        }
        Ok(out)
    }

    /// Picks for the most recent gameweek that has any, ordered by pick
    /// position. `None` when no picks are stored.
    pub fn latest_picks(&self) -> Result<Option<Picks>> {
        let conn = self.conn()?;
        let latest: Option<u32> = conn
            .query_row("SELECT MAX(gameweek) FROM manager_picks", [], |row| row.get(0))
            .context("failed to query latest pick gameweek")?;
        let Some(gameweek) = latest else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare(
                "SELECT player_id FROM manager_picks WHERE gameweek = ?1 ORDER BY position",
            )
            .context("failed to prepare picks query")?;
        let athletes = stmt
            .query_map(params![gameweek], |row| Ok(AthleteId(row.get(0)?)))
            .context("failed to query manager picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pick rows")?;

        Ok(Some(Picks { gameweek, athletes }))
    }
}

struct PlayerRow {
    id: u32,
    name: String,
    club: u32,
    position_id: i64,
    price: f64,
    form: f64,
    status: String,
    price_change: f64,
    set_piece_taker: bool,
}

fn player_columns(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn
        .prepare("PRAGMA table_info(players)")
        .context("failed to inspect players table")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .context("failed to query players columns")?
        .collect::<std::result::Result<HashSet<_>, _>>()
        .context("failed to map players columns")?;
    Ok(columns)
}

/// Opponent references are stored as club ids, as integers or text.
fn club_ref(value: &Value) -> Option<ClubId> {
    match value {
        Value::Integer(n) => u32::try_from(*n).ok().map(ClubId),
        Value::Text(s) => s.trim().parse().ok().map(ClubId),
        _ => None,
    }
}

fn parse_kickoff(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
