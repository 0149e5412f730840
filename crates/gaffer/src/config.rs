// Configuration loading and parsing (league.toml, strategy.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use gaffer_core::optimize::branch::{DEFAULT_NODE_LIMIT, DEFAULT_TIME_LIMIT};
use gaffer_core::recommend::AdvisorThresholds;
use gaffer_core::squad::PositionQuotas;
use gaffer_core::{CaptainWeights, SquadRules, TransferTerms};
use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub strategy: StrategyConfig,
    pub data: DataPaths,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    /// Total spending limit: squad value plus bank.
    pub budget: f64,
    pub squad_size: usize,
    pub club_cap: usize,
    pub season_length: u32,
    pub quotas: PositionQuotas,
}

impl LeagueConfig {
    pub fn rules(&self) -> SquadRules {
        SquadRules {
            squad_size: self.squad_size,
            club_cap: self.club_cap,
            quotas: self.quotas,
        }
    }
}

// ---------------------------------------------------------------------------
// strategy.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire strategy.toml file.
#[derive(Debug, Clone, Deserialize)]
struct StrategyFile {
    #[serde(default)]
    transfers: TransferTerms,
    #[serde(default)]
    solver: SolverConfig,
    #[serde(default)]
    captain: CaptainWeights,
    #[serde(default)]
    advisor: AdvisorThresholds,
    data: DataPaths,
}

/// The public strategy config assembled from the strategy.toml sections.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub transfers: TransferTerms,
    pub solver: SolverConfig,
    pub captain: CaptainWeights,
    pub advisor: AdvisorThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub timeout_ms: u64,
    pub max_nodes: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            timeout_ms: u64::try_from(DEFAULT_TIME_LIMIT.as_millis()).unwrap_or(u64::MAX),
            max_nodes: DEFAULT_NODE_LIMIT,
        }
    }
}

impl SolverConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub db_path: String,
    #[serde(default)]
    pub snapshot_path: Option<String>,
    #[serde(default)]
    pub projections_path: Option<String>,
    /// Drop injured, suspended and doubtful athletes from the transfer pool.
    #[serde(default)]
    pub exclude_unavailable: bool,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml` and
/// `config/strategy.toml`, relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;
    let league = league_file.league;

    // --- strategy.toml (required) ---
    let strategy_path = config_dir.join("strategy.toml");
    let strategy_text = read_file(&strategy_path)?;
    let strategy_file: StrategyFile =
        toml::from_str(&strategy_text).map_err(|e| ConfigError::ParseError {
            path: strategy_path.clone(),
            source: e,
        })?;

    // The history lookback follows the league's season length.
    let captain = CaptainWeights {
        season_length: league.season_length,
        ..strategy_file.captain
    };

    let config = Config {
        league,
        strategy: StrategyConfig {
            transfers: strategy_file.transfers,
            solver: strategy_file.solver,
            captain,
            advisor: strategy_file.advisor,
        },
        data: strategy_file.data,
    };

    validate(&config)?;

    Ok(config)
}

/// Files read from `config/`, seeded from `defaults/` on first run.
pub const CONFIG_FILES: [&str; 2] = ["league.toml", "strategy.toml"];

/// Copy each of [`CONFIG_FILES`] missing from `config/` out of `defaults/`.
/// Returns the copied paths; existing files are left untouched.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for name in CONFIG_FILES {
        let source = defaults_dir.join(name);
        if !source.is_file() {
            continue;
        }
        let target = config_dir.join(name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&source).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", source.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let league = &config.league;
    if !league.budget.is_finite() || league.budget <= 0.0 {
        return Err(invalid(
            "league.budget",
            format!("must be a positive number, got {}", league.budget),
        ));
    }

    let counts: &[(&str, usize)] = &[
        ("league.squad_size", league.squad_size),
        ("league.club_cap", league.club_cap),
        ("league.season_length", league.season_length as usize),
    ];
    for (name, val) in counts {
        if *val == 0 {
            return Err(invalid(name, "must be greater than 0"));
        }
    }

    if league.quotas.total() != league.squad_size {
        return Err(invalid(
            "league.quotas",
            format!(
                "quotas add up to {}, squad size is {}",
                league.quotas.total(),
                league.squad_size
            ),
        ));
    }

    let transfers = &config.strategy.transfers;
    if !transfers.cost_per_extra.is_finite() || transfers.cost_per_extra < 0.0 {
        return Err(invalid(
            "transfers.cost_per_extra",
            format!("must be >= 0, got {}", transfers.cost_per_extra),
        ));
    }
    if transfers.gameweeks_ahead == 0 {
        return Err(invalid("transfers.gameweeks_ahead", "must be greater than 0"));
    }

    if config.strategy.solver.timeout_ms == 0 {
        return Err(invalid("solver.timeout_ms", "must be greater than 0"));
    }

    // Multipliers may be zero (never captain a position) but not negative.
    let w = &config.strategy.captain;
    let weight_fields: &[(&str, f64)] = &[
        ("captain.GK", w.goalkeeper),
        ("captain.DEF", w.defender),
        ("captain.MID", w.midfielder),
        ("captain.FWD", w.forward),
        ("captain.home_bonus", w.home_bonus),
    ];
    for (name, val) in weight_fields {
        if !val.is_finite() || *val < 0.0 {
            return Err(invalid(name, format!("must be >= 0, got {val}")));
        }
    }

    let advisor = &config.strategy.advisor;
    let spans: &[(&str, u32)] = &[
        ("advisor.transfers.fixture_run_span", advisor.transfers.fixture_run_span),
        ("advisor.chips.difficult_run_span", advisor.chips.difficult_run_span),
    ];
    for (name, val) in spans {
        if *val == 0 {
            return Err(invalid(name, "must be greater than 0"));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Workspace root, where defaults/ lives.
    fn project_root() -> PathBuf {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        if !root.join("defaults").exists() {
            panic!("Cannot locate defaults/ directory from {:?}", root);
        }
        root
    }

    /// Fresh temp dir with `config/` holding copies of both default files.
    fn temp_with_defaults(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();

        let root = project_root();
        fs::copy(root.join("defaults/league.toml"), config_dir.join("league.toml")).unwrap();
        fs::copy(
            root.join("defaults/strategy.toml"),
            config_dir.join("strategy.toml"),
        )
        .unwrap();
        tmp
    }

    fn rewrite(tmp: &Path, file: &str, from: &str, to: &str) {
        let path = tmp.join("config").join(file);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(from), "{file} does not contain {from:?}");
        fs::write(&path, text.replace(from, to)).unwrap();
    }

    fn expect_field(tmp: &Path, expected: &str) {
        match load_config_from(tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_valid_config_from_project_files() {
        let tmp = temp_with_defaults("gaffer_config_test_defaults");
        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.league.name, "Gaffer Classic");
        assert!((config.league.budget - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.league.rules(), SquadRules::default());
        assert_eq!(config.league.season_length, 38);

        assert_eq!(config.strategy.transfers, TransferTerms::default());
        assert_eq!(config.strategy.solver, SolverConfig::default());
        assert_eq!(config.strategy.solver.time_limit(), Duration::from_secs(10));
        assert_eq!(config.strategy.captain, CaptainWeights::default());
        assert_eq!(config.strategy.advisor, AdvisorThresholds::default());

        assert_eq!(config.data.db_path, "data/fpl.db");
        assert!(config.data.snapshot_path.is_none());
        assert!(config.data.projections_path.is_none());
        assert!(config.data.exclude_unavailable);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn optional_sections_fall_back_to_defaults() {
        let tmp = temp_with_defaults("gaffer_config_test_minimal_strategy");
        fs::write(
            tmp.join("config/strategy.toml"),
            "[transfers]\nfree_transfers = 2\n\n[data]\ndb_path = \"x.db\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("should load minimal strategy");
        assert_eq!(config.strategy.transfers.free_transfers, 2);
        assert!((config.strategy.transfers.cost_per_extra - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.strategy.solver.max_nodes, DEFAULT_NODE_LIMIT);
        assert_eq!(config.strategy.advisor.chips.timing_horizon, 8);
        assert!(!config.data.exclude_unavailable);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn season_length_flows_into_captain_weights() {
        let tmp = temp_with_defaults("gaffer_config_test_season_length");
        rewrite(&tmp, "league.toml", "season_length = 38", "season_length = 34");

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.strategy.captain.season_length, 34);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_budget() {
        let tmp = temp_with_defaults("gaffer_config_test_zero_budget");
        rewrite(&tmp, "league.toml", "budget = 100.0", "budget = 0.0");
        expect_field(&tmp, "league.budget");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_club_cap() {
        let tmp = temp_with_defaults("gaffer_config_test_zero_club_cap");
        rewrite(&tmp, "league.toml", "club_cap = 3", "club_cap = 0");
        expect_field(&tmp, "league.club_cap");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_quotas_that_do_not_fill_the_squad() {
        let tmp = temp_with_defaults("gaffer_config_test_quota_mismatch");
        rewrite(&tmp, "league.toml", "FWD = 3", "FWD = 2");
        expect_field(&tmp, "league.quotas");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_negative_transfer_cost() {
        let tmp = temp_with_defaults("gaffer_config_test_negative_cost");
        rewrite(&tmp, "strategy.toml", "cost_per_extra = 4.0", "cost_per_extra = -1.0");
        expect_field(&tmp, "transfers.cost_per_extra");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_horizon() {
        let tmp = temp_with_defaults("gaffer_config_test_zero_horizon");
        rewrite(&tmp, "strategy.toml", "gameweeks_ahead = 1", "gameweeks_ahead = 0");
        expect_field(&tmp, "transfers.gameweeks_ahead");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_solver_timeout() {
        let tmp = temp_with_defaults("gaffer_config_test_zero_timeout");
        rewrite(&tmp, "strategy.toml", "timeout_ms = 10000", "timeout_ms = 0");
        expect_field(&tmp, "solver.timeout_ms");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_negative_multiplier() {
        let tmp = temp_with_defaults("gaffer_config_test_negative_multiplier");
        rewrite(&tmp, "strategy.toml", "GK  = 0.3", "GK  = -0.3");
        expect_field(&tmp, "captain.GK");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_league_toml() {
        let tmp = temp_with_defaults("gaffer_config_test_missing_league");
        fs::remove_file(tmp.join("config/league.toml")).unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("league.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_strategy_toml() {
        let tmp = temp_with_defaults("gaffer_config_test_missing_strategy");
        fs::remove_file(tmp.join("config/strategy.toml")).unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("strategy.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = temp_with_defaults("gaffer_config_test_parse_error");
        fs::write(tmp.join("config/league.toml"), "[league\nname = ").unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with("league.toml")),
            other => panic!("expected ParseError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_files() {
        let tmp = std::env::temp_dir().join("gaffer_config_test_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults/league.toml"), "a").unwrap();
        fs::write(tmp.join("defaults/strategy.toml"), "b").unwrap();
        fs::write(tmp.join("defaults/notes.txt"), "c").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(
            copied,
            vec![tmp.join("config/league.toml"), tmp.join("config/strategy.toml")]
        );
        assert_eq!(fs::read_to_string(tmp.join("config/strategy.toml")).unwrap(), "b");
        // Only the known config files are seeded.
        assert!(!tmp.join("config/notes.txt").exists());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_skips_existing() {
        let tmp = std::env::temp_dir().join("gaffer_config_test_ensure_skips");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("defaults/league.toml"), "default").unwrap();
        fs::write(tmp.join("defaults/strategy.toml"), "default").unwrap();
        fs::write(tmp.join("config/league.toml"), "custom").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config/strategy.toml")]);
        assert_eq!(
            fs::read_to_string(tmp.join("config/league.toml")).unwrap(),
            "custom"
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_no_defaults_dir_is_ok() {
        let tmp = std::env::temp_dir().join("gaffer_config_test_no_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        assert!(ensure_config_files(&tmp).unwrap().is_empty());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("gaffer_config_test_no_dirs");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        assert!(matches!(
            ensure_config_files(&tmp),
            Err(ConfigError::DefaultsCopyError { .. })
        ));

        let _ = fs::remove_dir_all(&tmp);
    }
}
