// Integration tests: snapshot file -> advisor run -> JSON report.

use std::path::{Path, PathBuf};

use gaffer::config::{Config, DataPaths, LeagueConfig, SolverConfig, StrategyConfig};
use gaffer::loader::{self, SnapshotData};
use gaffer::projections::load_projections;
use gaffer::report::{PlanReport, Report};
use gaffer::run::advise;
use gaffer_core::optimize::branch::DEFAULT_NODE_LIMIT;
use gaffer_core::recommend::AdvisorThresholds;
use gaffer_core::squad::PositionQuotas;
use gaffer_core::{AthleteId, CaptainWeights, Chip, TransferTerms};

// ===========================================================================
// Helpers
// ===========================================================================

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn test_config(exclude_unavailable: bool) -> Config {
    Config {
        league: LeagueConfig {
            name: "Test League".into(),
            budget: 100.0,
            squad_size: 15,
            club_cap: 3,
            season_length: 38,
            quotas: PositionQuotas::default(),
        },
        strategy: StrategyConfig {
            transfers: TransferTerms::default(),
            // Generous deadline so slow debug builds never time out.
            solver: SolverConfig {
                timeout_ms: 120_000,
                max_nodes: DEFAULT_NODE_LIMIT,
            },
            captain: CaptainWeights::default(),
            advisor: AdvisorThresholds::default(),
        },
        data: DataPaths {
            db_path: String::new(),
            snapshot_path: None,
            projections_path: None,
            exclude_unavailable,
        },
    }
}

fn sample() -> SnapshotData {
    loader::from_json_file(&fixture("snapshot.json")).expect("fixture should parse")
}

async fn report_for(data: SnapshotData, config: &Config) -> Report {
    let loaded = data.freeze(None).expect("fixture should freeze");
    advise(config, loaded).await.expect("advisor should run")
}

fn ids(refs: &[gaffer::report::AthleteRef]) -> Vec<u32> {
    refs.iter().map(|r| r.id.0).collect()
}

// ===========================================================================
// Transfer plan
// ===========================================================================

#[tokio::test]
async fn plan_swaps_the_weakest_midfielder() {
    let report = report_for(sample(), &test_config(true)).await;

    assert_eq!(report.gameweek, 10);
    assert!((report.budget - 92.0).abs() < 1e-9);
    assert_eq!(report.squad.len(), 15);

    match &report.plan {
        PlanReport::Transfers {
            transfers_out,
            transfers_in,
            paid_transfers,
            bank,
            ..
        } => {
            assert_eq!(ids(transfers_out), vec![9]);
            assert_eq!(ids(transfers_in), vec![101]);
            assert_eq!(*paid_transfers, 0);
            assert!((bank - 3.0).abs() < 1e-6);
        }
        other => panic!("expected transfers, got {other:?}"),
    }
}

#[tokio::test]
async fn injured_pool_athlete_does_not_change_the_plan() {
    let report = report_for(sample(), &test_config(false)).await;
    match &report.plan {
        PlanReport::Transfers { transfers_in, .. } => assert_eq!(ids(transfers_in), vec![101]),
        other => panic!("expected transfers, got {other:?}"),
    }
}

#[tokio::test]
async fn projections_can_make_the_squad_optimal() {
    let mut data = sample();
    let projections = load_projections(&fixture("projections.csv")).unwrap();
    assert_eq!(data.apply_projections(&projections), 2);

    let report = report_for(data, &test_config(true)).await;
    assert!(
        matches!(report.plan, PlanReport::NoTransfers { .. }),
        "got {:?}",
        report.plan
    );
}

#[tokio::test]
async fn short_squad_falls_back_to_a_wildcard() {
    let mut data = sample();
    data.squad.retain(|id| *id != AthleteId(15));

    let report = report_for(data, &test_config(true)).await;
    match &report.plan {
        PlanReport::Wildcard {
            reason,
            squad,
            total_price,
            ..
        } => {
            assert!(reason.contains("invalid squad"), "reason: {reason}");
            assert_eq!(squad.len(), 15);
            assert!(*total_price <= 92.0 + 1e-6);
            // The injured defender is filtered out of the rebuild.
            assert!(!ids(squad).contains(&103));
        }
        other => panic!("expected wildcard, got {other:?}"),
    }
}

#[tokio::test]
async fn impossible_budget_reports_both_failures() {
    let mut data = sample();
    data.budget = Some(10.0);

    let report = report_for(data, &test_config(true)).await;
    match &report.plan {
        PlanReport::Failed {
            error,
            fallback_error,
        } => {
            assert!(error.contains("no squad satisfies"), "error: {error}");
            assert!(fallback_error.is_some());
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

// ===========================================================================
// Captaincy, tiers and chips
// ===========================================================================

#[tokio::test]
async fn report_covers_captaincy_tiers_and_chips() {
    let report = report_for(sample(), &test_config(true)).await;

    let captaincy = report.captaincy.as_ref().expect("captaincy should be ranked");
    assert_ne!(captaincy.captain.score.athlete, captaincy.vice_captain.score.athlete);
    assert!(captaincy.captain.score.score >= captaincy.vice_captain.score.score);
    assert!(captaincy.alternates.len() <= 3);
    assert!(!captaincy.captain.name.is_empty());

    let priority: Vec<u32> = report.transfers.priority.iter().map(|e| e.athlete.id.0).collect();
    assert_eq!(priority, vec![4]);
    assert!(report.transfers.value.iter().any(|e| e.athlete.id.0 == 101));
    assert!(report.transfers.summary.contains("1 urgent transfer(s) needed"));

    // The wildcard is already used.
    let chips: Vec<Chip> = report.chips.iter().map(|c| c.chip).collect();
    assert_eq!(chips, vec![Chip::BenchBoost, Chip::TripleCaptain, Chip::FreeHit]);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn report_serializes_to_json() {
    let report = report_for(sample(), &test_config(true)).await;
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(json["gameweek"], 10);
    assert_eq!(json["plan"]["kind"], "transfers");
    assert_eq!(json["plan"]["transfers_in"][0]["name"], "Palmer");
    assert_eq!(json["chips"][0]["chip"], "bench_boost");
    assert!(json["chips"][0]["timing"]["when"].is_string());
    assert!(json["captaincy"]["captain"]["reasons"].is_array());
}
