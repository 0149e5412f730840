// Advisor run: transfer plan (with wildcard fallback), captaincy, transfer
// tiers and chip timing for one loaded snapshot.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use gaffer_core::optimize::BranchAndBound;
use gaffer_core::{analyze_chips, classify_transfers, rank_captains, EngineError, Optimizer};
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::loader::LoadedSnapshot;
use crate::report::{CaptaincyReport, PlanReport, Report, TiersReport};

/// Slack on top of the solver's own deadline before the outer guard fires.
const OUTER_GRACE: Duration = Duration::from_secs(2);

/// Milliseconds in `limit`, saturating for limits beyond `u64`.
fn limit_ms(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

/// Await a solver task for at most `limit` plus a grace period.
async fn guarded<T, F>(limit: Duration, task: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<Result<T, EngineError>, JoinError>>,
{
    match tokio::time::timeout(limit.saturating_add(OUTER_GRACE), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(EngineError::Solver(format!("solver task failed: {join}"))),
        Err(_) => Err(EngineError::Timeout {
            limit_ms: limit_ms(limit),
        }),
    }
}

/// Run a solve on the blocking pool under [`guarded`].
async fn solve_blocking<T, F>(limit: Duration, solve: F) -> Result<T, EngineError>
where
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    guarded(limit, tokio::task::spawn_blocking(solve)).await
}

/// Plan transfers; when that fails for any reason, suggest a wildcard
/// rebuild instead.
async fn plan_transfers(config: &Config, loaded: &Arc<LoadedSnapshot>, budget: f64) -> PlanReport {
    let limit = config.strategy.solver.time_limit();
    let solver = BranchAndBound::new(limit).with_node_limit(config.strategy.solver.max_nodes);
    let optimizer = Arc::new(Optimizer::with_solver(config.league.rules(), solver));
    let exclude = config.data.exclude_unavailable;

    let pool = loaded.pool(exclude);
    let terms = config.strategy.transfers;
    let (snap, opt) = (Arc::clone(loaded), Arc::clone(&optimizer));
    let outcome = solve_blocking(limit, move || {
        opt.optimize(&snap.snapshot, &snap.squad, &pool, budget, &terms)
    })
    .await;

    let failure = match outcome {
        Ok(plan) => {
            info!(
                "transfer plan: {} in, {} paid, {:.1} expected points",
                plan.transfers_in.len(),
                plan.paid_transfers,
                plan.total_expected_points
            );
            return PlanReport::from_plan(&loaded.snapshot, &plan);
        }
        Err(e) => e,
    };

    warn!("transfer optimization failed: {failure}; trying a wildcard rebuild");
    let rebuild = loaded.rebuild_pool(exclude);
    let snap = Arc::clone(loaded);
    let fallback = solve_blocking(limit, move || {
        optimizer.optimize_wildcard(&snap.snapshot, &rebuild, budget)
    })
    .await;

    match fallback {
        Ok(selection) => {
            info!(
                "wildcard squad: {:.1} expected points, {:.1} spent",
                selection.total_expected_points, selection.total_price
            );
            PlanReport::from_wildcard(&loaded.snapshot, failure.to_string(), &selection)
        }
        Err(e) => {
            error!("wildcard rebuild failed as well: {e}");
            PlanReport::Failed {
                error: failure.to_string(),
                fallback_error: Some(e.to_string()),
            }
        }
    }
}

/// Produce the full report for `loaded`.
pub async fn advise(config: &Config, loaded: LoadedSnapshot) -> Result<Report> {
    let loaded = Arc::new(loaded);
    let budget = loaded.budget.unwrap_or(config.league.budget);
    let gameweek = loaded.gameweek;
    let strategy = &config.strategy;
    let mut warnings = Vec::new();

    let plan = plan_transfers(config, &loaded, budget).await;

    let snapshot = &loaded.snapshot;
    let captaincy = match rank_captains(&loaded.squad, gameweek, snapshot, &strategy.captain) {
        Ok(ranking) => Some(CaptaincyReport::new(snapshot, ranking)),
        Err(e) => {
            warn!("captain ranking skipped: {e}");
            warnings.push(format!("captaincy: {e}"));
            None
        }
    };

    let pool = loaded.pool(config.data.exclude_unavailable);
    let tiers = classify_transfers(
        &loaded.squad,
        &pool,
        gameweek,
        snapshot,
        &strategy.advisor.transfers,
    );
    info!("transfer tiers: {}", tiers.summary());

    let chips = analyze_chips(
        &loaded.squad,
        gameweek,
        &loaded.chips,
        snapshot,
        &strategy.advisor.chips,
        &strategy.captain,
    );

    Ok(Report {
        gameweek,
        budget,
        squad: Report::squad_refs(snapshot, loaded.squad.picks()),
        plan,
        captaincy,
        transfers: TiersReport::new(snapshot, &tiers),
        chips,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outer_guard_reports_timeout() {
        tokio::time::pause();
        let stuck = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, JoinError>(Ok::<_, EngineError>(()))
        };
        let result: Result<(), EngineError> = guarded(Duration::from_millis(10), stuck).await;
        assert_eq!(result, Err(EngineError::Timeout { limit_ms: 10 }));
    }

    #[tokio::test]
    async fn outer_guard_lets_fast_solves_through() {
        tokio::time::pause();
        let quick = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, JoinError>(Ok::<_, EngineError>(7))
        };
        assert_eq!(guarded(Duration::from_millis(10), quick).await, Ok(7));
    }

    #[test]
    fn limit_ms_saturates() {
        assert_eq!(limit_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(limit_ms(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn solver_errors_pass_through() {
        let result: Result<(), EngineError> =
            solve_blocking(Duration::from_secs(1), || Err(EngineError::Infeasible)).await;
        assert_eq!(result, Err(EngineError::Infeasible));
    }

    #[tokio::test]
    async fn panicking_solve_becomes_a_solver_error() {
        let result: Result<(), EngineError> =
            solve_blocking(Duration::from_secs(1), || panic!("boom")).await;
        assert!(matches!(result, Err(EngineError::Solver(_))));
    }
}
