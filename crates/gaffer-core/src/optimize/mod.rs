// Optimization engine: transfer planning and wildcard squad selection.
//
// Both problems are written as binary integer programs against the
// solver-agnostic `Model` and handed to a `Solver`. The universe of athletes
// is always sorted by athlete id before the model is built, so equal optima
// resolve the same way regardless of input order.

pub mod branch;
pub mod model;
mod simplex;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::model::{AthleteIdx, ClubId, Position, Squad};
use crate::snapshot::Snapshot;
use crate::squad::{squad_value, validate_squad, SquadRules, PRICE_TOLERANCE};

pub use branch::BranchAndBound;
pub use model::{Assignment, LinExpr, Model, Sense, SolveError, Solver, Var};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Transfer allowance and penalty for one planning run.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransferTerms {
    pub free_transfers: u32,
    /// Points deducted per transfer beyond the free allotment.
    pub cost_per_extra: f64,
    /// Horizon multiplier applied to expected points in the objective.
    pub gameweeks_ahead: u32,
}

impl Default for TransferTerms {
    fn default() -> Self {
        Self {
            free_transfers: 1,
            cost_per_extra: 4.0,
            gameweeks_ahead: 1,
        }
    }
}

/// Result of a transfer optimization. An empty plan (no transfers) is a valid
/// answer meaning the current squad is already optimal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferPlan {
    pub transfers_out: Vec<AthleteIdx>,
    pub transfers_in: Vec<AthleteIdx>,
    /// Resulting squad; incoming athletes take the pick slot of the athlete
    /// they replace.
    pub squad: Squad,
    pub paid_transfers: u32,
    /// Points penalty for transfers beyond the free allotment.
    pub transfer_cost: f64,
    /// Single-gameweek expected points of the resulting squad.
    pub total_expected_points: f64,
    pub objective: f64,
    /// Budget left after the plan.
    pub bank: f64,
}

impl TransferPlan {
    pub fn is_empty(&self) -> bool {
        self.transfers_in.is_empty()
    }
}

/// Result of a wildcard (unconstrained rebuild) optimization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SquadSelection {
    /// Ordered by position, then expected points descending.
    pub squad: Squad,
    pub total_expected_points: f64,
    pub total_price: f64,
    pub bank: f64,
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Builds optimization models under fixed squad rules and solves them with
/// `S`.
#[derive(Debug, Clone, Default)]
pub struct Optimizer<S = BranchAndBound> {
    rules: SquadRules,
    solver: S,
}

impl Optimizer<BranchAndBound> {
    pub fn new(rules: SquadRules) -> Self {
        Self {
            rules,
            solver: BranchAndBound::default(),
        }
    }
}

impl<S: Solver> Optimizer<S> {
    pub fn with_solver(rules: SquadRules, solver: S) -> Self {
        Self { rules, solver }
    }

    pub fn rules(&self) -> &SquadRules {
        &self.rules
    }

    /// Choose the transfers that maximize expected points over
    /// `terms.gameweeks_ahead` minus the penalty for paid transfers.
    ///
    /// Owned athletes are either kept or sold; pool athletes are either bought
    /// or ignored. The resulting squad must satisfy the squad rules with a
    /// total price within `budget`.
    pub fn optimize(
        &self,
        snapshot: &Snapshot,
        current: &Squad,
        pool: &[AthleteIdx],
        budget: f64,
        terms: &TransferTerms,
    ) -> Result<TransferPlan, EngineError> {
        check_budget(budget)?;
        if !terms.cost_per_extra.is_finite() || terms.cost_per_extra < 0.0 {
            return Err(EngineError::invalid_squad(
                "transfer cost must be finite and non-negative",
            ));
        }
        check_current_squad(current, snapshot, &self.rules)?;

        let owned: HashSet<AthleteIdx> = current.picks().iter().copied().collect();
        let candidates = usable_candidates(snapshot, pool, &owned)?;
        let mut universe: Vec<AthleteIdx> = current.picks().to_vec();
        universe.extend(prune_dominated(snapshot, &candidates, &self.rules));
        universe.sort_by_key(|&idx| snapshot.athlete(idx).id);

        debug!(
            "transfer model: {} owned, {} candidates ({} after pruning)",
            owned.len(),
            candidates.len(),
            universe.len() - owned.len()
        );

        let horizon = f64::from(terms.gameweeks_ahead);
        let mut model = Model::new();
        let select: Vec<Var> = universe.iter().map(|_| model.binary()).collect();
        // `out` for owned athletes, `in` for everyone else.
        let link: Vec<Var> = universe.iter().map(|_| model.binary()).collect();
        let extra = model.integer(0.0, self.rules.squad_size as f64);

        let mut objective: LinExpr = universe
            .iter()
            .zip(&select)
            .map(|(&idx, &v)| (v, objective_points(snapshot, idx) * horizon))
            .collect();
        objective.add_term(extra, -terms.cost_per_extra);
        model.maximize(objective);

        let mut ins = LinExpr::new();
        let mut balance = LinExpr::new();
        let mut spend = LinExpr::new();
        for ((&idx, &sel), &l) in universe.iter().zip(&select).zip(&link) {
            let price = snapshot.athlete(idx).price;
            let linkage = LinExpr::new().term(sel, 1.0);
            if owned.contains(&idx) {
                model.constrain(
                    format!("keep_or_sell_{}", idx.0),
                    linkage.term(l, 1.0),
                    Sense::Eq,
                    1.0,
                );
                balance.add_term(l, -1.0);
                spend.add_term(l, -price);
            } else {
                model.constrain(format!("buy_{}", idx.0), linkage.term(l, -1.0), Sense::Eq, 0.0);
                ins.add_term(l, 1.0);
                balance.add_term(l, 1.0);
                spend.add_term(l, price);
            }
        }

        let mut paid = ins;
        paid.add_term(extra, -1.0);
        model.constrain("paid_transfers", paid, Sense::Le, f64::from(terms.free_transfers));
        model.constrain("transfer_balance", balance, Sense::Eq, 0.0);
        spend.add_term(extra, terms.cost_per_extra);
        model.constrain("transfer_spend", spend, Sense::Le, budget + PRICE_TOLERANCE);
        add_squad_constraints(&mut model, snapshot, &universe, &select, budget, &self.rules);

        let assignment = self.solver.solve(&model).map_err(engine_error)?;

        let selected: HashSet<AthleteIdx> = universe
            .iter()
            .zip(&select)
            .filter(|(_, v)| assignment.is_set(**v))
            .map(|(idx, _)| *idx)
            .collect();
        let transfers_out: Vec<AthleteIdx> = current
            .picks()
            .iter()
            .copied()
            .filter(|idx| !selected.contains(idx))
            .collect();
        let transfers_in: Vec<AthleteIdx> = universe
            .iter()
            .copied()
            .filter(|idx| !owned.contains(idx) && selected.contains(idx))
            .collect();

        if transfers_in.len() != transfers_out.len() {
            return Err(EngineError::Solver(format!(
                "unbalanced plan: {} in, {} out",
                transfers_in.len(),
                transfers_out.len()
            )));
        }

        let squad = Squad::new(replace_in_slots(snapshot, current, &transfers_out, &transfers_in));
        validate_squad(squad.picks(), snapshot, budget, &self.rules)
            .map_err(|e| EngineError::Solver(format!("solver returned an invalid squad: {e}")))?;

        let paid_transfers = u32::try_from(transfers_in.len())
            .unwrap_or(u32::MAX)
            .saturating_sub(terms.free_transfers);
        let plan = TransferPlan {
            paid_transfers,
            transfer_cost: f64::from(paid_transfers) * terms.cost_per_extra,
            total_expected_points: squad
                .picks()
                .iter()
                .map(|&idx| objective_points(snapshot, idx))
                .sum(),
            objective: assignment.objective(),
            bank: budget - squad_value(squad.picks(), snapshot),
            squad,
            transfers_out,
            transfers_in,
        };

        info!(
            "transfer plan: {} transfer(s), {} paid, objective {:.2}, bank {:.1}",
            plan.transfers_in.len(),
            plan.paid_transfers,
            plan.objective,
            plan.bank
        );
        Ok(plan)
    }

    /// Pick the best squad from `pool` alone, ignoring ownership and
    /// transfer penalties.
    pub fn optimize_wildcard(
        &self,
        snapshot: &Snapshot,
        pool: &[AthleteIdx],
        budget: f64,
    ) -> Result<SquadSelection, EngineError> {
        check_budget(budget)?;
        let candidates = usable_candidates(snapshot, pool, &HashSet::new())?;
        let mut universe = prune_dominated(snapshot, &candidates, &self.rules);
        universe.sort_by_key(|&idx| snapshot.athlete(idx).id);

        debug!(
            "wildcard model: {} candidates ({} after pruning)",
            candidates.len(),
            universe.len()
        );

        let mut model = Model::new();
        let select: Vec<Var> = universe.iter().map(|_| model.binary()).collect();
        model.maximize(
            universe
                .iter()
                .zip(&select)
                .map(|(&idx, &v)| (v, objective_points(snapshot, idx)))
                .collect(),
        );
        add_squad_constraints(&mut model, snapshot, &universe, &select, budget, &self.rules);

        let assignment = self.solver.solve(&model).map_err(engine_error)?;

        let mut picks: Vec<AthleteIdx> = universe
            .iter()
            .zip(&select)
            .filter(|(_, v)| assignment.is_set(**v))
            .map(|(idx, _)| *idx)
            .collect();
        picks.sort_by(|&a, &b| {
            let (a, b) = (snapshot.athlete(a), snapshot.athlete(b));
            a.position
                .cmp(&b.position)
                .then(b.expected_points.total_cmp(&a.expected_points))
                .then(a.id.cmp(&b.id))
        });

        validate_squad(&picks, snapshot, budget, &self.rules)
            .map_err(|e| EngineError::Solver(format!("solver returned an invalid squad: {e}")))?;

        let total_price = squad_value(&picks, snapshot);
        let selection = SquadSelection {
            total_expected_points: picks.iter().map(|&idx| objective_points(snapshot, idx)).sum(),
            total_price,
            bank: budget - total_price,
            squad: Squad::new(picks),
        };
        info!(
            "wildcard squad: {:.2} expected points for {:.1}",
            selection.total_expected_points, selection.total_price
        );
        Ok(selection)
    }
}

/// [`Optimizer::optimize`] with default rules and solver.
pub fn optimize(
    snapshot: &Snapshot,
    current: &Squad,
    pool: &[AthleteIdx],
    budget: f64,
    terms: &TransferTerms,
) -> Result<TransferPlan, EngineError> {
    Optimizer::new(SquadRules::default()).optimize(snapshot, current, pool, budget, terms)
}

/// [`Optimizer::optimize_wildcard`] with default rules and solver.
pub fn optimize_wildcard(
    snapshot: &Snapshot,
    pool: &[AthleteIdx],
    budget: f64,
) -> Result<SquadSelection, EngineError> {
    Optimizer::new(SquadRules::default()).optimize_wildcard(snapshot, pool, budget)
}

// ---------------------------------------------------------------------------
// Model building helpers
// ---------------------------------------------------------------------------

fn engine_error(err: SolveError) -> EngineError {
    match err {
        SolveError::Infeasible => EngineError::Infeasible,
        SolveError::Timeout { limit_ms } => EngineError::Timeout { limit_ms },
        SolveError::Numerical(msg) => EngineError::Solver(msg),
    }
}

fn check_budget(budget: f64) -> Result<(), EngineError> {
    if budget.is_finite() {
        Ok(())
    } else {
        Err(EngineError::invalid_squad(format!("budget {budget} is not finite")))
    }
}

/// Structural checks on the current squad. Quota, club and price violations
/// are left to the model: transfers may repair them.
fn check_current_squad(
    current: &Squad,
    snapshot: &Snapshot,
    rules: &SquadRules,
) -> Result<(), EngineError> {
    if current.len() != rules.squad_size {
        return Err(EngineError::invalid_squad(format!(
            "expected {} athletes, got {}",
            rules.squad_size,
            current.len()
        )));
    }
    let mut seen = HashSet::new();
    for &idx in current.picks() {
        if !seen.insert(idx) {
            return Err(EngineError::invalid_squad(format!(
                "athlete index {} appears twice",
                idx.0
            )));
        }
        let athlete = snapshot.get(idx).ok_or_else(|| {
            EngineError::invalid_squad(format!("athlete index {} is not in the snapshot", idx.0))
        })?;
        if !athlete.price.is_finite() {
            return Err(EngineError::invalid_squad(format!(
                "{} has a non-finite price",
                athlete.name
            )));
        }
    }
    Ok(())
}

/// Pool athletes that can enter the model: known, not owned, deduplicated,
/// with finite price and expected points.
fn usable_candidates(
    snapshot: &Snapshot,
    pool: &[AthleteIdx],
    owned: &HashSet<AthleteIdx>,
) -> Result<Vec<AthleteIdx>, EngineError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(pool.len());
    for &idx in pool {
        let athlete = snapshot.get(idx).ok_or_else(|| {
            EngineError::invalid_squad(format!("pool index {} is not in the snapshot", idx.0))
        })?;
        if owned.contains(&idx) || !seen.insert(idx) {
            continue;
        }
        if !athlete.price.is_finite() || !athlete.expected_points.is_finite() {
            warn!("skipping {} from the pool: non-finite price or expected points", athlete.name);
            continue;
        }
        out.push(idx);
    }
    Ok(out)
}

/// Expected points used as an objective coefficient; non-finite values count
/// as zero.
fn objective_points(snapshot: &Snapshot, idx: AthleteIdx) -> f64 {
    let ep = snapshot.athlete(idx).expected_points;
    if ep.is_finite() {
        ep
    } else {
        debug!("{} has non-finite expected points, scoring as 0", snapshot.athlete(idx).name);
        0.0
    }
}

/// Drop non-owned candidates that can never be part of a unique best answer.
///
/// A candidate is dominated by another of the same position that is no more
/// expensive and projects at least as many points (ties broken by id). Once
/// the dominators span enough distinct clubs, at least one of them is always
/// unselected and from a club under its cap, so swapping it in keeps any
/// squad feasible without lowering the objective.
fn prune_dominated(
    snapshot: &Snapshot,
    candidates: &[AthleteIdx],
    rules: &SquadRules,
) -> Vec<AthleteIdx> {
    let full_clubs = rules.squad_size.saturating_sub(1) / rules.club_cap.max(1);

    candidates
        .iter()
        .copied()
        .filter(|&x| {
            let a = snapshot.athlete(x);
            let needed = rules.quotas.get(a.position) + full_clubs;
            let mut clubs: HashSet<ClubId> = HashSet::new();
            for &y in candidates {
                let b = snapshot.athlete(y);
                let dominates = y != x
                    && b.position == a.position
                    && b.price <= a.price
                    && b.expected_points >= a.expected_points
                    && (b.price < a.price || b.expected_points > a.expected_points || b.id < a.id);
                if dominates {
                    clubs.insert(b.club);
                    if clubs.len() >= needed {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

/// Squad size, position quotas, club cap and total price.
fn add_squad_constraints(
    model: &mut Model,
    snapshot: &Snapshot,
    universe: &[AthleteIdx],
    select: &[Var],
    budget: f64,
    rules: &SquadRules,
) {
    model.constrain(
        "squad_size",
        select.iter().map(|&v| (v, 1.0)).collect(),
        Sense::Eq,
        rules.squad_size as f64,
    );

    for pos in Position::ALL {
        let expr: LinExpr = universe
            .iter()
            .zip(select)
            .filter(|(idx, _)| snapshot.athlete(**idx).position == pos)
            .map(|(_, &v)| (v, 1.0))
            .collect();
        model.constrain(format!("quota_{pos}"), expr, Sense::Eq, rules.quotas.get(pos) as f64);
    }

    let mut by_club: BTreeMap<ClubId, Vec<Var>> = BTreeMap::new();
    for (&idx, &v) in universe.iter().zip(select) {
        by_club.entry(snapshot.athlete(idx).club).or_default().push(v);
    }
    for (club, vars) in by_club {
        if vars.len() > rules.club_cap {
            model.constrain(
                format!("club_cap_{}", club.0),
                vars.into_iter().map(|v| (v, 1.0)).collect(),
                Sense::Le,
                rules.club_cap as f64,
            );
        }
    }

    model.constrain(
        "squad_value",
        universe
            .iter()
            .zip(select)
            .map(|(&idx, &v)| (v, snapshot.athlete(idx).price))
            .collect(),
        Sense::Le,
        budget + PRICE_TOLERANCE,
    );
}

/// Put each incoming athlete into the slot of an outgoing athlete, preferring
/// one of the same position so starters stay starters.
fn replace_in_slots(
    snapshot: &Snapshot,
    current: &Squad,
    transfers_out: &[AthleteIdx],
    transfers_in: &[AthleteIdx],
) -> Vec<AthleteIdx> {
    let mut picks = current.picks().to_vec();
    let mut pending: Vec<AthleteIdx> = transfers_in.to_vec();
    let mut open_slots = Vec::new();

    for slot in 0..picks.len() {
        if !transfers_out.contains(&picks[slot]) {
            continue;
        }
        let position = snapshot.athlete(picks[slot]).position;
        match pending
            .iter()
            .position(|&idx| snapshot.athlete(idx).position == position)
        {
            Some(i) => picks[slot] = pending.remove(i),
            None => open_slots.push(slot),
        }
    }
    for (slot, idx) in open_slots.into_iter().zip(pending) {
        picks[slot] = idx;
    }
    picks
}
