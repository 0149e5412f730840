// Depth-first branch-and-bound over LP relaxations.
//
// Node order is fully determined by the model: the most fractional integer
// variable is branched on (lowest index on ties) and the up branch is explored
// first. The incumbent is only replaced on strict improvement, so among equal
// optima the first one found wins.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::model::{Assignment, Model, SolveError, Solver};
use super::simplex::{solve_relaxation, Relaxation};

/// Distance from an integer below which a value counts as integral.
const INTEGRALITY_TOLERANCE: f64 = 1e-6;
/// Objective gain required to replace the incumbent or keep a node open.
const IMPROVEMENT_EPSILON: f64 = 1e-6;
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(10);
pub const DEFAULT_NODE_LIMIT: usize = 200_000;

/// The shipped [`Solver`]: deterministic, with a wall-clock deadline and a
/// node budget. Running out of either is a `Timeout`, even if an incumbent
/// exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchAndBound {
    pub time_limit: Duration,
    pub node_limit: usize,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self {
            time_limit: DEFAULT_TIME_LIMIT,
            node_limit: DEFAULT_NODE_LIMIT,
        }
    }
}

impl BranchAndBound {
    pub fn new(time_limit: Duration) -> Self {
        Self {
            time_limit,
            ..Self::default()
        }
    }

    pub fn with_node_limit(mut self, node_limit: usize) -> Self {
        self.node_limit = node_limit;
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

/// Integer variable whose relaxed value is furthest from integral.
fn branching_variable(model: &Model, values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (j, (def, &v)) in model.vars().iter().zip(values).enumerate() {
        if !def.integer {
            continue;
        }
        let frac = v - v.floor();
        let distance = frac.min(1.0 - frac);
        if distance <= INTEGRALITY_TOLERANCE {
            continue;
        }
        if best.map_or(true, |(_, d)| distance > d + 1e-12) {
            best = Some((j, distance));
        }
    }
    best.map(|(j, _)| j)
}

fn round_integers(model: &Model, mut values: Vec<f64>) -> Vec<f64> {
    for (def, v) in model.vars().iter().zip(values.iter_mut()) {
        if def.integer {
            *v = v.round();
        }
    }
    values
}

impl Solver for BranchAndBound {
    fn solve(&self, model: &Model) -> Result<Assignment, SolveError> {
        let started = Instant::now();
        let limit_ms = u64::try_from(self.time_limit.as_millis()).unwrap_or(u64::MAX);
        let iteration_limit = 50 * (model.vars().len() + model.constraints().len()) + 1_000;

        let mut stack = vec![Node {
            lower: model.vars().iter().map(|v| v.lower).collect(),
            upper: model.vars().iter().map(|v| v.upper).collect(),
        }];
        let mut incumbent: Option<Assignment> = None;
        let mut explored = 0usize;

        while let Some(node) = stack.pop() {
            if explored >= self.node_limit || started.elapsed() >= self.time_limit {
                debug!(
                    "branch-and-bound stopped after {explored} nodes in {:?}",
                    started.elapsed()
                );
                return Err(SolveError::Timeout { limit_ms });
            }
            explored += 1;

            let (values, bound) =
                match solve_relaxation(model, &node.lower, &node.upper, iteration_limit)? {
                    Relaxation::Infeasible => continue,
                    Relaxation::Optimal { values, objective } => (values, objective),
                };

            if let Some(best) = &incumbent {
                if bound <= best.objective() + IMPROVEMENT_EPSILON {
                    continue;
                }
            }

            match branching_variable(model, &values) {
                None => {
                    let rounded = round_integers(model, values);
                    if !model.is_feasible(&rounded, FEASIBILITY_TOLERANCE) {
                        warn!("discarding integral relaxation that fails the model after rounding");
                        continue;
                    }
                    let objective = model.objective().evaluate(&rounded);
                    let improves = incumbent
                        .as_ref()
                        .map_or(true, |best| objective > best.objective() + IMPROVEMENT_EPSILON);
                    if improves {
                        debug!("new incumbent {objective:.4} at node {explored}");
                        incumbent = Some(Assignment::new(rounded, objective));
                    }
                }
                Some(j) => {
                    let v = values[j];
                    let mut down = node.clone();
                    down.upper[j] = v.floor();
                    let mut up = node;
                    up.lower[j] = v.ceil();
                    // Stack order: the up branch is popped first.
                    stack.push(down);
                    stack.push(up);
                }
            }
        }

        debug!(
            "branch-and-bound finished: {explored} nodes in {:?}",
            started.elapsed()
        );
        incumbent.ok_or(SolveError::Infeasible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::model::{LinExpr, Sense};

    #[test]
    fn solves_small_knapsack_exactly() {
        // max 10a + 7b + 6c  s.t. 6a + 4b + 3c <= 7; the best item alone loses to b + c.
        let mut m = Model::new();
        let a = m.binary();
        let b = m.binary();
        let c = m.binary();
        m.maximize(LinExpr::new().term(a, 10.0).term(b, 7.0).term(c, 6.0));
        m.constrain(
            "weight",
            LinExpr::new().term(a, 6.0).term(b, 4.0).term(c, 3.0),
            Sense::Le,
            7.0,
        );

        let sol = BranchAndBound::default().solve(&m).unwrap();
        assert!(!sol.is_set(a));
        assert!(sol.is_set(b));
        assert!(sol.is_set(c));
        assert!((sol.objective() - 13.0).abs() < 1e-6);
    }

    #[test]
    fn general_integer_with_equality() {
        // max 3x + 2y  s.t. x + y == 4, 2x + y <= 6.5, x, y in 0..=4
        let mut m = Model::new();
        let x = m.integer(0.0, 4.0);
        let y = m.integer(0.0, 4.0);
        m.maximize(LinExpr::new().term(x, 3.0).term(y, 2.0));
        m.constrain("sum", LinExpr::new().term(x, 1.0).term(y, 1.0), Sense::Eq, 4.0);
        m.constrain("cap", LinExpr::new().term(x, 2.0).term(y, 1.0), Sense::Le, 6.5);

        let sol = BranchAndBound::default().solve(&m).unwrap();
        assert_eq!(sol.value(x), 2.0);
        assert_eq!(sol.value(y), 2.0);
    }

    #[test]
    fn infeasible_model() {
        let mut m = Model::new();
        let x = m.binary();
        let y = m.binary();
        m.maximize(LinExpr::new().term(x, 1.0));
        m.constrain("two", LinExpr::new().term(x, 1.0).term(y, 1.0), Sense::Eq, 1.5);

        assert_eq!(
            BranchAndBound::default().solve(&m),
            Err(SolveError::Infeasible)
        );
    }

    #[test]
    fn equal_optima_pick_lowest_index_first() {
        // Any one of three identical items is optimal.
        let mut m = Model::new();
        let items: Vec<_> = (0..3).map(|_| m.binary()).collect();
        m.maximize(items.iter().map(|&v| (v, 5.0)).collect());
        m.constrain(
            "one",
            items.iter().map(|&v| (v, 1.0)).collect(),
            Sense::Le,
            1.0,
        );

        let first = BranchAndBound::default().solve(&m).unwrap();
        let second = BranchAndBound::default().solve(&m).unwrap();
        assert_eq!(first, second);
        assert_eq!(items.iter().filter(|&&v| first.is_set(v)).count(), 1);
    }

    #[test]
    fn node_budget_exhaustion_is_a_timeout() {
        let mut m = Model::new();
        let a = m.binary();
        let b = m.binary();
        m.maximize(LinExpr::new().term(a, 3.0).term(b, 2.0));
        m.constrain("cap", LinExpr::new().term(a, 2.0).term(b, 2.0), Sense::Le, 3.0);

        let solver = BranchAndBound::default().with_node_limit(0);
        assert_eq!(solver.solve(&m), Err(SolveError::Timeout { limit_ms: 10_000 }));
    }
}
