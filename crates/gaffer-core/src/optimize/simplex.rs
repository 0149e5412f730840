// Bounded-variable primal simplex used for LP relaxations.
//
// Variables are shifted so every lower bound is zero. Upper bounds are
// handled by complementing columns (x -> u - x) instead of extra rows, so a
// nonbasic column always sits at zero in the current orientation. Phase 1
// drives artificials to zero, phase 2 minimizes the negated objective.

use super::model::{Model, Sense, SolveError};

const COST_EPSILON: f64 = 1e-9;
const PIVOT_EPSILON: f64 = 1e-9;
const FEASIBILITY_EPSILON: f64 = 1e-7;
const PHASE_ONE_TOLERANCE: f64 = 1e-6;
const RATIO_TIE: f64 = 1e-12;
/// Consecutive degenerate steps before switching to Bland's rule.
const BLAND_AFTER_DEGENERATE: usize = 50;

/// Outcome of solving the continuous relaxation under node bounds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Relaxation {
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
}

enum Step {
    Flip,
    Pivot { row: usize, to_upper: bool },
    Unbounded,
}

struct Tableau {
    rows: Vec<Vec<f64>>,
    rhs: Vec<f64>,
    basis: Vec<usize>,
    is_basic: Vec<bool>,
    upper: Vec<f64>,
    flipped: Vec<bool>,
    reduced: Vec<f64>,
    enterable: Vec<bool>,
}

impl Tableau {
    fn new(rows: Vec<Vec<f64>>, rhs: Vec<f64>, basis: Vec<usize>, upper: Vec<f64>) -> Self {
        let ncols = upper.len();
        let mut is_basic = vec![false; ncols];
        for &b in &basis {
            is_basic[b] = true;
        }
        Self {
            rows,
            rhs,
            basis,
            is_basic,
            upper,
            flipped: vec![false; ncols],
            reduced: vec![0.0; ncols],
            enterable: vec![true; ncols],
        }
    }

    fn ncols(&self) -> usize {
        self.upper.len()
    }

    /// Recompute reduced costs for `cost`, given in the original column
    /// orientation.
    fn price_out(&mut self, cost: &[f64]) {
        let effective: Vec<f64> = cost
            .iter()
            .zip(&self.flipped)
            .map(|(&c, &f)| if f { -c } else { c })
            .collect();

        let mut reduced = effective.clone();
        for (row, &b) in self.rows.iter().zip(&self.basis) {
            let cb = effective[b];
            if cb != 0.0 {
                for (r, a) in reduced.iter_mut().zip(row) {
                    *r -= cb * a;
                }
            }
        }
        self.reduced = reduced;
    }

    fn entering(&self, bland: bool) -> Option<usize> {
        let candidates = (0..self.ncols())
            .filter(|&j| self.enterable[j] && !self.is_basic[j] && self.reduced[j] < -COST_EPSILON);
        if bland {
            candidates.min()
        } else {
            candidates.min_by(|&a, &b| self.reduced[a].total_cmp(&self.reduced[b]))
        }
    }

    fn ratio_test(&self, e: usize) -> (Step, f64) {
        let mut best = self.upper[e];
        let mut choice: Option<(usize, bool)> = None;

        for (i, row) in self.rows.iter().enumerate() {
            let a = row[e];
            let (t, to_upper) = if a > PIVOT_EPSILON {
                (self.rhs[i].max(0.0) / a, false)
            } else if a < -PIVOT_EPSILON {
                let u = self.upper[self.basis[i]];
                if !u.is_finite() {
                    continue;
                }
                ((u - self.rhs[i]).max(0.0) / -a, true)
            } else {
                continue;
            };

            let take = match choice {
                None => t <= best,
                Some((r, _)) => {
                    t < best - RATIO_TIE
                        || (t <= best + RATIO_TIE && self.basis[i] < self.basis[r])
                }
            };
            if take {
                best = t;
                choice = Some((i, to_upper));
            }
        }

        match choice {
            Some((row, to_upper)) => (Step::Pivot { row, to_upper }, best),
            None if best.is_finite() => (Step::Flip, best),
            None => (Step::Unbounded, best),
        }
    }

    /// Move nonbasic column `e` from zero to its upper bound by complementing it.
    fn flip(&mut self, e: usize) {
        let u = self.upper[e];
        for (row, rhs) in self.rows.iter_mut().zip(self.rhs.iter_mut()) {
            let a = row[e];
            if a != 0.0 {
                *rhs -= a * u;
                row[e] = -a;
            }
        }
        self.reduced[e] = -self.reduced[e];
        self.flipped[e] = !self.flipped[e];
    }

    /// Complement the basic variable of row `r` so it can leave at zero.
    fn complement_basic(&mut self, r: usize) {
        let k = self.basis[r];
        let u = self.upper[k];
        for (j, a) in self.rows[r].iter_mut().enumerate() {
            if j != k {
                *a = -*a;
            }
        }
        self.rhs[r] = u - self.rhs[r];
        self.flipped[k] = !self.flipped[k];
    }

    fn pivot(&mut self, r: usize, e: usize) {
        let p = self.rows[r][e];
        let pivot_row: Vec<f64> = self.rows[r].iter().map(|a| a / p).collect();
        let pivot_rhs = self.rhs[r] / p;

        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == r {
                continue;
            }
            let f = row[e];
            if f == 0.0 {
                continue;
            }
            for (a, pr) in row.iter_mut().zip(&pivot_row) {
                *a -= f * pr;
            }
            row[e] = 0.0;
            self.rhs[i] -= f * pivot_rhs;
            if self.rhs[i] < 0.0 && self.rhs[i] > -FEASIBILITY_EPSILON {
                self.rhs[i] = 0.0;
            }
        }

        let f = self.reduced[e];
        if f != 0.0 {
            for (d, pr) in self.reduced.iter_mut().zip(&pivot_row) {
                *d -= f * pr;
            }
            self.reduced[e] = 0.0;
        }

        self.rows[r] = pivot_row;
        self.rows[r][e] = 1.0;
        self.rhs[r] = pivot_rhs.max(0.0);
        self.is_basic[self.basis[r]] = false;
        self.is_basic[e] = true;
        self.basis[r] = e;
    }

    fn run(&mut self, iteration_limit: usize) -> Result<(), SolveError> {
        let mut degenerate = 0usize;
        for _ in 0..iteration_limit {
            let Some(e) = self.entering(degenerate >= BLAND_AFTER_DEGENERATE) else {
                return Ok(());
            };
            let (step, t) = self.ratio_test(e);
            match step {
                Step::Unbounded => {
                    return Err(SolveError::Numerical("unbounded relaxation".into()));
                }
                Step::Flip => self.flip(e),
                Step::Pivot { row, to_upper } => {
                    if to_upper {
                        self.complement_basic(row);
                    }
                    self.pivot(row, e);
                }
            }
            if t < FEASIBILITY_EPSILON {
                degenerate += 1;
            } else {
                degenerate = 0;
            }
        }
        Err(SolveError::Numerical(format!(
            "simplex iteration limit of {iteration_limit} reached"
        )))
    }

    /// After phase 1: pivot zero-valued artificials out of the basis where
    /// possible and pin every artificial at zero.
    fn retire_artificials(&mut self, art_start: usize) {
        for i in 0..self.rows.len() {
            if self.basis[i] < art_start {
                continue;
            }
            let candidate = (0..art_start)
                .filter(|&j| !self.is_basic[j] && self.rows[i][j].abs() > FEASIBILITY_EPSILON)
                .max_by(|&a, &b| self.rows[i][a].abs().total_cmp(&self.rows[i][b].abs()));
            if let Some(j) = candidate {
                self.pivot(i, j);
            }
            // Otherwise the row is redundant and its artificial stays basic at zero.
        }
        for j in art_start..self.ncols() {
            self.enterable[j] = false;
            self.upper[j] = 0.0;
        }
    }
}

/// Solve the LP relaxation of `model` with per-variable bounds overridden by
/// `lower` / `upper` (used by branch-and-bound nodes).
pub(crate) fn solve_relaxation(
    model: &Model,
    lower: &[f64],
    upper: &[f64],
    iteration_limit: usize,
) -> Result<Relaxation, SolveError> {
    let n = model.vars().len();
    if lower.len() != n || upper.len() != n {
        return Err(SolveError::Numerical("bound vectors do not match the model".into()));
    }
    if (0..n).any(|j| upper[j] < lower[j] - FEASIBILITY_EPSILON) {
        return Ok(Relaxation::Infeasible);
    }

    // Columns only for variables that are not fixed by their bounds.
    let mut column_of: Vec<Option<usize>> = vec![None; n];
    let mut structural: Vec<usize> = Vec::new();
    for j in 0..n {
        if upper[j] - lower[j] > FEASIBILITY_EPSILON {
            column_of[j] = Some(structural.len());
            structural.push(j);
        }
    }
    let s = structural.len();

    // Dense rows with non-negative right-hand sides.
    let mut dense: Vec<(Vec<f64>, Sense, f64)> = Vec::with_capacity(model.constraints().len());
    for c in model.constraints() {
        let mut row = vec![0.0; s];
        let mut rhs = c.rhs - c.expr.constant();
        for &(v, coef) in c.expr.terms() {
            let j = v.index();
            rhs -= coef * lower[j];
            if let Some(col) = column_of[j] {
                row[col] += coef;
            }
        }
        let mut sense = c.sense;
        if rhs < 0.0 {
            row.iter_mut().for_each(|a| *a = -*a);
            rhs = -rhs;
            sense = match sense {
                Sense::Le => Sense::Ge,
                Sense::Ge => Sense::Le,
                Sense::Eq => Sense::Eq,
            };
        }
        dense.push((row, sense, rhs));
    }

    let m = dense.len();
    let n_slack = dense.iter().filter(|(_, sense, _)| *sense != Sense::Eq).count();
    let n_art = dense.iter().filter(|(_, sense, _)| *sense != Sense::Le).count();
    let art_start = s + n_slack;
    let ncols = art_start + n_art;

    let mut rows = vec![vec![0.0; ncols]; m];
    let mut rhs = vec![0.0; m];
    let mut basis = vec![0usize; m];
    let mut col_upper = vec![f64::INFINITY; ncols];
    for (col, &j) in structural.iter().enumerate() {
        col_upper[col] = upper[j] - lower[j];
    }

    let mut next_slack = s;
    let mut next_art = art_start;
    for (i, (row, sense, b)) in dense.into_iter().enumerate() {
        rows[i][..s].copy_from_slice(&row);
        rhs[i] = b;
        match sense {
            Sense::Le => {
                rows[i][next_slack] = 1.0;
                basis[i] = next_slack;
                next_slack += 1;
            }
            Sense::Ge => {
                rows[i][next_slack] = -1.0;
                next_slack += 1;
                rows[i][next_art] = 1.0;
                basis[i] = next_art;
                next_art += 1;
            }
            Sense::Eq => {
                rows[i][next_art] = 1.0;
                basis[i] = next_art;
                next_art += 1;
            }
        }
    }

    let mut tableau = Tableau::new(rows, rhs, basis, col_upper);

    // Phase 1
    if n_art > 0 {
        let cost: Vec<f64> = (0..ncols)
            .map(|j| if j >= art_start { 1.0 } else { 0.0 })
            .collect();
        tableau.price_out(&cost);
        tableau.run(iteration_limit)?;

        let infeasibility: f64 = tableau
            .basis
            .iter()
            .zip(&tableau.rhs)
            .filter(|(&b, _)| b >= art_start)
            .map(|(_, &v)| v)
            .sum();
        if infeasibility > PHASE_ONE_TOLERANCE {
            return Ok(Relaxation::Infeasible);
        }
        tableau.retire_artificials(art_start);
    }

    // Phase 2: minimize the negated objective.
    let mut cost = vec![0.0; ncols];
    for &(v, coef) in model.objective().terms() {
        if let Some(col) = column_of[v.index()] {
            cost[col] -= coef;
        }
    }
    tableau.price_out(&cost);
    tableau.run(iteration_limit)?;

    let mut column_value = vec![0.0; s];
    for (&b, &v) in tableau.basis.iter().zip(&tableau.rhs) {
        if b < s {
            column_value[b] = v;
        }
    }

    let mut values = lower.to_vec();
    for (col, &j) in structural.iter().enumerate() {
        let u = tableau.upper[col];
        let y = if tableau.flipped[col] {
            u - column_value[col]
        } else {
            column_value[col]
        };
        values[j] = lower[j] + y.clamp(0.0, u);
    }

    let objective = model.objective().evaluate(&values);
    Ok(Relaxation::Optimal { values, objective })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::model::{LinExpr, Model, Sense};

    fn bounds(model: &Model) -> (Vec<f64>, Vec<f64>) {
        (
            model.vars().iter().map(|v| v.lower).collect(),
            model.vars().iter().map(|v| v.upper).collect(),
        )
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn fractional_knapsack_relaxation() {
        // max 10a + 6b + 4c  s.t. 5a + 4b + 3c <= 7, all in [0, 1]
        let mut m = Model::new();
        let a = m.continuous(0.0, 1.0);
        let b = m.continuous(0.0, 1.0);
        let c = m.continuous(0.0, 1.0);
        m.maximize(LinExpr::new().term(a, 10.0).term(b, 6.0).term(c, 4.0));
        m.constrain(
            "weight",
            LinExpr::new().term(a, 5.0).term(b, 4.0).term(c, 3.0),
            Sense::Le,
            7.0,
        );

        let (lo, hi) = bounds(&m);
        match solve_relaxation(&m, &lo, &hi, 1_000).unwrap() {
            Relaxation::Optimal { values, objective } => {
                // Ratios: a 2.0, b 1.5, c 1.33 -> a = 1, b = 0.5
                assert!(approx_eq(values[0], 1.0));
                assert!(approx_eq(values[1], 0.5));
                assert!(approx_eq(values[2], 0.0));
                assert!(approx_eq(objective, 13.0));
            }
            other => panic!("expected optimum, got {other:?}"),
        }
    }

    #[test]
    fn equality_and_ge_rows() {
        // max x + 2y  s.t. x + y == 3, x >= 1, x in [0, 5], y in [0, 1.5]
        let mut m = Model::new();
        let x = m.continuous(0.0, 5.0);
        let y = m.continuous(0.0, 1.5);
        m.maximize(LinExpr::new().term(x, 1.0).term(y, 2.0));
        m.constrain("sum", LinExpr::new().term(x, 1.0).term(y, 1.0), Sense::Eq, 3.0);
        m.constrain("floor", LinExpr::new().term(x, 1.0), Sense::Ge, 1.0);

        let (lo, hi) = bounds(&m);
        match solve_relaxation(&m, &lo, &hi, 1_000).unwrap() {
            Relaxation::Optimal { values, objective } => {
                assert!(approx_eq(values[0], 1.5));
                assert!(approx_eq(values[1], 1.5));
                assert!(approx_eq(objective, 4.5));
            }
            other => panic!("expected optimum, got {other:?}"),
        }
    }

    #[test]
    fn detects_infeasible_rows() {
        let mut m = Model::new();
        let x = m.continuous(0.0, 1.0);
        let y = m.continuous(0.0, 1.0);
        m.maximize(LinExpr::new().term(x, 1.0));
        m.constrain("too_many", LinExpr::new().term(x, 1.0).term(y, 1.0), Sense::Ge, 3.0);

        let (lo, hi) = bounds(&m);
        assert_eq!(
            solve_relaxation(&m, &lo, &hi, 1_000).unwrap(),
            Relaxation::Infeasible
        );
    }

    #[test]
    fn respects_node_bounds() {
        // Fixing x to 1 through the bounds moves it into the right-hand side.
        let mut m = Model::new();
        let x = m.continuous(0.0, 1.0);
        let y = m.continuous(0.0, 1.0);
        m.maximize(LinExpr::new().term(x, 1.0).term(y, 3.0));
        m.constrain("one", LinExpr::new().term(x, 1.0).term(y, 1.0), Sense::Le, 1.0);

        let lo = vec![1.0, 0.0];
        let hi = vec![1.0, 1.0];
        match solve_relaxation(&m, &lo, &hi, 1_000).unwrap() {
            Relaxation::Optimal { values, objective } => {
                assert!(approx_eq(values[0], 1.0));
                assert!(approx_eq(values[1], 0.0));
                assert!(approx_eq(objective, 1.0));
            }
            other => panic!("expected optimum, got {other:?}"),
        }

        let crossed = vec![1.0, 0.0];
        let low_hi = vec![0.0, 1.0];
        assert_eq!(
            solve_relaxation(&m, &crossed, &low_hi, 1_000).unwrap(),
            Relaxation::Infeasible
        );
    }
}
