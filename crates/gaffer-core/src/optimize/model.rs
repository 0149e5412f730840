// Solver-agnostic mixed-integer linear model.
//
// Engines describe a problem as bounded variables, one linear objective to
// maximize and linear (in)equality constraints. Any `Solver` can then turn
// the model into an `Assignment`.

use thiserror::Error;

/// Handle to a model variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(usize);

impl Var {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarDef {
    pub lower: f64,
    pub upper: f64,
    pub integer: bool,
}

/// A linear expression `sum(coef * var) + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(Var, f64)>,
    constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, var: Var, coef: f64) -> Self {
        self.add_term(var, coef);
        self
    }

    pub fn add_term(&mut self, var: Var, coef: f64) {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn terms(&self) -> &[(Var, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(v, c)| c * values[v.0])
                .sum::<f64>()
    }
}

impl FromIterator<(Var, f64)> for LinExpr {
    fn from_iter<I: IntoIterator<Item = (Var, f64)>>(iter: I) -> Self {
        let mut expr = LinExpr::new();
        for (v, c) in iter {
            expr.add_term(v, c);
        }
        expr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    /// Whether `values` satisfy the constraint within `tolerance`.
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tolerance,
            Sense::Ge => lhs >= self.rhs - tolerance,
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// A maximization problem over bounded, optionally integer, variables.
#[derive(Debug, Clone, Default)]
pub struct Model {
    vars: Vec<VarDef>,
    objective: LinExpr,
    constraints: Vec<Constraint>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// A 0/1 decision variable.
    pub fn binary(&mut self) -> Var {
        self.integer(0.0, 1.0)
    }

    pub fn integer(&mut self, lower: f64, upper: f64) -> Var {
        self.add_var(VarDef {
            lower,
            upper,
            integer: true,
        })
    }

    pub fn continuous(&mut self, lower: f64, upper: f64) -> Var {
        self.add_var(VarDef {
            lower,
            upper,
            integer: false,
        })
    }

    fn add_var(&mut self, def: VarDef) -> Var {
        self.vars.push(def);
        Var(self.vars.len() - 1)
    }

    pub fn maximize(&mut self, objective: LinExpr) {
        self.objective = objective;
    }

    pub fn constrain(&mut self, name: impl Into<String>, expr: LinExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            expr,
            sense,
            rhs,
        });
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Whether `values` respect every bound, integrality and constraint.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        values.len() == self.vars.len()
            && self.vars.iter().zip(values).all(|(def, &v)| {
                v >= def.lower - tolerance
                    && v <= def.upper + tolerance
                    && (!def.integer || (v - v.round()).abs() <= tolerance)
            })
            && self
                .constraints
                .iter()
                .all(|c| c.is_satisfied(values, tolerance))
    }
}

/// Values chosen for every variable of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    values: Vec<f64>,
    objective: f64,
}

impl Assignment {
    pub fn new(values: Vec<f64>, objective: f64) -> Self {
        Self { values, objective }
    }

    pub fn value(&self, var: Var) -> f64 {
        self.values[var.0]
    }

    /// Binary reading of a variable.
    pub fn is_set(&self, var: Var) -> bool {
        self.values[var.0] > 0.5
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("model has no feasible assignment")]
    Infeasible,

    #[error("no proven optimum within {limit_ms} ms")]
    Timeout { limit_ms: u64 },

    #[error("numerical failure: {0}")]
    Numerical(String),
}

/// Build model / solve / extract assignment. Implementations must be
/// deterministic for a given model.
pub trait Solver {
    fn solve(&self, model: &Model) -> Result<Assignment, SolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_evaluation_and_feasibility() {
        let mut m = Model::new();
        let x = m.binary();
        let y = m.integer(0.0, 3.0);
        let expr = LinExpr::new().term(x, 2.0).term(y, 1.0);
        m.constrain("cap", expr.clone(), Sense::Le, 4.0);
        m.maximize(expr);

        assert!(m.is_feasible(&[1.0, 2.0], 1e-9));
        assert!(!m.is_feasible(&[1.0, 3.0], 1e-9));
        assert!(!m.is_feasible(&[0.5, 1.0], 1e-9));
        assert_eq!(m.objective().evaluate(&[1.0, 2.0]), 4.0);
    }

    #[test]
    fn zero_coefficients_are_dropped() {
        let mut m = Model::new();
        let x = m.binary();
        let expr: LinExpr = [(x, 0.0), (x, 1.5)].into_iter().collect();
        assert_eq!(expr.terms().len(), 1);
    }
}
