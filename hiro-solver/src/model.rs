use crate::{
    branch::{self, SolveOutcome, SolverParams},
    callback::LazyCallback,
    error::SolverError,
};
use std::{collections::BTreeMap, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(pub(crate) usize);

impl Var {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// A sum of `coefficient * variable` terms. The same variable may appear more
/// than once; terms are merged before they reach the LP engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(Var, f64)>,
}

impl LinExpr {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn add(&mut self, var: Var, coeff: f64) -> &mut Self {
        self.terms.push((var, coeff));
        self
    }

    pub fn with(mut self, var: Var, coeff: f64) -> Self {
        self.terms.push((var, coeff));
        self
    }

    pub fn terms(&self) -> &[(Var, f64)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coeff)| coeff * values.get(var.0).copied().unwrap_or(0.0))
            .sum()
    }

    pub(crate) fn merged(&self) -> Vec<(Var, f64)> {
        let mut merged: BTreeMap<Var, f64> = BTreeMap::new();
        for &(var, coeff) in &self.terms {
            *merged.entry(var).or_insert(0.0) += coeff;
        }
        merged.into_iter().filter(|&(_, c)| c != 0.0).collect()
    }
}

impl FromIterator<(Var, f64)> for LinExpr {
    fn from_iter<I: IntoIterator<Item = (Var, f64)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

impl Extend<(Var, f64)> for LinExpr {
    fn extend<I: IntoIterator<Item = (Var, f64)>>(&mut self, iter: I) {
        self.terms.extend(iter);
    }
}

/// A range row `lower <= expr <= upper`. Either side may be infinite.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub expr: LinExpr,
    pub lower: f64,
    pub upper: f64,
}

impl Constraint {
    pub fn range(expr: LinExpr, lower: f64, upper: f64) -> Self {
        Self { expr, lower, upper }
    }

    pub fn le(expr: LinExpr, upper: f64) -> Self {
        Self::range(expr, f64::NEG_INFINITY, upper)
    }

    pub fn ge(expr: LinExpr, lower: f64) -> Self {
        Self::range(expr, lower, f64::INFINITY)
    }

    pub fn eq(expr: LinExpr, value: f64) -> Self {
        Self::range(expr, value, value)
    }

    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let activity = self.expr.evaluate(values);
        activity >= self.lower - tolerance && activity <= self.upper + tolerance
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct VarDef {
    pub(crate) kind: VarKind,
    pub(crate) lower: f64,
    pub(crate) upper: f64,
}

pub struct Model {
    sense: Sense,
    vars: Vec<VarDef>,
    constraints: Vec<Constraint>,
    objective: LinExpr,
    lazy: Option<Box<dyn LazyCallback>>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("sense", &self.sense)
            .field("num_vars", &self.vars.len())
            .field("num_constraints", &self.constraints.len())
            .field("lazy_callback", &self.lazy.is_some())
            .finish()
    }
}

impl Model {
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            vars: Vec::new(),
            constraints: Vec::new(),
            objective: LinExpr::new(),
            lazy: None,
        }
    }

    /// Binary variables are clipped to `[0, 1]`.
    pub fn add_var(&mut self, kind: VarKind, lower: f64, upper: f64) -> Var {
        let (lower, upper) = match kind {
            VarKind::Continuous => (lower, upper),
            VarKind::Binary => (lower.max(0.0).ceil(), upper.min(1.0).floor()),
        };
        self.vars.push(VarDef { kind, lower, upper });
        Var(self.vars.len() - 1)
    }

    pub fn add_binary(&mut self) -> Var {
        self.add_var(VarKind::Binary, 0.0, 1.0)
    }

    pub fn add_continuous(&mut self, lower: f64, upper: f64) -> Var {
        self.add_var(VarKind::Continuous, lower, upper)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn set_objective(&mut self, objective: LinExpr) {
        self.objective = objective;
    }

    /// Registers the callback invoked on every integral candidate. Only one
    /// callback may be registered per model.
    pub fn set_lazy_callback(&mut self, callback: Box<dyn LazyCallback>) -> Result<(), SolverError> {
        if self.lazy.is_some() {
            return Err(SolverError::CallbackAlreadyRegistered);
        }
        self.lazy = Some(callback);
        Ok(())
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    pub fn var_kind(&self, var: Var) -> Option<VarKind> {
        self.vars.get(var.0).map(|def| def.kind)
    }

    /// Solves the model. Lazy cuts found during the search stay in the model.
    pub fn solve(&mut self, params: &SolverParams) -> Result<SolveOutcome, SolverError> {
        self.validate()?;
        let mut callback = self.lazy.take();
        let result = branch::solve(self, callback.as_mut().map(|cb| &mut **cb as &mut dyn LazyCallback), params);
        self.lazy = callback;
        result
    }

    pub(crate) fn var_defs(&self) -> &[VarDef] {
        &self.vars
    }

    pub(crate) fn objective_coefficients(&self) -> Vec<f64> {
        let mut coeffs = vec![0.0; self.vars.len()];
        for (var, coeff) in self.objective.merged() {
            coeffs[var.0] += coeff;
        }
        coeffs
    }

    pub(crate) fn push_cut(&mut self, cut: Constraint) -> Result<(), SolverError> {
        self.check_vars(&cut.expr)?;
        self.constraints.push(cut);
        Ok(())
    }

    fn check_vars(&self, expr: &LinExpr) -> Result<(), SolverError> {
        match expr.terms().iter().find(|(var, _)| var.0 >= self.vars.len()) {
            Some(&(var, _)) => Err(SolverError::UnknownVariable(var)),
            None => Ok(()),
        }
    }

    fn validate(&self) -> Result<(), SolverError> {
        self.check_vars(&self.objective)?;
        for constraint in &self.constraints {
            self.check_vars(&constraint.expr)?;
            if constraint.lower > constraint.upper {
                return Err(SolverError::Infeasible);
            }
            if constraint.expr.merged().is_empty() && !(constraint.lower <= 0.0 && constraint.upper >= 0.0) {
                return Err(SolverError::Infeasible);
            }
        }
        if self.vars.iter().any(|def| def.lower > def.upper) {
            return Err(SolverError::Infeasible);
        }
        Ok(())
    }
}
