use crate::{
    callback::{Candidate, LazyCallback},
    error::SolverError,
    model::{Constraint, Model, Sense, Var, VarKind},
};
use microlp::{ComparisonOp, OptimizationDirection, Problem, Solution, Variable};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SolverParams {
    pub time_limit: Option<Duration>,
    pub node_limit: Option<u64>,
    pub integrality_tolerance: f64,
    pub optimality_gap: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            time_limit: None,
            node_limit: None,
            integrality_tolerance: 1e-6,
            optimality_gap: 1e-9,
        }
    }
}

impl SolverParams {
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    pub fn with_node_limit(mut self, node_limit: u64) -> Self {
        self.node_limit = Some(node_limit);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    TimeLimit,
    NodeLimit,
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    status: SolveStatus,
    objective: f64,
    best_bound: f64,
    values: Vec<f64>,
    nodes: u64,
    lazy_cuts: usize,
}

impl SolveOutcome {
    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// Best proven bound on the objective; equals `objective()` when optimal.
    pub fn best_bound(&self) -> f64 {
        self.best_bound
    }

    pub fn value(&self, var: Var) -> Option<f64> {
        self.values.get(var.index()).copied().filter(|v| v.is_finite())
    }

    pub fn require(&self, var: Var) -> Result<f64, SolverError> {
        self.value(var).ok_or(SolverError::ValueUnavailable(var))
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of branch-and-bound nodes whose relaxation was solved.
    pub fn nodes(&self) -> u64 {
        self.nodes
    }

    pub fn lazy_cuts(&self) -> usize {
        self.lazy_cuts
    }
}

struct Node {
    lower: Vec<f64>,
    upper: Vec<f64>,
    // parent relaxation value, in minimisation form
    bound: f64,
}

pub(crate) fn solve(
    model: &mut Model,
    mut callback: Option<&mut dyn LazyCallback>,
    params: &SolverParams,
) -> Result<SolveOutcome, SolverError> {
    let start = Instant::now();
    let sense = model.sense();
    let mut stack = vec![Node {
        lower: model.var_defs().iter().map(|def| def.lower).collect(),
        upper: model.var_defs().iter().map(|def| def.upper).collect(),
        bound: f64::NEG_INFINITY,
    }];
    let mut incumbent: Option<(f64, Vec<f64>)> = None;
    let mut nodes = 0u64;
    let mut lazy_cuts = 0usize;
    let mut status = SolveStatus::Optimal;

    while let Some(node) = stack.pop() {
        if params.time_limit.is_some_and(|limit| start.elapsed() >= limit) {
            stack.push(node);
            status = SolveStatus::TimeLimit;
            break;
        }
        if params.node_limit.is_some_and(|limit| nodes >= limit) {
            stack.push(node);
            status = SolveStatus::NodeLimit;
            break;
        }
        if is_dominated(node.bound, &incumbent, params) {
            continue;
        }
        nodes += 1;

        let Some((mut solution, lp_vars)) = relax(model, &node.lower, &node.upper)? else {
            continue;
        };
        loop {
            let objective = to_min_form(sense, solution.objective());
            if is_dominated(objective, &incumbent, params) {
                break;
            }
            let values: Vec<f64> = lp_vars.iter().map(|&v| solution[v]).collect();
            if let Some(index) = branching_index(model, &values, params.integrality_tolerance) {
                let value = values[index];
                let mut down = Node {
                    lower: node.lower.clone(),
                    upper: node.upper.clone(),
                    bound: objective,
                };
                down.upper[index] = value.floor();
                let mut up = Node {
                    lower: node.lower.clone(),
                    upper: node.upper.clone(),
                    bound: objective,
                };
                up.lower[index] = value.ceil();
                stack.push(down);
                stack.push(up);
                break;
            }

            let values = snap_integral(model, values);
            let cuts = match callback.as_mut() {
                Some(cb) => cb.on_candidate(&Candidate::new(&values, from_min_form(sense, objective)))?,
                None => Vec::new(),
            };
            if cuts.is_empty() {
                trace!(objective = from_min_form(sense, objective), nodes, "new incumbent");
                incumbent = Some((objective, values));
                break;
            }
            if cuts.iter().all(|cut| cut.is_satisfied(&values, params.integrality_tolerance)) {
                return Err(SolverError::Callback(
                    "lazy cuts do not separate the current candidate".to_string(),
                ));
            }

            lazy_cuts += cuts.len();
            let first = model.num_constraints();
            for cut in cuts {
                model.push_cut(cut)?;
            }
            solution = match apply_cuts(solution, &lp_vars, &model.constraints()[first..])? {
                Some(solution) => solution,
                None => break,
            };
        }
    }

    let Some((objective, values)) = incumbent else {
        return match status {
            SolveStatus::Optimal => Err(SolverError::Infeasible),
            _ => Err(SolverError::NoIncumbent { nodes }),
        };
    };
    let best_bound = stack.iter().map(|node| node.bound).fold(objective, f64::min);
    debug!(?status, nodes, lazy_cuts, objective = from_min_form(sense, objective), "search finished");
    Ok(SolveOutcome {
        status,
        objective: from_min_form(sense, objective),
        best_bound: from_min_form(sense, best_bound),
        values,
        nodes,
        lazy_cuts,
    })
}

fn is_dominated(bound: f64, incumbent: &Option<(f64, Vec<f64>)>, params: &SolverParams) -> bool {
    match incumbent {
        Some((best, _)) => bound >= best - params.optimality_gap,
        None => false,
    }
}

fn to_min_form(sense: Sense, objective: f64) -> f64 {
    match sense {
        Sense::Minimize => objective,
        Sense::Maximize => -objective,
    }
}

fn from_min_form(sense: Sense, objective: f64) -> f64 {
    to_min_form(sense, objective)
}

/// Most fractional binary variable, lowest index on ties.
fn branching_index(model: &Model, values: &[f64], tolerance: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, def) in model.var_defs().iter().enumerate() {
        if def.kind != VarKind::Binary {
            continue;
        }
        let fraction = values[index] - values[index].floor();
        let distance = fraction.min(1.0 - fraction);
        if distance > tolerance && best.map_or(true, |(_, d)| distance > d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

fn snap_integral(model: &Model, mut values: Vec<f64>) -> Vec<f64> {
    for (value, def) in values.iter_mut().zip(model.var_defs()) {
        if def.kind == VarKind::Binary {
            *value = value.round();
        }
    }
    values
}

fn relax(model: &Model, lower: &[f64], upper: &[f64]) -> Result<Option<(Solution, Vec<Variable>)>, SolverError> {
    let direction = match model.sense() {
        Sense::Minimize => OptimizationDirection::Minimize,
        Sense::Maximize => OptimizationDirection::Maximize,
    };
    let mut problem = Problem::new(direction);
    let lp_vars: Vec<Variable> = model
        .objective_coefficients()
        .into_iter()
        .enumerate()
        .map(|(index, coeff)| problem.add_var(coeff, (lower[index], upper[index])))
        .collect();
    for constraint in model.constraints() {
        let terms = lp_terms(&lp_vars, constraint);
        if terms.is_empty() {
            continue;
        }
        for (op, rhs) in row_sides(constraint) {
            problem.add_constraint(terms.clone(), op, rhs);
        }
    }
    match problem.solve() {
        Ok(solution) => Ok(Some((solution, lp_vars))),
        Err(microlp::Error::Infeasible) => Ok(None),
        Err(microlp::Error::Unbounded) => Err(SolverError::Unbounded),
        Err(other) => Err(SolverError::Lp(other.to_string())),
    }
}

fn apply_cuts(mut solution: Solution, lp_vars: &[Variable], cuts: &[Constraint]) -> Result<Option<Solution>, SolverError> {
    for cut in cuts {
        let terms = lp_terms(lp_vars, cut);
        for (op, rhs) in row_sides(cut) {
            solution = match solution.add_constraint(terms.clone(), op, rhs) {
                Ok(solution) => solution,
                Err(microlp::Error::Infeasible) => return Ok(None),
                Err(other) => return Err(SolverError::Lp(other.to_string())),
            };
        }
    }
    Ok(Some(solution))
}

fn lp_terms(lp_vars: &[Variable], constraint: &Constraint) -> Vec<(Variable, f64)> {
    constraint
        .expr
        .merged()
        .into_iter()
        .map(|(var, coeff)| (lp_vars[var.index()], coeff))
        .collect()
}

fn row_sides(constraint: &Constraint) -> Vec<(ComparisonOp, f64)> {
    if constraint.lower == constraint.upper {
        return vec![(ComparisonOp::Eq, constraint.upper)];
    }
    let mut sides = Vec::with_capacity(2);
    if constraint.lower.is_finite() {
        sides.push((ComparisonOp::Ge, constraint.lower));
    }
    if constraint.upper.is_finite() {
        sides.push((ComparisonOp::Le, constraint.upper));
    }
    sides
}
