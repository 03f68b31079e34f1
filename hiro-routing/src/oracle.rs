use crate::cycles::{decompose_cycles, subtour_cuts, tour_from_solution, ArcAssignment};
use hiro_generator::{GeneratorError, Oracle, OracleSolution, Relaxation, RelaxationRow};
use hiro_solver::{
    Candidate, Constraint, LazyCallback, LinExpr, Model, Sense, SolverError, SolverParams, Var,
};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Node count behind `num_elements = nodes²`.
pub fn num_nodes(num_elements: usize) -> Result<usize, GeneratorError> {
    let nodes = (num_elements as f64).sqrt().round() as usize;
    if nodes == 0 || nodes * nodes != num_elements {
        return Err(GeneratorError::Configuration(format!(
            "routing needs a positive square element count, got {}",
            num_elements
        )));
    }
    Ok(nodes)
}

/// Rejects integral candidates that split into several cycles, adding one
/// elimination row per cycle.
pub struct SubtourCallback {
    arcs: Vec<Vec<Option<Var>>>,
}

impl SubtourCallback {
    pub fn new(arcs: Vec<Vec<Option<Var>>>) -> Self {
        Self { arcs }
    }

    fn assignment(&self, candidate: &Candidate<'_>) -> Result<ArcAssignment, SolverError> {
        let num_nodes = self.arcs.len();
        let mut values = vec![0.0; num_nodes * num_nodes];
        for (i, row) in self.arcs.iter().enumerate() {
            for (j, arc) in row.iter().enumerate() {
                if let Some(var) = arc {
                    values[i * num_nodes + j] = candidate.require(*var)?;
                }
            }
        }
        ArcAssignment::from_values(num_nodes, &values).map_err(|e| SolverError::Callback(e.to_string()))
    }
}

impl LazyCallback for SubtourCallback {
    fn on_candidate(&mut self, candidate: &Candidate<'_>) -> Result<Vec<Constraint>, SolverError> {
        let assignment = self.assignment(candidate)?;
        let cycles = decompose_cycles(&assignment).map_err(|e| SolverError::Callback(e.to_string()))?;
        let cuts = subtour_cuts(&cycles);
        if !cuts.is_empty() {
            trace!(
                "candidate {:.6} splits into {} cycles",
                candidate.objective(),
                cycles.len()
            );
        }
        cuts.into_iter()
            .map(|cut| {
                let expr = cut
                    .arcs
                    .iter()
                    .map(|&(from, to)| {
                        self.arcs[from][to]
                            .map(|var| (var, 1.0))
                            .ok_or_else(|| SolverError::Callback(format!("no variable for arc {}->{}", from, to)))
                    })
                    .collect::<Result<LinExpr, _>>()?;
                Ok(Constraint::le(expr, cut.rhs as f64))
            })
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoutingSolution {
    pub oracle: OracleSolution,
    pub tour: Vec<usize>,
    pub lazy_cuts: usize,
}

/// Minimax cyclic routing: one Hamiltonian tour minimising the worst
/// scenario cost, with subtours removed lazily.
#[derive(Debug, Clone, Default)]
pub struct RoutingOracle {
    params: SolverParams,
}

impl RoutingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: SolverParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn solve_routing(&self, costs: ArrayView2<'_, f64>) -> Result<RoutingSolution, GeneratorError> {
        let nodes = num_nodes(costs.ncols())?;
        if nodes < 2 {
            return Err(GeneratorError::OracleInfeasible);
        }

        let mut model = Model::new(Sense::Minimize);
        let arcs: Vec<Vec<Option<Var>>> = (0..nodes)
            .map(|i| {
                (0..nodes)
                    .map(|j| (i != j).then(|| model.add_binary()))
                    .collect()
            })
            .collect();
        let z = model.add_continuous(0.0, f64::INFINITY);

        for scenario in costs.rows() {
            let mut row = LinExpr::new().with(z, 1.0);
            for (i, targets) in arcs.iter().enumerate() {
                for (j, arc) in targets.iter().enumerate() {
                    if let Some(var) = arc {
                        row.add(*var, -scenario[i * nodes + j]);
                    }
                }
            }
            model.add_constraint(Constraint::ge(row, 0.0));
        }
        for node in 0..nodes {
            let incoming: LinExpr = (0..nodes).filter_map(|j| arcs[j][node]).map(|v| (v, 1.0)).collect();
            let outgoing: LinExpr = arcs[node].iter().flatten().map(|&v| (v, 1.0)).collect();
            model.add_constraint(Constraint::eq(incoming, 1.0));
            model.add_constraint(Constraint::eq(outgoing, 1.0));
        }
        model.set_objective(LinExpr::new().with(z, 1.0));
        model.set_lazy_callback(Box::new(SubtourCallback::new(arcs.clone())))?;

        let outcome = model.solve(&self.params).map_err(|e| match e {
            SolverError::Infeasible => GeneratorError::OracleInfeasible,
            e => GeneratorError::Solver(e),
        })?;

        let mut solution = vec![0.0; nodes * nodes];
        for (i, targets) in arcs.iter().enumerate() {
            for (j, arc) in targets.iter().enumerate() {
                if let Some(var) = arc {
                    solution[i * nodes + j] = outcome.require(*var)?.round();
                }
            }
        }
        let tour = tour_from_solution(nodes, &solution)
            .map_err(|e| GeneratorError::InvalidSolution(e.to_string()))?;
        debug!(
            "routing oracle: {} nodes, objective {:.6}, {} search nodes, {} cuts",
            nodes,
            outcome.objective(),
            outcome.nodes(),
            outcome.lazy_cuts()
        );
        Ok(RoutingSolution {
            oracle: OracleSolution {
                solution,
                upper_bound: outcome.objective(),
                nodes: outcome.nodes(),
            },
            tour,
            lazy_cuts: outcome.lazy_cuts(),
        })
    }
}

impl Oracle for RoutingOracle {
    fn solve_ip(&self, costs: ArrayView2<'_, f64>) -> Result<OracleSolution, GeneratorError> {
        self.solve_routing(costs).map(|routing| routing.oracle)
    }

    /// Assignment relaxation: every node has one incoming and one outgoing
    /// arc, self loops are fixed at zero.
    fn relaxation(&self, num_elements: usize) -> Option<Relaxation> {
        let nodes = num_nodes(num_elements).ok()?;
        let mut rows = Vec::with_capacity(2 * nodes);
        for node in 0..nodes {
            rows.push(RelaxationRow {
                terms: (0..nodes).filter(|&j| j != node).map(|j| (j * nodes + node, 1.0)).collect(),
                rhs: 1.0,
            });
            rows.push(RelaxationRow {
                terms: (0..nodes).filter(|&j| j != node).map(|j| (node * nodes + j, 1.0)).collect(),
                rhs: 1.0,
            });
        }
        let element_upper = (0..num_elements)
            .map(|e| if e / nodes == e % nodes { 0.0 } else { 1.0 })
            .collect();
        Some(Relaxation { rows, element_upper })
    }
}
