use super::{
    iterative,
    pool::{assign_scenarios, dot, same_vector, SolutionPool},
    Incumbent, SearchContext,
};
use crate::{engine::GenerationReport, error::GeneratorError, oracle::Oracle};
use hiro_solver::{Constraint, LinExpr, Model, Sense, SolverError, Var};
use ndarray::Array2;
use tracing::{debug, info, warn};

const FLAT_DIRECTION: f64 = 1e-9;
const DUAL_MISMATCH: f64 = 1e-6;

/// Extreme cost vector of the uncertainty set used by one scenario.
#[derive(Debug, Clone)]
struct Column {
    costs: Vec<f64>,
    reduced_cost: f64,
}

struct MasterSolution {
    bound: f64,
    weights: Vec<Vec<f64>>,
}

struct Duals {
    linking: Vec<f64>,
    convexity: Vec<f64>,
    objective: f64,
}

/// Dantzig-Wolfe decomposition of the master over the per-scenario
/// uncertainty sets, with each pooled solution linked to a single scenario.
///
/// The restricted bound only holds for the current links. Once the oracle
/// agrees with it, the pool master over every link decides: it either
/// certifies the incumbent or supplies costs whose links start the next round.
pub(crate) fn run<O: Oracle + ?Sized>(
    ctx: &SearchContext<'_, O>,
    report: &mut GenerationReport,
) -> Result<Array2<f64>, GeneratorError> {
    let midpoint = ctx.uncertainty.midpoint();
    let mut current = ctx.broadcast(&midpoint);
    let first = ctx.call_oracle(current.view(), report)?;
    let mut best = Incumbent::new(first.upper_bound, current.clone());
    let mut pool = SolutionPool::new(None);
    pool.insert(first.solution);

    let mut columns: Vec<Vec<Column>> = (0..ctx.num_scenarios)
        .map(|_| {
            vec![Column {
                costs: midpoint.clone(),
                reduced_cost: 0.0,
            }]
        })
        .collect();

    while report.iterations < ctx.max_iterations && ctx.has_time() {
        report.iterations += 1;
        let assignment = assign_scenarios(current.view(), pool.solutions());
        let mut history = Vec::new();
        let master = loop {
            let master = solve_restricted_master(ctx, &columns, pool.solutions(), &assignment)?;
            if let Some(&previous) = history.last() {
                if master.bound < previous - DUAL_MISMATCH * (1.0 + f64::abs(previous)) {
                    return Err(GeneratorError::BoundRegression {
                        previous,
                        current: master.bound,
                    });
                }
            }
            history.push(master.bound);

            let duals = solve_dual(ctx, &columns, pool.solutions(), &assignment)?;
            if (duals.objective - master.bound).abs() > DUAL_MISMATCH * (1.0 + master.bound.abs()) {
                warn!(
                    "dual objective {:.9} differs from master bound {:.9}",
                    duals.objective, master.bound
                );
            }

            let mut added = 0;
            for k in 0..ctx.num_scenarios {
                if let Some(column) = price(ctx, &columns[k], pool.solutions(), &assignment, &duals, k) {
                    debug!("scenario {}: column with reduced cost {:.6}", k, column.reduced_cost);
                    columns[k].push(column);
                    added += 1;
                }
            }
            if added == 0 || !ctx.has_time() {
                break master;
            }
        };
        report.bound_history.push(history);

        let mix = mix_columns(ctx, &columns, &master.weights);
        let result = ctx.call_oracle(mix.view(), report)?;
        best.offer(result.upper_bound, &mix);
        info!(
            "round {}: linked master {:.6}, oracle {:.6}, columns {}",
            report.iterations,
            master.bound,
            result.upper_bound,
            columns.iter().map(Vec::len).sum::<usize>()
        );
        let fresh = pool.insert(result.solution);
        if result.upper_bound < master.bound - ctx.gap {
            if !fresh {
                report.converged = true;
                break;
            }
            current = mix;
            continue;
        }

        let (outcome, linked) = match iterative::solve_master(ctx, pool.solutions()) {
            Ok(master) => master,
            Err(GeneratorError::Solver(SolverError::NoIncumbent { nodes })) => {
                info!("link check stopped without an incumbent after {} nodes", nodes);
                break;
            }
            Err(e) => return Err(e),
        };
        if outcome.is_optimal() {
            report.upper_bound = Some(outcome.best_bound());
            if best.value >= outcome.objective() - ctx.gap {
                report.certified = true;
                report.converged = true;
                break;
            }
        }
        debug!(
            "pool master {:.6} exceeds the linked bound {:.6}, relinking",
            outcome.objective(),
            master.bound
        );
        current = linked;
    }

    report.objective = Some(best.value);
    Ok(best.costs)
}

/// `max t  s.t.  t − Σ_p α_{k(j)p} (v_{k(j)p}·x_j) <= 0,  Σ_p α_kp = 1,  α >= 0`
fn solve_restricted_master<O: Oracle + ?Sized>(
    ctx: &SearchContext<'_, O>,
    columns: &[Vec<Column>],
    solutions: &[Vec<f64>],
    assignment: &[usize],
) -> Result<MasterSolution, GeneratorError> {
    let mut model = Model::new(Sense::Maximize);
    let t = model.add_continuous(f64::NEG_INFINITY, f64::INFINITY);
    let alpha: Vec<Vec<Var>> = columns
        .iter()
        .map(|scenario| {
            scenario
                .iter()
                .map(|_| model.add_continuous(0.0, f64::INFINITY))
                .collect()
        })
        .collect();

    for (x, &k) in solutions.iter().zip(assignment) {
        let mut row = LinExpr::new().with(t, 1.0);
        for (column, &var) in columns[k].iter().zip(&alpha[k]) {
            row.add(var, -dot(&column.costs, x));
        }
        model.add_constraint(Constraint::le(row, 0.0));
    }
    for scenario in &alpha {
        let convexity: LinExpr = scenario.iter().map(|&var| (var, 1.0)).collect();
        model.add_constraint(Constraint::eq(convexity, 1.0));
    }
    model.set_objective(LinExpr::new().with(t, 1.0));

    let outcome = model.solve(&ctx.solver_params())?;
    let weights = alpha
        .iter()
        .map(|scenario| {
            scenario
                .iter()
                .map(|&var| outcome.require(var))
                .collect::<Result<Vec<f64>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MasterSolution {
        bound: outcome.objective(),
        weights,
    })
}

/// `min Σ_k σ_k  s.t.  Σ_j π_j = 1,  σ_k − Σ_{j: k(j)=k} π_j (v_kp·x_j) >= 0,  π >= 0`
fn solve_dual<O: Oracle + ?Sized>(
    ctx: &SearchContext<'_, O>,
    columns: &[Vec<Column>],
    solutions: &[Vec<f64>],
    assignment: &[usize],
) -> Result<Duals, GeneratorError> {
    let mut model = Model::new(Sense::Minimize);
    let pi: Vec<Var> = solutions
        .iter()
        .map(|_| model.add_continuous(0.0, f64::INFINITY))
        .collect();
    let sigma: Vec<Var> = columns
        .iter()
        .map(|_| model.add_continuous(f64::NEG_INFINITY, f64::INFINITY))
        .collect();

    model.add_constraint(Constraint::eq(pi.iter().map(|&var| (var, 1.0)).collect(), 1.0));
    for (k, scenario) in columns.iter().enumerate() {
        for column in scenario {
            let mut row = LinExpr::new().with(sigma[k], 1.0);
            for ((x, &assigned), &var) in solutions.iter().zip(assignment).zip(&pi) {
                if assigned == k {
                    row.add(var, -dot(&column.costs, x));
                }
            }
            model.add_constraint(Constraint::ge(row, 0.0));
        }
    }
    model.set_objective(sigma.iter().map(|&var| (var, 1.0)).collect());

    let outcome = model.solve(&ctx.solver_params())?;
    Ok(Duals {
        linking: pi
            .iter()
            .map(|&var| outcome.require(var))
            .collect::<Result<_, _>>()?,
        convexity: sigma
            .iter()
            .map(|&var| outcome.require(var))
            .collect::<Result<_, _>>()?,
        objective: outcome.objective(),
    })
}

/// Best new column for scenario `k`, if its reduced cost exceeds the gap.
fn price<O: Oracle + ?Sized>(
    ctx: &SearchContext<'_, O>,
    existing: &[Column],
    solutions: &[Vec<f64>],
    assignment: &[usize],
    duals: &Duals,
    k: usize,
) -> Option<Column> {
    let n = ctx.num_elements();
    let mut direction = vec![0.0; n];
    for ((x, &assigned), &pi) in solutions.iter().zip(assignment).zip(&duals.linking) {
        if assigned == k {
            for (g, &xi) in direction.iter_mut().zip(x) {
                *g += pi * xi;
            }
        }
    }
    let is_known = |candidate: &[f64]| existing.iter().any(|c| same_vector(&c.costs, candidate));

    let box_search = ctx.uncertainty.maximize(&direction);
    let flat = direction.iter().all(|g| g.abs() <= FLAT_DIRECTION);
    let candidates: Vec<Vec<f64>> = if flat || is_known(&box_search) {
        let mut candidates: Vec<Vec<f64>> = solutions
            .iter()
            .map(|x| ctx.uncertainty.maximize(x))
            .collect();
        candidates.extend((0..n).map(|i| {
            let mut unit = vec![0.0; n];
            unit[i] = 1.0;
            ctx.uncertainty.maximize(&unit)
        }));
        candidates
    } else {
        vec![box_search]
    };

    candidates
        .into_iter()
        .filter(|candidate| !is_known(candidate))
        .map(|candidate| {
            let reduced_cost = dot(&direction, &candidate) - duals.convexity[k];
            Column {
                costs: candidate,
                reduced_cost,
            }
        })
        .filter(|column| column.reduced_cost > ctx.gap)
        .max_by(|a, b| a.reduced_cost.total_cmp(&b.reduced_cost))
}

fn mix_columns<O: Oracle + ?Sized>(
    ctx: &SearchContext<'_, O>,
    columns: &[Vec<Column>],
    weights: &[Vec<f64>],
) -> Array2<f64> {
    let mut mix = Array2::zeros((ctx.num_scenarios, ctx.num_elements()));
    for (k, (scenario, alpha)) in columns.iter().zip(weights).enumerate() {
        let total: f64 = alpha.iter().map(|a| a.max(0.0)).sum();
        for (p, (column, &a)) in scenario.iter().zip(alpha).enumerate() {
            let share = match total > 0.0 {
                true => a.max(0.0) / total,
                false if p == 0 => 1.0,
                false => 0.0,
            };
            for (i, &v) in column.costs.iter().enumerate() {
                mix[[k, i]] += share * v;
            }
        }
    }
    mix
}
