use super::{
    pool::{CostVariables, SolutionPool},
    Incumbent, SearchContext,
};
use crate::{engine::GenerationReport, error::GeneratorError, oracle::Oracle};
use hiro_solver::{Constraint, LinExpr, Model, Sense, SolveOutcome, SolverError, VarKind};
use ndarray::Array2;
use tracing::{debug, info};

/// Exact search: alternates the master MIP over the pooled solutions with
/// oracle calls until the oracle confirms the master bound.
pub(crate) fn run<O: Oracle + ?Sized>(
    ctx: &SearchContext<'_, O>,
    report: &mut GenerationReport,
) -> Result<Array2<f64>, GeneratorError> {
    let start = ctx.broadcast(&ctx.uncertainty.midpoint());
    let first = ctx.call_oracle(start.view(), report)?;
    let mut best = Incumbent::new(first.upper_bound, start);
    let mut pool = SolutionPool::new(None);
    pool.insert(first.solution);

    while report.iterations < ctx.max_iterations && ctx.has_time() {
        report.iterations += 1;
        let (outcome, costs) = match solve_master(ctx, pool.solutions()) {
            Ok(master) => master,
            Err(GeneratorError::Solver(SolverError::NoIncumbent { nodes })) => {
                info!("master stopped without an incumbent after {} nodes", nodes);
                break;
            }
            Err(e) => return Err(e),
        };
        let bound = outcome.objective();
        report.upper_bound = Some(outcome.best_bound());
        report.bound_history.push(vec![bound]);

        let result = ctx.call_oracle(costs.view(), report)?;
        best.offer(result.upper_bound, &costs);
        debug!(
            "iteration {}: master {:.6}, oracle {:.6}, pool {}",
            report.iterations,
            bound,
            result.upper_bound,
            pool.len()
        );
        if outcome.is_optimal() && result.upper_bound >= bound - ctx.gap {
            report.certified = true;
            report.converged = true;
            break;
        }
        if !pool.insert(result.solution) {
            break;
        }
    }

    report.objective = Some(best.value);
    Ok(best.costs)
}

/// `max t  s.t.  t <= max_k c^k·x_j` for every pooled `x_j`, with the inner
/// maximum linearised through scenario selectors `λ_jk` and products
/// `d_jki = λ_jk c^k_i`.
pub(super) fn solve_master<O: Oracle + ?Sized>(
    ctx: &SearchContext<'_, O>,
    solutions: &[Vec<f64>],
) -> Result<(SolveOutcome, Array2<f64>), GeneratorError> {
    let lower = ctx.uncertainty.lower();
    let upper = ctx.uncertainty.upper();
    let mut model = Model::new(Sense::Maximize);
    let t = model.add_continuous(f64::NEG_INFINITY, f64::INFINITY);
    let costs = CostVariables::add(&mut model, ctx.uncertainty, ctx.num_scenarios);

    for x in solutions {
        let support: Vec<usize> = (0..x.len()).filter(|&i| x[i] != 0.0).collect();
        let mut selectors = LinExpr::new();
        let mut value = LinExpr::new().with(t, 1.0);
        for k in 0..ctx.num_scenarios {
            let lambda = model.add_var(VarKind::Binary, 0.0, 1.0);
            selectors.add(lambda, 1.0);
            for &i in &support {
                let d = model.add_continuous(0.0, upper[i]);
                model.add_constraint(Constraint::le(
                    LinExpr::new().with(d, 1.0).with(lambda, -upper[i]),
                    0.0,
                ));
                model.add_constraint(Constraint::le(
                    LinExpr::new()
                        .with(d, 1.0)
                        .with(costs.get(k, i), -1.0)
                        .with(lambda, -lower[i]),
                    -lower[i],
                ));
                value.add(d, -x[i]);
            }
        }
        model.add_constraint(Constraint::eq(selectors, 1.0));
        model.add_constraint(Constraint::le(value, 0.0));
    }
    model.set_objective(LinExpr::new().with(t, 1.0));

    let outcome = model.solve(&ctx.solver_params())?;
    let matrix = costs.read(&outcome)?;
    Ok((outcome, matrix))
}
