use super::{
    pool::{assign_scenarios, CostVariables, SolutionPool},
    Incumbent, SearchContext,
};
use crate::{engine::GenerationReport, error::GeneratorError, oracle::Oracle};
use hiro_solver::{Constraint, LinExpr, Model, Sense};
use ndarray::Array2;
use tracing::debug;

/// Alternates between the compact cost LP for a fixed pool and an oracle
/// call on the resulting costs. `capacity` bounds the pool; `Some(1)` keeps
/// only the latest solution.
pub(crate) fn run<O: Oracle + ?Sized>(
    ctx: &SearchContext<'_, O>,
    report: &mut GenerationReport,
    capacity: Option<usize>,
) -> Result<Array2<f64>, GeneratorError> {
    let mut costs = ctx.broadcast(&ctx.uncertainty.midpoint());
    let first = ctx.call_oracle(costs.view(), report)?;
    let mut best = Incumbent::new(first.upper_bound, costs.clone());
    let mut pool = SolutionPool::new(capacity);
    pool.insert(first.solution);

    while report.iterations < ctx.max_iterations && ctx.has_time() {
        report.iterations += 1;
        let (bound, next) = solve_compact(ctx, &costs, pool.solutions())?;
        report.bound_history.push(vec![bound]);

        let result = ctx.call_oracle(next.view(), report)?;
        best.offer(result.upper_bound, &next);
        let shift = (&next - &costs)
            .iter()
            .fold(0.0_f64, |acc, d| acc.max(d.abs()));
        debug!(
            "iteration {}: lp {:.6}, oracle {:.6}, shift {:.3e}",
            report.iterations, bound, result.upper_bound, shift
        );
        let known = !pool.insert(result.solution);
        costs = next;
        if known && shift <= ctx.gap {
            report.converged = true;
            break;
        }
    }

    report.objective = Some(best.value);
    Ok(best.costs)
}

/// `max t  s.t.  t <= c^{k(j)}·x_j,  c ∈ U^N`. Scenarios without a linked
/// solution keep their previous costs.
fn solve_compact<O: Oracle + ?Sized>(
    ctx: &SearchContext<'_, O>,
    previous: &Array2<f64>,
    solutions: &[Vec<f64>],
) -> Result<(f64, Array2<f64>), GeneratorError> {
    let assignment = assign_scenarios(previous.view(), solutions);
    let mut model = Model::new(Sense::Maximize);
    let t = model.add_continuous(f64::NEG_INFINITY, f64::INFINITY);
    let costs = CostVariables::add(&mut model, ctx.uncertainty, ctx.num_scenarios);

    for (x, &k) in solutions.iter().zip(&assignment) {
        let mut row = costs.scenario_expr(k, x);
        row.add(t, -1.0);
        model.add_constraint(Constraint::ge(row, 0.0));
    }
    for k in (0..ctx.num_scenarios).filter(|k| !assignment.contains(k)) {
        for i in 0..ctx.num_elements() {
            model.add_constraint(Constraint::eq(
                LinExpr::new().with(costs.get(k, i), 1.0),
                previous[[k, i]].clamp(ctx.uncertainty.lower()[i], ctx.uncertainty.upper()[i]),
            ));
        }
    }
    model.set_objective(LinExpr::new().with(t, 1.0));

    let outcome = model.solve(&ctx.solver_params())?;
    Ok((outcome.objective(), costs.read(&outcome)?))
}
