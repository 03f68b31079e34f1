use super::{pool::CostVariables, SearchContext};
use crate::{
    engine::GenerationReport,
    error::GeneratorError,
    oracle::{Oracle, Relaxation},
};
use hiro_solver::{Constraint, LinExpr, Model, Sense};
use ndarray::Array2;
use tracing::{debug, info};

const RANK_TOLERANCE: f64 = 1e-9;

pub(crate) fn generate<O: Oracle + ?Sized>(ctx: &SearchContext<'_, O>) -> Array2<f64> {
    ctx.broadcast(&ctx.uncertainty.midpoint())
}

/// Maximises the LP dual bound of the scenario-averaged cost over the
/// oracle's relaxation `{ A x = b, 0 <= x <= u }`:
///
/// `max b·y − u·w  s.t.  Aᵀy − w <= (1/N) Σ_k c^k,  w >= 0,  c ∈ U^N`
pub(crate) fn generate_lp<O: Oracle + ?Sized>(
    ctx: &SearchContext<'_, O>,
    report: &mut GenerationReport,
) -> Result<Array2<f64>, GeneratorError> {
    let n = ctx.num_elements();
    let relaxation = ctx.oracle.relaxation(n).ok_or_else(|| {
        GeneratorError::Configuration("the oracle does not expose an LP relaxation".to_string())
    })?;
    if relaxation.element_upper.len() != n {
        return Err(GeneratorError::Configuration(format!(
            "relaxation has {} element bounds, expected {}",
            relaxation.element_upper.len(),
            n
        )));
    }

    if let Some(i) = relaxation
        .rows
        .iter()
        .flat_map(|row| row.terms.iter().map(|&(i, _)| i))
        .find(|&i| i >= n)
    {
        return Err(GeneratorError::Configuration(format!(
            "relaxation references element {} of {}",
            i, n
        )));
    }
    // redundant rows leave a line of dual optima along which the simplex stalls
    let rows = independent_rows(&relaxation);
    debug!("midpoint LP keeps {} of {} relaxation rows", rows.len(), relaxation.rows.len());

    let mut model = Model::new(Sense::Maximize);
    let costs = CostVariables::add(&mut model, ctx.uncertainty, ctx.num_scenarios);
    let y: Vec<_> = rows
        .iter()
        .map(|_| model.add_continuous(f64::NEG_INFINITY, f64::INFINITY))
        .collect();
    let mut objective: LinExpr = rows
        .iter()
        .zip(&y)
        .map(|(&r, &var)| (var, relaxation.rows[r].rhs))
        .collect();

    let mut columns: Vec<LinExpr> = vec![LinExpr::new(); n];
    for (&r, &var) in rows.iter().zip(&y) {
        for &(i, a) in &relaxation.rows[r].terms {
            columns[i].add(var, a);
        }
    }

    let weight = 1.0 / ctx.num_scenarios as f64;
    for (i, mut column) in columns.into_iter().enumerate() {
        let u = relaxation.element_upper[i];
        if u <= 0.0 {
            // x_i is fixed at zero and imposes no dual row
            continue;
        }
        if u.is_finite() {
            let w = model.add_continuous(0.0, f64::INFINITY);
            column.add(w, -1.0);
            objective.add(w, -u);
        }
        for k in 0..ctx.num_scenarios {
            column.add(costs.get(k, i), -weight);
        }
        model.add_constraint(Constraint::le(column, 0.0));
    }
    model.set_objective(objective);

    let outcome = model.solve(&ctx.solver_params())?;
    let matrix = costs.read(&outcome)?;
    info!("midpoint LP bound {:.6}", outcome.objective());
    report.iterations = 1;
    report.bound_history.push(vec![outcome.objective()]);

    let evaluated = ctx.call_oracle(matrix.view(), report)?;
    report.objective = Some(evaluated.upper_bound);
    Ok(matrix)
}

/// Indices of a maximal linearly independent subset of the relaxation rows,
/// restricted to elements that may be positive. Dropping a dependent row
/// keeps the optimum: its dual can be folded into the rows it combines.
fn independent_rows(relaxation: &Relaxation) -> Vec<usize> {
    let n = relaxation.element_upper.len();
    let mut basis: Vec<(usize, Vec<f64>)> = Vec::new();
    let mut kept = Vec::new();
    for (r, row) in relaxation.rows.iter().enumerate() {
        let mut dense = vec![0.0; n];
        for &(i, a) in &row.terms {
            if relaxation.element_upper[i] > 0.0 {
                dense[i] += a;
            }
        }
        for (pivot, reduced) in &basis {
            let factor = dense[*pivot];
            if factor != 0.0 {
                for (d, &b) in dense.iter_mut().zip(reduced) {
                    *d -= factor * b;
                }
            }
        }
        let Some(pivot) = (0..n).max_by(|&a, &b| dense[a].abs().total_cmp(&dense[b].abs())) else {
            continue;
        };
        let scale = dense[pivot];
        if scale.abs() <= RANK_TOLERANCE {
            continue;
        }
        for d in dense.iter_mut() {
            *d /= scale;
        }
        basis.push((pivot, dense));
        kept.push(r);
    }
    kept
}
