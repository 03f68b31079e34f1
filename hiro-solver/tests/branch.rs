use hiro_solver::{
    Candidate, Constraint, LinExpr, Model, Sense, SolveStatus, SolverError, SolverParams, VarKind,
};

fn knapsack() -> (Model, [hiro_solver::Var; 3]) {
    // max 5a + 4b + 3c  s.t.  2a + 3b + c <= 5
    let mut model = Model::new(Sense::Maximize);
    let a = model.add_binary();
    let b = model.add_binary();
    let c = model.add_binary();
    model.add_constraint(Constraint::le(
        LinExpr::new().with(a, 2.0).with(b, 3.0).with(c, 1.0),
        5.0,
    ));
    model.set_objective(LinExpr::new().with(a, 5.0).with(b, 4.0).with(c, 3.0));
    (model, [a, b, c])
}

#[test]
fn test_continuous_lp() {
    let mut model = Model::new(Sense::Maximize);
    let x = model.add_continuous(0.0, f64::INFINITY);
    let y = model.add_continuous(0.0, 3.0);
    model.add_constraint(Constraint::le(LinExpr::new().with(x, 1.0).with(y, 1.0), 4.0));
    model.add_constraint(Constraint::ge(LinExpr::new().with(x, 2.0).with(y, 1.0), 2.0));
    model.set_objective(LinExpr::new().with(x, 1.0).with(y, 2.0));

    let outcome = model.solve(&SolverParams::default()).unwrap();
    assert_eq!(outcome.status(), SolveStatus::Optimal);
    assert!((outcome.objective() - 7.0).abs() < 1e-9);
    assert!((outcome.value(x).unwrap() - 1.0).abs() < 1e-9);
    assert!((outcome.value(y).unwrap() - 3.0).abs() < 1e-9);
    assert_eq!(outcome.nodes(), 1);
}

#[test]
fn test_binary_knapsack() {
    let (mut model, [a, b, c]) = knapsack();
    let outcome = model.solve(&SolverParams::default()).unwrap();
    assert!(outcome.is_optimal());
    assert!((outcome.objective() - 9.0).abs() < 1e-9);
    assert_eq!(outcome.value(a), Some(1.0));
    assert_eq!(outcome.value(b), Some(1.0));
    assert_eq!(outcome.value(c), Some(0.0));
    assert!((outcome.best_bound() - outcome.objective()).abs() < 1e-9);
}

#[test]
fn test_lazy_callback_rejects_candidate() {
    let (mut model, [a, b, c]) = knapsack();
    let callback = move |candidate: &Candidate<'_>| -> Result<Vec<Constraint>, SolverError> {
        if candidate.require(a)? + candidate.require(b)? > 1.5 {
            Ok(vec![Constraint::le(LinExpr::new().with(a, 1.0).with(b, 1.0), 1.0)])
        } else {
            Ok(Vec::new())
        }
    };
    model.set_lazy_callback(Box::new(callback)).unwrap();

    let outcome = model.solve(&SolverParams::default()).unwrap();
    assert!((outcome.objective() - 8.0).abs() < 1e-9);
    assert_eq!(outcome.value(a), Some(1.0));
    assert_eq!(outcome.value(b), Some(0.0));
    assert_eq!(outcome.value(c), Some(1.0));
    assert!(outcome.lazy_cuts() >= 1);
    assert!(model.num_constraints() >= 2);
}

#[test]
fn test_single_callback_registration() {
    let (mut model, _) = knapsack();
    let accept = |_: &Candidate<'_>| -> Result<Vec<Constraint>, SolverError> { Ok(Vec::new()) };
    model.set_lazy_callback(Box::new(accept)).unwrap();
    assert_eq!(
        model.set_lazy_callback(Box::new(accept)),
        Err(SolverError::CallbackAlreadyRegistered)
    );
}

#[test]
fn test_callback_must_separate() {
    let (mut model, [a, _, _]) = knapsack();
    let useless = move |_: &Candidate<'_>| -> Result<Vec<Constraint>, SolverError> {
        Ok(vec![Constraint::le(LinExpr::new().with(a, 1.0), 1.0)])
    };
    model.set_lazy_callback(Box::new(useless)).unwrap();
    assert!(matches!(
        model.solve(&SolverParams::default()),
        Err(SolverError::Callback(_))
    ));
}

#[test]
fn test_infeasible_model() {
    let mut model = Model::new(Sense::Minimize);
    let x = model.add_binary();
    let y = model.add_binary();
    model.add_constraint(Constraint::ge(LinExpr::new().with(x, 1.0).with(y, 1.0), 3.0));
    model.set_objective(LinExpr::new().with(x, 1.0));
    assert_eq!(model.solve(&SolverParams::default()).unwrap_err(), SolverError::Infeasible);
}

#[test]
fn test_empty_row_infeasible() {
    let mut model = Model::new(Sense::Minimize);
    let x = model.add_var(VarKind::Continuous, 0.0, 1.0);
    model.add_constraint(Constraint::eq(LinExpr::new(), 1.0));
    model.set_objective(LinExpr::new().with(x, 1.0));
    assert_eq!(model.solve(&SolverParams::default()).unwrap_err(), SolverError::Infeasible);
}

#[test]
fn test_unknown_variable() {
    let (mut other, _) = knapsack();
    let stray = other.add_binary();
    let mut model = Model::new(Sense::Minimize);
    let x = model.add_binary();
    model.add_constraint(Constraint::le(LinExpr::new().with(x, 1.0).with(stray, 1.0), 1.0));
    assert_eq!(
        model.solve(&SolverParams::default()).unwrap_err(),
        SolverError::UnknownVariable(stray)
    );
}

#[test]
fn test_value_outside_model_is_absent() {
    let (mut model, _) = knapsack();
    let outcome = model.solve(&SolverParams::default()).unwrap();
    let mut bigger = Model::new(Sense::Minimize);
    let mut last = bigger.add_binary();
    for _ in 0..5 {
        last = bigger.add_binary();
    }
    assert_eq!(outcome.value(last), None);
    assert_eq!(outcome.require(last), Err(SolverError::ValueUnavailable(last)));
}

#[test]
fn test_node_limit_without_incumbent() {
    let (mut model, _) = knapsack();
    let params = SolverParams::default().with_node_limit(0);
    assert_eq!(
        model.solve(&params).unwrap_err(),
        SolverError::NoIncumbent { nodes: 0 }
    );
}
