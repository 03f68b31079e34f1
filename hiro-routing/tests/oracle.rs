use hiro_generator::{GeneratorError, Oracle};
use hiro_routing::{num_nodes, RoutingOracle, SubtourCallback};
use hiro_solver::{Candidate, LazyCallback, Model, Sense, Var};
use ndarray::{Array2, Axis};

fn arc_costs(nodes: usize, default: f64, arcs: &[((usize, usize), f64)]) -> Vec<f64> {
    let mut costs = vec![default; nodes * nodes];
    for i in 0..nodes {
        costs[i * nodes + i] = 0.0;
    }
    for &((from, to), cost) in arcs {
        costs[from * nodes + to] = cost;
    }
    costs
}

fn scenarios(rows: &[Vec<f64>]) -> Array2<f64> {
    let mut matrix = Array2::zeros((rows.len(), rows[0].len()));
    for (mut dst, row) in matrix.axis_iter_mut(Axis(0)).zip(rows) {
        for (d, &c) in dst.iter_mut().zip(row) {
            *d = c;
        }
    }
    matrix
}

#[test]
fn test_three_nodes_identical_scenarios() {
    let costs = arc_costs(3, 5.0, &[((0, 1), 1.0), ((1, 2), 2.0), ((2, 0), 3.0)]);
    let matrix = scenarios(&[costs.clone(), costs]);
    let result = RoutingOracle::new().solve_routing(matrix.view()).unwrap();
    assert!((result.oracle.upper_bound - 6.0).abs() < 1e-6);
    assert_eq!(result.tour, vec![0, 1, 2]);
    assert_eq!(result.lazy_cuts, 0);
    assert_eq!(result.oracle.solution.iter().sum::<f64>(), 3.0);
    assert_eq!(result.oracle.solution[0 * 3 + 1], 1.0);
    assert_eq!(result.oracle.solution[1 * 3 + 2], 1.0);
    assert_eq!(result.oracle.solution[2 * 3 + 0], 1.0);
    assert_eq!(result.oracle.nodes, 1);
}

#[test]
fn test_worst_scenario_drives_the_tour() {
    // the forward tour is cheap in the first scenario and expensive in the second
    let first = arc_costs(3, 4.0, &[((0, 1), 1.0), ((1, 2), 1.0), ((2, 0), 1.0)]);
    let second = arc_costs(3, 4.0, &[((0, 1), 9.0), ((1, 2), 9.0), ((2, 0), 9.0)]);
    let result = RoutingOracle::new()
        .solve_ip(scenarios(&[first, second]).view())
        .unwrap();
    assert!((result.upper_bound - 12.0).abs() < 1e-6);
    assert_eq!(result.solution[0 * 3 + 2], 1.0);
}

#[test]
fn test_subtours_are_cut() {
    let costs = arc_costs(
        4,
        10.0,
        &[((0, 1), 1.0), ((1, 0), 1.0), ((2, 3), 1.0), ((3, 2), 1.0)],
    );
    let result = RoutingOracle::new()
        .solve_routing(scenarios(&[costs]).view())
        .unwrap();
    assert!((result.oracle.upper_bound - 22.0).abs() < 1e-6);
    assert!(result.lazy_cuts >= 2);
    assert_eq!(result.tour.len(), 4);
    assert_eq!(result.tour[0], 0);
}

#[test]
fn test_callback_emits_one_cut_per_cycle() {
    let mut model = Model::new(Sense::Minimize);
    let arcs: Vec<Vec<Option<Var>>> = (0..4)
        .map(|i| (0..4).map(|j| (i != j).then(|| model.add_binary())).collect())
        .collect();
    let mut values = vec![0.0; model.num_vars()];
    for (from, to) in [(0, 1), (1, 0), (2, 3), (3, 2)] {
        values[arcs[from][to].unwrap().index()] = 1.0;
    }

    let mut callback = SubtourCallback::new(arcs.clone());
    let cuts = callback.on_candidate(&Candidate::new(&values, 4.0)).unwrap();
    assert_eq!(cuts.len(), 2);
    let expected = [[(0, 1), (1, 0)], [(2, 3), (3, 2)]];
    for (cut, arcs_in_cycle) in cuts.iter().zip(expected) {
        let vars: Vec<Var> = arcs_in_cycle.iter().map(|&(i, j)| arcs[i][j].unwrap()).collect();
        let terms: Vec<(Var, f64)> = vars.iter().map(|&v| (v, 1.0)).collect();
        assert_eq!(cut.expr.terms(), terms.as_slice());
        assert_eq!(cut.upper, 1.0);
        assert!(!cut.is_satisfied(&values, 1e-9));
    }

    let mut tour = vec![0.0; model.num_vars()];
    for (from, to) in [(0, 1), (1, 2), (2, 3), (3, 0)] {
        tour[arcs[from][to].unwrap().index()] = 1.0;
    }
    assert!(callback.on_candidate(&Candidate::new(&tour, 4.0)).unwrap().is_empty());
}

#[test]
fn test_callback_rejects_missing_values() {
    let mut model = Model::new(Sense::Minimize);
    let arcs: Vec<Vec<Option<Var>>> = (0..3)
        .map(|i| (0..3).map(|j| (i != j).then(|| model.add_binary())).collect())
        .collect();
    let mut callback = SubtourCallback::new(arcs);
    assert!(callback.on_candidate(&Candidate::new(&[1.0, 0.0], 0.0)).is_err());
}

#[test]
fn test_invalid_sizes() {
    assert_eq!(
        RoutingOracle::new().solve_ip(Array2::from_elem((2, 1), 1.0).view()),
        Err(GeneratorError::OracleInfeasible)
    );
    assert!(matches!(
        RoutingOracle::new().solve_ip(Array2::from_elem((1, 5), 1.0).view()),
        Err(GeneratorError::Configuration(_))
    ));
    assert_eq!(num_nodes(16), Ok(4));
    assert!(num_nodes(0).is_err());
}

#[test]
fn test_relaxation_rows() {
    let relaxation = RoutingOracle::new().relaxation(9).unwrap();
    assert_eq!(relaxation.rows.len(), 6);
    assert!(relaxation.rows.iter().all(|row| row.terms.len() == 2 && row.rhs == 1.0));
    assert_eq!(
        relaxation.element_upper,
        vec![0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0]
    );
    assert!(RoutingOracle::new().relaxation(8).is_none());
}
