use hiro_generator::{robust_value, Algorithm, GeneratorSettings, HardInstanceGenerator, Oracle};
use hiro_routing::{tour_from_solution, RoutingOracle};

const TOLERANCE: f64 = 1e-4;

fn settings(algorithm: Algorithm) -> GeneratorSettings {
    let mut settings = GeneratorSettings::new(algorithm, 9, 2);
    settings.seed = 42;
    settings.max_iterations = 25;
    settings.time_limit_secs = 60.0;
    settings
}

fn generate(algorithm: Algorithm) -> HardInstanceGenerator<RoutingOracle> {
    let mut generator = HardInstanceGenerator::from_settings(RoutingOracle::new(), &settings(algorithm)).unwrap();
    generator.generate_hard_instance().unwrap();
    generator
}

fn hardness(generator: &HardInstanceGenerator<RoutingOracle>) -> f64 {
    let costs = generator.costs().unwrap();
    let result = generator.oracle().solve_ip(costs.view()).unwrap();
    assert_eq!(tour_from_solution(3, &result.solution).unwrap().len(), 3);
    assert!((robust_value(costs.view(), &result.solution) - result.upper_bound).abs() < TOLERANCE);
    result.upper_bound
}

#[test]
fn test_exact_strategy_on_three_nodes() {
    let generator = generate(Algorithm::Iterative);
    let report = generator.report().unwrap();
    assert!(report.certified);
    assert!(report.oracle_calls >= 2);
    assert!((hardness(&generator) - report.objective.unwrap()).abs() < TOLERANCE);
}

#[test]
fn test_heuristics_never_beat_exact() {
    let exact = hardness(&generate(Algorithm::Iterative));
    for algorithm in [
        Algorithm::Alternating,
        Algorithm::AlternateHeuristic,
        Algorithm::ColumnGeneration,
        Algorithm::MidpointLp,
        Algorithm::Midpoint,
        Algorithm::Normal,
    ] {
        let generator = generate(algorithm);
        let value = hardness(&generator);
        assert!(
            value <= exact + TOLERANCE,
            "{} reached {} above the exact {}",
            algorithm,
            value,
            exact
        );
        let report = generator.report().unwrap();
        assert!(report.iterations <= 25);
        if algorithm == Algorithm::ColumnGeneration && report.certified {
            assert!((value - exact).abs() < TOLERANCE, "certified {} against exact {}", value, exact);
        }
    }
}

#[test]
fn test_midpoint_lp_stays_in_bounds() {
    let generator = generate(Algorithm::MidpointLp);
    let uncertainty = generator.uncertainty().unwrap();
    for row in generator.costs().unwrap().rows() {
        assert!(uncertainty.contains(row.as_slice().unwrap(), 1e-6));
    }
    let report = generator.report().unwrap();
    assert_eq!(report.oracle_calls, 1);
    assert!(report.objective.is_some());
}

#[test]
fn test_instance_round_trip_through_oracle() {
    let generator = generate(Algorithm::ColumnGeneration);
    let instance = generator.instance().unwrap();
    assert_eq!(instance.num_elements, 9);
    assert_eq!(instance.num_scenarios, 2);
    let costs = instance.cost_matrix().unwrap();
    let result = RoutingOracle::new().solve_routing(costs.view()).unwrap();
    assert_eq!(result.tour[0], 0);
}
