use anyhow::{anyhow, Result};
use clap::{arg, Command};
use hiro_generator::{GeneratorSettings, HardInstance, HardInstanceGenerator};
use hiro_routing::RoutingOracle;
use hiro_solver::SolverParams;
use serde::Serialize;
use std::{fs, io::Read, path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("hiro-runtime")
        .about("Generates hard robust routing instances or solves them")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("generate")
                .about("Generates a hard instance")
                .arg(
                    arg!(<SETTINGS> "Settings json string or path to json file")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--output [OUTPUT_FILE] "If set, the instance will be saved to this file path")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("solve")
                .about("Solves an instance with the routing oracle")
                .arg(
                    arg!(<INSTANCE> "Instance json string, path to json file, or '-' for stdin")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--timeout [TIMEOUT] "Optional time limit in seconds for the search")
                        .value_parser(clap::value_parser!(f64)),
                ),
        )
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let matches = cli().get_matches();

    if let Err(e) = match matches.subcommand() {
        Some(("generate", sub_m)) => match sub_m.get_one::<String>("SETTINGS") {
            Some(settings) => generate(settings, sub_m.get_one::<PathBuf>("output").cloned()),
            None => Err(anyhow!("Missing settings")),
        },
        Some(("solve", sub_m)) => match sub_m.get_one::<String>("INSTANCE") {
            Some(instance) => solve(instance, sub_m.get_one::<f64>("timeout").copied()),
            None => Err(anyhow!("Missing instance")),
        },
        _ => Err(anyhow!("Invalid subcommand")),
    } {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

pub fn generate(settings: &str, output_file: Option<PathBuf>) -> Result<()> {
    let settings = load_settings(settings)?;
    let mut generator = HardInstanceGenerator::from_settings(RoutingOracle::new(), &settings)?;
    let report = generator.generate_hard_instance()?;
    info!(
        "{} finished after {} iterations ({} oracle calls)",
        report.algorithm, report.iterations, report.oracle_calls
    );
    let instance = generator
        .instance()
        .ok_or_else(|| anyhow!("Generation produced no instance"))?;
    let json = instance.to_json()?;
    match output_file {
        Some(path) => {
            fs::write(&path, json).map_err(|e| anyhow!("Failed to write {}: {}", path.display(), e))?;
            info!("instance written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[derive(Serialize)]
struct SolveOutput {
    tour: Vec<usize>,
    objective: f64,
    nodes: u64,
    lazy_cuts: usize,
}

pub fn solve(instance: &str, timeout: Option<f64>) -> Result<()> {
    let instance = load_instance(instance)?;
    let mut params = SolverParams::default();
    if let Some(secs) = timeout {
        params = params.with_time_limit(
            Duration::try_from_secs_f64(secs).map_err(|e| anyhow!("Invalid timeout {}: {}", secs, e))?,
        );
    }
    let costs = instance.cost_matrix()?;
    let result = RoutingOracle::with_params(params).solve_routing(costs.view())?;
    let output = SolveOutput {
        tour: result.tour,
        objective: result.oracle.upper_bound,
        nodes: result.oracle.nodes,
        lazy_cuts: result.lazy_cuts,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn read_input(input: &str, what: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| anyhow!("Failed to read {} from stdin: {}", what, e))?;
        Ok(buffer)
    } else if input.ends_with(".json") {
        fs::read_to_string(input).map_err(|e| anyhow!("Failed to read {} file {}: {}", what, input, e))
    } else {
        Ok(input.to_string())
    }
}

fn load_settings(settings: &str) -> Result<GeneratorSettings> {
    let settings = read_input(settings, "settings")?;
    serde_json::from_str(&settings).map_err(|e| anyhow!("Failed to parse settings: {}", e))
}

fn load_instance(instance: &str) -> Result<HardInstance> {
    let instance = read_input(instance, "instance")?;
    HardInstance::from_json(&instance).map_err(|e| anyhow!("Failed to parse instance: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiro_generator::Algorithm;

    #[test]
    fn test_load_settings_from_string() {
        let settings =
            load_settings(r#"{"algorithm": "alternate_heuristic", "num_elements": 16, "num_scenarios": 3}"#)
                .unwrap();
        assert_eq!(settings.algorithm, Algorithm::AlternateHeuristic);
        assert_eq!(settings.num_elements, 16);
        assert_eq!(settings.max_iterations, 100);
        assert!(load_settings(r#"{"algorithm": "unknown"}"#).is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let matches = cli()
            .try_get_matches_from(["hiro-runtime", "generate", "settings.json", "--output", "out.json"])
            .unwrap();
        let (name, sub_m) = matches.subcommand().unwrap();
        assert_eq!(name, "generate");
        assert_eq!(sub_m.get_one::<String>("SETTINGS").unwrap(), "settings.json");
        assert_eq!(sub_m.get_one::<PathBuf>("output").unwrap(), &PathBuf::from("out.json"));
    }

    #[test]
    fn test_generated_instance_can_be_solved() {
        let settings = r#"{"algorithm": "midpoint", "num_elements": 9, "num_scenarios": 2, "seed": 1}"#;
        let settings = load_settings(settings).unwrap();
        let mut generator = HardInstanceGenerator::from_settings(RoutingOracle::new(), &settings).unwrap();
        generator.generate_hard_instance().unwrap();
        let json = generator.instance().unwrap().to_json().unwrap();
        let instance = load_instance(&json).unwrap();
        let result = RoutingOracle::new()
            .solve_routing(instance.cost_matrix().unwrap().view())
            .unwrap();
        assert_eq!(result.tour.len(), 3);
    }
}
