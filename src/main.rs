use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::info;
use nasim::environment::{NasimEnv, ObservabilityMode};
use nasim::render::RenderMode;
use nasim::runner::{run_random_agent, RunConfig};
use nasim::scenario::{
    generate_scenario, load_generator_params, load_scenario, GeneratorParams, Scenario,
};
use std::fs;
use std::path::PathBuf;

/// Network attack simulator: load or generate a scenario and evaluate a
/// random agent on it
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a scenario YAML file
    #[arg(short, long, conflicts_with_all = ["hosts", "services"])]
    scenario: Option<PathBuf>,

    /// Number of hosts for a generated scenario (minimum 3)
    #[arg(long, requires = "services")]
    hosts: Option<usize>,

    /// Number of services for a generated scenario (minimum 1)
    #[arg(long, requires = "hosts")]
    services: Option<usize>,

    /// YAML file with generator parameters
    #[arg(long, requires = "hosts")]
    generator_config: Option<PathBuf>,

    /// Observability mode (MDP or POMDP)
    #[arg(long, default_value = "MDP")]
    mode: String,

    /// Number of random-agent episodes
    #[arg(short, long, default_value_t = 10)]
    episodes: usize,

    /// Step limit per episode
    #[arg(long, default_value_t = 1000)]
    max_steps: usize,

    /// Seed for the environment and the random agent
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Worker threads for parallel episodes (0 = rayon default)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Rendering of the initial state (ascii or readable)
    #[arg(long, default_value = "ascii")]
    render: RenderMode,

    /// Write the evaluation report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the network graph in GraphViz DOT format
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn build_scenario(args: &Args) -> Result<Scenario> {
    match (&args.scenario, args.hosts, args.services) {
        (Some(path), _, _) => {
            load_scenario(path)
                .wrap_err_with(|| format!("Failed to load scenario '{}'", path.display()))
        }
        (None, Some(hosts), Some(services)) => {
            let params = match &args.generator_config {
                Some(path) => load_generator_params(path)
                    .wrap_err_with(|| {
                        format!("Failed to load generator parameters '{}'", path.display())
                    })?,
                None => GeneratorParams { seed: args.seed, ..Default::default() },
            };
            info!("Generating scenario with {} hosts and {} services", hosts, services);
            generate_scenario(hosts, services, &params).wrap_err("Failed to generate scenario")
        }
        _ => Err(eyre!("either --scenario or both --hosts and --services must be given")),
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .wrap_err("Failed to configure thread pool")?;
    }

    let mode: ObservabilityMode = args.mode.parse()?;
    let scenario = build_scenario(&args)?;

    let env = NasimEnv::seeded(scenario.clone(), mode, args.seed)
        .wrap_err("Failed to create environment")?;
    info!("{}", env);
    info!(
        "State shape {:?}, {} actions, minimal steps {}, best possible score {:.2}",
        env.state_shape(),
        env.num_actions(),
        env.minimum_actions(),
        env.best_possible_score()
    );
    println!("{}", env.render(args.render));

    if let Some(path) = &args.graph {
        fs::write(path, env.render_network_graph())
            .wrap_err_with(|| format!("Failed to write graph to '{}'", path.display()))?;
        info!("Wrote network graph to {:?}", path);
    }

    let config = RunConfig {
        episodes: args.episodes,
        max_steps: args.max_steps,
        seed: args.seed,
        mode,
    };
    let report = run_random_agent(&scenario, &config).wrap_err("Random-agent evaluation failed")?;
    info!(
        "Random agent: mean reward {:.2}, goal reached in {:.0}% of {} episodes",
        report.mean_reward,
        report.goal_rate * 100.0,
        report.episodes.len()
    );

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}results.json", env.outfile_name())));
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(&output, json)
        .wrap_err_with(|| format!("Failed to write report to '{}'", output.display()))?;
    info!("Wrote evaluation report to {:?}", output);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["nasim", "--scenario", "tiny.yaml"]);
        assert_eq!(args.scenario, Some(PathBuf::from("tiny.yaml")));
        assert_eq!(args.episodes, 10);
        assert_eq!(args.render, RenderMode::Ascii);
        assert_eq!(args.mode, "MDP");
    }

    #[test]
    fn test_generation_args() {
        let args =
            Args::parse_from(["nasim", "--hosts", "8", "--services", "3", "--render", "readable"]);
        assert_eq!(args.hosts, Some(8));
        assert_eq!(args.render, RenderMode::Readable);

        let scenario = build_scenario(&args).unwrap();
        assert_eq!(scenario.num_hosts(), 8);
        assert_eq!(scenario.num_services(), 3);
    }

    #[test]
    fn test_scenario_and_generation_conflict() {
        let result = Args::try_parse_from([
            "nasim", "--scenario", "a.yaml", "--hosts", "5", "--services", "2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_generator_config_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "max_subnet_size: 2\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let args = Args::parse_from([
            "nasim",
            "--hosts",
            "6",
            "--services",
            "2",
            "--generator-config",
            &path,
        ]);
        let scenario = build_scenario(&args).unwrap();
        assert_eq!(scenario.subnets, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_missing_scenario_source() {
        let args = Args::parse_from(["nasim"]);
        assert!(build_scenario(&args).is_err());
    }
}
