mod common;
mod config;
mod dist;
mod graph;
mod map;
mod scenario;
mod solver;
mod stat;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use tracing::{error, info};

use crate::common::Deadline;
use crate::config::{Cli, Config};
use crate::map::Map;
use crate::scenario::Scenario;
use crate::solver::{LaCam, Solver};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("cannot read config file {path}"))?;
            Config::from_yaml_str(&raw)?
        }
        None => Config::default(),
    }
    .override_from_command_line(&cli)?;
    info!("config: {config:?}");

    let map = Map::from_file(&config.map_path)?;
    let scenario = Scenario::load_from_scen(&config.scen_path)?;

    let mut scen_rng = StdRng::seed_from_u64(config.seed.unwrap_or(0));
    let agents = scenario.generate_agents_randomly(config.num_agents, &mut scen_rng)?;
    for agent in &agents {
        ensure!(
            agent.verify(&map),
            "agent {} has a blocked start or goal",
            agent.id
        );
    }

    let grid = map.to_grid_graph();
    let instance = grid.build_instance(&agents)?;

    let deadline = Deadline::new(config.time_limit_ms);
    let mut solver = LaCam::new(
        instance.clone(),
        config.objective,
        config.restart_rate,
        config.seed,
    );
    let solution = solver.solve(&deadline);

    match &solution {
        Some(solution) => {
            if !solution.verify(&instance) {
                error!("solution failed verification");
            }
            solution.log_solution();
            info!("makespan: {}", solution.makespan());
            if let Some(output_path) = &config.output_path {
                solution.write_yaml(output_path)?;
                info!("solution written to {output_path}");
            }
        }
        None => info!("no solution found"),
    }

    solver.stats().print();
    print!("{}", solver.additional_info());

    Ok(())
}
