use anyhow::{ensure, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::common::Objective;

#[derive(Parser, Debug)]
#[command(
    name = "rust-lacam",
    about = "Anytime multi-agent path finding with lazy constraint addition.",
    version = "0.1.0"
)]
pub struct Cli {
    #[arg(long, short, help = "Path to the YAML config file")]
    pub config: Option<String>,

    #[arg(long, short, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    pub verbose: u8,

    #[arg(long, help = "Override the random seed from the config")]
    pub seed: Option<u64>,
}

#[derive(Serialize, Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub map_path: String,
    pub scen_path: String,
    pub num_agents: usize,
    pub seed: Option<u64>,
    pub objective: Objective,
    pub restart_rate: f64,
    pub time_limit_ms: u64,
    pub output_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map_path: "map_file/test/test.map".to_string(),
            scen_path: "map_file/test/test.scen".to_string(),
            num_agents: 8,
            seed: None,
            objective: Objective::None,
            restart_rate: 0.001,
            time_limit_ms: 3000,
            output_path: None,
        }
    }
}

impl Config {
    pub fn from_yaml_str(config_str: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(config_str)?;
        config.validate()
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> Result<Self> {
        if let Some(seed) = cli.seed {
            self.seed = Some(seed);
        }
        self.validate()
    }

    pub fn validate(self) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&self.restart_rate),
            "restart_rate must lie in [0, 1], got {}",
            self.restart_rate
        );
        ensure!(self.num_agents >= 1, "at least one agent is required");
        Ok(self)
    }
}
