use anyhow::{bail, Context, Result};
use rand::prelude::*;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use tracing::info;

use crate::common::Agent;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Route {
    pub start_x: usize,
    pub start_y: usize,
    pub goal_x: usize,
    pub goal_y: usize,
}

#[derive(Debug)]
pub struct Scenario {
    pub map: String,
    pub map_width: usize,
    pub map_height: usize,
    pub routes: Vec<Route>,
}

impl Scenario {
    pub fn load_from_scen(path: &str) -> Result<Scenario> {
        let file = File::open(path).with_context(|| format!("cannot open scenario {path}"))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Scenario> {
        let mut lines = reader.lines();

        // first line is "version x.x"
        let _version = lines.next().context("empty scenario file")??;

        let mut scenario = Scenario {
            map: String::new(),
            map_width: 0,
            map_height: 0,
            routes: Vec::new(),
        };

        for line in lines {
            let line = line?;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 8 {
                bail!("malformed scenario row: {line}");
            }

            // scen columns are (col, row); the grid indexes (row, col)
            let route = Route {
                start_x: parts[5].parse()?,
                start_y: parts[4].parse()?,
                goal_x: parts[7].parse()?,
                goal_y: parts[6].parse()?,
            };

            if scenario.map.is_empty() {
                scenario.map = parts[1].to_string();
                scenario.map_width = parts[2].parse()?;
                scenario.map_height = parts[3].parse()?;
            }

            scenario.routes.push(route);
        }

        Ok(scenario)
    }

    /// Draw agents whose starts and goals are pairwise distinct, in a
    /// shuffled order fixed by the caller's RNG.
    pub fn generate_agents_randomly<R: Rng + ?Sized>(
        &self,
        num_agents: usize,
        rng: &mut R,
    ) -> Result<Vec<Agent>> {
        let mut available_routes = self.routes.clone();
        available_routes.sort();
        available_routes.shuffle(rng);

        let mut agents: Vec<Agent> = Vec::new();
        let mut used_starts: HashSet<(usize, usize)> = HashSet::new();
        let mut used_goals: HashSet<(usize, usize)> = HashSet::new();

        for route in available_routes {
            if agents.len() == num_agents {
                break;
            }
            let start = (route.start_x, route.start_y);
            let goal = (route.goal_x, route.goal_y);
            if !used_starts.insert(start) || !used_goals.insert(goal) {
                continue;
            }
            agents.push(Agent {
                id: agents.len(),
                start,
                goal,
            });
        }

        if agents.len() < num_agents {
            bail!(
                "scenario only yields {} non-overlapping agents, {} requested",
                agents.len(),
                num_agents
            );
        }

        info!("Generate scen: {agents:?}");
        Ok(agents)
    }

    pub fn load_agents_from_yaml(path: &str) -> Result<Vec<Agent>> {
        let file = File::open(path).with_context(|| format!("cannot open agent list {path}"))?;
        let agents = serde_yaml::from_reader(BufReader::new(file))?;
        Ok(agents)
    }

    pub fn write_agents_to_yaml(path: &str, agents: &[Agent]) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(serde_yaml::to_string(&agents)?.as_bytes())?;
        Ok(())
    }
}
