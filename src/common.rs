use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::graph::{Config, Instance, VertexId};
use crate::map::Map;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub start: (usize, usize),
    pub goal: (usize, usize),
}

impl Agent {
    pub fn verify(&self, map: &Map) -> bool {
        map.is_passable(self.start.0, self.start.1) && map.is_passable(self.goal.0, self.goal.1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    #[default]
    None,
    Makespan,
    SumOfLoss,
}

impl Objective {
    pub(crate) fn index(self) -> usize {
        match self {
            Objective::None => 0,
            Objective::Makespan => 1,
            Objective::SumOfLoss => 2,
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::None => write!(f, "none"),
            Objective::Makespan => write!(f, "makespan"),
            Objective::SumOfLoss => write!(f, "sum_of_loss"),
        }
    }
}

/// Wall-clock budget handed to the solver; polled once per search iteration.
#[derive(Debug)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn new(limit_ms: u64) -> Self {
        Deadline {
            start: Instant::now(),
            limit: Duration::from_millis(limit_ms),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn is_expired(&self) -> bool {
        self.start.elapsed() >= self.limit
    }
}

/// Sequence of joint configurations, one per timestep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    pub configs: Vec<Config>,
}

impl Solution {
    pub fn makespan(&self) -> usize {
        self.configs.len().saturating_sub(1)
    }

    pub fn verify(&self, instance: &Instance) -> bool {
        if self.configs.is_empty() {
            return true;
        }

        let n = instance.num_agents();
        if self.configs.iter().any(|config| config.len() != n) {
            error!("incomplete solution");
            return false;
        }

        if self.configs[0] != instance.starts {
            error!(
                "start mismatch: solution begins at {:?}, instance starts at {:?}",
                self.configs[0], instance.starts
            );
            return false;
        }
        if self.configs.last().is_none_or(|last| *last != instance.goals) {
            error!("goal mismatch: solution ends off the goal configuration");
            return false;
        }

        for (t, window) in self.configs.windows(2).enumerate() {
            let [from, to] = window else { continue };

            for i in 0..n {
                if to[i] != from[i] && !instance.graph.neighbors(from[i]).contains(&to[i]) {
                    error!("illegal move of agent {} at timestep {}", i, t + 1);
                    return false;
                }
            }

            for i in 0..n {
                for j in (i + 1)..n {
                    if from[i] == to[j] && from[j] == to[i] {
                        error!(
                            "swap conflict between agents {} and {} at timestep {}",
                            i,
                            j,
                            t + 1
                        );
                        return false;
                    }
                }
            }
        }

        for (t, config) in self.configs.iter().enumerate() {
            let mut seen_vertices = HashSet::new();
            for &v in config {
                if !seen_vertices.insert(v) {
                    error!("vertex conflict at {:?} in timestep {}", v, t);
                    return false;
                }
            }
        }

        true
    }

    pub fn log_solution(&self) {
        let mut formatted_solution = String::new();
        for (t, config) in self.configs.iter().enumerate() {
            formatted_solution.push_str(&format!(" t{}: {:?}\n", t, config));
        }
        debug!("solution:\n{}", formatted_solution);
    }

    pub fn write_yaml(&self, path: &str) -> Result<()> {
        let n = self.configs.first().map_or(0, |config| config.len());
        let paths: Vec<Vec<VertexId>> = (0..n)
            .map(|i| self.configs.iter().map(|config| config[i]).collect())
            .collect();

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(serde_yaml::to_string(&paths)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn line_instance() -> Instance {
        // 0 - 1 - 2 - 3
        let mut graph = Graph::new(4);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(2, 3);
        Instance::new(graph, vec![0, 3], vec![1, 2])
    }

    #[test]
    fn test_deadline_zero_expires_immediately() {
        let deadline = Deadline::new(0);
        assert!(deadline.is_expired());
    }

    #[test]
    fn test_objective_encoding() {
        assert_eq!(Objective::None.index(), 0);
        assert_eq!(Objective::Makespan.index(), 1);
        assert_eq!(Objective::SumOfLoss.index(), 2);
        assert_eq!(Objective::SumOfLoss.to_string(), "sum_of_loss");
    }

    #[test]
    fn test_verify_accepts_valid_solution() {
        let instance = line_instance();
        let solution = Solution {
            configs: vec![vec![0, 3], vec![1, 2]],
        };
        assert!(solution.verify(&instance));
        assert_eq!(solution.makespan(), 1);
    }

    #[test]
    fn test_verify_rejects_vertex_conflict() {
        let instance = line_instance();
        let solution = Solution {
            configs: vec![vec![0, 3], vec![2, 2]],
        };
        assert!(!solution.verify(&instance));
    }

    #[test]
    fn test_verify_rejects_swap_conflict() {
        // agents trade places across one timestep
        let mut graph = Graph::new(2);
        graph.add_edge(0, 1);
        let instance = Instance::new(graph, vec![0, 1], vec![1, 0]);
        let solution = Solution {
            configs: vec![vec![0, 1], vec![1, 0]],
        };
        assert!(!solution.verify(&instance));
    }

    #[test]
    fn test_verify_rejects_teleport() {
        let instance = line_instance();
        let solution = Solution {
            configs: vec![vec![0, 3], vec![1, 3], vec![1, 2]],
        };
        // agent 0 stays once: fine. Replace with a jump 0 -> 2.
        assert!(solution.verify(&instance));
        let bad = Solution {
            configs: vec![vec![0, 3], vec![2, 3], vec![1, 2]],
        };
        assert!(!bad.verify(&instance));
    }

    #[test]
    fn test_verify_rejects_wrong_endpoints() {
        let instance = line_instance();
        let bad_start = Solution {
            configs: vec![vec![1, 3], vec![1, 2]],
        };
        assert!(!bad_start.verify(&instance));
        let bad_goal = Solution {
            configs: vec![vec![0, 3], vec![0, 2]],
        };
        assert!(!bad_goal.verify(&instance));
    }

    #[test]
    fn test_empty_solution_is_trivially_valid() {
        let instance = line_instance();
        assert!(Solution::default().verify(&instance));
    }
}
