use std::collections::HashSet;

pub type VertexId = usize;

/// Joint placement of all agents, indexed by agent id.
pub type Config = Vec<VertexId>;

#[derive(Debug, Clone, Default)]
pub struct Graph {
    adjacency: Vec<Vec<VertexId>>,
}

impl Graph {
    pub fn new(num_vertices: usize) -> Self {
        Graph {
            adjacency: vec![Vec::new(); num_vertices],
        }
    }

    pub fn add_edge(&mut self, u: VertexId, v: VertexId) {
        self.adjacency[u].push(v);
        self.adjacency[v].push(u);
    }

    pub fn size(&self) -> usize {
        self.adjacency.len()
    }

    pub fn neighbors(&self, v: VertexId) -> &[VertexId] {
        &self.adjacency[v]
    }
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub graph: Graph,
    pub starts: Config,
    pub goals: Config,
}

impl Instance {
    pub fn new(graph: Graph, starts: Config, goals: Config) -> Self {
        Instance {
            graph,
            starts,
            goals,
        }
    }

    pub fn num_agents(&self) -> usize {
        self.starts.len()
    }

    pub fn verify(&self) -> bool {
        let n = self.starts.len();
        if n == 0 || self.goals.len() != n {
            return false;
        }
        if self
            .starts
            .iter()
            .chain(self.goals.iter())
            .any(|&v| v >= self.graph.size())
        {
            return false;
        }

        // starts and goals must each be pairwise distinct
        let starts: HashSet<VertexId> = self.starts.iter().copied().collect();
        let goals: HashSet<VertexId> = self.goals.iter().copied().collect();
        starts.len() == n && goals.len() == n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(config: &Config) -> u64 {
        let mut hasher = DefaultHasher::new();
        config.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_graph_edges_are_symmetric() {
        let mut graph = Graph::new(4);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(2, 3);
        graph.add_edge(3, 0);

        assert_eq!(graph.size(), 4);
        assert_eq!(graph.neighbors(0), &[1, 3]);
        assert_eq!(graph.neighbors(1), &[0, 2]);
        assert_eq!(graph.neighbors(3), &[2, 0]);
    }

    #[test]
    fn test_config_hash_round_trip() {
        let config: Config = vec![3, 1, 4, 1];
        let ids: Vec<usize> = config.clone();
        let rebuilt: Config = ids;

        assert_eq!(config, rebuilt);
        assert_eq!(hash_of(&config), hash_of(&rebuilt));
    }

    #[test]
    fn test_instance_verify() {
        let mut graph = Graph::new(3);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);

        assert!(Instance::new(graph.clone(), vec![0, 2], vec![2, 0]).verify());
        // duplicate starts
        assert!(!Instance::new(graph.clone(), vec![0, 0], vec![2, 1]).verify());
        // duplicate goals
        assert!(!Instance::new(graph.clone(), vec![0, 1], vec![2, 2]).verify());
        // out of range
        assert!(!Instance::new(graph.clone(), vec![0, 3], vec![2, 0]).verify());
        // length mismatch
        assert!(!Instance::new(graph, vec![0, 1], vec![2]).verify());
    }
}
