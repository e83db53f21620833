use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::common::Agent;
use crate::graph::{Config, Graph, Instance, VertexId};

#[derive(Debug, Clone)]
pub struct Tile {
    passable: bool,
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        self.passable
    }
}

#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    pub grid: Vec<Vec<Tile>>,
}

impl Map {
    pub fn from_file(path: &str) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("cannot open map file {path}"))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut lines = reader.lines();

        let _type = lines.next().context("missing map type line")??;
        let height = lines
            .next()
            .context("missing height line")??
            .split_whitespace()
            .last()
            .context("malformed height line")?
            .parse::<usize>()?;
        let width = lines
            .next()
            .context("missing width line")??
            .split_whitespace()
            .last()
            .context("malformed width line")?
            .parse::<usize>()?;
        let _map = lines.next().context("missing map marker line")??;

        let mut grid = Vec::with_capacity(height);
        for line in lines.take(height) {
            let row: Vec<Tile> = line?
                .chars()
                .map(|ch| Tile {
                    passable: ch == '.',
                })
                .collect();
            grid.push(row);
        }
        if grid.len() != height || grid.iter().any(|row| row.len() != width) {
            bail!("map body does not match the {height}x{width} header");
        }

        Ok(Map {
            height,
            width,
            grid,
        })
    }

    pub fn is_passable(&self, x: usize, y: usize) -> bool {
        self.grid[x][y].is_passable()
    }

    pub fn get_neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let directions = [(-1, 0), (1, 0), (0, -1), (0, 1)]; // up, down, left, right
        let mut neighbors = Vec::new();

        for &(dx, dy) in &directions {
            let new_x = x as i32 + dx;
            let new_y = y as i32 + dy;
            if new_x >= 0
                && new_y >= 0
                && new_x < self.height as i32
                && new_y < self.width as i32
                && self.grid[new_x as usize][new_y as usize].passable
            {
                neighbors.push((new_x as usize, new_y as usize));
            }
        }

        neighbors
    }

    /// Collapse passable cells into a dense undirected graph.
    pub fn to_grid_graph(&self) -> GridGraph {
        let mut vertex_of = vec![vec![None; self.width]; self.height];
        let mut coord_of = Vec::new();
        for x in 0..self.height {
            for y in 0..self.width {
                if self.grid[x][y].passable {
                    vertex_of[x][y] = Some(coord_of.len());
                    coord_of.push((x, y));
                }
            }
        }

        let mut graph = Graph::new(coord_of.len());
        for (v, &(x, y)) in coord_of.iter().enumerate() {
            for (nx, ny) in self.get_neighbors(x, y) {
                // insert each undirected edge once
                if let Some(u) = vertex_of[nx][ny] {
                    if v < u {
                        graph.add_edge(v, u);
                    }
                }
            }
        }

        GridGraph {
            graph,
            vertex_of,
            coord_of,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GridGraph {
    pub graph: Graph,
    pub vertex_of: Vec<Vec<Option<VertexId>>>,
    pub coord_of: Vec<(usize, usize)>,
}

impl GridGraph {
    pub fn vertex_at(&self, x: usize, y: usize) -> Option<VertexId> {
        self.vertex_of[x][y]
    }

    pub fn build_instance(&self, agents: &[Agent]) -> Result<Instance> {
        let mut starts: Config = Vec::with_capacity(agents.len());
        let mut goals: Config = Vec::with_capacity(agents.len());
        for agent in agents {
            let Some(start) = self.vertex_at(agent.start.0, agent.start.1) else {
                bail!("agent {} starts on a blocked cell {:?}", agent.id, agent.start);
            };
            let Some(goal) = self.vertex_at(agent.goal.0, agent.goal.1) else {
                bail!("agent {} aims at a blocked cell {:?}", agent.id, agent.goal);
            };
            starts.push(start);
            goals.push(goal);
        }

        let instance = Instance::new(self.graph.clone(), starts, goals);
        if !instance.verify() {
            bail!("agents do not form a valid instance (overlapping starts or goals?)");
        }
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TINY_MAP: &str = "type octile\n\
                            height 3\n\
                            width 4\n\
                            map\n\
                            ....\n\
                            .@@.\n\
                            ....\n";

    #[test]
    fn test_read_map() {
        let map = Map::from_reader(Cursor::new(TINY_MAP)).unwrap();

        assert_eq!(map.height, 3);
        assert_eq!(map.width, 4);

        assert!(map.is_passable(0, 0));
        assert!(!map.is_passable(1, 1));
        assert!(!map.is_passable(1, 2));

        let neighbors = map.get_neighbors(0, 1);
        assert_eq!(neighbors.len(), 2);
        assert!(neighbors.contains(&(0, 0)));
        assert!(neighbors.contains(&(0, 2)));
    }

    #[test]
    fn test_grid_graph_adjacency() {
        let map = Map::from_reader(Cursor::new(TINY_MAP)).unwrap();
        let grid = map.to_grid_graph();

        // 12 cells minus 2 blocked
        assert_eq!(grid.graph.size(), 10);

        let corner = grid.vertex_at(0, 0).unwrap();
        assert_eq!(grid.graph.neighbors(corner).len(), 2);

        assert!(grid.vertex_at(1, 1).is_none());

        // left corridor cell (1, 0) connects straight through the gap
        let mid_left = grid.vertex_at(1, 0).unwrap();
        assert_eq!(grid.graph.neighbors(mid_left).len(), 2);
    }

    #[test]
    fn test_build_instance() {
        let map = Map::from_reader(Cursor::new(TINY_MAP)).unwrap();
        let grid = map.to_grid_graph();

        let agents = vec![
            Agent {
                id: 0,
                start: (0, 0),
                goal: (2, 3),
            },
            Agent {
                id: 1,
                start: (2, 0),
                goal: (0, 3),
            },
        ];
        let instance = grid.build_instance(&agents).unwrap();
        assert!(instance.verify());
        assert_eq!(instance.num_agents(), 2);

        let blocked = vec![Agent {
            id: 0,
            start: (1, 1),
            goal: (0, 0),
        }];
        assert!(grid.build_instance(&blocked).is_err());
    }
}
