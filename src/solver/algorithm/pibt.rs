use rand::rngs::StdRng;
use rand::Rng;

use crate::dist::DistTable;
use crate::graph::{Config, Instance, VertexId};

/// Corridor-swap extension toggle.
pub(crate) const ENABLE_SWAP: bool = true;

#[derive(Debug, Clone)]
pub(crate) struct AgentState {
    pub(crate) v_now: VertexId,
    pub(crate) v_next: Option<VertexId>,
}

/// One-step prioritized planner. Produces, for a fixed current configuration
/// and an optional prefix of pinned agents, a complete collision-free next
/// configuration. The occupancy scratch survives across calls and is cleaned
/// incrementally in `setup`.
#[derive(Debug)]
pub(crate) struct Pibt {
    pub(crate) agents: Vec<AgentState>,
    occupied_now: Vec<Option<usize>>,
    occupied_next: Vec<Option<usize>>,
    tie_breakers: Vec<f64>,
}

impl Pibt {
    pub(crate) fn new(num_agents: usize, num_vertices: usize) -> Self {
        Pibt {
            agents: vec![
                AgentState {
                    v_now: 0,
                    v_next: None,
                };
                num_agents
            ],
            occupied_now: vec![None; num_vertices],
            occupied_next: vec![None; num_vertices],
            tie_breakers: vec![0.0; num_vertices],
        }
    }

    /// Clear the previous invocation's marks and place every agent at its
    /// position in `config`.
    pub(crate) fn setup(&mut self, config: &Config) {
        for i in 0..self.agents.len() {
            let v_now = self.agents[i].v_now;
            if self.occupied_now[v_now] == Some(i) {
                self.occupied_now[v_now] = None;
            }
            if let Some(v_next) = self.agents[i].v_next.take() {
                self.occupied_next[v_next] = None;
            }

            self.agents[i].v_now = config[i];
            self.occupied_now[config[i]] = Some(i);
        }
    }

    /// Pin the constrained agents to their vertices. Fails on a vertex clash
    /// or on a pairwise swap against an already-pinned agent.
    pub(crate) fn apply_constraints(
        &mut self,
        config: &Config,
        path: &[(usize, VertexId)],
    ) -> bool {
        for &(who, to) in path {
            if self.occupied_next[to].is_some() {
                return false;
            }
            let origin = config[who];
            if let (Some(incoming), Some(resident)) =
                (self.occupied_next[origin], self.occupied_now[to])
            {
                if incoming == resident {
                    return false;
                }
            }

            self.agents[who].v_next = Some(to);
            self.occupied_next[to] = Some(who);
        }
        true
    }

    pub(crate) fn next_config(&self) -> Option<Config> {
        self.agents.iter().map(|a| a.v_next).collect()
    }

    pub(crate) fn func_pibt(
        &mut self,
        i: usize,
        instance: &Instance,
        dist: &mut DistTable,
        rng: &mut Option<StdRng>,
    ) -> bool {
        let v_now = self.agents[i].v_now;
        let neighbors = instance.graph.neighbors(v_now);

        let mut candidates: Vec<VertexId> = Vec::with_capacity(neighbors.len() + 1);
        for &u in neighbors {
            if let Some(rng) = rng {
                self.tie_breakers[u] = rng.gen::<f64>();
            }
            candidates.push(u);
        }
        candidates.push(v_now);

        let mut keyed: Vec<(f64, VertexId)> = candidates
            .iter()
            .map(|&v| {
                (
                    dist.get(&instance.graph, i, v) as f64 + self.tie_breakers[v],
                    v,
                )
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut candidates: Vec<VertexId> = keyed.into_iter().map(|(_, v)| v).collect();

        let swap_agent = if ENABLE_SWAP {
            self.swap_possible_and_required(i, &candidates, instance, dist)
        } else {
            None
        };
        if swap_agent.is_some() {
            // take the retreat direction first so the partner can be pulled
            candidates.reverse();
        }

        for (k, &u) in candidates.iter().enumerate() {
            // vertex conflict
            if self.occupied_next[u].is_some() {
                continue;
            }

            let ak = self.occupied_now[u];

            // swap conflict
            if ak.is_some_and(|ak| self.agents[ak].v_next == Some(v_now)) {
                continue;
            }

            // reserve next location
            self.occupied_next[u] = Some(i);
            self.agents[i].v_next = Some(u);

            // priority inheritance: push the current resident out first
            if let Some(ak) = ak {
                if ak != i
                    && self.agents[ak].v_next.is_none()
                    && !self.func_pibt(ak, instance, dist, rng)
                {
                    continue;
                }
            }

            // pull the swap partner into the vacated vertex
            if let Some(aj) = swap_agent {
                if k == 0
                    && self.agents[aj].v_next.is_none()
                    && self.occupied_next[v_now].is_none()
                {
                    self.agents[aj].v_next = Some(v_now);
                    self.occupied_next[v_now] = Some(aj);
                }
            }
            return true;
        }

        // failed to secure a node: keep a reservation on the current vertex
        self.occupied_next[v_now] = Some(i);
        self.agents[i].v_next = Some(v_now);
        false
    }

    fn swap_possible_and_required(
        &self,
        i: usize,
        candidates: &[VertexId],
        instance: &Instance,
        dist: &mut DistTable,
    ) -> Option<usize> {
        let v_now = self.agents[i].v_now;
        if candidates[0] == v_now {
            return None;
        }

        // head-on case: the best candidate is occupied by an unplanned agent
        if let Some(aj) = self.occupied_now[candidates[0]] {
            if self.agents[aj].v_next.is_none()
                && self.is_swap_required(i, aj, v_now, self.agents[aj].v_now, instance, dist)
                && self.is_swap_possible(self.agents[aj].v_now, v_now, instance)
            {
                return Some(aj);
            }
        }

        // clear operation: a neighbor needs to pass through this agent
        for &u in instance.graph.neighbors(v_now) {
            let Some(ak) = self.occupied_now[u] else {
                continue;
            };
            if candidates[0] == self.agents[ak].v_now {
                continue;
            }
            if self.is_swap_required(ak, i, v_now, candidates[0], instance, dist)
                && self.is_swap_possible(candidates[0], v_now, instance)
            {
                return Some(ak);
            }
        }

        None
    }

    /// Walk the puller away from the pusher along a unique corridor. The swap
    /// is required when the puller sits on the pusher's shortest path and the
    /// corridor offers no branching escape.
    pub(crate) fn is_swap_required(
        &self,
        pusher: usize,
        puller: usize,
        v_pusher_origin: VertexId,
        v_puller_origin: VertexId,
        instance: &Instance,
        dist: &mut DistTable,
    ) -> bool {
        let graph = &instance.graph;
        let mut v_pusher = v_pusher_origin;
        let mut v_puller = v_puller_origin;
        let mut tmp: Option<VertexId> = None;

        while dist.get(graph, pusher, v_puller) < dist.get(graph, pusher, v_pusher) {
            let mut n = graph.neighbors(v_puller).len();
            for &u in graph.neighbors(v_puller) {
                let parked_at_goal = graph.neighbors(u).len() == 1
                    && self.occupied_now[u].is_some_and(|a| instance.goals[a] == u);
                if u == v_pusher || parked_at_goal {
                    n -= 1;
                } else {
                    tmp = Some(u);
                }
            }
            if n >= 2 {
                return false; // able to avoid each other
            }
            if n == 0 {
                break;
            }
            v_pusher = v_puller;
            match tmp {
                Some(u) => v_puller = u,
                None => break,
            }
        }

        dist.get(graph, puller, v_pusher) < dist.get(graph, puller, v_puller)
            && (dist.get(graph, pusher, v_pusher) == 0
                || dist.get(graph, pusher, v_puller) < dist.get(graph, pusher, v_pusher))
    }

    /// Walk down the corridor looking for a branching vertex the pair could
    /// swap around.
    pub(crate) fn is_swap_possible(
        &self,
        v_pusher_origin: VertexId,
        v_puller_origin: VertexId,
        instance: &Instance,
    ) -> bool {
        let graph = &instance.graph;
        let mut v_pusher = v_pusher_origin;
        let mut v_puller = v_puller_origin;
        let mut tmp: Option<VertexId> = None;

        while v_puller != v_pusher_origin {
            let mut n = graph.neighbors(v_puller).len();
            for &u in graph.neighbors(v_puller) {
                let parked_at_goal = graph.neighbors(u).len() == 1
                    && self.occupied_now[u].is_some_and(|a| instance.goals[a] == u);
                if u == v_pusher || parked_at_goal {
                    n -= 1;
                } else {
                    tmp = Some(u);
                }
            }
            if n >= 2 {
                return true; // found a branching vertex
            }
            if n == 0 {
                return false; // dead end
            }
            v_pusher = v_puller;
            match tmp {
                Some(u) => v_puller = u,
                None => return false,
            }
        }
        false // looped back
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, Instance};

    fn path_instance(n: usize, starts: Config, goals: Config) -> Instance {
        let mut graph = Graph::new(n);
        for v in 1..n {
            graph.add_edge(v - 1, v);
        }
        Instance::new(graph, starts, goals)
    }

    #[test]
    fn test_swap_impossible_in_plain_corridor() {
        // 0 - 1 - 2 with agents parked at both ends
        let instance = path_instance(3, vec![0, 2], vec![2, 0]);
        let mut pibt = Pibt::new(2, 3);
        pibt.setup(&instance.starts);

        assert!(!pibt.is_swap_possible(0, 2, &instance));
        assert!(!pibt.is_swap_possible(2, 0, &instance));
    }

    #[test]
    fn test_swap_possible_with_branch() {
        // corridor 0 - 1 - 2 plus a spur 1 - 3 - 4: vertex 1 branches
        let mut graph = Graph::new(5);
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph.add_edge(1, 3);
        graph.add_edge(3, 4);
        let instance = Instance::new(graph, vec![0, 2], vec![2, 0]);

        let mut pibt = Pibt::new(2, 5);
        pibt.setup(&instance.starts);

        assert!(pibt.is_swap_possible(0, 2, &instance));
    }

    #[test]
    fn test_swap_required_head_on() {
        // adjacent pair deep in a corridor, each blocking the other's path
        let instance = path_instance(3, vec![0, 1], vec![2, 0]);
        let mut pibt = Pibt::new(2, 3);
        pibt.setup(&instance.starts);
        let mut dist = DistTable::new(&instance.goals);

        assert!(pibt.is_swap_required(0, 1, 0, 1, &instance, &mut dist));
    }

    #[test]
    fn test_single_agent_steps_toward_goal() {
        let instance = path_instance(4, vec![0], vec![3]);
        let mut pibt = Pibt::new(1, 4);
        let mut dist = DistTable::new(&instance.goals);
        let mut rng = None;

        pibt.setup(&instance.starts);
        assert!(pibt.func_pibt(0, &instance, &mut dist, &mut rng));
        assert_eq!(pibt.agents[0].v_next, Some(1));
    }

    #[test]
    fn test_pinned_vertex_forces_detour() {
        // both agents want vertex 1; agent 1 is pinned there first
        let instance = path_instance(4, vec![0, 2], vec![3, 1]);
        let mut pibt = Pibt::new(2, 4);
        let mut dist = DistTable::new(&instance.goals);
        let mut rng = None;

        pibt.setup(&instance.starts);
        assert!(pibt.apply_constraints(&instance.starts, &[(1, 1)]));
        assert!(pibt.func_pibt(0, &instance, &mut dist, &mut rng));
        // vertex 1 is taken, and moving nowhere beats drifting backwards
        assert_eq!(pibt.agents[0].v_next, Some(0));

        let config = pibt.next_config().unwrap();
        assert_eq!(config, vec![0, 1]);
    }

    #[test]
    fn test_constraint_replay_rejects_vertex_clash() {
        let instance = path_instance(4, vec![0, 2], vec![3, 0]);
        let mut pibt = Pibt::new(2, 4);
        pibt.setup(&instance.starts);

        assert!(!pibt.apply_constraints(&instance.starts, &[(0, 1), (1, 1)]));
    }

    #[test]
    fn test_constraint_replay_rejects_pairwise_swap() {
        // 0 <-> 1 exchange between adjacent agents
        let instance = path_instance(3, vec![0, 1], vec![2, 0]);
        let mut pibt = Pibt::new(2, 3);
        pibt.setup(&instance.starts);

        assert!(!pibt.apply_constraints(&instance.starts, &[(0, 1), (1, 0)]));
    }

    #[test]
    fn test_head_on_neighbors_do_not_cross() {
        // adjacent agents facing each other in a dead corridor: the joint
        // step must not trade their vertices
        let instance = path_instance(2, vec![0, 1], vec![1, 0]);
        let mut pibt = Pibt::new(2, 2);
        let mut dist = DistTable::new(&instance.goals);
        let mut rng = None;

        pibt.setup(&instance.starts);
        let mut ok = true;
        for i in 0..2 {
            if pibt.agents[i].v_next.is_none() {
                ok &= pibt.func_pibt(i, &instance, &mut dist, &mut rng);
            }
        }
        if ok {
            let config = pibt.next_config().unwrap();
            assert_ne!(config, vec![1, 0]);
        }
    }
}
