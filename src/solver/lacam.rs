use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, instrument};

use super::algorithm::Pibt;
use super::comm::{HNode, HNodeId, LNodeId, LNodePool};
use super::Solver;
use crate::common::{Deadline, Objective, Solution};
use crate::dist::DistTable;
use crate::graph::{Config, Instance};
use crate::stat::Stats;

/// DFS over joint configurations. Each visited configuration owns a lazily
/// grown tree of partial constraints; a one-step PIBT run under the popped
/// constraint yields the successor configuration. Revisited configurations
/// trigger a Dijkstra-style relaxation over the discovered search graph, and
/// with an RNG attached the search occasionally restarts from the root.
pub struct LaCam {
    instance: Instance,
    objective: Objective,
    restart_rate: f64,
    rng: Option<StdRng>,
    dist: DistTable,
    stats: Stats,
    nodes: Vec<HNode>,
    explored: HashMap<Config, HNodeId>,
    lnodes: LNodePool,
    pibt: Pibt,
}

impl LaCam {
    pub fn new(
        instance: Instance,
        objective: Objective,
        restart_rate: f64,
        seed: Option<u64>,
    ) -> Self {
        let num_agents = instance.num_agents();
        let num_vertices = instance.graph.size();
        LaCam {
            dist: DistTable::new(&instance.goals),
            pibt: Pibt::new(num_agents, num_vertices),
            rng: seed.map(StdRng::seed_from_u64),
            instance,
            objective,
            restart_rate,
            stats: Stats::default(),
            nodes: Vec::new(),
            explored: HashMap::new(),
            lnodes: LNodePool::default(),
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn additional_info(&self) -> String {
        self.stats.additional_info()
    }

    fn h_value(&mut self, config: &Config) -> usize {
        let n = config.len();
        match self.objective {
            Objective::Makespan => (0..n)
                .map(|i| self.dist.get(&self.instance.graph, i, config[i]))
                .max()
                .unwrap_or(0),
            Objective::SumOfLoss => (0..n).fold(0usize, |acc, i| {
                acc.saturating_add(self.dist.get(&self.instance.graph, i, config[i]))
            }),
            Objective::None => 0,
        }
    }

    fn push_hnode(&mut self, config: Config, parent: Option<HNodeId>, g: usize) -> HNodeId {
        let h = self.h_value(&config);
        let root_constraint = self.lnodes.root();
        let id = self.nodes.len();
        let node = HNode::new(
            config,
            &self.instance.graph,
            &mut self.dist,
            parent.map(|p| (p, &self.nodes[p])),
            g,
            h,
            root_constraint,
        );
        self.nodes.push(node);
        if let Some(p) = parent {
            self.nodes[p].neighbor.insert(id);
        }
        self.explored.insert(self.nodes[id].config.clone(), id);
        id
    }

    /// Grow the constraint tree one level below `l`: one child per candidate
    /// vertex of the next agent in priority order.
    fn expand_lowlevel_tree(&mut self, h: HNodeId, l: LNodeId) {
        let depth = self.lnodes.depth(l);
        if depth >= self.instance.num_agents() {
            return;
        }
        let i = self.nodes[h].order[depth];

        let mut candidates = self.instance.graph.neighbors(self.nodes[h].config[i]).to_vec();
        candidates.push(self.nodes[h].config[i]);
        if let Some(rng) = &mut self.rng {
            use rand::seq::SliceRandom;
            candidates.shuffle(rng);
        }

        for v in candidates {
            let child = self.lnodes.child(l, i, v);
            self.nodes[h].search_tree.push_back(child);
        }
    }

    /// Replay the constraint path of `l` onto fresh occupancy scratch, then
    /// let PIBT complete the step for the unpinned agents.
    fn get_new_config(&mut self, h: HNodeId, l: LNodeId) -> bool {
        self.pibt.setup(&self.nodes[h].config);

        let path = self.lnodes.constraint_path(l);
        if !self.pibt.apply_constraints(&self.nodes[h].config, &path) {
            return false;
        }

        for idx in 0..self.instance.num_agents() {
            let k = self.nodes[h].order[idx];
            if self.pibt.agents[k].v_next.is_none()
                && !self.pibt.func_pibt(k, &self.instance, &mut self.dist, &mut self.rng)
            {
                return false;
            }
        }
        true
    }

    /// Insert the edge `from <-> to` and propagate any cost improvement
    /// through the discovered search graph. Branches that beat the incumbent
    /// goal cost are pushed back onto OPEN.
    fn rewrite(
        &mut self,
        from: HNodeId,
        to: HNodeId,
        h_goal: Option<HNodeId>,
        open: &mut Vec<HNodeId>,
        deadline: &Deadline,
    ) {
        self.nodes[from].neighbor.insert(to);
        self.nodes[to].neighbor.insert(from);

        let mut queue = VecDeque::from([from]);
        while let Some(n_from) = queue.pop_front() {
            let neighbors: Vec<HNodeId> = self.nodes[n_from].neighbor.iter().copied().collect();
            for n_to in neighbors {
                let g_val = self.nodes[n_from].g.saturating_add(get_edge_cost(
                    self.objective,
                    &self.instance.goals,
                    &self.nodes[n_from].config,
                    &self.nodes[n_to].config,
                ));
                if g_val < self.nodes[n_to].g {
                    if Some(n_to) == h_goal {
                        info!("cost update: {} -> {}", self.nodes[n_to].g, g_val);
                        self.stats.record_improvement(g_val, deadline.elapsed_ms());
                    }
                    self.nodes[n_to].g = g_val;
                    self.nodes[n_to].f = g_val.saturating_add(self.nodes[n_to].h);
                    self.nodes[n_to].parent = Some(n_from);
                    queue.push_back(n_to);
                    if let Some(goal) = h_goal {
                        if self.nodes[n_to].f < self.nodes[goal].f {
                            open.push(n_to);
                        }
                    }
                }
            }
        }
    }
}

impl Solver for LaCam {
    #[instrument(skip_all, name = "lacam", fields(agents = self.instance.num_agents()), level = "debug")]
    fn solve(&mut self, deadline: &Deadline) -> Option<Solution> {
        info!("start search");

        let init = self.push_hnode(self.instance.starts.clone(), None, 0);
        let mut open: Vec<HNodeId> = vec![init];
        let mut h_goal: Option<HNodeId> = None;

        loop {
            let Some(&h) = open.last() else { break };
            if deadline.is_expired() {
                break;
            }
            self.stats.loop_cnt += 1;

            // low-level tree exhausted for this node
            if self.nodes[h].search_tree.is_empty() {
                open.pop();
                continue;
            }

            // bound pruning against the incumbent
            if let Some(goal) = h_goal {
                if self.nodes[h].f >= self.nodes[goal].f {
                    open.pop();
                    continue;
                }
            }

            if h_goal.is_none() && self.nodes[h].config == self.instance.goals {
                h_goal = Some(h);
                info!("found solution, cost: {}", self.nodes[h].g);
                self.stats
                    .record_improvement(self.nodes[h].g, deadline.elapsed_ms());
                if self.objective == Objective::None {
                    break;
                }
                continue;
            }

            // successors at the low level
            let Some(l) = self.nodes[h].search_tree.pop_front() else {
                continue;
            };
            self.expand_lowlevel_tree(h, l);

            // successors at the high level
            if !self.get_new_config(h, l) {
                continue;
            }
            let Some(c_new) = self.pibt.next_config() else {
                continue;
            };

            match self.explored.get(&c_new) {
                Some(&existing) => {
                    self.rewrite(h, existing, h_goal, &mut open, deadline);

                    // re-insert, or randomly restart from the root
                    let reinsert = match self.rng.as_mut() {
                        Some(rng) => {
                            if rng.gen::<f64>() < self.restart_rate {
                                init
                            } else {
                                existing
                            }
                        }
                        None => existing,
                    };
                    if h_goal.is_none_or(|goal| self.nodes[reinsert].f < self.nodes[goal].f) {
                        open.push(reinsert);
                    }
                }
                None => {
                    let g = self.nodes[h].g.saturating_add(get_edge_cost(
                        self.objective,
                        &self.instance.goals,
                        &self.nodes[h].config,
                        &c_new,
                    ));
                    let new_id = self.push_hnode(c_new, Some(h), g);
                    debug!(
                        "new node {} f={} from {}",
                        new_id, self.nodes[new_id].f, h
                    );
                    if h_goal.is_none_or(|goal| self.nodes[new_id].f < self.nodes[goal].f) {
                        open.push(new_id);
                    }
                }
            }
        }

        // backtrack the parent chain
        let solution = h_goal.map(|goal| {
            let mut configs = Vec::new();
            let mut cur = Some(goal);
            while let Some(id) = cur {
                configs.push(self.nodes[id].config.clone());
                cur = self.nodes[id].parent;
            }
            configs.reverse();
            Solution { configs }
        });

        match (h_goal, open.is_empty()) {
            (Some(_), true) => info!("solved optimally, objective: {}", self.objective),
            (Some(_), false) => info!("solved sub-optimally, objective: {}", self.objective),
            (None, true) => info!("no solution"),
            (None, false) => info!("timeout"),
        }

        self.stats.optimal = h_goal.is_some() && open.is_empty();
        self.stats.objective = self.objective.index();
        self.stats.num_node_gen = self.nodes.len();
        self.stats.time_ms = deadline.elapsed_ms();
        if let Some(goal) = h_goal {
            self.stats.costs = self.nodes[goal].g;
            self.stats
                .record_improvement(self.nodes[goal].g, deadline.elapsed_ms());
        }

        solution
    }
}

/// Transition cost between two configurations under the chosen objective.
pub(crate) fn get_edge_cost(
    objective: Objective,
    goals: &Config,
    c1: &Config,
    c2: &Config,
) -> usize {
    match objective {
        // hamming distance, used only as a tiebreaker
        Objective::None => c1.iter().zip(c2).filter(|(a, b)| a != b).count(),
        Objective::SumOfLoss => (0..c1.len())
            .filter(|&i| c1[i] != goals[i] || c2[i] != goals[i])
            .count(),
        Objective::Makespan => 1,
    }
}
