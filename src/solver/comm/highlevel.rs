use std::collections::{BTreeSet, VecDeque};

use super::lowlevel::LNodeId;
use crate::dist::DistTable;
use crate::graph::{Config, Graph};

pub(crate) type HNodeId = usize;

/// A searched configuration plus its bookkeeping. Nodes live in an arena
/// indexed by `HNodeId`; `parent` and `neighbor` hold indices, never owning
/// references, so the (cyclic) search graph needs no reference counting.
#[derive(Debug)]
pub(crate) struct HNode {
    pub(crate) config: Config,
    pub(crate) parent: Option<HNodeId>,
    /// Nodes connected by a known one-step transition; kept ordered so the
    /// rewrite traversal is deterministic.
    pub(crate) neighbor: BTreeSet<HNodeId>,
    pub(crate) g: usize,
    pub(crate) h: usize,
    pub(crate) f: usize,
    pub(crate) priorities: Vec<f64>,
    pub(crate) order: Vec<usize>,
    /// FIFO of unexpanded constraint nodes, seeded with one empty root.
    pub(crate) search_tree: VecDeque<LNodeId>,
}

impl HNode {
    pub(crate) fn new(
        config: Config,
        graph: &Graph,
        dist: &mut DistTable,
        parent: Option<(HNodeId, &HNode)>,
        g: usize,
        h: usize,
        root_constraint: LNodeId,
    ) -> Self {
        let n = config.len();

        let mut priorities = vec![0.0; n];
        match parent {
            None => {
                for i in 0..n {
                    priorities[i] = dist.get(graph, i, config[i]) as f64 / n as f64;
                }
            }
            Some((_, parent_node)) => {
                // dynamic priorities: agents off goal accumulate, agents at
                // goal drop back to their fractional seed
                for i in 0..n {
                    if dist.get(graph, i, config[i]) != 0 {
                        priorities[i] = parent_node.priorities[i] + 1.0;
                    } else {
                        priorities[i] =
                            parent_node.priorities[i] - parent_node.priorities[i].floor();
                    }
                }
            }
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| priorities[j].total_cmp(&priorities[i]));

        let mut search_tree = VecDeque::new();
        search_tree.push_back(root_constraint);

        HNode {
            config,
            parent: parent.map(|(id, _)| id),
            neighbor: BTreeSet::new(),
            g,
            h,
            f: g.saturating_add(h),
            priorities,
            order,
            search_tree,
        }
    }
}
