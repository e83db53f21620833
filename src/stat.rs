use tracing::info;

/// Search counters plus the anytime improvement histories.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub(crate) costs: usize,
    pub(crate) time_ms: u64,
    pub(crate) optimal: bool,
    pub(crate) objective: usize,
    pub(crate) loop_cnt: usize,
    pub(crate) num_node_gen: usize,
    pub(crate) hist_cost: Vec<usize>,
    pub(crate) hist_time: Vec<u64>,
}

impl Stats {
    pub(crate) fn record_improvement(&mut self, cost: usize, elapsed_ms: u64) {
        self.hist_cost.push(cost);
        self.hist_time.push(elapsed_ms);
    }

    pub fn print(&self) {
        info!(
            "Cost {:?} Time(ms) {:?} Optimal {:?} Loop count {:?} Generated high level nodes {:?}",
            self.costs, self.time_ms, self.optimal, self.loop_cnt, self.num_node_gen
        );
    }

    pub fn additional_info(&self) -> String {
        let mut info = String::new();
        info += &format!("optimal={}\n", self.optimal as usize);
        info += &format!("objective={}\n", self.objective);
        info += &format!("loop_cnt={}\n", self.loop_cnt);
        info += &format!("num_node_gen={}\n", self.num_node_gen);
        info += &format!("hist_cost={}\n", join(&self.hist_cost));
        info += &format!("hist_time={}\n", join(&self.hist_time));
        info
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_additional_info_format() {
        let mut stats = Stats {
            optimal: true,
            objective: 1,
            loop_cnt: 42,
            num_node_gen: 7,
            ..Default::default()
        };
        stats.record_improvement(10, 3);
        stats.record_improvement(8, 5);

        let info = stats.additional_info();
        assert_eq!(
            info,
            "optimal=1\nobjective=1\nloop_cnt=42\nnum_node_gen=7\nhist_cost=10,8\nhist_time=3,5\n"
        );
    }

    #[test]
    fn test_empty_histories() {
        let stats = Stats::default();
        let info = stats.additional_info();
        assert!(info.contains("hist_cost=\n"));
        assert!(info.contains("optimal=0\n"));
    }
}
