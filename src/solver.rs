mod algorithm;
mod comm;
mod lacam;

pub use lacam::LaCam;

use crate::common::{Deadline, Solution};

pub trait Solver {
    fn solve(&mut self, deadline: &Deadline) -> Option<Solution>;
}
