#![allow(dead_code)]

use mc_core::{Communicator, McError, RngHandle};
use mc_sampler::{Measure, Move};

/// Toy sampled state: a walker position plus a log of committed moves.
#[derive(Debug, Default, Clone)]
pub struct Walker {
    pub position: i64,
    pub commits: u64,
}

/// Move returning a fixed ratio and counting every callback.
#[derive(Debug)]
pub struct FixedRatio {
    pub ratio: f64,
    pub attempts: u64,
    pub accepts: u64,
    pub rejects: u64,
}

impl FixedRatio {
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio,
            attempts: 0,
            accepts: 0,
            rejects: 0,
        }
    }
}

impl Move<Walker, f64> for FixedRatio {
    fn attempt(&mut self, _state: &mut Walker, _rng: &mut RngHandle) -> f64 {
        self.attempts += 1;
        self.ratio
    }

    fn accept(&mut self, state: &mut Walker) {
        self.accepts += 1;
        state.position += 1;
        state.commits += 1;
    }

    fn reject(&mut self, _state: &mut Walker) {
        self.rejects += 1;
    }
}

/// Counts invocations and keeps the last sign it saw.
#[derive(Debug, Default)]
pub struct InvocationCounter {
    pub calls: u64,
    pub last_sign: Option<f64>,
    pub total_calls: Option<u64>,
}

impl Measure<Walker, f64> for InvocationCounter {
    fn accumulate(&mut self, _state: &Walker, sign: f64) -> Result<(), McError> {
        self.calls += 1;
        self.last_sign = Some(sign);
        Ok(())
    }

    fn collect_results(&mut self, comm: &dyn Communicator) -> Result<(), McError> {
        self.total_calls = Some(comm.sum_u64s(&[self.calls])?[0]);
        Ok(())
    }
}

/// Measure that always fails.
#[derive(Debug, Default)]
pub struct Broken {
    pub attempts: u64,
}

impl Measure<Walker, f64> for Broken {
    fn accumulate(&mut self, _state: &Walker, _sign: f64) -> Result<(), McError> {
        self.attempts += 1;
        Err(McError::measure("broken", "this measure always fails"))
    }

    fn collect_results(&mut self, _comm: &dyn Communicator) -> Result<(), McError> {
        Err(McError::measure("broken", "this measure always fails"))
    }
}
