use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mc_core::errors::{ErrorInfo, McError};
use mc_core::{Communicator, RngHandle, Sign};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SamplerConfig;
use crate::measures::{Measure, MeasureHandle, MeasureSet};
use crate::moves::{Move, MoveHandle, MoveSet, MoveStatistics};
use crate::report::RunReport;
use crate::step;

/// Lifecycle of a [`Sampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Registering moves and measures; `start` not called yet.
    Idle,
    /// Cycles run, measurements are not accumulated.
    Warmup,
    /// Cycles run and every cycle is measured.
    Production,
    /// Sampling finished; partial sums are frozen.
    Collected,
}

/// Why the cycle loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Every warmup and production cycle ran.
    Completed,
    /// The convergence predicate fired.
    Converged,
    /// The stop condition fired before the budget was exhausted.
    Interrupted,
}

/// Caller-side cancellation, polled once per cycle after the measurements.
pub enum StopCondition<'a> {
    /// Run until the cycle budget is exhausted or the run converges.
    Never,
    /// Stop as soon as the callback returns true.
    When(Box<dyn FnMut() -> bool + 'a>),
}

impl<'a> StopCondition<'a> {
    /// Wraps a callback.
    pub fn when(callback: impl FnMut() -> bool + 'a) -> Self {
        StopCondition::When(Box::new(callback))
    }

    /// Stops once `limit` of wall-clock time has elapsed since construction.
    pub fn deadline(limit: Duration) -> Self {
        let started = Instant::now();
        StopCondition::when(move || started.elapsed() >= limit)
    }

    /// Stops once `flag` is raised, typically by another thread.
    pub fn flag(flag: &'a AtomicBool) -> Self {
        StopCondition::when(move || flag.load(Ordering::Relaxed))
    }

    fn should_stop(&mut self) -> bool {
        match self {
            StopCondition::Never => false,
            StopCondition::When(callback) => callback(),
        }
    }
}

/// Bookkeeping on the sampled state after every cycle, unrelated to sampling itself.
pub enum AfterCycle<C> {
    /// No post-cycle work.
    Nothing,
    /// Runs the callback after each cycle's steps.
    Duty(Box<dyn FnMut(&mut C)>),
}

impl<C> AfterCycle<C> {
    /// Wraps a callback.
    pub fn duty(callback: impl FnMut(&mut C) + 'static) -> Self {
        AfterCycle::Duty(Box::new(callback))
    }
}

/// Snapshot handed to the convergence predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Index of the cycle that just finished.
    pub cycle: u64,
    /// Warmup plus production cycles.
    pub total_cycles: u64,
    /// Measured cycles so far on this worker.
    pub measures: u64,
    /// Integer percent complete.
    pub percent: u64,
}

/// Convergence test evaluated after every cycle.
pub enum Convergence<C> {
    /// Never converges early; the run ends on budget or stop condition.
    Never,
    /// Ends the run as soon as the predicate returns true.
    Predicate(Box<dyn FnMut(&C, &Progress) -> bool>),
}

impl<C> Convergence<C> {
    /// Wraps a predicate.
    pub fn predicate(predicate: impl FnMut(&C, &Progress) -> bool + 'static) -> Self {
        Convergence::Predicate(Box::new(predicate))
    }

    fn converged(&mut self, state: &C, progress: &Progress) -> bool {
        match self {
            Convergence::Never => false,
            Convergence::Predicate(predicate) => predicate(state, progress),
        }
    }
}

/// Cycle-based Metropolis sampler over a state `C` with sign type `S`.
///
/// The sampler owns the state, the generator and both registries. Moves get `&mut C` and
/// measurements `&C` per call.
pub struct Sampler<C, S: Sign> {
    config: SamplerConfig,
    state: C,
    rng: RngHandle,
    moves: MoveSet<C, S>,
    measures: MeasureSet<C, S>,
    after_cycle: AfterCycle<C>,
    convergence: Convergence<C>,
    stage: Stage,
    cycle: u64,
    cycles_run: u64,
    measures_done: u64,
    sign: S,
    sign_sum: S,
    average_sign: S,
    percent: u64,
    termination: Option<Termination>,
    elapsed: Duration,
    collected: bool,
}

impl<C: 'static, S: Sign> Sampler<C, S> {
    /// Validates `config`, instantiates the named generator and takes ownership of `state`.
    pub fn new(config: SamplerConfig, state: C) -> Result<Self, McError> {
        config.validate()?;
        let rng = config.rng.build()?;
        Ok(Self {
            config,
            state,
            rng,
            moves: MoveSet::new(),
            measures: MeasureSet::new(),
            after_cycle: AfterCycle::Nothing,
            convergence: Convergence::Never,
            stage: Stage::Idle,
            cycle: 0,
            cycles_run: 0,
            measures_done: 0,
            sign: S::one(),
            sign_sum: S::zero(),
            average_sign: S::zero(),
            percent: 0,
            termination: None,
            elapsed: Duration::ZERO,
            collected: false,
        })
    }

    /// Installs the post-cycle callback.
    pub fn with_after_cycle(mut self, after_cycle: AfterCycle<C>) -> Self {
        self.after_cycle = after_cycle;
        self
    }

    /// Installs the convergence test.
    pub fn with_convergence(mut self, convergence: Convergence<C>) -> Self {
        self.convergence = convergence;
        self
    }

    /// Registers a move with its unnormalized proposal weight.
    pub fn add_move<M: Move<C, S>>(
        &mut self,
        mv: M,
        name: impl Into<String>,
        weight: f64,
    ) -> Result<MoveHandle<M>, McError> {
        self.ensure_idle("add_move")?;
        self.moves.add(mv, name, weight)
    }

    /// Registers a measurement.
    pub fn add_measure<M: Measure<C, S>>(
        &mut self,
        measure: M,
        name: impl Into<String>,
    ) -> Result<MeasureHandle<M>, McError> {
        self.ensure_idle("add_measure")?;
        self.measures.insert(measure, name)
    }

    /// Runs warmup then production cycles until the budget is exhausted, the run converges
    /// or `stop` fires. Returns true unless the stop condition ended the run.
    pub fn start(&mut self, sign_init: S, mut stop: StopCondition<'_>) -> Result<bool, McError> {
        self.ensure_idle("start")?;
        self.moves.seal()?;

        self.sign = sign_init;
        self.sign_sum = S::zero();
        self.measures_done = 0;
        self.percent = 0;
        self.cycles_run = 0;
        self.stage = if self.config.warmup_cycles == 0 {
            Stage::Production
        } else {
            Stage::Warmup
        };

        let total = self.config.total_cycles();
        let verbosity = self.config.verbosity;
        if verbosity >= 1 {
            info!(
                cycles = self.config.n_cycles,
                warmup = self.config.warmup_cycles,
                cycle_length = self.config.cycle_length,
                moves = self.moves.len(),
                measures = self.measures.len(),
                generator = self.rng.name(),
                "sampling started"
            );
        }

        let timer = Instant::now();
        let mut cycle = 0u64;
        let termination = loop {
            self.cycle = cycle;
            for _ in 0..self.config.cycle_length {
                step::metropolis(&mut self.moves, &mut self.state, &mut self.rng, &mut self.sign)?;
            }
            if let AfterCycle::Duty(duty) = &mut self.after_cycle {
                duty(&mut self.state);
            }
            if cycle >= self.config.warmup_cycles {
                if self.stage == Stage::Warmup {
                    self.stage = Stage::Production;
                    if verbosity >= 3 {
                        debug!(cycle, "warmup finished, measuring");
                    }
                }
                self.measures_done += 1;
                self.sign_sum = self.sign_sum + self.sign;
                self.measures.accumulate(&self.state, self.sign);
            }
            self.cycles_run = cycle + 1;

            let percent = percent_done(cycle, total);
            if percent > self.percent {
                self.percent = percent;
                if verbosity >= 1 {
                    info!(percent, "sampling progress");
                }
            }

            let progress = Progress {
                cycle,
                total_cycles: total,
                measures: self.measures_done,
                percent: self.percent,
            };
            let exhausted = cycle + 1 >= total;
            let converged = !exhausted && self.convergence.converged(&self.state, &progress);
            let stopped = stop.should_stop();
            if exhausted {
                break Termination::Completed;
            }
            if converged {
                break Termination::Converged;
            }
            if stopped {
                break Termination::Interrupted;
            }
            cycle += 1;
        };

        self.elapsed = timer.elapsed();
        self.stage = Stage::Collected;
        self.termination = Some(termination);
        if verbosity >= 1 {
            info!(
                ?termination,
                cycles = self.cycles_run,
                measures = self.measures_done,
                seconds = self.elapsed.as_secs_f64(),
                "sampling finished"
            );
        }
        Ok(termination != Termination::Interrupted)
    }

    /// Sums the measurement count and sign sum across workers, derives the average sign and
    /// lets every measurement merge its own state. Every worker must call this exactly once.
    pub fn collect_results(&mut self, comm: &dyn Communicator) -> Result<RunReport<S>, McError> {
        if self.stage != Stage::Collected {
            return Err(McError::State(
                ErrorInfo::new("not-finished", "collect_results requires a finished run")
                    .with_context("stage", format!("{:?}", self.stage)),
            ));
        }
        if self.collected {
            return Err(McError::State(ErrorInfo::new(
                "already-collected",
                "collect_results may only be called once",
            )));
        }
        self.collected = true;

        let total_measures = comm.sum_u64s(&[self.measures_done])?[0];
        let sign_sum = S::from_parts(&comm.sum_f64s(&self.sign_sum.to_parts())?);
        self.average_sign = if total_measures == 0 {
            S::zero()
        } else {
            sign_sum.scale(1.0 / total_measures as f64)
        };
        let moves = self.moves.reduced_statistics(comm)?;

        if self.config.verbosity >= 2 && comm.rank() == 0 {
            log_summary(&moves, total_measures, &self.average_sign, self.elapsed);
        }

        self.measures.collect_results(comm);

        Ok(RunReport {
            workers: comm.size(),
            total_measures,
            average_sign: self.average_sign,
            moves,
            measure_failures: self.measures.failures().into_iter().collect(),
            cycles_run: self.cycles_run,
            termination: self.termination.unwrap_or(Termination::Completed),
            elapsed_seconds: self.elapsed.as_secs_f64(),
        })
    }

    /// Average sign across workers, meaningful after `collect_results`.
    pub fn average_sign(&self) -> S {
        self.average_sign
    }

    /// Current running sign.
    pub fn sign(&self) -> S {
        self.sign
    }

    /// Integer percent of cycles done; reaches 100 only on the last cycle.
    pub fn percent(&self) -> u64 {
        self.percent
    }

    /// Current lifecycle stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Why the last run ended, once `start` returned.
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Cycles run by this worker, warmup included.
    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    /// Measured cycles on this worker.
    pub fn measures_done(&self) -> u64 {
        self.measures_done
    }

    /// Index of the current (or last) cycle.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Run parameters.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Local per-move counters.
    pub fn move_statistics(&self) -> Vec<MoveStatistics> {
        self.moves.statistics()
    }

    /// The generator, for callers preparing the initial state.
    pub fn rng_mut(&mut self) -> &mut RngHandle {
        &mut self.rng
    }

    /// The sampled state.
    pub fn state(&self) -> &C {
        &self.state
    }

    /// The sampled state, mutably. Changes made between cycles are invisible to the sign.
    pub fn state_mut(&mut self) -> &mut C {
        &mut self.state
    }

    /// Consumes the sampler and returns the sampled state.
    pub fn into_state(self) -> C {
        self.state
    }

    /// Resolves a move handle.
    pub fn move_ref<M: Move<C, S>>(&self, handle: MoveHandle<M>) -> Result<&M, McError> {
        self.moves.get(handle)
    }

    /// Resolves a move handle mutably.
    pub fn move_mut<M: Move<C, S>>(&mut self, handle: MoveHandle<M>) -> Result<&mut M, McError> {
        self.moves.get_mut(handle)
    }

    /// Resolves a measure handle.
    pub fn measure<M: Measure<C, S>>(&self, handle: MeasureHandle<M>) -> Result<&M, McError> {
        self.measures.get(handle)
    }

    /// Resolves a measure handle mutably.
    pub fn measure_mut<M: Measure<C, S>>(
        &mut self,
        handle: MeasureHandle<M>,
    ) -> Result<&mut M, McError> {
        self.measures.get_mut(handle)
    }

    /// Looks a move up by name, checking its type.
    pub fn get_move<M: Move<C, S>>(&self, name: &str) -> Result<&M, McError> {
        self.moves.get_by_name(name)
    }

    /// Looks a measure up by name, checking its type.
    pub fn get_measure<M: Measure<C, S>>(&self, name: &str) -> Result<&M, McError> {
        self.measures.get_by_name(name)
    }

    fn ensure_idle(&self, operation: &str) -> Result<(), McError> {
        if self.stage == Stage::Idle {
            Ok(())
        } else {
            Err(McError::State(
                ErrorInfo::new("not-idle", "operation is only valid before the run starts")
                    .with_context("operation", operation)
                    .with_context("stage", format!("{:?}", self.stage)),
            ))
        }
    }
}

fn percent_done(cycle: u64, total: u64) -> u64 {
    if total <= 1 {
        100
    } else {
        (cycle.saturating_mul(100) / (total - 1)).min(100)
    }
}

fn log_summary<S: Sign>(
    moves: &[MoveStatistics],
    total_measures: u64,
    average_sign: &S,
    elapsed: Duration,
) {
    for stats in moves {
        info!(
            name = %stats.name,
            attempted = stats.attempted,
            accepted = stats.accepted,
            rate = stats.acceptance_rate(),
            "move acceptance"
        );
    }
    info!(
        seconds = elapsed.as_secs_f64(),
        total_measures,
        average_sign = ?average_sign,
        "run summary"
    );
}
