#![deny(missing_docs)]

//! Cycle-based Metropolis sampler with pluggable moves and measurements.
//!
//! A [`Sampler`] owns the sampled state, a seeded generator, a [`MoveSet`] and a
//! [`MeasureSet`]. Each cycle runs a fixed number of Metropolis steps; once warmup is over
//! every cycle feeds the measurements with the running sign. At the end of the run
//! [`Sampler::collect_results`] merges counts and sign sums across workers through a
//! [`mc_core::Communicator`].

/// Reusable sign-weighted accumulators.
pub mod accumulators;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Typed registry handles.
pub mod handle;
/// Simulation driver and its callbacks.
pub mod kernel;
/// Measurement trait and registry.
pub mod measures;
/// Move trait, registry and per-move statistics.
pub mod moves;
/// End-of-run report.
pub mod report;
/// The Metropolis accept/reject primitive.
pub mod step;
/// Thread-backed multi-worker runs.
pub mod workers;

pub use accumulators::{WeightedMean, WeightedMeanResult};
pub use config::{RngConfig, SamplerConfig};
pub use handle::AsAny;
pub use kernel::{AfterCycle, Convergence, Progress, Sampler, Stage, StopCondition, Termination};
pub use measures::{Measure, MeasureHandle, MeasureSet};
pub use moves::{Move, MoveEntry, MoveHandle, MoveSet, MoveStatistics};
pub use report::RunReport;
pub use step::{metropolis, StepOutcome};
pub use workers::run_on_threads;
