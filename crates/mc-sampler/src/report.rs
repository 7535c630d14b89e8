use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use mc_core::errors::{ErrorInfo, McError};
use mc_core::Sign;
use serde::{Deserialize, Serialize};

use crate::kernel::Termination;
use crate::moves::MoveStatistics;

/// Summary returned by `Sampler::collect_results`, merged across workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "S: Sign")]
pub struct RunReport<S> {
    /// Number of workers that took part in the reduction.
    pub workers: usize,
    /// Measured cycles summed over workers.
    pub total_measures: u64,
    /// Summed sign divided by `total_measures`.
    pub average_sign: S,
    /// Per-move counters summed over workers, in registration order.
    pub moves: Vec<MoveStatistics>,
    /// Local failure count per measure.
    pub measure_failures: BTreeMap<String, u64>,
    /// Cycles run by this worker, warmup included.
    pub cycles_run: u64,
    /// Why this worker's cycle loop ended.
    pub termination: Termination,
    /// Wall-clock duration of this worker's cycle loop.
    pub elapsed_seconds: f64,
}

impl<S: Sign> RunReport<S> {
    /// Acceptance rate per move name.
    pub fn acceptance_rates(&self) -> BTreeMap<String, f64> {
        self.moves
            .iter()
            .map(|stats| (stats.name.clone(), stats.acceptance_rate()))
            .collect()
    }

    /// Writes the report to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), McError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                McError::Serde(
                    ErrorInfo::new("report-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            McError::Serde(
                ErrorInfo::new("report-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            McError::Serde(
                ErrorInfo::new("report-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a report from disk.
    pub fn load(path: &Path) -> Result<Self, McError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            McError::Serde(
                ErrorInfo::new("report-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            McError::Serde(
                ErrorInfo::new("report-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
