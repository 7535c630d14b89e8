use std::fs;
use std::path::Path;

use mc_core::errors::{ErrorInfo, McError};
use mc_core::RngHandle;
use serde::{Deserialize, Serialize};

use crate::determinism;

/// YAML-configurable parameters governing a sampling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Number of production (measured) cycles.
    pub n_cycles: u64,
    /// Number of Metropolis steps per cycle.
    #[serde(default = "default_cycle_length")]
    pub cycle_length: u64,
    /// Number of initial cycles during which measurements are not accumulated.
    #[serde(default)]
    pub warmup_cycles: u64,
    /// Random generator selection.
    #[serde(default)]
    pub rng: RngConfig,
    /// Report level: 0 silent, 1 progress, 2 end-of-run summary, 3 stage transitions.
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,
}

fn default_cycle_length() -> u64 {
    1
}

fn default_verbosity() -> u8 {
    1
}

impl SamplerConfig {
    /// Creates a configuration with the default generator and verbosity.
    pub fn new(n_cycles: u64, cycle_length: u64, warmup_cycles: u64) -> Self {
        Self {
            n_cycles,
            cycle_length,
            warmup_cycles,
            rng: RngConfig::default(),
            verbosity: default_verbosity(),
        }
    }

    /// Replaces the generator selection.
    pub fn with_rng(mut self, name: impl Into<String>, seed: u64) -> Self {
        self.rng = RngConfig {
            name: name.into(),
            seed,
        };
        self
    }

    /// Replaces the report level.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Total number of cycles, warmup included.
    pub fn total_cycles(&self) -> u64 {
        self.n_cycles.saturating_add(self.warmup_cycles)
    }

    /// Rejects budgets that cannot produce a single measurement.
    pub fn validate(&self) -> Result<(), McError> {
        if self.n_cycles == 0 {
            return Err(McError::Configuration(
                ErrorInfo::new("invalid-cycles", "at least one production cycle is required")
                    .with_context("n_cycles", "0"),
            ));
        }
        if self.cycle_length == 0 {
            return Err(McError::Configuration(
                ErrorInfo::new("invalid-cycle-length", "a cycle needs at least one step")
                    .with_context("cycle_length", "0"),
            ));
        }
        Ok(())
    }

    /// Parses a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, McError> {
        serde_yaml::from_str(yaml)
            .map_err(|err| McError::Serde(ErrorInfo::new("config-parse", err.to_string())))
    }

    /// Loads a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, McError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            McError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_yaml::from_str(&contents).map_err(|err| {
            McError::Serde(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Named generator and seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngConfig {
    /// Generator name, see [`mc_core::KNOWN_GENERATORS`].
    #[serde(default = "default_generator")]
    pub name: String,
    /// Seed of this worker's stream.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_generator() -> String {
    "std".to_string()
}

fn default_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for RngConfig {
    fn default() -> Self {
        Self {
            name: default_generator(),
            seed: default_seed(),
        }
    }
}

impl RngConfig {
    /// Same generator with a seed derived for worker `rank`.
    pub fn for_worker(&self, rank: usize) -> Self {
        Self {
            name: self.name.clone(),
            seed: determinism::worker_seed(self.seed, rank),
        }
    }

    /// Instantiates the generator.
    pub fn build(&self) -> Result<RngHandle, McError> {
        RngHandle::new(&self.name, self.seed)
    }
}
