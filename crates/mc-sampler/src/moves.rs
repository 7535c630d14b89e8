use indexmap::IndexMap;
use mc_core::errors::{ErrorInfo, McError};
use mc_core::{Communicator, RngHandle, Sign};
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::handle::{next_registry_id, AsAny, Handle};

/// Proposal of a randomized change to the sampled state `C`.
///
/// `attempt` computes the ratio of the proposed weight to the current one, including any
/// proposal asymmetry, and must leave the committed state untouched. Exactly one of
/// `accept` or `reject` follows every `attempt`.
pub trait Move<C, S: Sign>: AsAny {
    /// Proposes a change and returns its acceptance ratio.
    fn attempt(&mut self, state: &mut C, rng: &mut RngHandle) -> S;

    /// Commits the change proposed by the last `attempt`.
    fn accept(&mut self, state: &mut C);

    /// Discards the change proposed by the last `attempt`.
    fn reject(&mut self, _state: &mut C) {}
}

/// Marker for handles into a [`MoveSet`].
#[derive(Debug)]
pub enum MoveTag {}

/// Typed handle returned by [`MoveSet::add`].
pub type MoveHandle<M> = Handle<MoveTag, M>;

/// A registered move with its proposal weight and counters.
pub struct MoveEntry<C, S: Sign> {
    name: String,
    mv: Box<dyn Move<C, S>>,
    weight: f64,
    attempted: u64,
    accepted: u64,
}

impl<C: 'static, S: Sign> MoveEntry<C, S> {
    /// Registration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unnormalized proposal weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Forwards to [`Move::attempt`].
    pub fn attempt(&mut self, state: &mut C, rng: &mut RngHandle) -> S {
        self.mv.attempt(state, rng)
    }

    /// Forwards to [`Move::accept`] and counts the acceptance.
    pub fn accept(&mut self, state: &mut C) {
        self.accepted += 1;
        self.mv.accept(state);
    }

    /// Forwards to [`Move::reject`].
    pub fn reject(&mut self, state: &mut C) {
        self.mv.reject(state);
    }
}

/// Attempt and acceptance counts of one move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveStatistics {
    /// Registration name.
    pub name: String,
    /// Number of times the move was drawn.
    pub attempted: u64,
    /// Number of accepted proposals.
    pub accepted: u64,
}

impl MoveStatistics {
    /// Accepted over attempted, zero when never attempted.
    pub fn acceptance_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempted as f64
        }
    }
}

/// Named moves drawn with probability proportional to their weight.
pub struct MoveSet<C, S: Sign> {
    entries: IndexMap<String, MoveEntry<C, S>>,
    distribution: Option<WeightedIndex<f64>>,
    registry: u64,
}

impl<C: 'static, S: Sign> Default for MoveSet<C, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static, S: Sign> MoveSet<C, S> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            distribution: None,
            registry: next_registry_id(),
        }
    }

    /// Registers `mv` under `name` with proposal weight `weight`.
    ///
    /// Weights need not be normalized. Registration closes at the first draw.
    pub fn add<M>(
        &mut self,
        mv: M,
        name: impl Into<String>,
        weight: f64,
    ) -> Result<MoveHandle<M>, McError>
    where
        M: Move<C, S>,
    {
        let name = name.into();
        if self.distribution.is_some() {
            return Err(McError::Configuration(
                ErrorInfo::new("moves-sealed", "moves cannot be added after the first draw")
                    .with_context("name", name),
            ));
        }
        if !(weight.is_finite() && weight > 0.0) {
            return Err(McError::Configuration(
                ErrorInfo::new("invalid-weight", "proposal weight must be positive and finite")
                    .with_context("name", name)
                    .with_context("weight", weight.to_string()),
            ));
        }
        if self.entries.contains_key(&name) {
            return Err(McError::Configuration(
                ErrorInfo::new("duplicate-move", "a move with this name is already registered")
                    .with_context("name", name),
            ));
        }
        let index = self.entries.len();
        self.entries.insert(
            name.clone(),
            MoveEntry {
                name,
                mv: Box::new(mv),
                weight,
                attempted: 0,
                accepted: 0,
            },
        );
        Ok(MoveHandle::new(index, self.registry))
    }

    /// Number of registered moves.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no move is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registration names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Normalized proposal probabilities in registration order.
    pub fn proposal_probabilities(&self) -> Vec<f64> {
        let total: f64 = self.entries.values().map(|entry| entry.weight).sum();
        self.entries
            .values()
            .map(|entry| entry.weight / total)
            .collect()
    }

    /// Draws a move proportionally to its weight and counts the attempt.
    pub fn draw(&mut self, rng: &mut RngHandle) -> Result<&mut MoveEntry<C, S>, McError> {
        if self.distribution.is_none() {
            self.distribution = Some(self.build_distribution()?);
        }
        let index = match &self.distribution {
            Some(distribution) => distribution.sample(rng),
            None => 0,
        };
        let (_, entry) = self.entries.get_index_mut(index).ok_or_else(|| {
            McError::Configuration(
                ErrorInfo::new("draw-out-of-range", "drawn move index has no entry")
                    .with_context("index", index.to_string()),
            )
        })?;
        entry.attempted += 1;
        Ok(entry)
    }

    fn build_distribution(&self) -> Result<WeightedIndex<f64>, McError> {
        if self.entries.is_empty() {
            return Err(McError::Configuration(
                ErrorInfo::new("no-moves", "no move registered")
                    .with_hint("register at least one move before starting the run"),
            ));
        }
        WeightedIndex::new(self.entries.values().map(|entry| entry.weight))
            .map_err(|err| McError::configuration("invalid-weight", err.to_string()))
    }

    /// Closes registration and builds the proposal distribution ahead of the first draw.
    pub fn seal(&mut self) -> Result<(), McError> {
        if self.distribution.is_none() {
            self.distribution = Some(self.build_distribution()?);
        }
        Ok(())
    }

    /// Local counters per move in registration order.
    pub fn statistics(&self) -> Vec<MoveStatistics> {
        self.entries
            .values()
            .map(|entry| MoveStatistics {
                name: entry.name.clone(),
                attempted: entry.attempted,
                accepted: entry.accepted,
            })
            .collect()
    }

    /// Counters summed across every worker of `comm`.
    pub fn reduced_statistics(
        &self,
        comm: &dyn Communicator,
    ) -> Result<Vec<MoveStatistics>, McError> {
        let local = self.statistics();
        let flat: Vec<u64> = local
            .iter()
            .flat_map(|stats| [stats.attempted, stats.accepted])
            .collect();
        let totals = comm.sum_u64s(&flat)?;
        Ok(local
            .into_iter()
            .zip(totals.chunks_exact(2))
            .map(|(stats, pair)| MoveStatistics {
                attempted: pair[0],
                accepted: pair[1],
                ..stats
            })
            .collect())
    }

    /// Resolves a handle returned by [`MoveSet::add`].
    pub fn get<M: Move<C, S>>(&self, handle: MoveHandle<M>) -> Result<&M, McError> {
        self.check_registry(handle.registry)?;
        let (name, entry) = self.index_entry(handle.index)?;
        let mv: &dyn Move<C, S> = entry.mv.as_ref();
        mv.as_any()
            .downcast_ref::<M>()
            .ok_or_else(|| type_mismatch::<M>(name, mv.type_name()))
    }

    /// Mutable variant of [`MoveSet::get`].
    pub fn get_mut<M: Move<C, S>>(&mut self, handle: MoveHandle<M>) -> Result<&mut M, McError> {
        self.check_registry(handle.registry)?;
        let (name, entry) = self
            .entries
            .get_index_mut(handle.index)
            .ok_or_else(|| unknown_index(handle.index))?;
        let mv: &mut (dyn Move<C, S> + 'static) = entry.mv.as_mut();
        let found = (*mv).type_name();
        mv.as_any_mut()
            .downcast_mut::<M>()
            .ok_or_else(|| type_mismatch::<M>(name, found))
    }

    /// Looks a move up by name and checks its concrete type.
    pub fn get_by_name<M: Move<C, S>>(&self, name: &str) -> Result<&M, McError> {
        let entry = self.entries.get(name).ok_or_else(|| {
            McError::Configuration(
                ErrorInfo::new("unknown-move", "no move registered under this name")
                    .with_context("name", name),
            )
        })?;
        let mv: &dyn Move<C, S> = entry.mv.as_ref();
        mv.as_any()
            .downcast_ref::<M>()
            .ok_or_else(|| type_mismatch::<M>(name, mv.type_name()))
    }

    fn index_entry(&self, index: usize) -> Result<(&String, &MoveEntry<C, S>), McError> {
        self.entries
            .get_index(index)
            .ok_or_else(|| unknown_index(index))
    }

    fn check_registry(&self, registry: u64) -> Result<(), McError> {
        if registry == self.registry {
            Ok(())
        } else {
            Err(McError::TypeMismatch(
                ErrorInfo::new("foreign-handle", "handle belongs to another move set")
                    .with_context("registry", registry.to_string()),
            ))
        }
    }
}

fn unknown_index(index: usize) -> McError {
    McError::Configuration(
        ErrorInfo::new("unknown-move", "no move registered at this index")
            .with_context("index", index.to_string()),
    )
}

fn type_mismatch<M>(name: &str, found: &str) -> McError {
    McError::TypeMismatch(
        ErrorInfo::new("move-type", "registered move has a different type")
            .with_context("name", name)
            .with_context("requested", std::any::type_name::<M>())
            .with_context("found", found),
    )
}
