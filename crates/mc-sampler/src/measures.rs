use indexmap::IndexMap;
use mc_core::errors::{ErrorInfo, McError};
use mc_core::{Communicator, Sign};
use tracing::warn;

use crate::handle::{next_registry_id, AsAny, Handle};

/// Accumulator invoked once per thermalized cycle.
///
/// The accumulated value belongs to the implementor; `collect_results` merges it across the
/// workers of `comm` and must issue the same collectives on every worker.
pub trait Measure<C, S: Sign>: AsAny {
    /// Adds the current state, weighted by `sign`.
    fn accumulate(&mut self, state: &C, sign: S) -> Result<(), McError>;

    /// Merges the accumulated value across workers.
    fn collect_results(&mut self, comm: &dyn Communicator) -> Result<(), McError>;
}

/// Marker for handles into a [`MeasureSet`].
#[derive(Debug)]
pub enum MeasureTag {}

/// Typed handle returned by [`MeasureSet::insert`].
pub type MeasureHandle<M> = Handle<MeasureTag, M>;

struct MeasureEntry<C, S: Sign> {
    measure: Box<dyn Measure<C, S>>,
    failures: u64,
}

/// Named measurements invoked in registration order.
pub struct MeasureSet<C, S: Sign> {
    entries: IndexMap<String, MeasureEntry<C, S>>,
    registry: u64,
}

impl<C: 'static, S: Sign> Default for MeasureSet<C, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static, S: Sign> MeasureSet<C, S> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            registry: next_registry_id(),
        }
    }

    /// Registers `measure` under `name`.
    pub fn insert<M>(
        &mut self,
        measure: M,
        name: impl Into<String>,
    ) -> Result<MeasureHandle<M>, McError>
    where
        M: Measure<C, S>,
    {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(McError::Configuration(
                ErrorInfo::new(
                    "duplicate-measure",
                    "a measure with this name is already registered",
                )
                .with_context("name", name),
            ));
        }
        let index = self.entries.len();
        self.entries.insert(
            name,
            MeasureEntry {
                measure: Box::new(measure),
                failures: 0,
            },
        );
        Ok(MeasureHandle::new(index, self.registry))
    }

    /// Number of registered measures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no measure is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registration names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Feeds every measure, in registration order. A failing measure is logged and
    /// counted; the remaining measures still run. Returns the number of failures.
    pub fn accumulate(&mut self, state: &C, sign: S) -> usize {
        let mut failed = 0;
        for (name, entry) in self.entries.iter_mut() {
            if let Err(err) = entry.measure.accumulate(state, sign) {
                entry.failures += 1;
                failed += 1;
                warn!(measure = %name, error = %err, "measure failed to accumulate");
            }
        }
        failed
    }

    /// Asks every measure to merge its state across workers, isolating failures the same
    /// way [`MeasureSet::accumulate`] does. Returns the number of failures.
    pub fn collect_results(&mut self, comm: &dyn Communicator) -> usize {
        let mut failed = 0;
        for (name, entry) in self.entries.iter_mut() {
            if let Err(err) = entry.measure.collect_results(comm) {
                entry.failures += 1;
                failed += 1;
                warn!(
                    measure = %name,
                    rank = comm.rank(),
                    error = %err,
                    "measure failed to collect results"
                );
            }
        }
        failed
    }

    /// Failure count per measure, in registration order.
    pub fn failures(&self) -> Vec<(String, u64)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.failures))
            .collect()
    }

    /// Resolves a handle returned by [`MeasureSet::insert`].
    pub fn get<M: Measure<C, S>>(&self, handle: MeasureHandle<M>) -> Result<&M, McError> {
        self.check_registry(handle.registry)?;
        let (name, entry) = self
            .entries
            .get_index(handle.index)
            .ok_or_else(|| unknown_index(handle.index))?;
        downcast_ref(name, entry)
    }

    /// Mutable variant of [`MeasureSet::get`].
    pub fn get_mut<M: Measure<C, S>>(
        &mut self,
        handle: MeasureHandle<M>,
    ) -> Result<&mut M, McError> {
        self.check_registry(handle.registry)?;
        let (name, entry) = self
            .entries
            .get_index_mut(handle.index)
            .ok_or_else(|| unknown_index(handle.index))?;
        let measure: &mut (dyn Measure<C, S> + 'static) = entry.measure.as_mut();
        let found = (*measure).type_name();
        measure
            .as_any_mut()
            .downcast_mut::<M>()
            .ok_or_else(|| type_mismatch::<M>(name, found))
    }

    /// Looks a measure up by name and checks its concrete type.
    pub fn get_by_name<M: Measure<C, S>>(&self, name: &str) -> Result<&M, McError> {
        let entry = self.entries.get(name).ok_or_else(|| {
            McError::Configuration(
                ErrorInfo::new("unknown-measure", "no measure registered under this name")
                    .with_context("name", name),
            )
        })?;
        downcast_ref(name, entry)
    }

    fn check_registry(&self, registry: u64) -> Result<(), McError> {
        if registry == self.registry {
            Ok(())
        } else {
            Err(McError::TypeMismatch(
                ErrorInfo::new("foreign-handle", "handle belongs to another measure set")
                    .with_context("registry", registry.to_string()),
            ))
        }
    }
}

fn downcast_ref<'a, C: 'static, S: Sign, M: Measure<C, S>>(
    name: &str,
    entry: &'a MeasureEntry<C, S>,
) -> Result<&'a M, McError> {
    let measure: &dyn Measure<C, S> = entry.measure.as_ref();
    measure
        .as_any()
        .downcast_ref::<M>()
        .ok_or_else(|| type_mismatch::<M>(name, measure.type_name()))
}

fn unknown_index(index: usize) -> McError {
    McError::Configuration(
        ErrorInfo::new("unknown-measure", "no measure registered at this index")
            .with_context("index", index.to_string()),
    )
}

fn type_mismatch<M>(name: &str, found: &str) -> McError {
    McError::TypeMismatch(
        ErrorInfo::new("measure-type", "registered measure has a different type")
            .with_context("name", name)
            .with_context("requested", std::any::type_name::<M>())
            .with_context("found", found),
    )
}
