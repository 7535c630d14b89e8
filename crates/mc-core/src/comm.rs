//! Collective reductions across sampler workers.
//!
//! The sampler only needs two collectives: a SUM over scalars and an all-gather of opaque
//! measurement state. [`Communicator`] exposes the all-gather as the single required
//! primitive and builds the SUM reductions on top of it, combining contributions in rank
//! order so every worker ends up with bit-identical totals.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{ErrorInfo, McError};

/// Handle on a group of workers that combine partial results at the end of a run.
///
/// Every worker of the group must call the same collectives in the same order; a worker
/// that skips one blocks the others forever.
pub trait Communicator {
    /// Index of this worker within the group.
    fn rank(&self) -> usize;

    /// Number of workers in the group.
    fn size(&self) -> usize;

    /// Contributes `payload` and returns every worker's payload ordered by rank.
    fn all_gather(&self, payload: Vec<u8>) -> Result<Vec<Vec<u8>>, McError>;

    /// Element-wise SUM of `values` across workers.
    fn sum_u64s(&self, values: &[u64]) -> Result<Vec<u64>, McError> {
        let payload = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let gathered = self.all_gather(payload)?;
        let mut totals = vec![0u64; values.len()];
        for (rank, bytes) in gathered.iter().enumerate() {
            check_len(rank, bytes.len(), values.len() * 8)?;
            for (total, chunk) in totals.iter_mut().zip(bytes.chunks_exact(8)) {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                *total = total.wrapping_add(u64::from_le_bytes(raw));
            }
        }
        Ok(totals)
    }

    /// Element-wise SUM of `values` across workers.
    fn sum_f64s(&self, values: &[f64]) -> Result<Vec<f64>, McError> {
        let payload = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let gathered = self.all_gather(payload)?;
        let mut totals = vec![0.0f64; values.len()];
        for (rank, bytes) in gathered.iter().enumerate() {
            check_len(rank, bytes.len(), values.len() * 8)?;
            for (total, chunk) in totals.iter_mut().zip(bytes.chunks_exact(8)) {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(chunk);
                *total += f64::from_le_bytes(raw);
            }
        }
        Ok(totals)
    }
}

fn check_len(rank: usize, actual: usize, expected: usize) -> Result<(), McError> {
    if actual == expected {
        Ok(())
    } else {
        Err(McError::Reduction(
            ErrorInfo::new("payload-shape", "workers contributed payloads of different length")
                .with_context("rank", rank.to_string())
                .with_context("expected", expected.to_string())
                .with_context("actual", actual.to_string())
                .with_hint("every worker must register the same moves and measures"),
        ))
    }
}

/// Gathers a serde value from every worker, ordered by rank.
pub fn gather<T>(comm: &dyn Communicator, value: &T) -> Result<Vec<T>, McError>
where
    T: Serialize + DeserializeOwned,
{
    let payload = bincode::serialize(value).map_err(|err| {
        McError::Serde(
            ErrorInfo::new("gather-encode", err.to_string())
                .with_context("rank", comm.rank().to_string()),
        )
    })?;
    comm.all_gather(payload)?
        .iter()
        .enumerate()
        .map(|(rank, bytes)| {
            bincode::deserialize(bytes).map_err(|err| {
                McError::Serde(
                    ErrorInfo::new("gather-decode", err.to_string())
                        .with_context("rank", rank.to_string()),
                )
            })
        })
        .collect()
}

/// Identity communicator for a run with a single worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather(&self, payload: Vec<u8>) -> Result<Vec<Vec<u8>>, McError> {
        Ok(vec![payload])
    }
}

#[derive(Debug, Default)]
struct Round {
    slots: Vec<Vec<u8>>,
    arrived: usize,
    generation: u64,
    published: Vec<Vec<u8>>,
    aborted: Option<usize>,
}

#[derive(Debug)]
struct Rendezvous {
    round: Mutex<Round>,
    ready: Condvar,
}

/// Communicator for workers running on threads of one process.
///
/// Handles are created together by [`ThreadComm::group`] and moved one per thread. Once any
/// handle calls [`ThreadComm::abort`], every pending and future collective of the group fails
/// with a Reduction error instead of waiting for the missing worker.
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    shared: Arc<Rendezvous>,
}

impl ThreadComm {
    /// Creates `size` connected handles, indexed by rank.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let shared = Arc::new(Rendezvous {
            round: Mutex::new(Round {
                slots: vec![Vec::new(); size],
                ..Round::default()
            }),
            ready: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Withdraws this worker from the group and wakes every peer blocked in a collective.
    ///
    /// Collectives that already completed are unaffected.
    pub fn abort(&self) {
        let mut round = self
            .shared
            .round
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        round.aborted.get_or_insert(self.rank);
        self.shared.ready.notify_all();
    }

    fn poisoned(&self) -> McError {
        McError::Reduction(
            ErrorInfo::new("rendezvous-poisoned", "a worker panicked during a collective")
                .with_context("rank", self.rank.to_string()),
        )
    }

    fn aborted(&self, by: usize) -> McError {
        McError::Reduction(
            ErrorInfo::new("worker-aborted", "a worker left the group before this collective")
                .with_context("rank", self.rank.to_string())
                .with_context("aborted_by", by.to_string()),
        )
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather(&self, payload: Vec<u8>) -> Result<Vec<Vec<u8>>, McError> {
        let mut round = self.shared.round.lock().map_err(|_| self.poisoned())?;
        if let Some(by) = round.aborted {
            return Err(self.aborted(by));
        }
        round.slots[self.rank] = payload;
        round.arrived += 1;
        let generation = round.generation;
        if round.arrived == self.size {
            let fresh = vec![Vec::new(); self.size];
            round.published = std::mem::replace(&mut round.slots, fresh);
            round.arrived = 0;
            round.generation += 1;
            self.shared.ready.notify_all();
            return Ok(round.published.clone());
        }
        // `published` stays put until this worker joins the next round.
        let round = self
            .shared
            .ready
            .wait_while(round, |round| {
                round.generation == generation && round.aborted.is_none()
            })
            .map_err(|_| self.poisoned())?;
        match (round.generation == generation, round.aborted) {
            (true, Some(by)) => Err(self.aborted(by)),
            _ => Ok(round.published.clone()),
        }
    }
}
