use std::marker::PhantomData;

use mc_core::errors::{ErrorInfo, McError};
use mc_core::{Communicator, Sign};
use serde::{Deserialize, Serialize};

use crate::measures::Measure;

/// Result of a [`WeightedMean`] after `collect_results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedMeanResult<S> {
    /// Number of accumulated samples across all workers.
    pub samples: u64,
    /// Sum of signs across all workers.
    pub sign_sum: S,
    /// `sum(sign * f) / sum(sign)`.
    pub mean: S,
}

/// Sign-weighted average `<sign * f(C)> / <sign>` of a real observable.
///
/// Merges across workers with two SUM reductions, so the result does not depend on how
/// the cycles were split between workers.
pub struct WeightedMean<C, S, F> {
    observable: F,
    samples: u64,
    weighted_sum: S,
    sign_sum: S,
    result: Option<WeightedMeanResult<S>>,
    _state: PhantomData<fn(&C)>,
}

impl<C, S, F> WeightedMean<C, S, F>
where
    S: Sign,
    F: Fn(&C) -> f64,
{
    /// Wraps `observable`.
    pub fn new(observable: F) -> Self {
        Self {
            observable,
            samples: 0,
            weighted_sum: S::zero(),
            sign_sum: S::zero(),
            result: None,
            _state: PhantomData,
        }
    }

    /// Local sample count.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Merged result, available after `collect_results`.
    pub fn result(&self) -> Option<&WeightedMeanResult<S>> {
        self.result.as_ref()
    }
}

impl<C, S, F> Measure<C, S> for WeightedMean<C, S, F>
where
    C: 'static,
    S: Sign,
    F: Fn(&C) -> f64 + 'static,
{
    fn accumulate(&mut self, state: &C, sign: S) -> Result<(), McError> {
        let value = (self.observable)(state);
        if !value.is_finite() {
            return Err(McError::Measure(
                ErrorInfo::new("non-finite-observable", "observable returned a non-finite value")
                    .with_context("value", value.to_string()),
            ));
        }
        self.samples += 1;
        self.weighted_sum = self.weighted_sum + sign.scale(value);
        self.sign_sum = self.sign_sum + sign;
        Ok(())
    }

    fn collect_results(&mut self, comm: &dyn Communicator) -> Result<(), McError> {
        let samples = comm.sum_u64s(&[self.samples])?[0];
        let mut parts = self.weighted_sum.to_parts();
        parts.extend(self.sign_sum.to_parts());
        let totals = comm.sum_f64s(&parts)?;
        let (weighted, signs) = totals.split_at(S::PARTS);
        let weighted_sum = S::from_parts(weighted);
        let sign_sum = S::from_parts(signs);
        let mean = if sign_sum.magnitude() == 0.0 {
            S::zero()
        } else {
            weighted_sum / sign_sum
        };
        self.result = Some(WeightedMeanResult {
            samples,
            sign_sum,
            mean,
        });
        Ok(())
    }
}
