use mc_core::{McError, RngHandle, Sign};
use serde::{Deserialize, Serialize};

use crate::moves::MoveSet;

/// Result of one Metropolis step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// The proposal was committed.
    Accepted,
    /// The proposal was discarded.
    Rejected,
    /// The ratio was NaN or infinite and the proposal was discarded.
    NonFinite,
}

impl StepOutcome {
    /// True for [`StepOutcome::Accepted`].
    pub fn is_accepted(&self) -> bool {
        matches!(self, StepOutcome::Accepted)
    }
}

/// Runs one Metropolis step: draw a move, attempt it and accept with probability `min(1, |r|)`.
///
/// On acceptance the running sign is multiplied by the phase `r / |r|`. A non-finite ratio
/// is rejected without consuming a uniform draw.
pub fn metropolis<C: 'static, S: Sign>(
    moves: &mut MoveSet<C, S>,
    state: &mut C,
    rng: &mut RngHandle,
    sign: &mut S,
) -> Result<StepOutcome, McError> {
    let entry = moves.draw(rng)?;
    let ratio = entry.attempt(state, rng);
    let magnitude = ratio.magnitude();
    if !ratio.is_finite() || !magnitude.is_finite() {
        entry.reject(state);
        return Ok(StepOutcome::NonFinite);
    }
    if rng.uniform() < magnitude {
        entry.accept(state);
        *sign = *sign * ratio.phase();
        Ok(StepOutcome::Accepted)
    } else {
        entry.reject(state);
        Ok(StepOutcome::Rejected)
    }
}
