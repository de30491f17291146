//! Upper probability bounds for a source step's hop list.

use thiserror::Error;

use crate::schema::hop::Hop;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbabilityError {
    #[error("hop probabilities cannot exceed 1.0 (running sum reached {sum})")]
    Overflow { sum: f32 },
    #[error("hop probabilities must sum to 1.0 (got {sum})")]
    Underflow { sum: f32 },
}

/// Cumulative bounds, one per hop, in declaration order.
///
/// The running sum is compared against 1.0 exactly, with no epsilon: it
/// must never go above 1.0 and must end on it. Long lists of small
/// probabilities can trip either check through accumulated rounding.
///
/// An empty list has no distribution and yields `Ok(None)`.
pub fn compile_bounds(hops: &[Hop]) -> Result<Option<Vec<f32>>, ProbabilityError> {
    if hops.is_empty() {
        return Ok(None);
    }

    let mut bounds = Vec::with_capacity(hops.len());
    let mut sum = 0.0f32;
    for hop in hops {
        sum += hop.probability;
        if sum > 1.0 {
            return Err(ProbabilityError::Overflow { sum });
        }
        bounds.push(sum);
    }

    if sum < 1.0 {
        return Err(ProbabilityError::Underflow { sum });
    }
    Ok(Some(bounds))
}
