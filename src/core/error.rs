//! Error type for the public sampler operations.

use thiserror::Error;

/// Errors surfaced by the public sampler operations.
///
/// Every variant is reported before any state is mutated, so a table that
/// returns an error is left exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SamplerError {
    /// An element index outside `[0, len)` was passed to `get`, `set`, or
    /// `delete_at`.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The table length at the time of the call.
        len: usize,
    },

    /// A draw was attempted while no element has positive weight.
    #[error("cannot draw: no element has positive weight")]
    EmptyDistribution,

    /// A negative weight was passed to the constructor or a mutator.
    #[error("weight must be non-negative, got {0}")]
    NegativeWeight(f64),

    /// A NaN or infinite weight was passed to the constructor or a mutator.
    #[error("weight must be finite, got {0}")]
    NonFiniteWeight(f64),
}
