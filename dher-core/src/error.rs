//! Errors in the library.
use thiserror::Error;

/// Errors raised by the episode store and the transition sampler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayBufferError {
    /// A single insertion is larger than the whole store.
    #[error("batch of {batch_size} episodes exceeds the store capacity of {capacity} episodes")]
    CapacityViolation {
        /// Number of episodes in the rejected batch.
        batch_size: usize,
        /// Capacity of the store in episodes.
        capacity: usize,
    },

    /// Sampling was requested before any episode was stored.
    #[error("cannot sample from an empty replay buffer")]
    EmptyBuffer,

    /// A sampled field does not have exactly one row per transition.
    #[error("field `{field}` has {actual} rows, but the batch size is {expected}")]
    BatchSizeMismatch {
        /// Name of the offending field.
        field: String,
        /// Requested batch size.
        expected: usize,
        /// Number of rows actually produced.
        actual: usize,
    },

    /// An episode does not match the shape of the store.
    #[error("episode {index} is malformed: {reason}")]
    InvalidEpisode {
        /// Position of the episode in the inserted batch.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// An episode shape that no episode can satisfy.
    #[error("invalid episode shape: {reason}")]
    InvalidShape {
        /// What is wrong with it.
        reason: String,
    },
}
