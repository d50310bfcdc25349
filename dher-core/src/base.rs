//! Core functionalities.
use crate::RewardFn;
use anyhow::Result;

/// Buffer into which experiences are pushed.
pub trait ExperienceBufferBase {
    /// Items pushed into the buffer.
    type PushedItem;

    /// The number of samples in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes an item into the buffer.
    fn push(&mut self, tr: Self::PushedItem) -> Result<()>;
}

/// Replay buffer from which training batches are drawn.
pub trait ReplayBufferBase: ExperienceBufferBase {
    /// Configuration of the replay buffer.
    type Config;

    /// Batch generated from the buffer.
    type Batch;

    /// Builds a replay buffer from [`Self::Config`].
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Constructs a batch of `size` transitions, recomputing rewards with
    /// `reward_fn`.
    fn batch<R: RewardFn>(&mut self, size: usize, reward_fn: &R) -> Result<Self::Batch>;
}
