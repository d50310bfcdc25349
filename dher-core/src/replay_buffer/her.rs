//! Replay buffer combining a shared episode store with a sampler.
use super::{
    BufferStats, HerReplayBufferConfig, SharedEpisodeStore, TransitionBatch, TransitionSampler,
};
use crate::{Episode, ExperienceBufferBase, ReplayBufferBase, ReplayBufferError, RewardFn};
use anyhow::Result;

/// The reader side of goal-intersection replay.
///
/// Owns the sampler and a handle to the store; writers insert through their
/// own clones of [`SharedEpisodeStore`] obtained with [`Self::store`].
pub struct HerReplayBuffer {
    store: SharedEpisodeStore,
    sampler: TransitionSampler,
}

impl HerReplayBuffer {
    /// Combines a store handle and a sampler.
    pub fn new(store: SharedEpisodeStore, sampler: TransitionSampler) -> Self {
        Self { store, sampler }
    }

    /// Handle to the underlying store.
    pub fn store(&self) -> &SharedEpisodeStore {
        &self.store
    }

    /// Inserts a batch of episodes.
    pub fn insert_episodes(&self, episodes: &[Episode]) -> Result<(), ReplayBufferError> {
        self.store.insert_episodes(episodes)
    }

    /// Samples `batch_size` transitions, recomputing rewards with `reward_fn`.
    pub fn sample<R: RewardFn>(
        &mut self,
        batch_size: usize,
        reward_fn: &R,
    ) -> Result<TransitionBatch, ReplayBufferError> {
        self.store.sample(&mut self.sampler, batch_size, reward_fn)
    }

    /// Empties the store.
    pub fn clear(&self) {
        self.store.clear()
    }

    /// Counters of the store.
    pub fn stats(&self) -> BufferStats {
        self.store.stats()
    }
}

impl ExperienceBufferBase for HerReplayBuffer {
    type PushedItem = Vec<Episode>;

    /// Number of valid transitions.
    fn len(&self) -> usize {
        self.store.stats().n_transitions
    }

    fn push(&mut self, tr: Self::PushedItem) -> Result<()> {
        self.store.insert_episodes(&tr)?;
        Ok(())
    }
}

impl ReplayBufferBase for HerReplayBuffer {
    type Config = HerReplayBufferConfig;
    type Batch = TransitionBatch;

    fn build(config: &Self::Config) -> Result<Self> {
        Ok(Self::new(
            SharedEpisodeStore::build(&config.store)?,
            TransitionSampler::build(&config.sampler),
        ))
    }

    fn batch<R: RewardFn>(&mut self, size: usize, reward_fn: &R) -> Result<Self::Batch> {
        Ok(self.sample(size, reward_fn)?)
    }
}
