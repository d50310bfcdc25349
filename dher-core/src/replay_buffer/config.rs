//! Configurations of the episode store and the transition sampler.
use crate::{EpisodeShape, GOAL_KEY_PRECISION};
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let file = File::open(path)?;
    let rdr = BufReader::new(file);
    let b = serde_yaml::from_reader(rdr)?;
    Ok(b)
}

fn save_yaml<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(serde_yaml::to_string(value)?.as_bytes())?;
    Ok(())
}

/// Configuration of [`EpisodeStore`](super::EpisodeStore).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpisodeStoreConfig {
    /// Capacity in episodes.
    pub capacity: usize,

    /// Shape of stored episodes.
    pub shape: EpisodeShape,

    /// Seed of the random number generator used to pick evicted slots.
    pub seed: u64,

    /// Decimal places kept when goal positions are hashed.
    pub key_precision: u32,

    /// Number of leading goal coordinates forming the spatial key.
    pub key_dims: usize,
}

impl Default for EpisodeStoreConfig {
    fn default() -> Self {
        Self {
            capacity: 10000,
            shape: EpisodeShape::default(),
            seed: 42,
            key_precision: GOAL_KEY_PRECISION,
            key_dims: 3,
        }
    }
}

impl EpisodeStoreConfig {
    /// Sets the capacity in episodes.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the capacity from a number of transitions.
    ///
    /// The capacity in episodes is `n_transitions / horizon`, so the shape
    /// must be set first.
    pub fn capacity_in_transitions(mut self, n_transitions: usize) -> Self {
        self.capacity = n_transitions / self.shape.horizon.max(1);
        self
    }

    /// Sets the episode shape.
    pub fn shape(mut self, shape: EpisodeShape) -> Self {
        self.shape = shape;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the key precision.
    pub fn key_precision(mut self, key_precision: u32) -> Self {
        self.key_precision = key_precision;
        self
    }

    /// Sets the number of goal coordinates forming the spatial key.
    pub fn key_dims(mut self, key_dims: usize) -> Self {
        self.key_dims = key_dims;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_yaml(path)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_yaml(self, path)
    }
}

/// Goal relabeling strategy.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum ReplayStrategy {
    /// Relabel with goals achieved later in the trajectory.
    Future,

    /// Plain experience replay.
    None,
}

/// Configuration of [`TransitionSampler`](super::TransitionSampler).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TransitionSamplerConfig {
    /// Relabeling strategy.
    pub replay_strategy: ReplayStrategy,

    /// Ratio between relabeled and regular replays.
    pub replay_k: usize,

    /// If `true`, ordinary transitions are also relabeled with future
    /// achieved goals of their own episode.
    pub relabel_future: bool,

    /// Seed of the random number generator.
    pub seed: u64,
}

impl Default for TransitionSamplerConfig {
    fn default() -> Self {
        Self {
            replay_strategy: ReplayStrategy::Future,
            replay_k: 4,
            relabel_future: false,
            seed: 42,
        }
    }
}

impl TransitionSamplerConfig {
    /// Sets the relabeling strategy.
    pub fn replay_strategy(mut self, replay_strategy: ReplayStrategy) -> Self {
        self.replay_strategy = replay_strategy;
        self
    }

    /// Sets `replay_k`.
    pub fn replay_k(mut self, replay_k: usize) -> Self {
        self.replay_k = replay_k;
        self
    }

    /// Enables future relabeling of ordinary transitions.
    pub fn relabel_future(mut self, relabel_future: bool) -> Self {
        self.relabel_future = relabel_future;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Probability of replaying with a substituted goal.
    ///
    /// `1 - 1 / (1 + replay_k)` for [`ReplayStrategy::Future`], `0` otherwise.
    pub fn future_p(&self) -> f64 {
        match self.replay_strategy {
            ReplayStrategy::Future => 1.0 - 1.0 / (1.0 + self.replay_k as f64),
            ReplayStrategy::None => 0.0,
        }
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_yaml(path)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_yaml(self, path)
    }
}

/// Configuration of [`HerReplayBuffer`](super::HerReplayBuffer).
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Clone)]
pub struct HerReplayBufferConfig {
    /// Configuration of the episode store.
    pub store: EpisodeStoreConfig,

    /// Configuration of the sampler.
    pub sampler: TransitionSamplerConfig,
}

impl HerReplayBufferConfig {
    /// Sets the store configuration.
    pub fn store(mut self, store: EpisodeStoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Sets the sampler configuration.
    pub fn sampler(mut self, sampler: TransitionSamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_yaml(path)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_yaml(self, path)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_future_p() {
        let config = TransitionSamplerConfig::default().replay_k(4);
        assert!((config.future_p() - 0.8).abs() < 1e-12);
        let config = config.replay_strategy(ReplayStrategy::None);
        assert_eq!(config.future_p(), 0.0);
    }

    #[test]
    fn test_capacity_in_transitions() {
        let config = EpisodeStoreConfig::default()
            .shape(EpisodeShape::new(50, 10, 3, 4))
            .capacity_in_transitions(1_000_000);
        assert_eq!(config.capacity, 20000);
    }

    #[test]
    fn test_serde_her_replay_buffer_config() -> Result<()> {
        let config = HerReplayBufferConfig::default()
            .store(
                EpisodeStoreConfig::default()
                    .capacity(8)
                    .shape(EpisodeShape::new(3, 2, 3, 1).info("is_grasped", 1))
                    .seed(7),
            )
            .sampler(TransitionSamplerConfig::default().relabel_future(true));

        let dir = TempDir::new("her_replay_buffer_config")?;
        let path = dir.path().join("her_replay_buffer_config.yaml");
        config.save(&path)?;
        let config_ = HerReplayBufferConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
