#![warn(missing_docs)]
//! Core components of goal-intersection experience replay.
//!
//! Episodes are stored in a fixed-capacity [`EpisodeStore`] which keeps a
//! spatial index of achieved and desired goal positions up to date on every
//! insertion. The [`TransitionSampler`] uses the intersections found by that
//! index to synthesize reward-bearing transitions for failed episodes.
pub mod error;
pub mod flat;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{ExperienceBufferBase, ReplayBufferBase};

mod episode;
pub use episode::{Episode, EpisodeShape, Rows, INFO_PREFIX, SUCCESS_KEY};

mod goal_key;
pub use goal_key::{GoalKey, GOAL_KEY_PRECISION};

mod reward;
pub use reward::{GoalDistanceReward, InfoView, RewardFn, RewardType};

pub use error::ReplayBufferError;
pub use replay_buffer::{
    BufferStats, EpisodeStore, EpisodeStoreConfig, HerReplayBuffer, HerReplayBufferConfig,
    Intersection, Location, ReplayStrategy, SampleDiagnostics, SharedEpisodeStore,
    StoreSnapshot, TransitionBatch, TransitionSampler, TransitionSamplerConfig, TransitionSource,
    SUCCESS_HISTORY_LEN,
};
