//! Goal-intersection replay buffer.
//!
//! The [`EpisodeStore`] owns trajectory data and keeps a spatial index of the
//! goals achieved and desired in each step. Whenever one episode achieves a
//! position another episode desired, the pair is recorded as an
//! [`Intersection`]. The [`TransitionSampler`] turns intersections whose
//! desired episode failed into synthetic transitions: the achieved episode's
//! steps, with the failed episode's goal substituted.
//!
//! ```no_run
//! use dher_core::{
//!     EpisodeShape, EpisodeStoreConfig, GoalDistanceReward, HerReplayBuffer,
//!     HerReplayBufferConfig, ReplayBufferBase, TransitionSamplerConfig,
//! };
//!
//! let config = HerReplayBufferConfig::default()
//!     .store(
//!         EpisodeStoreConfig::default()
//!             .shape(EpisodeShape::new(50, 10, 3, 4))
//!             .capacity_in_transitions(1_000_000),
//!     )
//!     .sampler(TransitionSamplerConfig::default().replay_k(4));
//! let mut buffer = HerReplayBuffer::build(&config).unwrap();
//!
//! // Rollout workers insert through clones of the store handle.
//! let writer = buffer.store().clone();
//! # let episodes: Vec<dher_core::Episode> = vec![];
//! writer.insert_episodes(&episodes).unwrap();
//!
//! let batch = buffer.sample(256, &GoalDistanceReward::sparse(0.05)).unwrap();
//! ```
mod batch;
mod config;
mod field;
mod her;
mod sampler;
mod snapshot;
mod store;
pub use batch::{TransitionBatch, TransitionSource};
pub use config::{
    EpisodeStoreConfig, HerReplayBufferConfig, ReplayStrategy, TransitionSamplerConfig,
};
pub use her::HerReplayBuffer;
pub use sampler::{SampleDiagnostics, TransitionSampler};
pub use snapshot::StoreSnapshot;
pub use store::{
    BufferStats, EpisodeStore, Intersection, Location, SharedEpisodeStore, SUCCESS_HISTORY_LEN,
};
