//! Asynchronous insertion of episodes into a shared store.
//!
//! Rollout workers send batches of episodes over a [`crossbeam_channel`] to an
//! [`EpisodeWriter`], which inserts them into a [`SharedEpisodeStore`] on its
//! own thread. Learners sample from clones of the same store handle.
//!
//! ```no_run
//! use dher_async::{EpisodeWriter, EpisodeWriterConfig};
//! use dher_core::{EpisodeStoreConfig, SharedEpisodeStore};
//!
//! let store = SharedEpisodeStore::build(&EpisodeStoreConfig::default()).unwrap();
//! let (writer, sender) = EpisodeWriter::spawn(&EpisodeWriterConfig::default(), store.clone());
//!
//! // Rollout workers own clones of `sender`.
//! # let episodes = vec![];
//! sender.send(episodes).unwrap();
//!
//! let stats = writer.stop_and_join().unwrap();
//! log::info!("{}", stats.fmt());
//! ```
//!
//! [`SharedEpisodeStore`]: dher_core::SharedEpisodeStore
mod writer;
pub use writer::{EpisodeWriter, EpisodeWriterConfig, EpisodeWriterStats};
