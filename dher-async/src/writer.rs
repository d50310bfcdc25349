//! Writer thread.
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use dher_core::{Episode, SharedEpisodeStore};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    sync::{Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

/// Configuration of [`EpisodeWriter`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct EpisodeWriterConfig {
    /// Number of batches the channel holds before senders block.
    pub channel_capacity: usize,

    /// Interval at which the thread checks the stop flag while idle.
    pub poll_interval_ms: u64,
}

impl Default for EpisodeWriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
            poll_interval_ms: 10,
        }
    }
}

impl EpisodeWriterConfig {
    /// Sets the channel capacity.
    pub fn channel_capacity(mut self, v: usize) -> Self {
        self.channel_capacity = v;
        self
    }

    /// Sets the poll interval in milliseconds.
    pub fn poll_interval_ms(mut self, v: u64) -> Self {
        self.poll_interval_ms = v;
        self
    }

    /// Loads configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Statistics of an [`EpisodeWriter`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EpisodeWriterStats {
    /// Number of batches inserted.
    pub n_batches: usize,

    /// Number of episodes inserted.
    pub n_episodes: usize,

    /// Number of episodes in batches the store rejected.
    pub n_rejected: usize,
}

impl EpisodeWriterStats {
    /// Returns a formatted string of the stats.
    pub fn fmt(&self) -> String {
        format!(
            "batches: {}, episodes: {}, rejected episodes: {}",
            self.n_batches, self.n_episodes, self.n_rejected
        )
    }

    fn insert(&mut self, store: &SharedEpisodeStore, episodes: Vec<Episode>) {
        match store.insert_episodes(&episodes) {
            Ok(()) => {
                self.n_batches += 1;
                self.n_episodes += episodes.len();
            }
            Err(e) => {
                warn!("Dropped a batch of {} episodes: {}", episodes.len(), e);
                self.n_rejected += episodes.len();
            }
        }
    }
}

/// Inserts episodes received over a channel into a shared store.
///
/// The thread stops when [`EpisodeWriter::stop_and_join`] is called or when
/// every sender has been dropped. In both cases the batches still in the
/// channel are inserted before it exits.
pub struct EpisodeWriter {
    stop: Arc<Mutex<bool>>,
    handle: JoinHandle<EpisodeWriterStats>,
}

impl EpisodeWriter {
    /// Spawns the writer thread and returns it with the sending end of its
    /// channel.
    pub fn spawn(
        config: &EpisodeWriterConfig,
        store: SharedEpisodeStore,
    ) -> (Self, Sender<Vec<Episode>>) {
        let (sender, receiver) = bounded(config.channel_capacity);
        let stop = Arc::new(Mutex::new(false));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        let handle = {
            let stop = stop.clone();
            thread::spawn(move || run(receiver, store, stop, poll_interval))
        };
        info!("Started episode writer");

        (Self { stop, handle }, sender)
    }

    /// Returns `true` if the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits until every sender is dropped and the channel is drained.
    pub fn join(self) -> Result<EpisodeWriterStats> {
        let stats = self
            .handle
            .join()
            .map_err(|_| anyhow!("episode writer thread panicked"))?;
        info!("Stats of episode writer");
        info!("{}", stats.fmt());
        Ok(stats)
    }

    /// Asks the thread to stop and waits for it.
    pub fn stop_and_join(self) -> Result<EpisodeWriterStats> {
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.join()
    }
}

fn run(
    receiver: Receiver<Vec<Episode>>,
    store: SharedEpisodeStore,
    stop: Arc<Mutex<bool>>,
    poll_interval: Duration,
) -> EpisodeWriterStats {
    let mut stats = EpisodeWriterStats::default();

    loop {
        if *stop.lock().unwrap_or_else(PoisonError::into_inner) {
            break;
        }
        match receiver.recv_timeout(poll_interval) {
            Ok(episodes) => stats.insert(&store, episodes),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Batches sent before the stop request
    for episodes in receiver.try_iter() {
        stats.insert(&store, episodes);
    }
    stats
}
