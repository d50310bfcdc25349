//! Fixed-capacity episode store with a goal intersection index.
mod index;
mod success_history;
use super::{
    field::FieldBuffer, EpisodeStoreConfig, StoreSnapshot, TransitionBatch, TransitionSampler,
};
use crate::{Episode, EpisodeShape, GoalKey, ReplayBufferError, RewardFn};
use index::GoalIntersectionIndex;
pub use index::{Intersection, Location};
use log::{debug, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use success_history::SuccessHistory;
pub use success_history::SUCCESS_HISTORY_LEN;

/// Counters describing the contents of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Number of valid episodes.
    pub n_episodes: usize,

    /// Number of valid transitions.
    pub n_transitions: usize,

    /// Number of transitions ever stored, including evicted ones.
    pub n_transitions_stored: usize,

    /// Whether every slot holds an episode.
    pub is_full: bool,
}

/// A fixed-capacity store of episodes.
///
/// Slots are filled sequentially until the store is full. From then on each
/// new episode overwrites a slot chosen uniformly at random. Every insertion
/// keeps the goal intersection index consistent with the stored data.
pub struct EpisodeStore {
    capacity: usize,
    shape: EpisodeShape,
    key_precision: u32,
    key_dims: usize,
    current_size: usize,
    n_transitions_stored: usize,
    obs: FieldBuffer,
    achieved_goal: FieldBuffer,
    desired_goal: FieldBuffer,
    action: FieldBuffer,
    reward: FieldBuffer,
    info: BTreeMap<String, FieldBuffer>,
    index: GoalIntersectionIndex,
    success_history: SuccessHistory,
    rng: StdRng,
}

impl EpisodeStore {
    /// Builds an empty store.
    ///
    /// Fails with [`ReplayBufferError::InvalidShape`] if the shape has a
    /// zero horizon or a zero-dimensional field.
    pub fn build(config: &EpisodeStoreConfig) -> Result<Self, ReplayBufferError> {
        config.shape.validate()?;
        let capacity = config.capacity;
        let shape = config.shape.clone();
        let (t, t1) = (shape.horizon, shape.state_rows());
        let info = shape
            .info_dims
            .iter()
            .map(|(name, &dim)| (name.clone(), FieldBuffer::new(capacity, t, dim)))
            .collect();

        Ok(Self {
            capacity,
            key_precision: config.key_precision,
            key_dims: config.key_dims,
            current_size: 0,
            n_transitions_stored: 0,
            obs: FieldBuffer::new(capacity, t1, shape.obs_dim),
            achieved_goal: FieldBuffer::new(capacity, t1, shape.goal_dim),
            desired_goal: FieldBuffer::new(capacity, t1, shape.goal_dim),
            action: FieldBuffer::new(capacity, t, shape.action_dim),
            reward: FieldBuffer::new(capacity, t, 1),
            info,
            index: GoalIntersectionIndex::default(),
            success_history: SuccessHistory::new(SUCCESS_HISTORY_LEN),
            rng: StdRng::seed_from_u64(config.seed),
            shape,
        })
    }

    /// Capacity in episodes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shape of stored episodes.
    pub fn shape(&self) -> &EpisodeShape {
        &self.shape
    }

    /// Number of valid episodes.
    pub fn len(&self) -> usize {
        self.current_size
    }

    /// Returns `true` if no episode is stored.
    pub fn is_empty(&self) -> bool {
        self.current_size == 0
    }

    /// Number of valid transitions.
    pub fn n_transitions(&self) -> usize {
        self.current_size * self.shape.horizon
    }

    /// Number of transitions ever stored.
    pub fn n_transitions_stored(&self) -> usize {
        self.n_transitions_stored
    }

    /// Returns `true` if every slot holds an episode.
    pub fn is_full(&self) -> bool {
        self.current_size == self.capacity
    }

    /// Counters of the store.
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            n_episodes: self.len(),
            n_transitions: self.n_transitions(),
            n_transitions_stored: self.n_transitions_stored,
            is_full: self.is_full(),
        }
    }

    /// Spatial key of the goal achieved after step `t` of slot `episode`,
    /// `None` if the position is not finite.
    pub fn achieved_key(&self, episode: usize, t: usize) -> Option<GoalKey> {
        GoalKey::quantize(
            self.achieved_goal.at(episode, t + 1),
            self.key_precision,
            self.key_dims,
        )
    }

    /// Spatial key of the goal desired after step `t` of slot `episode`,
    /// `None` if the position is not finite.
    pub fn desired_key(&self, episode: usize, t: usize) -> Option<GoalKey> {
        GoalKey::quantize(
            self.desired_goal.at(episode, t + 1),
            self.key_precision,
            self.key_dims,
        )
    }

    /// Location where the position `key` was last achieved.
    pub fn achieved_location(&self, key: &GoalKey) -> Option<Location> {
        self.index.achieved(key)
    }

    /// Location where the position `key` was last desired.
    pub fn desired_location(&self, key: &GoalKey) -> Option<Location> {
        self.index.desired(key)
    }

    /// Intersection recorded at `key`.
    pub fn intersection(&self, key: &GoalKey) -> Option<Intersection> {
        self.index.intersection(key)
    }

    /// All recorded intersections.
    pub fn intersections(&self) -> impl Iterator<Item = (&GoalKey, &Intersection)> + '_ {
        self.index.intersections()
    }

    /// Every location referenced by the position maps and the intersection
    /// table.
    pub fn indexed_locations(&self) -> Vec<Location> {
        self.index
            .achieved_locations()
            .chain(self.index.desired_locations())
            .copied()
            .chain(
                self.index
                    .intersections()
                    .flat_map(|(_, x)| [x.achieved, x.desired]),
            )
            .collect()
    }

    /// Inserts a batch of episodes.
    ///
    /// The batch is validated before anything is modified, so a failed call
    /// leaves the store untouched.
    pub fn insert_episodes(&mut self, episodes: &[Episode]) -> Result<(), ReplayBufferError> {
        let batch_size = episodes.len();
        if batch_size > self.capacity {
            return Err(ReplayBufferError::CapacityViolation {
                batch_size,
                capacity: self.capacity,
            });
        }
        for (i, episode) in episodes.iter().enumerate() {
            episode.validate(&self.shape, i)?;
        }
        if batch_size == 0 {
            return Ok(());
        }

        let n_before = self.current_size;
        let idxs = self.storage_indexes(batch_size);
        for (&slot, episode) in idxs.iter().zip(episodes.iter()) {
            if slot < n_before {
                trace!("Evicting episode in slot {}", slot);
            }
            self.unindex_slot(slot);
            self.write_slot(slot, episode);
            self.success_history.push(episode.is_success());
            self.index_slot(slot);
        }

        let mut written = idxs;
        written.sort_unstable();
        written.dedup();
        for &slot in written.iter() {
            self.link_slot(slot);
        }

        self.n_transitions_stored += batch_size * self.shape.horizon;
        debug!(
            "Stored {} episodes, {}/{} slots in use",
            batch_size, self.current_size, self.capacity
        );
        Ok(())
    }

    /// Copies the valid part of the store.
    ///
    /// Episode data is shared with the store rather than copied, so the cost
    /// grows with the number of episodes and intersections, not with their
    /// size. Later insertions do not affect the snapshot.
    pub fn snapshot(&self) -> Result<StoreSnapshot, ReplayBufferError> {
        let success_rate = match self.success_history.rate() {
            Some(rate) if self.current_size > 0 => rate,
            _ => return Err(ReplayBufferError::EmptyBuffer),
        };
        let n = self.current_size;

        let mut intersections: Vec<(GoalKey, Intersection)> = self
            .index
            .intersections()
            .map(|(k, x)| (k.clone(), *x))
            .collect();
        intersections.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        Ok(StoreSnapshot {
            shape: self.shape.clone(),
            n_episodes: n,
            obs: self.obs.head(n),
            achieved_goal: self.achieved_goal.head(n),
            desired_goal: self.desired_goal.head(n),
            action: self.action.head(n),
            reward: self.reward.head(n),
            info: self
                .info
                .iter()
                .map(|(name, buf)| (name.clone(), buf.head(n)))
                .collect(),
            intersections,
            success_rate,
        })
    }

    /// Empties the store.
    ///
    /// Stored values are not zeroed; they become unreachable. The success
    /// history is kept since it describes the agent rather than the data.
    pub fn clear(&mut self) {
        self.current_size = 0;
        self.index.clear();
    }

    /// Number of episodes in the success history.
    pub fn success_history_len(&self) -> usize {
        self.success_history.len()
    }

    /// Chooses the slots for `inc` new episodes and grows the store.
    ///
    /// Goes sequentially until the end is hit, then picks randomly.
    fn storage_indexes(&mut self, inc: usize) -> Vec<usize> {
        let idxs = if self.current_size + inc <= self.capacity {
            (self.current_size..self.current_size + inc).collect()
        } else if self.current_size < self.capacity {
            let overflow = inc - (self.capacity - self.current_size);
            let n = self.current_size;
            let mut idxs: Vec<usize> = (self.current_size..self.capacity).collect();
            idxs.extend((0..overflow).map(|_| self.rng.gen_range(0..n)));
            idxs
        } else {
            let n = self.capacity;
            (0..inc).map(|_| self.rng.gen_range(0..n)).collect()
        };

        self.current_size = (self.current_size + inc).min(self.capacity);
        idxs
    }

    // Steps whose positions have no key are left out of the index.
    fn unindex_slot(&mut self, slot: usize) {
        for t in 0..self.shape.horizon {
            let loc = Location::new(slot, t);
            if let Some(k) = self.achieved_key(slot, t) {
                self.index.remove_achieved(&k, loc);
            }
            if let Some(k) = self.desired_key(slot, t) {
                self.index.remove_desired(&k, loc);
            }
        }
    }

    fn index_slot(&mut self, slot: usize) {
        for t in 0..self.shape.horizon {
            let loc = Location::new(slot, t);
            if let Some(k) = self.achieved_key(slot, t) {
                self.index.insert_achieved(k, loc);
            }
            if let Some(k) = self.desired_key(slot, t) {
                self.index.insert_desired(k, loc);
            }
        }
    }

    fn link_slot(&mut self, slot: usize) {
        for t in 0..self.shape.horizon {
            let loc = Location::new(slot, t);
            if let Some(k) = self.achieved_key(slot, t) {
                self.index.link_achieved(&k, loc);
            }
            if let Some(k) = self.desired_key(slot, t) {
                self.index.link_desired(&k, loc);
            }
        }
    }

    fn write_slot(&mut self, slot: usize, episode: &Episode) {
        self.obs.write(slot, &episode.obs);
        self.achieved_goal.write(slot, &episode.achieved_goal);
        self.desired_goal.write(slot, &episode.desired_goal);
        self.action.write(slot, &episode.action);
        self.reward.write(slot, &episode.reward);
        for (name, buf) in self.info.iter_mut() {
            if let Some(rows) = episode.info.get(name) {
                buf.write(slot, rows);
            }
        }
    }
}

/// Handle to an [`EpisodeStore`] shared between writers and readers.
///
/// Every operation holds the lock for its whole duration, so no reader ever
/// observes a partially written slot or a partially updated index. Sampling
/// only holds it while the snapshot is taken.
#[derive(Clone)]
pub struct SharedEpisodeStore {
    inner: Arc<Mutex<EpisodeStore>>,
}

impl SharedEpisodeStore {
    /// Wraps a store.
    pub fn new(store: EpisodeStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Builds an empty shared store.
    pub fn build(config: &EpisodeStoreConfig) -> Result<Self, ReplayBufferError> {
        Ok(Self::new(EpisodeStore::build(config)?))
    }

    fn lock(&self) -> MutexGuard<'_, EpisodeStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`EpisodeStore::insert_episodes`].
    pub fn insert_episodes(&self, episodes: &[Episode]) -> Result<(), ReplayBufferError> {
        self.lock().insert_episodes(episodes)
    }

    /// See [`EpisodeStore::snapshot`].
    pub fn snapshot(&self) -> Result<StoreSnapshot, ReplayBufferError> {
        self.lock().snapshot()
    }

    /// Takes a snapshot and samples a batch from it after releasing the lock.
    pub fn sample<R: RewardFn>(
        &self,
        sampler: &mut TransitionSampler,
        batch_size: usize,
        reward_fn: &R,
    ) -> Result<TransitionBatch, ReplayBufferError> {
        let snapshot = self.snapshot()?;
        sampler.sample(&snapshot, batch_size, reward_fn)
    }

    /// See [`EpisodeStore::clear`].
    pub fn clear(&self) {
        self.lock().clear()
    }

    /// See [`EpisodeStore::stats`].
    pub fn stats(&self) -> BufferStats {
        self.lock().stats()
    }

    /// Number of valid episodes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no episode is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns `true` if every slot holds an episode.
    pub fn is_full(&self) -> bool {
        self.lock().is_full()
    }

    /// Runs `f` on the store while holding the lock.
    pub fn with_store<T>(&self, f: impl FnOnce(&EpisodeStore) -> T) -> T {
        f(&self.lock())
    }
}
