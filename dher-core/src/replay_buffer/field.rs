//! Per-field episode storage.
use crate::Rows;
use std::sync::Arc;

/// Storage of one field for a fixed number of episode slots.
///
/// Each slot is an immutable row-major chunk of `rows_per_episode * dim`
/// values. Writing a slot replaces its chunk, so copies made by
/// [`FieldBuffer::head`] share the chunks and keep seeing the data as it was
/// when they were made.
#[derive(Debug, Clone)]
pub(crate) struct FieldBuffer {
    rows_per_episode: usize,
    dim: usize,
    slots: Vec<Arc<[f32]>>,
}

impl FieldBuffer {
    pub fn new(n_episodes: usize, rows_per_episode: usize, dim: usize) -> Self {
        let zeros: Arc<[f32]> = vec![0.0; rows_per_episode * dim].into();
        Self {
            rows_per_episode,
            dim,
            slots: vec![zeros; n_episodes],
        }
    }

    #[inline]
    pub fn at(&self, episode: usize, t: usize) -> &[f32] {
        debug_assert!(t < self.rows_per_episode);
        &self.slots[episode][t * self.dim..(t + 1) * self.dim]
    }

    /// Overwrites slot `episode` with `src`.
    pub fn write(&mut self, episode: usize, src: &Rows) {
        debug_assert_eq!(src.len(), self.rows_per_episode);
        debug_assert_eq!(src.dim(), self.dim);
        self.slots[episode] = Arc::from(src.as_flat());
    }

    /// The first `n_episodes` slots, sharing their chunks with `self`.
    pub fn head(&self, n_episodes: usize) -> Self {
        Self {
            rows_per_episode: self.rows_per_episode,
            dim: self.dim,
            slots: self.slots[..n_episodes].to_vec(),
        }
    }
}
