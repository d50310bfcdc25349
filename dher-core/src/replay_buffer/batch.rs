//! Batches of transitions drawn by the sampler.
use super::{Location, SampleDiagnostics, StoreSnapshot};
use crate::{EpisodeShape, ReplayBufferError, Rows};
use std::collections::BTreeMap;

/// Where a sampled transition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSource {
    /// Steps of the achieved episode with goals of the desired episode.
    Intersection {
        /// Step whose fields were copied.
        achieved: Location,

        /// Step whose desired goals were substituted.
        desired: Location,
    },

    /// A stored transition as is.
    Ordinary(Location),

    /// A stored transition whose goals were replaced with the goal achieved
    /// at a later state row of the same episode.
    Relabeled {
        /// Step whose fields were copied.
        location: Location,

        /// State row providing the goal.
        future_row: usize,
    },
}

/// A batch of transitions.
///
/// Row `i` of every field belongs to transition `i`.
#[derive(Debug, Clone)]
pub struct TransitionBatch {
    /// Observations.
    pub obs: Rows,

    /// Actions.
    pub act: Rows,

    /// Next observations.
    pub next_obs: Rows,

    /// Rewards recomputed with the reward function.
    pub reward: Vec<f32>,

    /// Achieved goals.
    pub achieved_goal: Rows,

    /// Next achieved goals.
    pub next_achieved_goal: Rows,

    /// Desired goals.
    pub desired_goal: Rows,

    /// Next desired goals.
    pub next_desired_goal: Rows,

    /// Info fields, keyed without the `info_` prefix.
    pub info: BTreeMap<String, Rows>,

    /// Provenance of each transition.
    pub sources: Vec<TransitionSource>,

    /// Statistics of the draw.
    pub diagnostics: SampleDiagnostics,
}

impl TransitionBatch {
    /// Creates an empty batch with space for `capacity` transitions.
    pub fn with_capacity(shape: &EpisodeShape, capacity: usize) -> Self {
        Self {
            obs: Rows::with_capacity(shape.obs_dim, capacity),
            act: Rows::with_capacity(shape.action_dim, capacity),
            next_obs: Rows::with_capacity(shape.obs_dim, capacity),
            reward: Vec::with_capacity(capacity),
            achieved_goal: Rows::with_capacity(shape.goal_dim, capacity),
            next_achieved_goal: Rows::with_capacity(shape.goal_dim, capacity),
            desired_goal: Rows::with_capacity(shape.goal_dim, capacity),
            next_desired_goal: Rows::with_capacity(shape.goal_dim, capacity),
            info: shape
                .info_dims
                .iter()
                .map(|(name, &dim)| (name.clone(), Rows::with_capacity(dim, capacity)))
                .collect(),
            sources: Vec::with_capacity(capacity),
            diagnostics: SampleDiagnostics::default(),
        }
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Number of transitions synthesized from intersections.
    pub fn n_synthetic(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s, TransitionSource::Intersection { .. }))
            .count()
    }

    /// Appends step `loc` of `snapshot` with the given desired goals.
    pub(crate) fn push(
        &mut self,
        snapshot: &StoreSnapshot,
        loc: Location,
        desired_goal: &[f32],
        next_desired_goal: &[f32],
        source: TransitionSource,
    ) {
        let (e, t) = (loc.episode, loc.step);
        self.obs.push(snapshot.obs(e, t));
        self.act.push(snapshot.action(e, t));
        self.next_obs.push(snapshot.next_obs(e, t));
        self.achieved_goal.push(snapshot.achieved_goal(e, t));
        self.next_achieved_goal.push(snapshot.next_achieved_goal(e, t));
        self.desired_goal.push(desired_goal);
        self.next_desired_goal.push(next_desired_goal);
        for (name, rows) in self.info.iter_mut() {
            if let Some(row) = snapshot.info(name, e, t) {
                rows.push(row);
            }
        }
        self.sources.push(source);
    }

    /// Checks that every field has exactly `batch_size` rows.
    pub(crate) fn check_len(&self, batch_size: usize) -> Result<(), ReplayBufferError> {
        let fields = [
            ("o", self.obs.len()),
            ("u", self.act.len()),
            ("o_2", self.next_obs.len()),
            ("r", self.reward.len()),
            ("ag", self.achieved_goal.len()),
            ("ag_2", self.next_achieved_goal.len()),
            ("g", self.desired_goal.len()),
            ("g_2", self.next_desired_goal.len()),
        ];
        let info = self.info.iter().map(|(name, rows)| (name.as_str(), rows.len()));
        for (field, actual) in fields.into_iter().chain(info) {
            if actual != batch_size {
                return Err(ReplayBufferError::BatchSizeMismatch {
                    field: field.to_string(),
                    expected: batch_size,
                    actual,
                });
            }
        }
        Ok(())
    }
}
