//! Read-only copy of the valid part of an episode store.
use super::{field::FieldBuffer, Intersection};
use crate::{EpisodeShape, GoalKey, SUCCESS_KEY};
use std::collections::BTreeMap;

/// A consistent copy of the valid episodes, the intersection table and the
/// success rate at the time it was taken.
///
/// Next-step views are computed from the state rows on access.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub(crate) shape: EpisodeShape,
    pub(crate) n_episodes: usize,
    pub(crate) obs: FieldBuffer,
    pub(crate) achieved_goal: FieldBuffer,
    pub(crate) desired_goal: FieldBuffer,
    pub(crate) action: FieldBuffer,
    pub(crate) reward: FieldBuffer,
    pub(crate) info: BTreeMap<String, FieldBuffer>,
    pub(crate) intersections: Vec<(GoalKey, Intersection)>,
    pub(crate) success_rate: f64,
}

impl StoreSnapshot {
    /// Replaces the success rate estimate, e.g. with one tracked by the
    /// training loop.
    pub fn with_success_rate(mut self, success_rate: f64) -> Self {
        self.success_rate = success_rate;
        self
    }

    /// Shape of the episodes.
    pub fn shape(&self) -> &EpisodeShape {
        &self.shape
    }

    /// Number of episodes.
    pub fn n_episodes(&self) -> usize {
        self.n_episodes
    }

    /// Number of actions per episode.
    pub fn horizon(&self) -> usize {
        self.shape.horizon
    }

    /// Intersections ordered by key.
    pub fn intersections(&self) -> &[(GoalKey, Intersection)] {
        &self.intersections
    }

    /// Mean success over the recent episodes.
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    /// Observation at step `t` of episode `e`.
    pub fn obs(&self, e: usize, t: usize) -> &[f32] {
        self.obs.at(e, t)
    }

    /// Observation after step `t` of episode `e`.
    pub fn next_obs(&self, e: usize, t: usize) -> &[f32] {
        self.obs.at(e, t + 1)
    }

    /// Achieved goal at step `t` of episode `e`.
    pub fn achieved_goal(&self, e: usize, t: usize) -> &[f32] {
        self.achieved_goal.at(e, t)
    }

    /// Achieved goal after step `t` of episode `e`.
    pub fn next_achieved_goal(&self, e: usize, t: usize) -> &[f32] {
        self.achieved_goal.at(e, t + 1)
    }

    /// Desired goal at step `t` of episode `e`.
    pub fn desired_goal(&self, e: usize, t: usize) -> &[f32] {
        self.desired_goal.at(e, t)
    }

    /// Desired goal after step `t` of episode `e`.
    pub fn next_desired_goal(&self, e: usize, t: usize) -> &[f32] {
        self.desired_goal.at(e, t + 1)
    }

    /// Action at step `t` of episode `e`.
    pub fn action(&self, e: usize, t: usize) -> &[f32] {
        self.action.at(e, t)
    }

    /// Reward recorded at step `t` of episode `e`.
    pub fn reward(&self, e: usize, t: usize) -> f32 {
        self.reward.at(e, t)[0]
    }

    /// Info field `name` at step `t` of episode `e`.
    pub fn info(&self, name: &str, e: usize, t: usize) -> Option<&[f32]> {
        self.info.get(name).map(|buf| buf.at(e, t))
    }

    /// Names of the info fields.
    pub fn info_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.info.keys().map(|k| k.as_str())
    }

    /// Whether any step of episode `e` succeeded.
    pub fn episode_success(&self, e: usize) -> bool {
        (0..self.shape.horizon).any(|t| {
            self.info(SUCCESS_KEY, e, t)
                .map_or(false, |flag| flag.iter().any(|&f| f != 0.0))
        })
    }
}
