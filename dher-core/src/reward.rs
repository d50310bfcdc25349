//! Reward functions used to recompute rewards of sampled transitions.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Info fields of a single transition, keyed without the `info_` prefix.
pub type InfoView<'a> = BTreeMap<&'a str, &'a [f32]>;

/// Computes the reward of a transition from its goals.
///
/// This is the only place where environment semantics enter the replay
/// buffer: rewards stored with episodes are never reused.
pub trait RewardFn {
    /// Reward for reaching `next_achieved_goal` while pursuing
    /// `next_desired_goal`.
    fn reward(
        &self,
        next_achieved_goal: &[f32],
        next_desired_goal: &[f32],
        info: &InfoView<'_>,
    ) -> f32;
}

impl<F> RewardFn for F
where
    F: Fn(&[f32], &[f32], &InfoView<'_>) -> f32,
{
    fn reward(
        &self,
        next_achieved_goal: &[f32],
        next_desired_goal: &[f32],
        info: &InfoView<'_>,
    ) -> f32 {
        self(next_achieved_goal, next_desired_goal, info)
    }
}

/// Shape of [`GoalDistanceReward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardType {
    /// `-1` unless the goal is within the distance threshold, then `0`.
    Sparse,

    /// Negative Euclidean distance to the goal.
    Dense,
}

/// Reward based on the Euclidean distance between goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalDistanceReward {
    /// Reward shape.
    pub reward_type: RewardType,

    /// Distance under which a goal counts as reached.
    pub distance_threshold: f32,
}

impl GoalDistanceReward {
    /// Sparse reward with the given threshold.
    pub fn sparse(distance_threshold: f32) -> Self {
        Self {
            reward_type: RewardType::Sparse,
            distance_threshold,
        }
    }

    /// Dense reward.
    pub fn dense() -> Self {
        Self {
            reward_type: RewardType::Dense,
            distance_threshold: 0.0,
        }
    }

    /// Euclidean distance between two goals.
    pub fn goal_distance(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }
}

impl RewardFn for GoalDistanceReward {
    fn reward(
        &self,
        next_achieved_goal: &[f32],
        next_desired_goal: &[f32],
        _info: &InfoView<'_>,
    ) -> f32 {
        let d = Self::goal_distance(next_achieved_goal, next_desired_goal);
        match self.reward_type {
            RewardType::Sparse => -((d > self.distance_threshold) as i32 as f32),
            RewardType::Dense => -d,
        }
    }
}
