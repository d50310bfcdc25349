//! Goal-intersection replay over a flat list of grid transitions.
//!
//! A simpler sibling of [`replay_buffer`](crate::replay_buffer) for
//! environments with integer positions, such as a snake on a grid. Nothing is
//! evicted and the index is rebuilt on every call, so positions are hashed
//! exactly instead of being quantized. Rather than substituting goals, each
//! intersection is turned into a short trajectory that walks up to it.
use crate::GoalKey;
use rand::Rng;
use std::collections::HashMap;

/// Maximum number of steps walked back from an intersection.
pub const LOOKAHEAD: usize = 8;

/// Reward of every synthesized step except the last.
pub const STEP_PENALTY: f32 = -1.0;

/// Reward of the step reaching the intersection.
pub const TERMINAL_REWARD: f32 = 0.0;

/// A position on the grid.
pub type GridPos = [i64; 2];

/// A stored transition.
///
/// Positions are those observed before the action; the next positions are
/// read from the following entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransition {
    /// Position of the agent.
    pub achieved: GridPos,

    /// Position of the goal.
    pub desired: GridPos,

    /// Discrete action.
    pub action: usize,

    /// Reward given by the environment.
    pub reward: f32,

    /// Whether the episode ended with this transition.
    pub done: bool,
}

/// A transition of a synthesized trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticTransition {
    /// Observation, see [`grid_observation`].
    pub obs: [f32; 6],

    /// Discrete action.
    pub action: usize,

    /// [`STEP_PENALTY`] or [`TERMINAL_REWARD`].
    pub reward: f32,

    /// Next observation.
    pub next_obs: [f32; 6],

    /// Set on the step reaching the intersection.
    pub done: bool,
}

/// `[ac_x, ac_y, de_x, de_y, ac_x - de_x, ac_y - de_y]`.
pub fn grid_observation(achieved: GridPos, desired: GridPos) -> [f32; 6] {
    let [ax, ay] = achieved;
    let [dx, dy] = desired;
    [
        ax as f32,
        ay as f32,
        dx as f32,
        dy as f32,
        (ax - dx) as f32,
        (ay - dy) as f32,
    ]
}

/// Append-only list of grid transitions.
#[derive(Debug, Default, Clone)]
pub struct FlatReplay {
    transitions: Vec<GridTransition>,
}

impl FlatReplay {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transition.
    pub fn push(&mut self, tr: GridTransition) {
        self.transitions.push(tr);
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Returns the `i`-th transition.
    pub fn get(&self, i: usize) -> Option<&GridTransition> {
        self.transitions.get(i)
    }

    /// Pairs `(achieved_index, desired_index)` of entries where a position
    /// achieved in one entry is desired in another.
    ///
    /// Each position maps to the last entry where it was seen. Pairs are
    /// sorted so that sampling is reproducible under a seeded generator.
    pub fn intersections(&self) -> Vec<(usize, usize)> {
        let mut achieved: HashMap<GoalKey, usize> = HashMap::new();
        let mut desired: HashMap<GoalKey, usize> = HashMap::new();
        for (i, tr) in self.transitions.iter().enumerate() {
            achieved.insert(GoalKey::exact(&tr.achieved), i);
            desired.insert(GoalKey::exact(&tr.desired), i);
        }

        let mut pairs: Vec<(usize, usize)> = achieved
            .iter()
            .filter_map(|(key, &ac)| match desired.get(key) {
                Some(&de) if de != ac => Some((ac, de)),
                _ => None,
            })
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// Number of steps that can be walked back from `(ac, de)` without
    /// crossing an episode boundary on either side.
    fn span(&self, ac: usize, de: usize) -> usize {
        let mut span = 0;
        for j in 1..=LOOKAHEAD {
            match (ac.checked_sub(j), de.checked_sub(j)) {
                (Some(a), Some(d)) if !self.transitions[a].done && !self.transitions[d].done => {
                    span = j
                }
                _ => break,
            }
        }
        span
    }

    /// Synthesizes up to `batch_size` trajectories ending at intersections.
    ///
    /// Intersections are drawn uniformly with replacement. Intersections at
    /// the very start of an episode yield no trajectory and are skipped, so
    /// fewer than `batch_size` trajectories may be returned.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Vec<Vec<SyntheticTransition>> {
        let intersections = self.intersections();
        if intersections.is_empty() {
            return vec![];
        }

        let mut trajectories = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let (ac, de) = intersections[rng.gen_range(0..intersections.len())];
            let span = self.span(ac, de);
            if span == 0 {
                continue;
            }

            let trajectory = (0..span)
                .map(|k| {
                    let (a, d) = (ac - span + k, de - span + k);
                    let last = k == span - 1;
                    SyntheticTransition {
                        obs: grid_observation(
                            self.transitions[a].achieved,
                            self.transitions[d].desired,
                        ),
                        action: self.transitions[a].action,
                        reward: if last { TERMINAL_REWARD } else { STEP_PENALTY },
                        next_obs: grid_observation(
                            self.transitions[a + 1].achieved,
                            self.transitions[d + 1].desired,
                        ),
                        done: last,
                    }
                })
                .collect();
            trajectories.push(trajectory);
        }
        trajectories
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn push_episode(replay: &mut FlatReplay, path: &[GridPos], goal: &[GridPos]) {
        for (i, (&achieved, &desired)) in path.iter().zip(goal.iter()).enumerate() {
            replay.push(GridTransition {
                achieved,
                desired,
                action: i,
                reward: -1.0,
                done: i == path.len() - 1,
            });
        }
    }

    /// Episode 0 walks along y = 0; episode 1 chases a goal moving along
    /// y = 5 and then jumping to (3, 0).
    fn replay() -> FlatReplay {
        let mut replay = FlatReplay::new();
        push_episode(
            &mut replay,
            &[[0, 0], [1, 0], [2, 0], [3, 0], [4, 0]],
            &[[9, 9]; 5],
        );
        push_episode(
            &mut replay,
            &[[0, 9], [0, 8], [0, 7], [0, 6]],
            &[[0, 5], [1, 5], [2, 5], [3, 0]],
        );
        replay
    }

    #[test]
    fn test_grid_observation() {
        assert_eq!(
            grid_observation([3, 1], [1, 4]),
            [3.0, 1.0, 1.0, 4.0, 2.0, -3.0]
        );
    }

    #[test]
    fn test_intersections() {
        let replay = replay();
        assert_eq!(replay.len(), 9);
        // (3, 0) is achieved at entry 3 and desired at entry 8.
        assert_eq!(replay.intersections(), vec![(3, 8)]);
    }

    #[test]
    fn test_synthesized_trajectory_walks_to_the_intersection() {
        let replay = replay();
        let mut rng = StdRng::seed_from_u64(0);
        let trajectories = replay.synthesize(4, &mut rng);
        assert_eq!(trajectories.len(), 4);

        // Entry 8 is three steps into episode 1, so the walk spans 3 steps.
        let trajectory = &trajectories[0];
        assert_eq!(trajectory.len(), 3);
        assert_eq!(trajectory[0].obs, grid_observation([0, 0], [0, 5]));
        assert_eq!(trajectory[0].action, 0);
        assert_eq!(trajectory[0].reward, STEP_PENALTY);
        assert!(!trajectory[1].done);

        let last = trajectory[2];
        assert_eq!(last.next_obs, grid_observation([3, 0], [3, 0]));
        assert_eq!(last.reward, TERMINAL_REWARD);
        assert!(last.done);
    }

    #[test]
    fn test_lookahead_caps_long_walks() {
        let mut replay = FlatReplay::new();
        let path: Vec<GridPos> = (0..20).map(|i| [i, 0]).collect();
        push_episode(&mut replay, &path, &[[99, 99]; 20]);
        let path: Vec<GridPos> = (0..20).map(|k| [k, 50]).collect();
        let goal: Vec<GridPos> = (0..20)
            .map(|k| if k == 15 { [12, 0] } else { [100 + k, 100] })
            .collect();
        push_episode(&mut replay, &path, &goal);

        // Both entries are far enough from their episode starts to walk back
        // further than the cap.
        assert_eq!(replay.intersections(), vec![(12, 35)]);
        let mut rng = StdRng::seed_from_u64(0);
        let trajectories = replay.synthesize(4, &mut rng);
        assert_eq!(trajectories.len(), 4);
        for trajectory in trajectories.iter() {
            assert_eq!(trajectory.len(), LOOKAHEAD);
        }

        let trajectory = &trajectories[0];
        assert_eq!(trajectory[0].obs, grid_observation([4, 0], [107, 100]));
        assert_eq!(trajectory[0].action, 4);
        let last = trajectory[LOOKAHEAD - 1];
        assert_eq!(last.next_obs, grid_observation([12, 0], [12, 0]));
        assert!(last.done);
    }

    #[test]
    fn test_intersection_at_episode_start_is_skipped() {
        let mut replay = FlatReplay::new();
        push_episode(
            &mut replay,
            &[[0, 0], [1, 0], [2, 0]],
            &[[9, 9], [5, 5], [9, 9]],
        );
        push_episode(&mut replay, &[[5, 5], [6, 5], [7, 5]], &[[20, 20]; 3]);

        // (5, 5) is achieved on the first entry of episode 1.
        assert_eq!(replay.intersections(), vec![(3, 1)]);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(replay.synthesize(8, &mut rng).is_empty());
    }

    #[test]
    fn test_no_intersection_no_trajectory() {
        let mut replay = FlatReplay::new();
        push_episode(&mut replay, &[[0, 0], [1, 0]], &[[5, 5], [5, 5]]);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(replay.synthesize(8, &mut rng).is_empty());
    }
}
