//! Sampling of training transitions from a store snapshot.
use super::{
    Intersection, Location, StoreSnapshot, TransitionBatch, TransitionSamplerConfig,
    TransitionSource,
};
use crate::{
    record::{Record, RecordValue},
    InfoView, ReplayBufferError, RewardFn,
};
use log::{debug, error};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;

/// Statistics of one draw of [`TransitionSampler::sample`].
///
/// Purely informational; none of these values feed back into sampling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleDiagnostics {
    /// Intersections whose desired episode failed.
    pub n_candidates: usize,

    /// Transitions synthesized from intersections.
    pub n_synthetic: usize,

    /// Transitions drawn from the stored episodes.
    pub n_ordinary: usize,

    /// Ordinary transitions relabeled with a future achieved goal.
    pub n_relabeled: usize,

    /// Success rate used to set the mixing ratio.
    pub success_rate: f64,

    /// Fraction of failed episodes whose desired goal is reached by another
    /// episode. Undefined when no episode failed.
    pub joint_rate: Option<f64>,
}

impl SampleDiagnostics {
    /// Converts the statistics into a [`Record`].
    ///
    /// The joint rate is omitted when undefined.
    pub fn to_record(&self) -> Record {
        let mut record = Record::empty();
        record.insert("n_candidates", RecordValue::Scalar(self.n_candidates as f32));
        record.insert("n_synthetic", RecordValue::Scalar(self.n_synthetic as f32));
        record.insert("n_ordinary", RecordValue::Scalar(self.n_ordinary as f32));
        record.insert("n_relabeled", RecordValue::Scalar(self.n_relabeled as f32));
        record.insert("success_rate", RecordValue::Scalar(self.success_rate as f32));
        if let Some(joint_rate) = self.joint_rate {
            record.insert("joint_rate", RecordValue::Scalar(joint_rate as f32));
        }
        record
    }
}

/// Draws batches mixing intersection-derived and ordinary transitions.
///
/// The share of synthetic transitions is `future_p * (1 - success_rate)`:
/// the less often the agent succeeds, the more it learns from intersections.
pub struct TransitionSampler {
    config: TransitionSamplerConfig,
    rng: StdRng,
}

impl TransitionSampler {
    /// Builds a sampler.
    pub fn build(config: &TransitionSamplerConfig) -> Self {
        Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Configuration of the sampler.
    pub fn config(&self) -> &TransitionSamplerConfig {
        &self.config
    }

    /// Number of synthetic transitions in a batch of `batch_size` when
    /// candidates exist.
    pub fn n_synthetic(&self, batch_size: usize, success_rate: f64) -> usize {
        let p = self.config.future_p() * (1.0 - success_rate);
        ((p * batch_size as f64).floor().max(0.0) as usize).min(batch_size)
    }

    /// Intersections whose desired episode never succeeded.
    ///
    /// Reaching the goal of an episode that already succeeded adds nothing.
    pub fn candidates(snapshot: &StoreSnapshot) -> Vec<Intersection> {
        let successful: Vec<bool> = (0..snapshot.n_episodes())
            .map(|e| snapshot.episode_success(e))
            .collect();
        snapshot
            .intersections()
            .iter()
            .map(|(_, x)| *x)
            .filter(|x| !successful[x.desired.episode])
            .collect()
    }

    /// Draws `batch_size` transitions from `snapshot`.
    ///
    /// Synthetic transitions come first, followed by ordinary ones. Every
    /// reward is recomputed with `reward_fn`.
    pub fn sample<R: RewardFn>(
        &mut self,
        snapshot: &StoreSnapshot,
        batch_size: usize,
        reward_fn: &R,
    ) -> Result<TransitionBatch, ReplayBufferError> {
        let (n, t) = (snapshot.n_episodes(), snapshot.horizon());
        if n == 0 || t == 0 {
            return Err(ReplayBufferError::EmptyBuffer);
        }

        let successful: Vec<bool> = (0..n).map(|e| snapshot.episode_success(e)).collect();
        let candidates = Self::candidates(snapshot);
        let size1 = if candidates.is_empty() {
            0
        } else {
            self.n_synthetic(batch_size, snapshot.success_rate())
        };
        let size2 = batch_size - size1;

        let mut batch = TransitionBatch::with_capacity(snapshot.shape(), batch_size);
        for _ in 0..size1 {
            let x = candidates[self.rng.gen_range(0..candidates.len())];
            let horizon = x.achieved.step.min(x.desired.step) + 1;
            let offset = self.rng.gen_range(0..horizon);
            let achieved = Location::new(x.achieved.episode, x.achieved.step - offset);
            let desired = Location::new(x.desired.episode, x.desired.step - offset);
            batch.push(
                snapshot,
                achieved,
                snapshot.desired_goal(desired.episode, desired.step),
                snapshot.next_desired_goal(desired.episode, desired.step),
                TransitionSource::Intersection { achieved, desired },
            );
        }

        let future_p = self.config.future_p();
        let mut n_relabeled = 0;
        for _ in 0..size2 {
            let loc = Location::new(self.rng.gen_range(0..n), self.rng.gen_range(0..t));
            if self.config.relabel_future && self.rng.gen::<f64>() < future_p {
                let future_row = self.rng.gen_range(loc.step + 1..=t);
                let goal = snapshot.achieved_goal(loc.episode, future_row);
                batch.push(
                    snapshot,
                    loc,
                    goal,
                    goal,
                    TransitionSource::Relabeled {
                        location: loc,
                        future_row,
                    },
                );
                n_relabeled += 1;
            } else {
                batch.push(
                    snapshot,
                    loc,
                    snapshot.desired_goal(loc.episode, loc.step),
                    snapshot.next_desired_goal(loc.episode, loc.step),
                    TransitionSource::Ordinary(loc),
                );
            }
        }

        let rewards: Vec<f32> = (0..batch.len())
            .map(|i| {
                let info: InfoView<'_> = batch
                    .info
                    .iter()
                    .map(|(name, rows)| (name.as_str(), rows.row(i)))
                    .collect();
                reward_fn.reward(
                    batch.next_achieved_goal.row(i),
                    batch.next_desired_goal.row(i),
                    &info,
                )
            })
            .collect();
        batch.reward = rewards;

        batch.diagnostics = SampleDiagnostics {
            n_candidates: candidates.len(),
            n_synthetic: size1,
            n_ordinary: size2,
            n_relabeled,
            success_rate: snapshot.success_rate(),
            joint_rate: joint_rate(&candidates, &successful),
        };

        if let Err(e) = batch.check_len(batch_size) {
            error!("Sampled batch is inconsistent: {}", e);
            return Err(e);
        }
        debug!(
            "Sampled {} transitions ({} synthetic, {} candidates)",
            batch_size, size1, batch.diagnostics.n_candidates
        );
        Ok(batch)
    }
}

/// Distinct failed episodes reached by some candidate, over all failed
/// episodes. `None` when every episode succeeded.
fn joint_rate(candidates: &[Intersection], successful: &[bool]) -> Option<f64> {
    let n_failed = successful.iter().filter(|&&s| !s).count();
    if n_failed == 0 {
        return None;
    }
    let joint: HashSet<usize> = candidates.iter().map(|x| x.desired.episode).collect();
    Some(joint.len() as f64 / n_failed as f64)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ReplayStrategy;

    #[test]
    fn test_n_synthetic_follows_success_rate() {
        let sampler = TransitionSampler::build(&TransitionSamplerConfig::default().replay_k(4));
        assert_eq!(sampler.n_synthetic(100, 0.0), 80);
        assert_eq!(sampler.n_synthetic(100, 0.5), 40);
        assert_eq!(sampler.n_synthetic(100, 1.0), 0);
        assert_eq!(sampler.n_synthetic(7, 0.0), 5);
    }

    #[test]
    fn test_no_synthetic_without_future_strategy() {
        let sampler = TransitionSampler::build(
            &TransitionSamplerConfig::default().replay_strategy(ReplayStrategy::None),
        );
        assert_eq!(sampler.n_synthetic(256, 0.0), 0);
    }

    #[test]
    fn test_joint_rate() {
        let x = Intersection {
            achieved: Location::new(0, 1),
            desired: Location::new(1, 2),
        };
        assert_eq!(joint_rate(&[x, x], &[false, false, true, false]), Some(1.0 / 3.0));
        assert_eq!(joint_rate(&[], &[false, true]), Some(0.0));
        assert_eq!(joint_rate(&[x], &[true, true]), None);
    }

    #[test]
    fn test_diagnostics_record_skips_undefined_joint_rate() {
        let diagnostics = SampleDiagnostics {
            n_synthetic: 3,
            success_rate: 1.0,
            ..Default::default()
        };
        let record = diagnostics.to_record();
        assert_eq!(record.get_scalar("n_synthetic"), Some(3.0));
        assert!(record.get("joint_rate").is_none());
    }
}
