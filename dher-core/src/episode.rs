//! Episodes and their shapes.
use crate::ReplayBufferError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix that marks auxiliary info fields in rollout dictionaries.
pub const INFO_PREFIX: &str = "info_";

/// Name of the info field holding per-step success flags.
pub const SUCCESS_KEY: &str = "is_success";

/// Row-major storage of fixed-dimensional `f32` vectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rows {
    dim: usize,
    data: Vec<f32>,
}

impl Rows {
    /// Creates an empty set of rows with dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self { dim, data: vec![] }
    }

    /// Creates an empty set of rows, reserving space for `n_rows`.
    pub fn with_capacity(dim: usize, n_rows: usize) -> Self {
        Self {
            dim,
            data: Vec::with_capacity(dim * n_rows),
        }
    }

    /// Creates `n_rows` zero rows.
    pub fn zeros(n_rows: usize, dim: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; n_rows * dim],
        }
    }

    /// Wraps a flat row-major vector.
    ///
    /// # Panics
    ///
    /// Panics if `dim` is zero or `data.len()` is not a multiple of `dim`.
    pub fn from_flat(dim: usize, data: Vec<f32>) -> Self {
        assert!(
            dim > 0 && data.len() % dim == 0,
            "{} values cannot be split into rows of dimension {}",
            data.len(),
            dim
        );
        Self { dim, data }
    }

    /// Builds rows from an iterator of slices.
    ///
    /// # Panics
    ///
    /// Panics if a row does not have `dim` elements.
    pub fn from_rows<I, R>(dim: usize, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[f32]>,
    {
        let mut out = Self::new(dim);
        for row in rows {
            out.push(row.as_ref());
        }
        out
    }

    /// Dimension of a row.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    /// Returns `true` if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the `i`-th row.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Returns the `i`-th row mutably.
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Appends a row.
    ///
    /// # Panics
    ///
    /// Panics if `row.len() != self.dim()`.
    pub fn push(&mut self, row: &[f32]) {
        assert_eq!(
            row.len(),
            self.dim,
            "row dimension mismatch: expected {}, got {}",
            self.dim,
            row.len()
        );
        self.data.extend_from_slice(row);
    }

    /// Appends all rows of `other`.
    pub fn extend(&mut self, other: &Rows) {
        assert_eq!(other.dim, self.dim, "row dimension mismatch");
        self.data.extend_from_slice(&other.data);
    }

    /// Iterates over rows.
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.len()).map(move |i| self.row(i))
    }

    /// Flat row-major view.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}

/// Dimensions of every field of an episode.
///
/// `horizon` is the number of actions `T`. Observations, achieved goals and
/// desired goals have `T + 1` rows; actions, rewards and info fields have `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeShape {
    /// Number of actions per episode.
    pub horizon: usize,

    /// Dimension of observations.
    pub obs_dim: usize,

    /// Dimension of achieved and desired goals.
    pub goal_dim: usize,

    /// Dimension of actions.
    pub action_dim: usize,

    /// Dimensions of info fields, keyed without the `info_` prefix.
    pub info_dims: BTreeMap<String, usize>,
}

impl Default for EpisodeShape {
    fn default() -> Self {
        Self::new(50, 10, 3, 4)
    }
}

impl EpisodeShape {
    /// Creates a shape with the mandatory `is_success` info field.
    pub fn new(horizon: usize, obs_dim: usize, goal_dim: usize, action_dim: usize) -> Self {
        let mut info_dims = BTreeMap::new();
        info_dims.insert(SUCCESS_KEY.to_string(), 1);
        Self {
            horizon,
            obs_dim,
            goal_dim,
            action_dim,
            info_dims,
        }
    }

    /// Sets the horizon.
    pub fn horizon(mut self, v: usize) -> Self {
        self.horizon = v;
        self
    }

    /// Adds an info field.
    pub fn info(mut self, name: impl Into<String>, dim: usize) -> Self {
        self.info_dims.insert(name.into(), dim);
        self
    }

    /// Number of state rows (`horizon + 1`).
    pub fn state_rows(&self) -> usize {
        self.horizon + 1
    }

    /// Checks that the horizon and every field dimension are positive.
    ///
    /// Rows of a zero-dimensional field cannot be counted, so no episode
    /// could ever be validated against such a shape.
    pub fn validate(&self) -> Result<(), ReplayBufferError> {
        if self.horizon == 0 {
            return Err(ReplayBufferError::InvalidShape {
                reason: "horizon must be positive".to_string(),
            });
        }
        let dims = [
            ("o", self.obs_dim),
            ("g", self.goal_dim),
            ("u", self.action_dim),
        ];
        let info = self.info_dims.iter().map(|(name, &dim)| (name.as_str(), dim));
        match dims.into_iter().chain(info).find(|&(_, dim)| dim == 0) {
            Some((name, _)) => Err(ReplayBufferError::InvalidShape {
                reason: format!("field `{}` has dimension 0", name),
            }),
            None => Ok(()),
        }
    }
}

/// One fixed-length trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    /// Observations, `T + 1` rows.
    pub obs: Rows,

    /// Achieved goals, `T + 1` rows.
    pub achieved_goal: Rows,

    /// Desired goals, `T + 1` rows.
    pub desired_goal: Rows,

    /// Actions, `T` rows.
    pub action: Rows,

    /// Rewards as recorded by the environment, `T` rows of dimension 1.
    pub reward: Rows,

    /// Info fields, `T` rows each, keyed without the `info_` prefix.
    pub info: BTreeMap<String, Rows>,
}

impl Episode {
    /// Number of actions in the episode.
    pub fn horizon(&self) -> usize {
        self.action.len()
    }

    /// An episode succeeded if any of its steps did.
    pub fn is_success(&self) -> bool {
        self.info
            .get(SUCCESS_KEY)
            .map(|flags| flags.as_flat().iter().any(|&f| f != 0.0))
            .unwrap_or(false)
    }

    /// Observation after the action at step `t`.
    pub fn next_obs(&self, t: usize) -> &[f32] {
        self.obs.row(t + 1)
    }

    /// Achieved goal after the action at step `t`.
    pub fn next_achieved_goal(&self, t: usize) -> &[f32] {
        self.achieved_goal.row(t + 1)
    }

    /// Desired goal after the action at step `t`.
    pub fn next_desired_goal(&self, t: usize) -> &[f32] {
        self.desired_goal.row(t + 1)
    }

    /// Builds an episode from a rollout dictionary.
    ///
    /// Recognized keys are `o`, `ag`, `g`, `u`, `r` and any key starting
    /// with `info_`, whose prefix is stripped. A missing `r` is filled with
    /// zeros since rewards are recomputed at sampling time.
    pub fn from_named_fields(
        mut fields: BTreeMap<String, Rows>,
    ) -> Result<Self, ReplayBufferError> {
        let mut take = |key: &str| {
            fields.remove(key).ok_or_else(|| ReplayBufferError::InvalidEpisode {
                index: 0,
                reason: format!("missing field `{}`", key),
            })
        };
        let obs = take("o")?;
        let achieved_goal = take("ag")?;
        let desired_goal = take("g")?;
        let action = take("u")?;
        let reward = fields
            .remove("r")
            .unwrap_or_else(|| Rows::zeros(action.len(), 1));

        let mut info = BTreeMap::new();
        for (key, rows) in fields {
            match key.strip_prefix(INFO_PREFIX) {
                Some(name) => {
                    info.insert(name.to_string(), rows);
                }
                None => log::warn!("Ignoring unknown episode field `{}`", key),
            }
        }

        Ok(Self {
            obs,
            achieved_goal,
            desired_goal,
            action,
            reward,
            info,
        })
    }

    /// Checks that the episode conforms to `shape`.
    ///
    /// `index` is the position of the episode in its batch and is only used
    /// in the error.
    pub fn validate(&self, shape: &EpisodeShape, index: usize) -> Result<(), ReplayBufferError> {
        let invalid = |reason: String| ReplayBufferError::InvalidEpisode { index, reason };
        let check = |name: &str, rows: &Rows, n_rows: usize, dim: usize| {
            if rows.dim() != dim {
                Err(invalid(format!(
                    "field `{}` has dimension {}, expected {}",
                    name,
                    rows.dim(),
                    dim
                )))
            } else if rows.len() != n_rows {
                Err(invalid(format!(
                    "field `{}` has {} rows, expected {}",
                    name,
                    rows.len(),
                    n_rows
                )))
            } else {
                Ok(())
            }
        };

        let t = shape.horizon;
        check("o", &self.obs, t + 1, shape.obs_dim)?;
        check("ag", &self.achieved_goal, t + 1, shape.goal_dim)?;
        check("g", &self.desired_goal, t + 1, shape.goal_dim)?;
        check("u", &self.action, t, shape.action_dim)?;
        check("r", &self.reward, t, 1)?;

        for (name, &dim) in shape.info_dims.iter() {
            match self.info.get(name) {
                Some(rows) => check(name, rows, t, dim)?,
                None => return Err(invalid(format!("missing info field `{}`", name))),
            }
        }
        if let Some(name) = self.info.keys().find(|k| !shape.info_dims.contains_key(*k)) {
            return Err(invalid(format!("unexpected info field `{}`", name)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn shape() -> EpisodeShape {
        EpisodeShape::new(2, 1, 2, 1)
    }

    fn fields(success: f32) -> BTreeMap<String, Rows> {
        let mut fields = BTreeMap::new();
        fields.insert("o".to_string(), Rows::from_flat(1, vec![0.0, 1.0, 2.0]));
        fields.insert(
            "ag".to_string(),
            Rows::from_flat(2, vec![0.0, 0.0, 1.0, 0.0, 2.0, 0.0]),
        );
        fields.insert("g".to_string(), Rows::zeros(3, 2));
        fields.insert("u".to_string(), Rows::from_flat(1, vec![0.5, -0.5]));
        fields.insert(
            "info_is_success".to_string(),
            Rows::from_flat(1, vec![0.0, success]),
        );
        fields
    }

    #[test]
    fn test_rows_indexing() {
        let mut rows = Rows::from_rows(2, [[1.0f32, 2.0], [3.0, 4.0]]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.row(1), &[3.0, 4.0]);
        rows.push(&[5.0, 6.0]);
        assert_eq!(rows.iter().last(), Some(&[5.0, 6.0][..]));
        assert!(Rows::new(3).is_empty());
    }

    #[test]
    #[should_panic]
    fn test_rows_rejects_wrong_dimension() {
        let mut rows = Rows::new(2);
        rows.push(&[1.0]);
    }

    #[test]
    fn test_from_named_fields_strips_info_prefix() {
        let episode = Episode::from_named_fields(fields(1.0)).unwrap();
        assert!(episode.info.contains_key(SUCCESS_KEY));
        assert_eq!(episode.reward.len(), 2);
        assert_eq!(episode.next_achieved_goal(1), &[2.0, 0.0]);
        assert!(episode.is_success());
        episode.validate(&shape(), 0).unwrap();
    }

    #[test]
    fn test_from_named_fields_requires_actions() {
        let mut fields = fields(0.0);
        fields.remove("u");
        let err = Episode::from_named_fields(fields).unwrap_err();
        assert!(matches!(err, ReplayBufferError::InvalidEpisode { .. }));
    }

    #[test]
    fn test_validate_reports_row_count() {
        let mut episode = Episode::from_named_fields(fields(0.0)).unwrap();
        assert!(!episode.is_success());
        episode.obs = Rows::from_flat(1, vec![0.0, 1.0]);
        let err = episode.validate(&shape(), 3).unwrap_err();
        assert_eq!(
            err,
            ReplayBufferError::InvalidEpisode {
                index: 3,
                reason: "field `o` has 2 rows, expected 3".to_string()
            }
        );
    }

    #[test]
    fn test_zero_dimensions_are_rejected() {
        assert!(shape().validate().is_ok());
        assert_eq!(
            shape().info("x", 0).validate(),
            Err(ReplayBufferError::InvalidShape {
                reason: "field `x` has dimension 0".to_string()
            })
        );
        assert!(EpisodeShape::new(2, 0, 2, 1).validate().is_err());
        assert!(shape().horizon(0).validate().is_err());
    }

    #[test]
    fn test_validate_reports_missing_info() {
        let mut episode = Episode::from_named_fields(fields(0.0)).unwrap();
        episode.info.clear();
        assert!(episode.validate(&shape(), 0).is_err());
    }
}
