//! Spatial keys for goal positions.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places kept when goal positions are hashed.
///
/// Two positions that agree up to this precision share a key. Raising it
/// makes intersections rarer but more exact; lowering it merges nearby goals.
pub const GOAL_KEY_PRECISION: u32 = 2;

/// A quantized goal position used as a hash key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GoalKey(Vec<i64>);

impl GoalKey {
    /// Quantizes the first `dims` coordinates of `position` to `precision`
    /// decimal places.
    ///
    /// Rounding is half away from zero, and `-0.00` and `0.00` share a key.
    /// Returns `None` if a keyed coordinate is NaN or infinite, since such a
    /// position coincides with nothing.
    pub fn quantize(position: &[f32], precision: u32, dims: usize) -> Option<Self> {
        let scale = 10f64.powi(precision as i32);
        position
            .iter()
            .take(dims)
            .map(|&x| {
                let q = (x as f64 * scale).round();
                // Also rejects finite values outside the range of `i64`.
                if q.is_finite() && q.abs() < i64::MAX as f64 {
                    Some(q as i64)
                } else {
                    None
                }
            })
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// A key over exact integer coordinates.
    pub fn exact(coords: &[i64]) -> Self {
        Self(coords.to_vec())
    }

    /// Quantized coordinates.
    pub fn coords(&self) -> &[i64] {
        &self.0
    }
}

impl fmt::Display for GoalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coords: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "({})", coords.join(","))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(position: &[f32], precision: u32) -> GoalKey {
        GoalKey::quantize(position, precision, 3).unwrap()
    }

    #[test]
    fn test_nearby_positions_share_a_key() {
        let a = key(&[1.001, 2.0, 0.0], GOAL_KEY_PRECISION);
        let b = key(&[0.998, 2.004, -0.001], GOAL_KEY_PRECISION);
        assert_eq!(a, b);
        assert_eq!(a.coords(), &[100, 200, 0]);
    }

    #[test]
    fn test_non_finite_positions_have_no_key() {
        let nan = f32::NAN;
        assert_eq!(GoalKey::quantize(&[nan; 3], 2, 3), None);
        assert_eq!(GoalKey::quantize(&[0.0, nan, 0.0], 2, 3), None);
        assert_eq!(GoalKey::quantize(&[f32::INFINITY, 0.0, 0.0], 2, 3), None);
        assert_eq!(GoalKey::quantize(&[0.0, f32::NEG_INFINITY, 0.0], 2, 3), None);
        assert_eq!(GoalKey::quantize(&[f32::MAX, 0.0, 0.0], 2, 3), None);
        assert_eq!(key(&[0.0; 3], 2).coords(), &[0, 0, 0]);

        // Coordinates beyond the keyed ones are ignored.
        assert_eq!(
            GoalKey::quantize(&[0.0, 0.0, 0.0, nan], 2, 3),
            Some(key(&[0.0; 3], 2))
        );
    }

    #[test]
    fn test_precision_separates_positions() {
        let a = [1.01, 2.0, 0.0];
        let b = [1.02, 2.0, 0.0];
        assert_ne!(key(&a, 2), key(&b, 2));
        assert_eq!(key(&a, 1), key(&b, 1));
    }

    #[test]
    fn test_only_leading_dimensions_are_keyed() {
        let a = GoalKey::quantize(&[0.5, 0.5, 0.5, 9.0], 2, 3).unwrap();
        let b = GoalKey::quantize(&[0.5, 0.5, 0.5, -9.0], 2, 3).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "(50,50,50)");
    }
}
