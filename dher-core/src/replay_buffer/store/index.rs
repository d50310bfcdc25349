//! Spatial index of goal positions and their intersections.
use crate::GoalKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A step of a stored episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// Slot of the episode in the store.
    pub episode: usize,

    /// Step within the episode.
    pub step: usize,
}

impl Location {
    /// Creates a location.
    pub fn new(episode: usize, step: usize) -> Self {
        Self { episode, step }
    }
}

/// An achieved position of one episode that coincides with a desired
/// position of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intersection {
    /// Where the position was achieved.
    pub achieved: Location,

    /// Where the position was desired.
    pub desired: Location,
}

impl Intersection {
    /// `(achieved_episode, achieved_step, desired_episode, desired_step)`.
    pub fn as_tuple(&self) -> (usize, usize, usize, usize) {
        (
            self.achieved.episode,
            self.achieved.step,
            self.desired.episode,
            self.desired.step,
        )
    }
}

/// Maps quantized goal positions to the locations where they were last
/// achieved or desired, and tracks where the two coincide across episodes.
///
/// The index only holds locations; trajectory data stays in the store.
#[derive(Debug, Default, Clone)]
pub(crate) struct GoalIntersectionIndex {
    achieved: HashMap<GoalKey, Location>,
    desired: HashMap<GoalKey, Location>,
    intersections: HashMap<GoalKey, Intersection>,
}

impl GoalIntersectionIndex {
    /// Records that the position `key` was achieved at `loc`.
    pub fn insert_achieved(&mut self, key: GoalKey, loc: Location) {
        self.achieved.insert(key, loc);
    }

    /// Records that the position `key` was desired at `loc`.
    pub fn insert_desired(&mut self, key: GoalKey, loc: Location) {
        self.desired.insert(key, loc);
    }

    /// Records an intersection if a different episode desired the position
    /// `key` achieved at `loc`.
    pub fn link_achieved(&mut self, key: &GoalKey, loc: Location) {
        if let Some(&desired) = self.desired.get(key) {
            if desired.episode != loc.episode {
                self.intersections.insert(
                    key.clone(),
                    Intersection {
                        achieved: loc,
                        desired,
                    },
                );
            }
        }
    }

    /// Records an intersection if a different episode achieved the position
    /// `key` desired at `loc`.
    pub fn link_desired(&mut self, key: &GoalKey, loc: Location) {
        if let Some(&achieved) = self.achieved.get(key) {
            if achieved.episode != loc.episode {
                self.intersections.insert(
                    key.clone(),
                    Intersection {
                        achieved,
                        desired: loc,
                    },
                );
            }
        }
    }

    /// Forgets that `key` was achieved at `loc`.
    ///
    /// Entries are removed only if both key and exact location match. The
    /// intersection is checked on its own: it is dropped when its achieved
    /// side is `loc`, whether or not the achieved map still points there.
    pub fn remove_achieved(&mut self, key: &GoalKey, loc: Location) {
        if self.achieved.get(key) == Some(&loc) {
            self.achieved.remove(key);
        }
        if self
            .intersections
            .get(key)
            .map_or(false, |x| x.achieved == loc)
        {
            self.intersections.remove(key);
        }
    }

    /// Forgets that `key` was desired at `loc`. See [`Self::remove_achieved`].
    pub fn remove_desired(&mut self, key: &GoalKey, loc: Location) {
        if self.desired.get(key) == Some(&loc) {
            self.desired.remove(key);
        }
        if self
            .intersections
            .get(key)
            .map_or(false, |x| x.desired == loc)
        {
            self.intersections.remove(key);
        }
    }

    pub fn clear(&mut self) {
        self.achieved.clear();
        self.desired.clear();
        self.intersections.clear();
    }

    pub fn achieved(&self, key: &GoalKey) -> Option<Location> {
        self.achieved.get(key).copied()
    }

    pub fn desired(&self, key: &GoalKey) -> Option<Location> {
        self.desired.get(key).copied()
    }

    pub fn intersection(&self, key: &GoalKey) -> Option<Intersection> {
        self.intersections.get(key).copied()
    }

    pub fn intersections(&self) -> impl Iterator<Item = (&GoalKey, &Intersection)> + '_ {
        self.intersections.iter()
    }

    pub fn achieved_locations(&self) -> impl Iterator<Item = &Location> + '_ {
        self.achieved.values()
    }

    pub fn desired_locations(&self) -> impl Iterator<Item = &Location> + '_ {
        self.desired.values()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(x: i64) -> GoalKey {
        GoalKey::exact(&[x, 0, 0])
    }

    /// Records both positions of a step, then links them.
    fn store_step(index: &mut GoalIntersectionIndex, ak: i64, dk: i64, loc: Location) {
        index.insert_achieved(key(ak), loc);
        index.insert_desired(key(dk), loc);
        index.link_achieved(&key(ak), loc);
        index.link_desired(&key(dk), loc);
    }

    fn remove_step(index: &mut GoalIntersectionIndex, ak: i64, dk: i64, loc: Location) {
        index.remove_achieved(&key(ak), loc);
        index.remove_desired(&key(dk), loc);
    }

    #[test]
    fn test_link_in_both_directions() {
        let mut index = GoalIntersectionIndex::default();
        store_step(&mut index, 1, 2, Location::new(0, 0));
        assert_eq!(index.intersections().count(), 0);

        // Episode 1 desires what episode 0 achieved and achieves what it desired.
        store_step(&mut index, 2, 1, Location::new(1, 3));
        assert_eq!(index.intersection(&key(1)).unwrap().as_tuple(), (0, 0, 1, 3));
        assert_eq!(index.intersection(&key(2)).unwrap().as_tuple(), (1, 3, 0, 0));
    }

    #[test]
    fn test_self_intersection_is_ignored() {
        let mut index = GoalIntersectionIndex::default();
        store_step(&mut index, 1, 5, Location::new(0, 0));
        store_step(&mut index, 6, 1, Location::new(0, 1));
        assert!(index.intersection(&key(1)).is_none());
    }

    #[test]
    fn test_one_sided_step_links_only_its_side() {
        let mut index = GoalIntersectionIndex::default();
        store_step(&mut index, 3, 4, Location::new(0, 0));

        // Only the desired position of this step has a key.
        let loc = Location::new(1, 2);
        index.insert_desired(key(3), loc);
        index.link_desired(&key(3), loc);
        assert_eq!(index.intersection(&key(3)).unwrap().as_tuple(), (0, 0, 1, 2));
        assert_eq!(index.achieved(&key(3)), Some(Location::new(0, 0)));

        index.remove_desired(&key(3), loc);
        assert!(index.intersection(&key(3)).is_none());
        assert_eq!(index.desired(&key(4)), Some(Location::new(0, 0)));
    }

    #[test]
    fn test_remove_requires_exact_location() {
        let mut index = GoalIntersectionIndex::default();
        index.insert_achieved(key(1), Location::new(0, 0));
        index.insert_desired(key(2), Location::new(0, 0));
        remove_step(&mut index, 1, 2, Location::new(0, 1));
        assert_eq!(index.achieved(&key(1)), Some(Location::new(0, 0)));
        assert_eq!(index.desired(&key(2)), Some(Location::new(0, 0)));

        remove_step(&mut index, 1, 2, Location::new(0, 0));
        assert_eq!(index.achieved(&key(1)), None);
        assert_eq!(index.desired(&key(2)), None);
    }

    #[test]
    fn test_stale_intersection_removed_after_achieved_map_moved_on() {
        let mut index = GoalIntersectionIndex::default();
        // Episode 1 desires key 1; episode 0 achieves it.
        index.insert_achieved(key(9), Location::new(1, 2));
        index.insert_desired(key(1), Location::new(1, 2));
        store_step(&mut index, 1, 8, Location::new(0, 1));
        assert_eq!(index.intersection(&key(1)).unwrap().as_tuple(), (0, 1, 1, 2));

        // Episode 1 later achieves key 1 itself: the achieved map now points
        // at episode 1, but the intersection still refers to episode 0.
        store_step(&mut index, 1, 7, Location::new(1, 0));
        assert_eq!(index.achieved(&key(1)), Some(Location::new(1, 0)));
        assert_eq!(index.intersection(&key(1)).unwrap().as_tuple(), (0, 1, 1, 2));

        // Evicting episode 0 must still drop the intersection.
        remove_step(&mut index, 1, 8, Location::new(0, 1));
        assert!(index.intersection(&key(1)).is_none());
        assert_eq!(index.achieved(&key(1)), Some(Location::new(1, 0)));
    }

    #[test]
    fn test_desired_side_removal_checks_desired_location_only() {
        let mut index = GoalIntersectionIndex::default();
        index.insert_achieved(key(1), Location::new(0, 1));
        index.insert_desired(key(4), Location::new(0, 1));
        store_step(&mut index, 5, 1, Location::new(1, 2));
        assert_eq!(index.intersection(&key(1)).unwrap().as_tuple(), (0, 1, 1, 2));

        // A desired-side removal at the achieved location leaves it alone.
        index.remove_desired(&key(1), Location::new(0, 1));
        assert!(index.intersection(&key(1)).is_some());

        remove_step(&mut index, 5, 1, Location::new(1, 2));
        assert!(index.intersection(&key(1)).is_none());
        assert_eq!(index.achieved(&key(1)), Some(Location::new(0, 1)));
    }
}
