//! Shuffle presentation order
//!
//! Shuffle never reorders the stored queue. It keeps a permutation of queue
//! indices plus a cursor; entries before the cursor have been played, entries
//! after it are the unplayed remainder. Walking a uniformly random
//! permutation is the same as picking uniformly among unplayed indices.

use rand::seq::SliceRandom;
use rand::Rng;

/// Random permutation of queue indices with a play cursor
#[derive(Debug, Clone, Default)]
pub struct ShuffleOrder {
    /// Permutation of `0..len`
    order: Vec<usize>,

    /// Position of the current index within `order`
    cursor: usize,
}

impl ShuffleOrder {
    /// Roll a fresh permutation of `0..len` with `current` placed first
    pub fn roll<R: Rng + ?Sized>(len: usize, current: Option<usize>, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(rng);

        if let Some(current) = current {
            if let Some(pos) = order.iter().position(|&i| i == current) {
                order.swap(0, pos);
            }
        }

        Self { order, cursor: 0 }
    }

    /// Number of indices in the permutation
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the permutation is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The presentation order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Whether an unplayed index remains after the cursor
    pub fn has_next(&self) -> bool {
        self.cursor + 1 < self.order.len()
    }

    /// Whether a played index precedes the cursor
    pub fn has_previous(&self) -> bool {
        self.cursor > 0 && !self.order.is_empty()
    }

    /// Advance to the next unplayed index
    pub fn next(&mut self) -> Option<usize> {
        if !self.has_next() {
            return None;
        }
        self.cursor += 1;
        Some(self.order[self.cursor])
    }

    /// Step back to the previously played index
    pub fn previous(&mut self) -> Option<usize> {
        if !self.has_previous() {
            return None;
        }
        self.cursor -= 1;
        Some(self.order[self.cursor])
    }

    /// Jump to the last entry of the order (wrap-around for `previous`)
    pub fn last(&mut self) -> Option<usize> {
        let last = self.order.len().checked_sub(1)?;
        self.cursor = last;
        Some(self.order[last])
    }

    /// Make `index` the current entry
    ///
    /// The index is moved directly after the played prefix so that
    /// everything still unplayed stays unplayed.
    pub fn focus(&mut self, index: usize) {
        let Some(pos) = self.order.iter().position(|&i| i == index) else {
            return;
        };
        if pos == self.cursor {
            return;
        }

        self.order.remove(pos);
        let target = if pos < self.cursor {
            self.cursor - 1
        } else {
            self.cursor
        };
        let target = (target + 1).min(self.order.len());
        let target = if self.order.is_empty() { 0 } else { target };
        self.order.insert(target, index);
        self.cursor = target;
    }

    /// Register a newly appended queue index at a random unplayed position
    pub fn insert<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) {
        if self.order.is_empty() {
            self.order.push(index);
            self.cursor = 0;
            return;
        }
        let pos = rng.gen_range(self.cursor + 1..=self.order.len());
        self.order.insert(pos, index);
    }

    /// Drop a removed queue index and renumber the ones after it
    ///
    /// If the removed index was current, the cursor is left on the vacated
    /// slot; the caller must follow up with `place_at_cursor`.
    pub fn remove(&mut self, index: usize) {
        if let Some(pos) = self.order.iter().position(|&i| i == index) {
            self.order.remove(pos);
            if pos < self.cursor {
                self.cursor -= 1;
            }
        }
        for entry in &mut self.order {
            if *entry > index {
                *entry -= 1;
            }
        }
        if self.order.is_empty() {
            self.cursor = 0;
        }
    }

    /// Put `index` in the current slot without touching the played prefix
    pub fn place_at_cursor(&mut self, index: usize) {
        let Some(pos) = self.order.iter().position(|&i| i == index) else {
            return;
        };
        self.order.remove(pos);
        if pos < self.cursor {
            self.cursor -= 1;
        }
        let cursor = self.cursor.min(self.order.len());
        self.order.insert(cursor, index);
        self.cursor = cursor;
    }

    /// Renumber entries after a queue item moved from `from` to `to`
    pub fn relocate(&mut self, from: usize, to: usize) {
        for entry in &mut self.order {
            *entry = relocated(*entry, from, to);
        }
    }

    /// Forget every index
    pub fn clear(&mut self) {
        self.order.clear();
        self.cursor = 0;
    }
}

/// Where index `i` ends up after the element at `from` is moved to `to`
pub(crate) fn relocated(i: usize, from: usize, to: usize) -> usize {
    if i == from {
        to
    } else if from < to && i > from && i <= to {
        i - 1
    } else if to < from && i >= to && i < from {
        i + 1
    } else {
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn roll_is_permutation_with_current_first() {
        let order = ShuffleOrder::roll(10, Some(4), &mut rng());
        assert_eq!(order.order()[0], 4);

        let unique: HashSet<_> = order.order().iter().copied().collect();
        assert_eq!(unique.len(), 10);
        assert!(unique.iter().all(|&i| i < 10));
    }

    #[test]
    fn walking_visits_every_index_once() {
        let mut order = ShuffleOrder::roll(6, Some(0), &mut rng());
        let mut seen = vec![0];
        while let Some(i) = order.next() {
            seen.push(i);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
        assert!(!order.has_next());
    }

    #[test]
    fn previous_walks_back_over_played_entries() {
        let mut order = ShuffleOrder::roll(4, Some(2), &mut rng());
        let second = order.next().unwrap();
        let _third = order.next().unwrap();
        assert_eq!(order.previous(), Some(second));
        assert_eq!(order.previous(), Some(2));
        assert_eq!(order.previous(), None);
    }

    #[test]
    fn focus_keeps_unplayed_entries_unplayed() {
        let mut order = ShuffleOrder::roll(5, Some(0), &mut rng());
        let target = order.order()[3];
        order.focus(target);

        let mut remaining = Vec::new();
        while let Some(i) = order.next() {
            remaining.push(i);
        }
        assert_eq!(remaining.len(), 3);
        assert!(!remaining.contains(&target));
        assert!(!remaining.contains(&0));
    }

    #[test]
    fn inserted_index_lands_after_cursor() {
        let mut order = ShuffleOrder::roll(3, Some(1), &mut rng());
        order.next();
        order.insert(3, &mut rng());

        let mut remaining = Vec::new();
        while let Some(i) = order.next() {
            remaining.push(i);
        }
        assert!(remaining.contains(&3));
    }

    #[test]
    fn remove_renumbers_following_indices() {
        let mut order = ShuffleOrder::roll(4, Some(0), &mut rng());
        order.remove(1);

        let mut all: Vec<_> = order.order().to_vec();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2]);
    }

    #[test]
    fn replacing_removed_current_keeps_played_prefix() {
        let mut order = ShuffleOrder::roll(5, Some(0), &mut rng());
        let played = order.next().unwrap();
        order.remove(played);

        let replacement = if played == 4 { 3 } else { played };
        order.place_at_cursor(replacement);
        assert_eq!(order.order()[order.cursor], replacement);
        assert_eq!(order.order()[0], 0);
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn relocated_matches_vec_move() {
        let mut items: Vec<usize> = (0..5).collect();
        let moved = items.remove(1);
        items.insert(3, moved);
        for (pos, original) in items.iter().enumerate() {
            assert_eq!(relocated(*original, 1, 3), pos);
        }

        let mut items: Vec<usize> = (0..5).collect();
        let moved = items.remove(4);
        items.insert(0, moved);
        for (pos, original) in items.iter().enumerate() {
            assert_eq!(relocated(*original, 4, 0), pos);
        }
    }
}
