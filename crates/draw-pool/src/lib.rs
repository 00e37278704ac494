//! Fair random selection over a fixed collection, without repeats until the
//! collection is exhausted.
//!
//! A [`DrawPool`] partitions its backing vector into an "undrawn" prefix and a
//! "drawn" suffix. Each draw picks uniformly from the prefix, swaps the pick to
//! the end of the prefix, and shrinks the prefix by one. When the prefix becomes
//! empty it is reset to the whole vector, starting a new cycle.
//!
//! This is a selection sampler, not a shuffle-then-iterate: it never runs dry
//! and can be queried indefinitely.
//!
//! # Examples
//!
//! ```
//! use draw_pool::DrawPool;
//! use rand::SeedableRng;
//! use rand::rngs::SmallRng;
//!
//! let mut rng = SmallRng::seed_from_u64(7);
//! let mut pool = DrawPool::new(vec!["a", "b", "c"]).unwrap();
//!
//! let mut seen: Vec<&str> = (0..3).map(|_| *pool.draw(&mut rng)).collect();
//! seen.sort();
//! assert_eq!(seen, vec!["a", "b", "c"]);
//! ```

use rand::Rng;
use thiserror::Error;

/// Returned when a pool would be constructed over zero items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot draw from an empty pool")]
pub struct EmptyPool;

/// A non-repeating random chooser over a fixed, non-empty collection.
#[derive(Debug, Clone)]
pub struct DrawPool<T> {
    items: Vec<T>,
    /// Length of the undrawn prefix. Always in `1..=items.len()`.
    remaining: usize,
}

impl<T> DrawPool<T> {
    /// Create a pool over `items`. Fails if `items` is empty.
    pub fn new(items: Vec<T>) -> Result<Self, EmptyPool> {
        if items.is_empty() {
            return Err(EmptyPool);
        }
        let remaining = items.len();
        Ok(DrawPool { items, remaining })
    }

    /// Draw the next item.
    ///
    /// Within any window of `len()` consecutive draws that starts at a cycle
    /// boundary, every item is returned exactly once.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &T {
        let last = self.remaining - 1;
        let pick = rng.random_range(0..self.remaining);
        self.items.swap(pick, last);

        self.remaining = if last == 0 { self.items.len() } else { last };
        &self.items[last]
    }

    /// Number of items in the pool.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of draws left before the current cycle resets.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Iterate over the items in their current (partially permuted) order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}
