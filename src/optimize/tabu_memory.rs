//! Bounded short-term memory of visited mask pairs.
//!
//! A FIFO queue of snapshots holds the visit order; a hash-count map keyed
//! by a quantized signature of each pair rules out most candidates in O(1);
//! a signature hit is confirmed against the stored snapshots.
//! Cells are quantized to [`QUANTUM`] before hashing so that masks equal up
//! to rounding noise share a signature. The same state may be recorded on
//! consecutive iterations, so the map counts occurrences and a signature
//! stays tabu until its last copy is evicted.

use rustc_hash::{FxHashMap, FxHasher};
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use crate::mask::Mask;

/// Resolution used when hashing mask cells.
pub const QUANTUM: f64 = 1e-9;

/// A (blur mask, sharp mask) search state.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskPair {
    pub blur: Mask,
    pub sharp: Mask,
}

impl MaskPair {
    pub fn new(blur: Mask, sharp: Mask) -> Self {
        Self { blur, sharp }
    }

    /// Quantized structural signature of the pair.
    pub fn signature(&self) -> u64 {
        pair_signature(&self.blur, &self.sharp)
    }
}

/// Signature of a pair without assembling a [`MaskPair`].
pub fn pair_signature(blur: &Mask, sharp: &Mask) -> u64 {
    let mut hasher = FxHasher::default();
    hash_mask(blur, &mut hasher);
    hash_mask(sharp, &mut hasher);
    hasher.finish()
}

#[inline]
fn hash_mask(mask: &Mask, hasher: &mut FxHasher) {
    mask.size().hash(hasher);
    for &v in mask.cells().iter() {
        quantize(v).hash(hasher);
    }
}

// +0.0 and -0.0 round to the same bucket
#[inline]
fn quantize(v: f64) -> i64 {
    (v / QUANTUM).round() as i64
}

fn same_quantized(a: &Mask, b: &Mask) -> bool {
    a.size() == b.size()
        && a
            .cells()
            .iter()
            .zip(b.cells().iter())
            .all(|(&x, &y)| quantize(x) == quantize(y))
}

#[derive(Debug, Clone)]
struct Entry {
    signature: u64,
    state: MaskPair,
}

/// FIFO tabu memory with a fixed capacity.
#[derive(Debug, Clone)]
pub struct TabuMemory {
    capacity: usize,
    queue: VecDeque<Entry>,
    counts: FxHashMap<u64, usize>,
}

impl TabuMemory {
    /// Creates an empty memory holding at most `capacity` states.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "called `TabuMemory::new()` with zero capacity");
        Self {
            capacity,
            queue: VecDeque::with_capacity(capacity + 1),
            counts: FxHashMap::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether the pair (blur, sharp) is currently tabu.
    pub fn contains_pair(&self, blur: &Mask, sharp: &Mask) -> bool {
        let signature = pair_signature(blur, sharp);
        if !self.counts.contains_key(&signature) {
            return false;
        }
        self.queue.iter().any(|e| {
            e.signature == signature
                && same_quantized(&e.state.blur, blur)
                && same_quantized(&e.state.sharp, sharp)
        })
    }

    pub fn contains(&self, state: &MaskPair) -> bool {
        self.contains_pair(&state.blur, &state.sharp)
    }

    /// Append a visited state, evicting the oldest one if over capacity.
    pub fn record(&mut self, state: MaskPair) {
        let signature = state.signature();
        *self.counts.entry(signature).or_insert(0) += 1;
        self.queue.push_back(Entry { signature, state });

        while self.queue.len() > self.capacity {
            if let Some(oldest) = self.queue.pop_front() {
                self.forget(oldest.signature);
            }
        }
    }

    fn forget(&mut self, signature: u64) {
        if let Some(count) = self.counts.get_mut(&signature) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&signature);
            }
        }
    }

    /// Remembered states, oldest first.
    pub fn states(&self) -> impl Iterator<Item = &MaskPair> {
        self.queue.iter().map(|e| &e.state)
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn pair(v: f64) -> MaskPair {
        let mut cells = Array2::<f64>::zeros((3, 3));
        cells[[1, 1]] = v;
        let blur = Mask::uniform(3);
        let sharp = Mask::new(cells).unwrap();
        MaskPair::new(blur, sharp)
    }

    #[test]
    fn test_initialization() {
        let memory = TabuMemory::new(4);
        assert_eq!(memory.capacity(), 4);
        assert!(memory.is_empty());
    }

    #[test]
    #[should_panic(expected = "called `TabuMemory::new()` with zero capacity")]
    fn test_zero_capacity_panics() {
        let _memory = TabuMemory::new(0);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut memory = TabuMemory::new(2);
        memory.record(pair(1.0));
        memory.record(pair(2.0));
        memory.record(pair(3.0));

        assert_eq!(memory.len(), 2);
        assert!(!memory.contains(&pair(1.0)));
        assert!(memory.contains(&pair(2.0)));
        assert!(memory.contains(&pair(3.0)));
        let order: Vec<_> = memory.states().cloned().collect();
        assert_eq!(order, vec![pair(2.0), pair(3.0)]);
    }

    #[test]
    fn test_duplicates_stay_tabu_until_last_copy_leaves() {
        let mut memory = TabuMemory::new(2);
        memory.record(pair(1.0));
        memory.record(pair(1.0));
        memory.record(pair(2.0));
        // One copy of 1.0 evicted, the other still remembered
        assert!(memory.contains(&pair(1.0)));
        memory.record(pair(2.0));
        assert!(!memory.contains(&pair(1.0)));
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_signature_ignores_rounding_noise() {
        let a = pair(0.3);
        let b = pair(0.1 + 0.2);
        assert_ne!(a, b);
        assert_eq!(a.signature(), b.signature());
        assert_ne!(pair(0.3).signature(), pair(0.31).signature());
    }

    #[test]
    fn test_signature_collision_is_not_tabu() {
        let mut memory = TabuMemory::new(3);
        // Store pair(1.0) under the signature of pair(2.0)
        let forged = pair(2.0).signature();
        memory.queue.push_back(Entry {
            signature: forged,
            state: pair(1.0),
        });
        *memory.counts.entry(forged).or_insert(0) += 1;

        assert!(!memory.contains(&pair(2.0)));
        memory.record(pair(2.0));
        assert!(memory.contains(&pair(2.0)));

        // Confirmation compares quantized cells, like the signature
        memory.record(pair(0.3));
        assert!(memory.contains(&pair(0.1 + 0.2)));
    }

    #[test]
    fn test_clear() {
        let mut memory = TabuMemory::new(3);
        memory.record(pair(1.0));
        memory.clear();
        assert!(memory.is_empty());
        assert!(!memory.contains(&pair(1.0)));
    }
}
