//! Top-K tracking over scored library entries.

use crate::scorer::ScoreBreakdown;
use std::cmp::Ordering;

/// Library entry scored against the current query.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Candidate {
    /// Position of the entry in library order.
    pub index: usize,
    pub breakdown: ScoreBreakdown,
}

impl Candidate {
    pub fn score(&self) -> f32 {
        self.breakdown.final_score()
    }
}

/// Descending score; on exact ties the earlier library entry ranks first.
fn candidate_cmp_desc(a: &Candidate, b: &Candidate) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| a.index.cmp(&b.index))
}

/// Top-K container with O(k) insertion cost.
pub(crate) struct TopK {
    k: usize,
    items: Vec<Candidate>,
}

impl TopK {
    /// Creates a collector; `expected` bounds the initial allocation.
    pub fn new(k: usize, expected: usize) -> Self {
        Self {
            k,
            items: Vec::with_capacity(k.min(expected)),
        }
    }

    /// Pushes a candidate, evicting the lowest ranked one if at capacity.
    pub fn push(&mut self, candidate: Candidate) {
        if self.k == 0 {
            return;
        }
        if self.items.len() < self.k {
            self.items.push(candidate);
            return;
        }

        let mut worst_idx = 0usize;
        for (idx, item) in self.items.iter().enumerate().skip(1) {
            if candidate_cmp_desc(item, &self.items[worst_idx]) == Ordering::Greater {
                worst_idx = idx;
            }
        }

        if candidate_cmp_desc(&candidate, &self.items[worst_idx]) == Ordering::Less {
            self.items[worst_idx] = candidate;
        }
    }

    /// Returns candidates sorted by descending score.
    pub fn into_sorted_desc(mut self) -> Vec<Candidate> {
        self.items.sort_by(candidate_cmp_desc);
        self.items
    }
}
