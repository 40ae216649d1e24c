//! Descriptors waiting for a promotion trial.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::genome::Genome;

pub const DEFAULT_CANDIDATE_CAP: usize = 33;
pub const DEFAULT_COMPACTION_FACTOR: usize = 3;

/// Per-name multiset of `(genome, score)`. Each name keeps roughly its best
/// `cap` entries; compaction is amortized and only runs once a name exceeds
/// `cap * compaction_factor`.
#[derive(Debug)]
pub struct CandidateQueue<G> {
    by_name: Mutex<HashMap<String, Vec<(G, f64)>>>,
    cap: usize,
    compaction_factor: usize,
}

impl<G: Genome> Default for CandidateQueue<G> {
    fn default() -> Self {
        Self::new(DEFAULT_CANDIDATE_CAP, DEFAULT_COMPACTION_FACTOR)
    }
}

impl<G: Genome> CandidateQueue<G> {
    pub fn new(cap: usize, compaction_factor: usize) -> Self {
        Self {
            by_name: Mutex::new(HashMap::new()),
            cap: cap.max(1),
            compaction_factor: compaction_factor.max(1),
        }
    }

    pub fn add(&self, genome: G, score: f64) {
        let name = genome.genome_id().name.clone();
        let mut by_name = self.by_name.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = by_name.entry(name).or_default();
        entries.push((genome, score));
        if entries.len() > self.cap * self.compaction_factor {
            entries.sort_by(|left, right| right.1.total_cmp(&left.1));
            entries.truncate(self.cap);
        }
    }

    /// Remove and return the best entry for `name`.
    pub fn pop(&self, name: &str) -> Option<(G, f64)> {
        let mut by_name = self.by_name.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = by_name.get_mut(name)?;
        let best = entries
            .iter()
            .enumerate()
            .max_by(|left, right| left.1 .1.total_cmp(&right.1 .1))
            .map(|(index, _)| index)?;
        let popped = entries.swap_remove(best);
        if entries.is_empty() {
            by_name.remove(name);
        }
        Some(popped)
    }

    pub fn len(&self, name: &str) -> usize {
        self.by_name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
