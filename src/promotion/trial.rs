use std::collections::HashMap;

use crate::error::{PodiumError, Result};
use crate::genome::{InstanceToken, TrialToken};

/// A descriptor being re-spawned to average out lucky or unlucky runs.
#[derive(Debug, Clone)]
pub struct TrialCandidate<G> {
    token: TrialToken,
    genome: G,
    /// Started runs; `None` while the ship is still alive.
    runs: HashMap<InstanceToken, Option<f64>>,
}

impl<G> TrialCandidate<G> {
    pub fn new(token: TrialToken, genome: G) -> Self {
        Self {
            token,
            genome,
            runs: HashMap::new(),
        }
    }

    pub fn token(&self) -> TrialToken {
        self.token
    }

    pub fn genome(&self) -> &G {
        &self.genome
    }

    pub fn into_genome(self) -> G {
        self.genome
    }

    pub fn started(&self) -> usize {
        self.runs.len()
    }

    pub fn finished(&self) -> usize {
        self.runs.values().filter(|score| score.is_some()).count()
    }

    pub fn owns(&self, instance: InstanceToken) -> bool {
        self.runs.contains_key(&instance)
    }

    pub fn is_running(&self, instance: InstanceToken) -> bool {
        matches!(self.runs.get(&instance), Some(None))
    }

    pub(crate) fn start(&mut self, instance: InstanceToken) {
        self.runs.entry(instance).or_insert(None);
    }

    /// Record the final score of a run. Already finished runs keep their score.
    pub(crate) fn finish(&mut self, instance: InstanceToken, score: f64) -> bool {
        match self.runs.get_mut(&instance) {
            Some(slot) if slot.is_none() => {
                *slot = Some(score);
                true
            }
            _ => false,
        }
    }

    /// Forget a run as if it had never started.
    pub(crate) fn abandon(&mut self, instance: InstanceToken) -> bool {
        self.runs.remove(&instance).is_some()
    }

    pub fn has_running(&self) -> bool {
        self.started() > self.finished()
    }

    /// Complete once at least `required` runs started and all of them finished.
    pub fn is_complete(&self, required: usize) -> bool {
        self.started() >= required && !self.has_running()
    }

    pub fn average(&self) -> Result<f64> {
        let started = self.started();
        let finished = self.finished();
        if started == 0 || finished < started {
            return Err(PodiumError::TrialIncomplete {
                trial: self.token,
                started,
                finished,
            });
        }
        let total: f64 = self.runs.values().flatten().sum();
        Ok(total / finished as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial_with(scores: &[f64]) -> TrialCandidate<()> {
        let mut trial = TrialCandidate::new(TrialToken(1), ());
        for (index, score) in scores.iter().enumerate() {
            let instance = InstanceToken(index as u64);
            trial.start(instance);
            trial.finish(instance, *score);
        }
        trial
    }

    #[test]
    fn average_of_finished_runs() {
        let trial = trial_with(&[10.0, 20.0, 30.0]);
        assert!(trial.is_complete(3));
        assert_eq!(trial.average().unwrap(), 20.0);
    }

    #[test]
    fn average_before_completion_is_an_error() {
        let mut trial = trial_with(&[10.0]);
        trial.start(InstanceToken(9));
        assert!(trial.has_running());
        assert!(!trial.is_complete(2));
        assert!(matches!(
            trial.average(),
            Err(PodiumError::TrialIncomplete {
                started: 2,
                finished: 1,
                ..
            })
        ));
    }

    #[test]
    fn finish_is_idempotent() {
        let mut trial = TrialCandidate::new(TrialToken(1), ());
        trial.start(InstanceToken(4));
        assert!(trial.finish(InstanceToken(4), 5.0));
        assert!(!trial.finish(InstanceToken(4), 50.0));
        assert!(!trial.finish(InstanceToken(5), 1.0));
        assert_eq!(trial.average().unwrap(), 5.0);
    }

    #[test]
    fn abandoned_runs_leave_no_trace() {
        let mut trial = trial_with(&[3.0]);
        trial.start(InstanceToken(7));
        assert!(trial.abandon(InstanceToken(7)));
        assert_eq!(trial.started(), 1);
        assert!(trial.is_complete(1));
    }
}
