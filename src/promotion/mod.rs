//! Moves genomes through the tiers: live winner → trial → finalist.
//!
//! A ship that dies while holding a place in the live pool is nominated into
//! the [CandidateQueue]. Nominees are re-spawned `finalist_count` times as a
//! trial; once every run has finished, the average score decides whether the
//! genome enters the permanent finalist pool. One lucky run is never enough.
//!
//! Deaths are buffered by [PromotionCoordinator::ship_died] and only processed
//! in [PromotionCoordinator::refresh_winners], the once-per-tick sync point.

pub mod trial;

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::candidates::CandidateQueue;
use crate::config::{EngineConfig, UnscoredDeath};
use crate::error::{PodiumError, Result};
use crate::genome::{Genome, InstanceToken, LiveInstance, TrialToken};
use crate::pool::{DescriptorPool, Individual, LivePool, Living, RankedPool};
use crate::rng::SharedRng;

pub use trial::TrialCandidate;

/// What one [PromotionCoordinator::refresh_winners] call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Deaths drained from the buffer.
    pub deaths: usize,
    /// Live winners that died and were nominated for a trial.
    pub nominated: usize,
    /// Trial runs finished with their best recorded score.
    pub scored_runs: usize,
    /// Trial runs that died without a score.
    pub unscored_runs: usize,
    pub promoted: usize,
    pub discarded: usize,
}

pub struct PromotionCoordinator<L: LiveInstance> {
    config: EngineConfig,
    live: LivePool<L>,
    finals: DescriptorPool<L::Genome>,
    candidates: CandidateQueue<L::Genome>,
    trials: Mutex<Vec<TrialCandidate<L::Genome>>>,
    /// Best score seen so far for each unfinished trial ship.
    trial_scores: Mutex<HashMap<InstanceToken, f64>>,
    pending_dead: Mutex<Vec<InstanceToken>>,
    next_trial: AtomicU64,
    refresh: Mutex<()>,
    rng: SharedRng,
}

impl<L: LiveInstance> PromotionCoordinator<L> {
    pub fn new(config: EngineConfig) -> Self {
        let finals = RankedPool::new(config.finals);
        Self::with_finalists(config, finals)
    }

    /// Start from a finalist pool restored by the host.
    pub fn with_finalists(config: EngineConfig, finals: DescriptorPool<L::Genome>) -> Self {
        Self {
            live: RankedPool::new(config.live),
            finals,
            candidates: CandidateQueue::new(config.candidate_cap, config.compaction_factor),
            trials: Mutex::new(Vec::new()),
            trial_scores: Mutex::new(HashMap::new()),
            pending_dead: Mutex::new(Vec::new()),
            next_trial: AtomicU64::new(1),
            refresh: Mutex::new(()),
            rng: SharedRng::from_entropy(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn live(&self) -> &LivePool<L> {
        &self.live
    }

    pub fn finals(&self) -> &DescriptorPool<L::Genome> {
        &self.finals
    }

    pub fn candidates(&self) -> &CandidateQueue<L::Genome> {
        &self.candidates
    }

    pub fn active_trials(&self) -> usize {
        self.lock_trials().len()
    }

    /// Trial ships with a recorded score that have not died yet.
    pub fn pending_trial_scores(&self) -> usize {
        self.trial_scores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wait for both pools' background merges.
    pub fn settle(&self) {
        self.live.settle();
        self.finals.settle();
    }

    fn lock_trials(&self) -> std::sync::MutexGuard<'_, Vec<TrialCandidate<L::Genome>>> {
        self.trials.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a ship spawned for `trial`.
    pub fn ship_created(&self, trial: TrialToken, instance: &L) -> Result<()> {
        let mut trials = self.lock_trials();
        let candidate = trials
            .iter_mut()
            .find(|candidate| candidate.token() == trial)
            .ok_or(PodiumError::UnknownTrial(trial))?;
        candidate.start(instance.token());
        tracing::debug!(%trial, ship = %instance.token(), started = candidate.started(), "trial run started");
        Ok(())
    }

    /// Note that a ship left the simulation. Processed by the next refresh.
    pub fn ship_died(&self, instance: InstanceToken) {
        self.pending_dead
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(instance);
    }

    /// Genome to spawn next for `name`, with the trial it belongs to.
    ///
    /// Trials that still need runs are preferred, picked at random; otherwise
    /// the best queued nominee opens a new trial.
    pub fn candidate(&self, name: &str) -> Option<(TrialToken, L::Genome)> {
        let mut trials = self.lock_trials();
        let eligible: Vec<usize> = trials
            .iter()
            .enumerate()
            .filter(|(_, trial)| {
                trial.genome().genome_id().name == name
                    && trial.started() < self.config.finalist_count
            })
            .map(|(index, _)| index)
            .collect();
        if let Some(pick) = self.rng.below(eligible.len()) {
            let trial = &trials[eligible[pick]];
            return Some((trial.token(), trial.genome().clone()));
        }

        let (genome, score) = self.candidates.pop(name)?;
        let token = TrialToken(self.next_trial.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%token, variant = name, nominated_score = score, "opening trial");
        trials.push(TrialCandidate::new(token, genome.clone()));
        Some((token, genome))
    }

    /// Whether a trial for `name` has ships in flight. Hosts hold off new
    /// trials while this is true so one lineage cannot monopolize the queue.
    pub fn has_living_candidate(&self, name: &str) -> bool {
        self.lock_trials()
            .iter()
            .any(|trial| trial.genome().genome_id().name == name && trial.has_running())
    }

    /// Per-tick synchronization. `live_scores` are current observations of
    /// living ships; `trial_scores` are current scores of trial ships.
    pub fn refresh_winners(
        &self,
        live_scores: Vec<Individual<Living<L>>>,
        trial_scores: impl IntoIterator<Item = (InstanceToken, f64)>,
    ) -> RefreshReport {
        let _refresh = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = RefreshReport::default();

        let removed: Vec<InstanceToken> = mem::take(
            &mut *self
                .pending_dead
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        report.deaths = removed.len();
        let removed_set: HashSet<InstanceToken> = removed.iter().copied().collect();

        let dead_winners = self.live.store_winners_removing(live_scores, &removed_set);

        let mut trials = self.lock_trials();
        let dead_runs: HashMap<InstanceToken, f64> = {
            let mut best = self
                .trial_scores
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for (token, score) in trial_scores {
                if !trials.iter().any(|trial| trial.is_running(token)) {
                    tracing::trace!(ship = %token, "ignoring score for a ship without a running trial");
                    continue;
                }
                best.entry(token)
                    .and_modify(|seen| *seen = seen.max(score))
                    .or_insert(score);
            }
            removed_set
                .iter()
                .filter_map(|token| best.remove(token).map(|score| (*token, score)))
                .collect()
        };

        for winner in dead_winners.values() {
            self.candidates
                .add(winner.member.handle().snapshot(), winner.score);
            report.nominated += 1;
        }
        if report.nominated > 0 {
            tracing::debug!(count = report.nominated, "nominated dead live winners");
        }

        for token in &removed {
            let Some(trial) = trials.iter_mut().find(|trial| trial.is_running(*token)) else {
                continue;
            };
            let score = dead_runs
                .get(token)
                .copied()
                .or_else(|| dead_winners.get(token).map(|winner| winner.score));
            match (score, self.config.unscored_death) {
                (Some(score), _) => {
                    trial.finish(*token, score);
                    report.scored_runs += 1;
                }
                (None, UnscoredDeath::CountAsZero) => {
                    trial.finish(*token, 0.0);
                    report.unscored_runs += 1;
                }
                (None, UnscoredDeath::Exclude) => {
                    trial.abandon(*token);
                    report.unscored_runs += 1;
                }
            }
        }

        let required = self.config.finalist_count;
        let (complete, active): (Vec<_>, Vec<_>) = mem::take(&mut *trials)
            .into_iter()
            .partition(|trial| trial.is_complete(required));
        *trials = active;
        drop(trials);

        let mut promotions = Vec::new();
        for trial in complete {
            let average = match trial.average() {
                Ok(average) => average,
                Err(err) => {
                    tracing::warn!(%err, "dropping trial without a usable average");
                    report.discarded += 1;
                    continue;
                }
            };
            let id = trial.genome().genome_id();
            if average.abs() > self.config.near_zero {
                tracing::info!(
                    variant = %id.name,
                    lineage = %id.lineage,
                    generation = id.generation,
                    average,
                    runs = trial.started(),
                    "promoting finalist"
                );
                promotions.push(Individual::descriptor(trial.into_genome(), average, 0.0));
                report.promoted += 1;
            } else {
                tracing::debug!(variant = %id.name, lineage = %id.lineage, "trial averaged zero, discarded");
                report.discarded += 1;
            }
        }
        self.finals.store_winners(promotions);

        report
    }
}

/// Parent genome for `name`: a random live winner, else a random finalist.
pub fn pick_parent<L: LiveInstance>(
    coordinator: &PromotionCoordinator<L>,
    name: &str,
) -> Option<L::Genome> {
    coordinator
        .live()
        .winner(name)
        .map(|winner| winner.member.handle().snapshot())
        .or_else(|| {
            coordinator
                .finals()
                .winner(name)
                .map(|finalist| finalist.member.into_genome())
        })
}
