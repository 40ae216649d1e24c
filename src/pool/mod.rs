//! Versioned, bounded, per-name ranked pools.
//!
//! A pool publishes an immutable [Snapshot] through an [ArcSwap]; readers load
//! the current handle and never wait on writers. Writes are merged on rayon's
//! pool in the background and published by compare-and-swap, keyed on the
//! snapshot version: a result only replaces the published snapshot when its
//! version is strictly newer, so a slow merge issued earlier can never clobber
//! a faster one issued later.
//!
//! The pool's mode is its member type. `RankedPool<Living<L>>` tracks running
//! ships and supports synchronous removal by instance token;
//! `RankedPool<Descriptor<G>>` holds inert genomes.

pub mod merge;
pub mod records;
pub mod snapshot;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use arc_swap::ArcSwap;

use crate::config::PoolLimits;
use crate::genome::{InstanceToken, LiveInstance};
use crate::rng::SharedRng;

pub use records::FinalistRecord;
pub use snapshot::{Descriptor, Individual, Lineage, Living, Member, NamedPool, Snapshot};

/// Pool of running ships.
pub type LivePool<L> = RankedPool<Living<L>>;
/// Pool of inert genomes, e.g. the finalist leaderboard.
pub type DescriptorPool<G> = RankedPool<Descriptor<G>>;

struct Shared<M> {
    published: ArcSwap<Snapshot<M>>,
    next_version: AtomicU64,
    /// Serializes version assignment with the base snapshot a writer reads.
    issue: Mutex<()>,
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl<M: Member> Shared<M> {
    /// Publish `next` unless something at least as new is already published.
    fn publish(&self, next: Arc<Snapshot<M>>) -> bool {
        let mut current = self.published.load_full();
        loop {
            if current.version >= next.version {
                tracing::debug!(
                    published = current.version,
                    discarded = next.version,
                    "dropping stale merge result"
                );
                return false;
            }
            let previous = self.published.compare_and_swap(&current, Arc::clone(&next));
            if Arc::ptr_eq(&*previous, &current) {
                tracing::trace!(version = next.version, "published snapshot");
                return true;
            }
            current = arc_swap::Guard::into_inner(previous);
        }
    }

    fn begin_merge(&self) {
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn finish_merge(&self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }
}

/// A merge whose input and version are fixed; computing it touches no shared state.
pub(crate) struct PendingMerge<M> {
    base: Arc<Snapshot<M>>,
    additions: Vec<Individual<M>>,
    limits: PoolLimits,
    version: u64,
}

impl<M: Member> PendingMerge<M> {
    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn compute(self) -> Snapshot<M> {
        merge::merge(&*self.base, self.additions, self.limits, self.version)
    }
}

pub struct RankedPool<M> {
    shared: Arc<Shared<M>>,
    limits: PoolLimits,
    rng: SharedRng,
}

impl<M: Member> RankedPool<M> {
    pub fn new(limits: PoolLimits) -> Self {
        Self::from_snapshot(limits, Snapshot::empty())
    }

    fn from_snapshot(limits: PoolLimits, snapshot: Snapshot<M>) -> Self {
        let version = snapshot.version;
        Self {
            shared: Arc::new(Shared {
                published: ArcSwap::from_pointee(snapshot),
                next_version: AtomicU64::new(version),
                issue: Mutex::new(()),
                in_flight: Mutex::new(0),
                idle: Condvar::new(),
            }),
            limits,
            rng: SharedRng::from_entropy(),
        }
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// Currently published state. Never waits for in-flight merges.
    pub fn snapshot(&self) -> Arc<Snapshot<M>> {
        self.shared.published.load_full()
    }

    /// Merge `additions` in the background. Returns immediately; the result
    /// becomes visible once published, and is dropped if a newer snapshot got
    /// there first.
    pub fn store_winners(&self, additions: Vec<Individual<M>>) {
        if additions.is_empty() {
            return;
        }
        let pending = self.prepare_merge(additions);
        let shared = Arc::clone(&self.shared);
        shared.begin_merge();
        rayon::spawn(move || {
            let version = pending.version();
            match panic::catch_unwind(AssertUnwindSafe(|| pending.compute())) {
                Ok(next) => {
                    shared.publish(Arc::new(next));
                }
                Err(_) => tracing::error!(version, "background merge panicked, result dropped"),
            }
            shared.finish_merge();
        });
    }

    /// Fix the input snapshot and version of a merge without running it.
    pub(crate) fn prepare_merge(&self, additions: Vec<Individual<M>>) -> PendingMerge<M> {
        let _issue = self
            .shared
            .issue
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let version = self.shared.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        PendingMerge {
            base: self.shared.published.load_full(),
            additions,
            limits: self.limits,
            version,
        }
    }

    #[cfg(test)]
    pub(crate) fn publish(&self, snapshot: Snapshot<M>) -> bool {
        self.shared.publish(Arc::new(snapshot))
    }

    /// Block until every merge issued so far has finished or been dropped.
    pub fn settle(&self) {
        let mut in_flight = self
            .shared
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *in_flight > 0 {
            in_flight = self
                .shared
                .idle
                .wait(in_flight)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn pending_merges(&self) -> usize {
        *self
            .shared
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// A random individual for `name`: a uniformly chosen lineage, then a
    /// uniformly chosen member of it.
    pub fn winner(&self, name: &str) -> Option<Individual<M>> {
        let snapshot = self.shared.published.load();
        let pool = snapshot.named(name)?;
        let lineage = &pool.lineages[self.rng.below(pool.lineages.len())?];
        let index = self.rng.below(lineage.individuals.len())?;
        Some(lineage.individuals[index].clone())
    }

    pub fn used_lineages(&self, name: &str) -> usize {
        self.shared
            .published
            .load()
            .named(name)
            .map(|pool| pool.lineages.len())
            .unwrap_or(0)
    }

    /// Lowest retained score per name.
    pub fn mins_by_name(&self) -> BTreeMap<String, f64> {
        self.shared
            .published
            .load()
            .names
            .iter()
            .map(|pool| {
                let min = pool
                    .lineages
                    .iter()
                    .map(Lineage::bottom_score)
                    .fold(f64::INFINITY, f64::min);
                (pool.name.clone(), min)
            })
            .collect()
    }

    /// Highest retained score per name.
    pub fn maxes_by_name(&self) -> BTreeMap<String, f64> {
        self.shared
            .published
            .load()
            .names
            .iter()
            .map(|pool| (pool.name.clone(), pool.top_score()))
            .collect()
    }

    /// Top score a ship from a new lineage must beat to get in, or None while
    /// `name` still has room for another lineage.
    pub fn admission_threshold(&self, name: &str) -> Option<f64> {
        let snapshot = self.shared.published.load();
        let pool = snapshot.named(name)?;
        if pool.lineages.len() < self.limits.max_lineages {
            return None;
        }
        pool.lineages.last().map(Lineage::top_score)
    }
}

impl<L: LiveInstance> RankedPool<Living<L>> {
    /// Remove every ship in `removal` from `additions` and from the published
    /// snapshot before returning, then merge what is left in the background.
    ///
    /// The pruned snapshot is always published under a fresh version, so merges
    /// issued before this call can no longer bring a removed ship back.
    ///
    /// The returned map holds every removed ship, whether it was published or
    /// only posted in `additions`; a ship found in both reports the better score.
    pub fn store_winners_removing(
        &self,
        additions: Vec<Individual<Living<L>>>,
        removal: &HashSet<InstanceToken>,
    ) -> HashMap<InstanceToken, Individual<Living<L>>> {
        if removal.is_empty() {
            self.store_winners(additions);
            return HashMap::new();
        }

        let (dropped, kept): (Vec<_>, Vec<_>) = additions
            .into_iter()
            .partition(|individual| removal.contains(&individual.member.token()));

        let mut removed: HashMap<InstanceToken, Individual<Living<L>>> = HashMap::new();
        {
            let _issue = self
                .shared
                .issue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            loop {
                let version = self.shared.next_version.fetch_add(1, Ordering::SeqCst) + 1;
                let base = self.shared.published.load_full();
                let (pruned, gone) = merge::prune(&*base, removal, version);
                let previous = self.shared.published.compare_and_swap(&base, Arc::new(pruned));
                if Arc::ptr_eq(&*previous, &base) {
                    for individual in gone {
                        keep_best(&mut removed, individual);
                    }
                    break;
                }
            }
        }

        for individual in dropped {
            keep_best(&mut removed, individual);
        }

        self.store_winners(kept);
        removed
    }
}

fn keep_best<L: LiveInstance>(
    removed: &mut HashMap<InstanceToken, Individual<Living<L>>>,
    individual: Individual<Living<L>>,
) {
    let token = individual.member.token();
    match removed.get(&token) {
        Some(existing) if existing.score >= individual.score => {}
        _ => {
            removed.insert(token, individual);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::{Genome, GenomeId};

    #[derive(Debug, Clone)]
    struct Blueprint(GenomeId);

    impl Genome for Blueprint {
        fn genome_id(&self) -> &GenomeId {
            &self.0
        }
    }

    #[derive(Debug, Clone)]
    struct Runner {
        token: u64,
        id: GenomeId,
    }

    impl LiveInstance for Runner {
        type Genome = Blueprint;

        fn token(&self) -> InstanceToken {
            InstanceToken(self.token)
        }

        fn genome_id(&self) -> &GenomeId {
            &self.id
        }

        fn snapshot(&self) -> Blueprint {
            Blueprint(self.id.clone())
        }
    }

    fn runner(token: u64, score: f64) -> Individual<Living<Runner>> {
        let id = GenomeId::new("climber", "R", 0);
        Individual::living(Runner { token, id }, score, 1.0)
    }

    fn holds(pool: &LivePool<Runner>, token: u64) -> bool {
        pool.snapshot()
            .names()
            .iter()
            .flat_map(|named| named.individuals())
            .any(|individual| individual.member.token() == InstanceToken(token))
    }

    fn blueprint(lineage: &str, score: f64) -> Individual<Descriptor<Blueprint>> {
        Individual::descriptor(Blueprint(GenomeId::new("climber", lineage, 0)), score, 0.0)
    }

    fn top(pool: &DescriptorPool<Blueprint>) -> f64 {
        pool.snapshot().named("climber").unwrap().top_score()
    }

    #[test]
    fn later_issued_merge_wins_even_when_it_finishes_first() {
        let pool: DescriptorPool<Blueprint> = RankedPool::new(PoolLimits::new(4, 4));
        let first = pool.prepare_merge(vec![blueprint("A", 1.0)]);
        let second = pool.prepare_merge(vec![blueprint("B", 2.0)]);
        assert!(second.version() > first.version());

        assert!(pool.publish(second.compute()));
        assert!(!pool.publish(first.compute()));

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.version(), 2);
        let climber = snapshot.named("climber").unwrap();
        assert!(climber.lineage(&"B".into()).is_some());
        assert!(climber.lineage(&"A".into()).is_none());
    }

    #[test]
    fn in_order_publishes_all_apply() {
        let pool: DescriptorPool<Blueprint> = RankedPool::new(PoolLimits::new(4, 4));
        let first = pool.prepare_merge(vec![blueprint("A", 1.0)]);
        assert!(pool.publish(first.compute()));
        let second = pool.prepare_merge(vec![blueprint("B", 2.0)]);
        assert!(pool.publish(second.compute()));
        assert_eq!(pool.used_lineages("climber"), 2);
        assert_eq!(top(&pool), 2.0);
    }

    #[test]
    fn empty_store_changes_nothing() {
        let pool: DescriptorPool<Blueprint> = RankedPool::new(PoolLimits::new(4, 4));
        pool.store_winners(vec![blueprint("A", 1.0)]);
        pool.settle();
        let before = pool.snapshot();
        pool.store_winners(Vec::new());
        pool.settle();
        let after = pool.snapshot();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.version(), 1);
    }

    #[test]
    fn admission_threshold_only_when_full() {
        let pool: DescriptorPool<Blueprint> = RankedPool::new(PoolLimits::new(2, 1));
        pool.store_winners(vec![blueprint("A", 4.0)]);
        pool.settle();
        assert_eq!(pool.admission_threshold("climber"), None);
        pool.store_winners(vec![blueprint("B", 6.0)]);
        pool.settle();
        assert_eq!(pool.admission_threshold("climber"), Some(4.0));
        assert_eq!(pool.admission_threshold("walker"), None);
    }

    #[test]
    fn removal_makes_earlier_merges_stale() {
        let pool: LivePool<Runner> = RankedPool::new(PoolLimits::new(4, 4));
        let in_flight = pool.prepare_merge(vec![runner(7, 5.0)]);

        let removal: HashSet<InstanceToken> = [InstanceToken(7)].into();
        let removed = pool.store_winners_removing(Vec::new(), &removal);
        assert!(removed.is_empty());
        assert!(pool.snapshot().version() > in_flight.version());

        assert!(!pool.publish(in_flight.compute()));
        assert!(!holds(&pool, 7));
    }

    #[test]
    fn removed_winner_is_not_restored_by_a_pending_rescore() {
        let pool: LivePool<Runner> = RankedPool::new(PoolLimits::new(4, 4));
        assert!(pool.publish(pool.prepare_merge(vec![runner(7, 5.0)]).compute()));
        let in_flight = pool.prepare_merge(vec![runner(7, 8.0), runner(8, 3.0)]);

        let removal: HashSet<InstanceToken> = [InstanceToken(7)].into();
        let removed = pool.store_winners_removing(Vec::new(), &removal);
        assert_eq!(removed[&InstanceToken(7)].score, 5.0);

        assert!(!pool.publish(in_flight.compute()));
        assert!(!holds(&pool, 7));
        pool.settle();
        assert!(!holds(&pool, 7));
    }

    #[test]
    fn removed_additions_are_reported_without_being_published() {
        let pool: LivePool<Runner> = RankedPool::new(PoolLimits::new(4, 4));
        let removal: HashSet<InstanceToken> = [InstanceToken(9)].into();
        let removed = pool.store_winners_removing(vec![runner(9, 50.0), runner(9, 20.0)], &removal);

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[&InstanceToken(9)].score, 50.0);
        pool.settle();
        assert!(!holds(&pool, 9));
    }
}
