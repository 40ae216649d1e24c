//! Building new ranked trees. Pure functions over snapshots; no shared state.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::config::PoolLimits;
use crate::genome::{InstanceToken, LineageId};
use crate::pool::snapshot::{Individual, Lineage, Member, NamedPool, Snapshot};

/// Union `existing` with `additions`, rank and bound every name, and stamp the
/// result with `version`. Names without additions are carried over as they are.
pub fn merge<M: Member>(
    existing: &Snapshot<M>,
    additions: Vec<Individual<M>>,
    limits: PoolLimits,
    version: u64,
) -> Snapshot<M> {
    let mut incoming: HashMap<String, Vec<Individual<M>>> = HashMap::new();
    for individual in additions {
        incoming
            .entry(individual.name().to_string())
            .or_default()
            .push(individual);
    }

    let mut work: Vec<(Option<&NamedPool<M>>, String, Vec<Individual<M>>)> = existing
        .names
        .iter()
        .map(|pool| {
            let added = incoming.remove(&pool.name).unwrap_or_default();
            (Some(pool), pool.name.clone(), added)
        })
        .collect();
    work.extend(incoming.into_iter().map(|(name, added)| (None, name, added)));

    let mut names: Vec<NamedPool<M>> = work
        .into_par_iter()
        .map(|(current, name, added)| match current {
            Some(pool) if added.is_empty() => pool.clone(),
            _ => merge_named(current, name, added, limits),
        })
        .collect();
    sort_names(&mut names);

    Snapshot { version, names }
}

fn merge_named<M: Member>(
    current: Option<&NamedPool<M>>,
    name: String,
    added: Vec<Individual<M>>,
    limits: PoolLimits,
) -> NamedPool<M> {
    let mut lineages: Vec<(LineageId, Vec<Individual<M>>)> = current
        .map(|pool| {
            pool.lineages
                .iter()
                .map(|lineage| (lineage.id.clone(), lineage.individuals.clone()))
                .collect()
        })
        .unwrap_or_default();
    let mut slots: HashMap<LineageId, usize> = lineages
        .iter()
        .enumerate()
        .map(|(index, (id, _))| (id.clone(), index))
        .collect();

    for individual in added {
        let id = individual.lineage().clone();
        match slots.get(&id) {
            Some(&index) => lineages[index].1.push(individual),
            None => {
                slots.insert(id.clone(), lineages.len());
                lineages.push((id, vec![individual]));
            }
        }
    }

    let mut ranked: Vec<Lineage<M>> = lineages
        .into_iter()
        .map(|(id, individuals)| Lineage {
            id,
            individuals: rank_lineage(individuals, limits.max_per_lineage),
        })
        .filter(|lineage| !lineage.individuals.is_empty())
        .collect();
    ranked.sort_by(|left, right| right.top_score().total_cmp(&left.top_score()));
    ranked.truncate(limits.max_lineages);

    NamedPool {
        name,
        lineages: ranked,
    }
}

/// Best first, one entry per live instance, at most `max` entries.
fn rank_lineage<M: Member>(mut individuals: Vec<Individual<M>>, max: usize) -> Vec<Individual<M>> {
    individuals.sort_by(|left, right| right.score.total_cmp(&left.score));
    let mut seen: HashSet<InstanceToken> = HashSet::new();
    individuals.retain(|individual| match individual.member.instance_token() {
        Some(token) => seen.insert(token),
        None => true,
    });
    individuals.truncate(max);
    individuals
}

fn sort_names<M>(names: &mut [NamedPool<M>]) {
    names.sort_by(|left, right| {
        right
            .top_score()
            .total_cmp(&left.top_score())
            .then_with(|| left.name.cmp(&right.name))
    });
}

/// Drop every individual whose instance token is in `tokens`. Emptied lineages
/// and names disappear; orderings are restored. Returns the pruned snapshot and
/// the removed individuals.
pub fn prune<M: Member>(
    existing: &Snapshot<M>,
    tokens: &HashSet<InstanceToken>,
    version: u64,
) -> (Snapshot<M>, Vec<Individual<M>>) {
    let mut removed = Vec::new();
    let mut names = Vec::with_capacity(existing.names.len());

    for pool in &existing.names {
        let mut lineages = Vec::with_capacity(pool.lineages.len());
        for lineage in &pool.lineages {
            let (gone, kept): (Vec<_>, Vec<_>) =
                lineage.individuals.iter().cloned().partition(|individual| {
                    individual
                        .member
                        .instance_token()
                        .is_some_and(|token| tokens.contains(&token))
                });
            removed.extend(gone);
            if !kept.is_empty() {
                lineages.push(Lineage {
                    id: lineage.id.clone(),
                    individuals: kept,
                });
            }
        }
        if !lineages.is_empty() {
            lineages.sort_by(|left, right| right.top_score().total_cmp(&left.top_score()));
            names.push(NamedPool {
                name: pool.name.clone(),
                lineages,
            });
        }
    }
    sort_names(&mut names);

    (Snapshot { version, names }, removed)
}
