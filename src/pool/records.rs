//! Flat view of a descriptor pool, for hosts that persist the leaderboard.

use serde::{Deserialize, Serialize};

use crate::config::PoolLimits;
use crate::genome::{Genome, LineageId};
use crate::pool::merge;
use crate::pool::snapshot::{Descriptor, Individual, Snapshot};
use crate::pool::RankedPool;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalistRecord<G> {
    pub name: String,
    pub lineage: LineageId,
    /// 1-based position inside the lineage.
    pub rank: usize,
    pub genome: G,
    pub score: f64,
}

impl<G: Genome> Snapshot<Descriptor<G>> {
    /// Every individual in display order: names, then lineages, then rank.
    pub fn records(&self) -> Vec<FinalistRecord<G>> {
        self.names
            .iter()
            .flat_map(|pool| {
                pool.lineages.iter().flat_map(move |lineage| {
                    lineage
                        .individuals
                        .iter()
                        .enumerate()
                        .map(move |(index, individual)| FinalistRecord {
                            name: pool.name.clone(),
                            lineage: lineage.id.clone(),
                            rank: index + 1,
                            genome: individual.member.genome().clone(),
                            score: individual.score,
                        })
                })
            })
            .collect()
    }
}

impl<G: Genome> RankedPool<Descriptor<G>> {
    /// Rebuild a pool from persisted records. Records are re-ranked under
    /// `limits`, so a file written with looser limits is trimmed on load.
    pub fn from_records(limits: PoolLimits, records: Vec<FinalistRecord<G>>) -> Self {
        if records.is_empty() {
            return Self::new(limits);
        }
        let individuals = records
            .into_iter()
            .map(|record| Individual::descriptor(record.genome, record.score, 0.0))
            .collect();
        let snapshot = merge::merge(&Snapshot::empty(), individuals, limits, 1);
        Self::from_snapshot(limits, snapshot)
    }
}
