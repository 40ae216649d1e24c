//! Immutable ranked state published by a [super::RankedPool].

use serde::{Deserialize, Serialize};

use crate::genome::{Genome, GenomeId, InstanceToken, LineageId, LiveInstance};

/// What a pool stores per individual. The two implementations fix a pool's mode.
pub trait Member: Clone + Send + Sync + 'static {
    fn genome_id(&self) -> &GenomeId;

    /// Live members dedupe on this; descriptors return None and never dedupe.
    fn instance_token(&self) -> Option<InstanceToken>;
}

/// A ship that is still running.
#[derive(Debug, Clone)]
pub struct Living<L> {
    handle: L,
    token: InstanceToken,
}

impl<L: LiveInstance> Living<L> {
    pub fn new(handle: L) -> Self {
        let token = handle.token();
        Self { handle, token }
    }

    pub fn handle(&self) -> &L {
        &self.handle
    }

    pub fn token(&self) -> InstanceToken {
        self.token
    }
}

impl<L: LiveInstance> Member for Living<L> {
    fn genome_id(&self) -> &GenomeId {
        self.handle.genome_id()
    }

    fn instance_token(&self) -> Option<InstanceToken> {
        Some(self.token)
    }
}

/// Inert genetic data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor<G>(pub G);

impl<G: Genome> Descriptor<G> {
    pub fn genome(&self) -> &G {
        &self.0
    }

    pub fn into_genome(self) -> G {
        self.0
    }
}

impl<G: Genome> Member for Descriptor<G> {
    fn genome_id(&self) -> &GenomeId {
        self.0.genome_id()
    }

    fn instance_token(&self) -> Option<InstanceToken> {
        None
    }
}

/// One scored variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual<M> {
    pub member: M,
    pub score: f64,
    /// Age of the ship when the score was recorded.
    pub age: f64,
}

impl<M: Member> Individual<M> {
    pub fn new(member: M, score: f64, age: f64) -> Self {
        Self { member, score, age }
    }

    pub fn name(&self) -> &str {
        &self.member.genome_id().name
    }

    pub fn lineage(&self) -> &LineageId {
        &self.member.genome_id().lineage
    }
}

impl<L: LiveInstance> Individual<Living<L>> {
    pub fn living(handle: L, score: f64, age: f64) -> Self {
        Self::new(Living::new(handle), score, age)
    }
}

impl<G: Genome> Individual<Descriptor<G>> {
    pub fn descriptor(genome: G, score: f64, age: f64) -> Self {
        Self::new(Descriptor(genome), score, age)
    }
}

/// Individuals of one mutation branch, best first.
#[derive(Debug, Clone)]
pub struct Lineage<M> {
    pub id: LineageId,
    pub individuals: Vec<Individual<M>>,
}

impl<M> Lineage<M> {
    pub fn top_score(&self) -> f64 {
        self.individuals
            .first()
            .map(|individual| individual.score)
            .unwrap_or(f64::NEG_INFINITY)
    }

    pub fn bottom_score(&self) -> f64 {
        self.individuals
            .last()
            .map(|individual| individual.score)
            .unwrap_or(f64::INFINITY)
    }
}

/// Lineages of one variant name, ordered by their top score.
#[derive(Debug, Clone)]
pub struct NamedPool<M> {
    pub name: String,
    pub lineages: Vec<Lineage<M>>,
}

impl<M> NamedPool<M> {
    pub fn lineage(&self, id: &LineageId) -> Option<&Lineage<M>> {
        self.lineages.iter().find(|lineage| &lineage.id == id)
    }

    pub fn top_score(&self) -> f64 {
        self.lineages
            .first()
            .map(Lineage::top_score)
            .unwrap_or(f64::NEG_INFINITY)
    }

    pub fn individuals(&self) -> impl Iterator<Item = &Individual<M>> {
        self.lineages
            .iter()
            .flat_map(|lineage| lineage.individuals.iter())
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot<M> {
    pub(crate) version: u64,
    pub(crate) names: Vec<NamedPool<M>>,
}

impl<M> Snapshot<M> {
    pub fn empty() -> Self {
        Self {
            version: 0,
            names: Vec::new(),
        }
    }

    /// Logical publish counter; strictly increases with every replacement.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Names ordered by their best lineage's top score.
    pub fn names(&self) -> &[NamedPool<M>] {
        &self.names
    }

    pub fn named(&self, name: &str) -> Option<&NamedPool<M>> {
        self.names.iter().find(|pool| pool.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names
            .iter()
            .flat_map(|pool| pool.lineages.iter())
            .map(|lineage| lineage.individuals.len())
            .sum()
    }
}

impl<M> Default for Snapshot<M> {
    fn default() -> Self {
        Self::empty()
    }
}
