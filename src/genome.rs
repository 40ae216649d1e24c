//! Identity types and the collaborator traits the engine consumes.
//!
//! The engine never looks inside a genome. It only needs the stable identity
//! (`name`, `lineage`, `generation`) to group individuals, and for live ships a
//! globally unique token plus a way to snapshot the genome they run.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a mutation branch. Generated ids are uuid v4 text; hosts may
/// also supply their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineageId(String);

impl LineageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LineageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LineageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for LineageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity fields of a genome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomeId {
    /// Variant type name; pools rank per name.
    pub name: String,
    pub lineage: LineageId,
    pub generation: u32,
}

impl GenomeId {
    pub fn new(name: impl Into<String>, lineage: impl Into<LineageId>, generation: u32) -> Self {
        Self {
            name: name.into(),
            lineage: lineage.into(),
            generation,
        }
    }

    /// Same name, fresh lineage, generation zero.
    pub fn founder(name: impl Into<String>) -> Self {
        Self::new(name, LineageId::generate(), 0)
    }

    /// Same name and lineage, next generation.
    pub fn offspring(&self) -> Self {
        Self {
            name: self.name.clone(),
            lineage: self.lineage.clone(),
            generation: self.generation.saturating_add(1),
        }
    }
}

/// Token of a live instance. Never reused for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceToken(pub u64);

impl fmt::Display for InstanceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ship#{}", self.0)
    }
}

/// Correlates spawned ships with the trial that requested them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrialToken(pub u64);

impl fmt::Display for TrialToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trial#{}", self.0)
    }
}

/// Inert genetic data.
pub trait Genome: Clone + Send + Sync + 'static {
    fn genome_id(&self) -> &GenomeId;
}

/// Handle to a ship currently running in the simulation.
pub trait LiveInstance: Clone + Send + Sync + 'static {
    type Genome: Genome;

    fn token(&self) -> InstanceToken;

    fn genome_id(&self) -> &GenomeId;

    /// Copy of the genome this ship runs, detached from the instance.
    fn snapshot(&self) -> Self::Genome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_lineages_are_distinct() {
        let a = LineageId::generate();
        let b = LineageId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn offspring_keeps_lineage_and_bumps_generation() {
        let parent = GenomeId::new("climber", "A", 4);
        let child = parent.offspring();
        assert_eq!(child.name, "climber");
        assert_eq!(child.lineage, LineageId::from("A"));
        assert_eq!(child.generation, 5);
    }
}
