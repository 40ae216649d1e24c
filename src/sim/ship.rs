//! Toy ships: a gene vector whose distance to a fixed target sets the climb rate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::genome::{Genome, GenomeId, InstanceToken, LiveInstance, TrialToken};
use crate::rng::Rng;

/// Gene values the climb rate peaks at. Genes past the end aim for 0.
const TARGET: [f64; 6] = [0.8, -0.3, 0.5, 0.1, -0.6, 0.9];
const PEAK_CLIMB_RATE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToyGenome {
    pub id: GenomeId,
    pub genes: Vec<f64>,
}

impl Genome for ToyGenome {
    fn genome_id(&self) -> &GenomeId {
        &self.id
    }
}

impl ToyGenome {
    pub fn random(name: &str, gene_count: usize, rng: &mut Rng) -> Self {
        Self {
            id: GenomeId::founder(name),
            genes: (0..gene_count).map(|_| rng.range_f64(-1.0, 1.0)).collect(),
        }
    }

    /// Child in the same lineage with every gene nudged by up to `scale`.
    pub fn mutate(&self, scale: f64, rng: &mut Rng) -> Self {
        Self {
            id: self.id.offspring(),
            genes: self
                .genes
                .iter()
                .map(|gene| (gene + rng.range_f64(-scale, scale)).clamp(-1.0, 1.0))
                .collect(),
        }
    }

    /// Height gained per tick before noise.
    pub fn climb_rate(&self) -> f64 {
        let distance_sq: f64 = self
            .genes
            .iter()
            .enumerate()
            .map(|(index, gene)| {
                let target = TARGET.get(index).copied().unwrap_or(0.0);
                (gene - target).powi(2)
            })
            .sum();
        PEAK_CLIMB_RATE / (1.0 + distance_sq)
    }
}

/// What the engine holds for a running ship.
#[derive(Debug, Clone)]
pub struct ShipHandle {
    token: InstanceToken,
    genome: Arc<ToyGenome>,
}

impl ShipHandle {
    pub fn new(token: InstanceToken, genome: ToyGenome) -> Self {
        Self {
            token,
            genome: Arc::new(genome),
        }
    }

    pub fn genome(&self) -> &ToyGenome {
        &self.genome
    }
}

impl LiveInstance for ShipHandle {
    type Genome = ToyGenome;

    fn token(&self) -> InstanceToken {
        self.token
    }

    fn genome_id(&self) -> &GenomeId {
        &self.genome.id
    }

    fn snapshot(&self) -> ToyGenome {
        self.genome.as_ref().clone()
    }
}

/// Simulation-side state of a running ship.
#[derive(Debug, Clone)]
pub struct Ship {
    pub handle: ShipHandle,
    /// Trial this ship was spawned for, if any.
    pub trial: Option<TrialToken>,
    pub height: f64,
    pub age: u32,
    lifetime: u32,
    crash_chance: f64,
    crashed: bool,
    rng: Rng,
}

impl Ship {
    pub fn new(
        handle: ShipHandle,
        trial: Option<TrialToken>,
        lifetime: u32,
        crash_chance: f64,
        seed: u64,
    ) -> Self {
        Self {
            handle,
            trial,
            height: 0.0,
            age: 0,
            lifetime,
            crash_chance,
            crashed: false,
            rng: Rng::new(seed),
        }
    }

    /// One tick of climbing. A crash (terrain collision) ends the run early.
    pub fn step(&mut self) {
        if self.is_dead() {
            return;
        }
        self.age += 1;
        if self.rng.next_f64() < self.crash_chance {
            self.crashed = true;
            return;
        }
        let noise = self.rng.range_f64(0.5, 1.5);
        self.height += self.handle.genome().climb_rate() * noise;
    }

    pub fn is_dead(&self) -> bool {
        self.crashed || self.age >= self.lifetime
    }

    pub fn token(&self) -> InstanceToken {
        self.handle.token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_genes_climb_fastest() {
        let best = ToyGenome {
            id: GenomeId::founder("climber"),
            genes: TARGET.to_vec(),
        };
        let worse = ToyGenome {
            id: GenomeId::founder("climber"),
            genes: vec![0.0; TARGET.len()],
        };
        assert_eq!(best.climb_rate(), PEAK_CLIMB_RATE);
        assert!(worse.climb_rate() < best.climb_rate());
    }

    #[test]
    fn mutation_stays_in_lineage_and_bounds() {
        let mut rng = Rng::new(1);
        let parent = ToyGenome::random("climber", 6, &mut rng);
        let child = parent.mutate(0.5, &mut rng);
        assert_eq!(child.id.lineage, parent.id.lineage);
        assert_eq!(child.id.generation, 1);
        assert!(child.genes.iter().all(|gene| (-1.0..=1.0).contains(gene)));
    }

    #[test]
    fn ship_dies_at_lifetime() {
        let mut rng = Rng::new(2);
        let handle = ShipHandle::new(InstanceToken(1), ToyGenome::random("climber", 3, &mut rng));
        let mut ship = Ship::new(handle, None, 3, 0.0, 9);
        for _ in 0..5 {
            ship.step();
        }
        assert!(ship.is_dead());
        assert_eq!(ship.age, 3);
        assert!(ship.height > 0.0);
    }
}
