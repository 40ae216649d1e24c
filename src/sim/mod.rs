//! Headless host loop that drives a [PromotionCoordinator] with toy ships.
//!
//! Every tick: step all ships in parallel, post scores that clear the live
//! pool's admission threshold, report deaths, refresh, then refill each
//! variant's population. Trials are spawned one ship at a time per variant;
//! everything else is a mutation of a live or finalist winner, or a fresh
//! founder when there is nothing to breed from.

pub mod ship;

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::genome::{InstanceToken, LiveInstance, TrialToken};
use crate::parallel::WorkerPool;
use crate::pool::{DescriptorPool, Individual};
use crate::promotion::{pick_parent, PromotionCoordinator, RefreshReport};
use crate::rng::Rng;

pub use ship::{Ship, ShipHandle, ToyGenome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub variants: Vec<String>,
    /// Ships kept alive per variant.
    pub population: usize,
    pub gene_count: usize,
    pub lifetime: u32,
    /// Per-tick chance that a ship hits the terrain and dies.
    pub crash_chance: f64,
    pub mutation_scale: f64,
    /// Chance that a spawn starts a new lineage even when parents exist.
    pub founder_chance: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            variants: vec!["climber".to_string(), "hopper".to_string()],
            population: 12,
            gene_count: 6,
            lifetime: 20,
            crash_chance: 0.02,
            mutation_scale: 0.15,
            founder_chance: 0.1,
        }
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub ticks: u64,
    pub spawned: usize,
    pub trial_ships: usize,
    pub deaths: usize,
    pub nominated: usize,
    pub promoted: usize,
    pub discarded: usize,
    pub finalists: usize,
    pub best_finalist: BTreeMap<String, f64>,
    pub best_live: BTreeMap<String, f64>,
}

impl SimulationSummary {
    fn absorb(&mut self, report: &RefreshReport) {
        self.deaths += report.deaths;
        self.nominated += report.nominated;
        self.promoted += report.promoted;
        self.discarded += report.discarded;
    }
}

pub struct World {
    coordinator: PromotionCoordinator<ShipHandle>,
    config: SimConfig,
    ships: Vec<Ship>,
    workers: WorkerPool,
    rng: Rng,
    next_token: u64,
    summary: SimulationSummary,
}

impl World {
    pub fn new(engine: EngineConfig, config: SimConfig, seed: u64, workers: WorkerPool) -> Self {
        Self::with_coordinator(PromotionCoordinator::new(engine), config, seed, workers)
    }

    /// Resume with a finalist pool restored from disk.
    pub fn with_finalists(
        engine: EngineConfig,
        finals: DescriptorPool<ToyGenome>,
        config: SimConfig,
        seed: u64,
        workers: WorkerPool,
    ) -> Self {
        Self::with_coordinator(
            PromotionCoordinator::with_finalists(engine, finals),
            config,
            seed,
            workers,
        )
    }

    fn with_coordinator(
        coordinator: PromotionCoordinator<ShipHandle>,
        config: SimConfig,
        seed: u64,
        workers: WorkerPool,
    ) -> Self {
        Self {
            coordinator,
            config,
            ships: Vec::new(),
            workers,
            rng: Rng::new(seed),
            next_token: 1,
            summary: SimulationSummary::default(),
        }
    }

    pub fn coordinator(&self) -> &PromotionCoordinator<ShipHandle> {
        &self.coordinator
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn run(&mut self, ticks: u64) -> Result<SimulationSummary> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(self.finish())
    }

    pub fn tick(&mut self) -> Result<RefreshReport> {
        self.populate()?;

        let ships = &mut self.ships;
        self.workers
            .install(|| ships.par_iter_mut().for_each(Ship::step));

        let live = self.coordinator.live();
        let mut live_scores = Vec::new();
        let mut trial_scores = Vec::new();
        for ship in &self.ships {
            let name = &ship.handle.genome_id().name;
            if live
                .admission_threshold(name)
                .is_some_and(|threshold| ship.height <= threshold)
            {
                continue;
            }
            match ship.trial {
                Some(_) => trial_scores.push((ship.token(), ship.height)),
                None => live_scores.push(Individual::living(
                    ship.handle.clone(),
                    ship.height,
                    f64::from(ship.age),
                )),
            }
        }

        let dead: Vec<InstanceToken> = self
            .ships
            .iter()
            .filter(|ship| ship.is_dead())
            .map(Ship::token)
            .collect();
        for token in &dead {
            self.coordinator.ship_died(*token);
        }
        self.ships.retain(|ship| !ship.is_dead());

        let report = self.coordinator.refresh_winners(live_scores, trial_scores);
        self.summary.absorb(&report);
        self.summary.ticks += 1;
        if report.promoted > 0 {
            tracing::info!(tick = self.summary.ticks, promoted = report.promoted, "finalists promoted");
        }
        Ok(report)
    }

    /// Wait for background merges and produce the run totals.
    pub fn finish(&mut self) -> SimulationSummary {
        self.coordinator.settle();
        let finals = self.coordinator.finals();
        self.summary.finalists = finals.snapshot().len();
        self.summary.best_finalist = finals.maxes_by_name();
        self.summary.best_live = self.coordinator.live().maxes_by_name();
        self.summary.clone()
    }

    fn populate(&mut self) -> Result<()> {
        let variants = self.config.variants.clone();
        for name in &variants {
            let alive = self
                .ships
                .iter()
                .filter(|ship| &ship.handle.genome_id().name == name)
                .count();
            for _ in alive..self.config.population {
                self.spawn(name)?;
            }
        }
        Ok(())
    }

    fn spawn(&mut self, name: &str) -> Result<()> {
        let token = InstanceToken(self.next_token);
        self.next_token += 1;
        let seed = self.rng.next_u64();

        if !self.coordinator.has_living_candidate(name) {
            if let Some((trial, genome)) = self.coordinator.candidate(name) {
                let handle = ShipHandle::new(token, genome);
                self.coordinator.ship_created(trial, &handle)?;
                self.push_ship(handle, Some(trial), seed);
                self.summary.trial_ships += 1;
                return Ok(());
            }
        }

        let founder = self.rng.next_f64() < self.config.founder_chance;
        let genome = match pick_parent(&self.coordinator, name) {
            Some(parent) if !founder => parent.mutate(self.config.mutation_scale, &mut self.rng),
            _ => ToyGenome::random(name, self.config.gene_count, &mut self.rng),
        };
        self.push_ship(ShipHandle::new(token, genome), None, seed);
        Ok(())
    }

    fn push_ship(&mut self, handle: ShipHandle, trial: Option<TrialToken>, seed: u64) {
        self.ships.push(Ship::new(
            handle,
            trial,
            self.config.lifetime,
            self.config.crash_chance,
            seed,
        ));
        self.summary.spawned += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolLimits;

    fn small_world(seed: u64) -> World {
        let engine = EngineConfig {
            live: PoolLimits::new(64, 3),
            ..EngineConfig::default()
        };
        let config = SimConfig {
            variants: vec!["climber".to_string()],
            population: 6,
            lifetime: 5,
            crash_chance: 0.0,
            ..SimConfig::default()
        };
        World::new(engine, config, seed, WorkerPool::global())
    }

    #[test]
    fn population_is_refilled_every_tick() {
        let mut world = small_world(3);
        for _ in 0..12 {
            world.tick().unwrap();
            assert!(world.ships().len() <= 6);
        }
        let summary = world.finish();
        assert_eq!(summary.ticks, 12);
        assert!(summary.deaths > 0);
        assert!(summary.spawned >= 6);
    }

    #[test]
    fn long_run_promotes_finalists() {
        let mut world = small_world(17);
        let summary = world.run(200).unwrap();
        assert!(summary.nominated > 0, "{summary:?}");
        assert!(summary.trial_ships > 0, "{summary:?}");
        assert!(summary.promoted > 0, "{summary:?}");
        assert!(summary.finalists > 0, "{summary:?}");
        assert!(summary.best_finalist.contains_key("climber"));
    }
}
