//! Winner tracking and promotion for a continuously running evolutionary
//! simulation: live winners are remembered, re-tested as trials and promoted
//! into a durable finalist leaderboard.

pub mod candidates;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod genome;
pub mod parallel;
pub mod pool;
pub mod promotion;
pub mod rng;
pub mod sim;

pub use candidates::CandidateQueue;
pub use config::{EngineConfig, PoolLimits, UnscoredDeath};
pub use error::{PodiumError, Result};
pub use genome::{Genome, GenomeId, InstanceToken, LineageId, LiveInstance, TrialToken};
pub use pool::{
    Descriptor, DescriptorPool, FinalistRecord, Individual, LivePool, Living, RankedPool, Snapshot,
};
pub use promotion::{PromotionCoordinator, RefreshReport, TrialCandidate};
