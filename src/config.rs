//! Engine configuration: pool limits, trial sizing and death policy.
//! Read from JSON or YAML; a missing file yields the defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PodiumError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "data/podium.yaml";
pub const CONFIG_ENV_VAR: &str = "PODIUM_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    pub max_lineages: usize,
    pub max_per_lineage: usize,
}

impl PoolLimits {
    pub const fn new(max_lineages: usize, max_per_lineage: usize) -> Self {
        Self {
            max_lineages,
            max_per_lineage,
        }
    }
}

/// What a trial run that dies before posting any score counts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscoredDeath {
    /// The run finishes with score 0 and is included in the average.
    #[default]
    CountAsZero,
    /// The run is forgotten; the trial spawns a replacement.
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Limits for the pool of currently living winners.
    pub live: PoolLimits,
    /// Limits for the permanent finalist leaderboard.
    pub finals: PoolLimits,
    /// Independent runs averaged before a candidate may be promoted.
    pub finalist_count: usize,
    /// Entries kept per name when the candidate queue compacts.
    pub candidate_cap: usize,
    /// The queue compacts once a name holds more than `candidate_cap * compaction_factor`.
    pub compaction_factor: usize,
    /// Averages with magnitude at or below this are never promoted.
    pub near_zero: f64,
    pub unscored_death: UnscoredDeath,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            live: PoolLimits::new(8, 3),
            finals: PoolLimits::new(16, 4),
            finalist_count: 3,
            candidate_cap: 33,
            compaction_factor: 3,
            near_zero: 1e-6,
            unscored_death: UnscoredDeath::CountAsZero,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();
        for (label, limits) in [("live", self.live), ("finals", self.finals)] {
            if limits.max_lineages == 0 {
                issues.push(format!("{label}.max_lineages must be at least 1"));
            }
            if limits.max_per_lineage == 0 {
                issues.push(format!("{label}.max_per_lineage must be at least 1"));
            }
        }
        if self.finalist_count == 0 {
            issues.push("finalist_count must be at least 1".to_string());
        }
        if self.candidate_cap == 0 {
            issues.push("candidate_cap must be at least 1".to_string());
        }
        if self.compaction_factor < 1 {
            issues.push("compaction_factor must be at least 1".to_string());
        }
        if !self.near_zero.is_finite() || self.near_zero < 0.0 {
            issues.push("near_zero must be a finite non-negative number".to_string());
        }
        if issues.is_empty() {
            Ok(())
        } else {
            Err(PodiumError::InvalidConfig(issues.join("; ")))
        }
    }

    /// Parse from text; `yaml` selects the YAML reader, otherwise JSON.
    pub fn parse(raw: &str, yaml: bool) -> Result<Self> {
        let config: Self = if yaml {
            serde_yaml::from_str(raw)?
        } else {
            serde_json::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }
}

/// Load config from `path`. A missing file yields [EngineConfig::default];
/// an unreadable or invalid file is an error.
pub fn load_config(path: &str) -> Result<EngineConfig> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(EngineConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    let yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    EngineConfig::parse(&raw, yaml)
}

/// Path from [CONFIG_ENV_VAR], or [DEFAULT_CONFIG_PATH].
pub fn config_path_from_env() -> String {
    std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}
