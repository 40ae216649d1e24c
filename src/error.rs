use thiserror::Error;

use crate::genome::TrialToken;

/// Errors raised by the engine and its host-side file handling.
///
/// Lookups that find nothing (`winner`, `candidate`, `pop`) return `None`
/// instead; only caller contract violations and I/O land here.
#[derive(Debug, Error)]
pub enum PodiumError {
    #[error("unknown trial token {0}")]
    UnknownTrial(TrialToken),
    #[error("trial {trial} is incomplete: {finished} of {started} runs finished")]
    TrialIncomplete {
        trial: TrialToken,
        started: usize,
        finished: usize,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, PodiumError>;
