//! Error types.
//!
//! Scoring and gating are plain arithmetic; these errors only report caller
//! contract violations (wrong lengths, unknown modules, bad configuration).

use thiserror::Error;

use crate::gating::Pathway;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("pattern length mismatch: target={target} cue_time={cue_time} terminal={terminal}")]
    LengthMismatch {
        target: usize,
        cue_time: usize,
        terminal: usize,
    },

    #[error("cannot score an empty pattern")]
    EmptyPattern,

    #[error("threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f32),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("unknown module `{0}`")]
    UnknownModule(String),

    #[error("module `{module}` has {expected} units, pattern has {actual}")]
    PatternLength {
        module: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GainError {
    #[error("gain for {pathway} must be finite and >= 0, got {value}")]
    Invalid { pathway: Pathway, value: f32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrialError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Gain(#[from] GainError),

    #[error("trial finished without a completion record")]
    Unscored,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(&'static str),

    #[error(transparent)]
    Gain(#[from] GainError),

    #[error("config I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("run {run}: {source}")]
    Trial {
        run: usize,
        #[source]
        source: TrialError,
    },

    #[error("epoch log I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("epoch log JSON: {0}")]
    Json(#[from] serde_json::Error),
}
