//! Phase-gated settling trials and completion scoring for a paired-associate
//! hippocampal memory model.
//!
//! A trial runs four fixed phases (cue, recall, completion, settle) on a
//! [`engine::SettlingEngine`], rewriting three pathway gains at each boundary
//! and scoring the target module after the completion phase. The crate ships
//! a reference engine ([`network::Hippocampus`]) and an AB-AC interference
//! experiment built on it.

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/phase.rs"]
pub mod phase;

#[path = "core/mode.rs"]
pub mod mode;

#[path = "core/gating.rs"]
pub mod gating;

#[path = "core/scorer.rs"]
pub mod scorer;

#[path = "core/engine.rs"]
pub mod engine;

#[path = "core/scheduler.rs"]
pub mod scheduler;

#[path = "core/patterns.rs"]
pub mod patterns;

#[path = "core/network.rs"]
pub mod network;

#[path = "core/stats.rs"]
pub mod stats;

#[path = "core/driver.rs"]
pub mod driver;

#[path = "experiments/ab_ac.rs"]
pub mod experiment;

pub mod config;
pub mod error;
pub mod observer;

pub use config::SimConfig;
pub use engine::{CircuitRoles, SettlingEngine};
pub use gating::{GainController, GainSnapshot, GatingProfile, Pathway};
pub use mode::TrialMode;
pub use phase::Phase;
pub use scheduler::{CycleObserver, PhaseScheduler, StopFlag, TrialOutcome};
pub use scorer::{score, CompletionRecord, RecallOutcome};
