//! The seam between the trial logic and whatever computes activations.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::gating::GainStore;
use crate::phase::Phase;

/// A cycle-stepped recurrent network.
///
/// The scheduler only sequences calls; it never computes activations or
/// weight changes itself.
pub trait SettlingEngine: GainStore {
    /// Reset transient activity before a trial. Learned weights are kept.
    fn begin_trial(&mut self);

    /// Clamp `module` to `pattern` until cleared or replaced.
    fn apply_external_input(&mut self, module: &str, pattern: &[f32]) -> Result<(), EngineError>;

    fn clear_external_input(&mut self, module: &str) -> Result<(), EngineError>;

    /// One activation-update step.
    fn run_cycle(&mut self);

    /// Called after the last cycle of each phase.
    fn end_phase(&mut self, phase: Phase);

    fn unit_activation(&self, module: &str, unit: usize) -> Option<f32>;

    fn module_len(&self, module: &str) -> Option<usize>;

    /// Apply the weight change accumulated over the trial that just finished.
    fn request_weight_update(&mut self);

    /// All activations of `module`.
    fn module_activations(&self, module: &str) -> Result<Vec<f32>, EngineError> {
        let n = self
            .module_len(module)
            .ok_or_else(|| EngineError::UnknownModule(module.to_string()))?;
        (0..n)
            .map(|i| {
                self.unit_activation(module, i)
                    .ok_or_else(|| EngineError::UnknownModule(module.to_string()))
            })
            .collect()
    }
}

/// Which engine module plays which role in a trial.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CircuitRoles {
    /// Receives the cue / study pattern.
    pub cue: String,
    /// Feeds the recall module (gated by the recall-source pathway).
    pub recall_source: String,
    /// Associative recall module.
    pub recall: String,
    /// Driven alternately by the cue and recall modules.
    pub completion: String,
    /// Output that is scored and, during study, teacher-forced.
    pub target: String,
}

impl Default for CircuitRoles {
    fn default() -> Self {
        Self {
            cue: "ECin".to_string(),
            recall_source: "DG".to_string(),
            recall: "CA3".to_string(),
            completion: "CA1".to_string(),
            target: "ECout".to_string(),
        }
    }
}
