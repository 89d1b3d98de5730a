#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::gating::GainSnapshot;

/// Whether a trial learns (study) or tests recall (probe).
///
/// Every mode-dependent decision of a trial lives in a method here, each one an
/// exhaustive `match`, so a new mode cannot silently fall through a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrialMode {
    Study,
    Probe,
}

impl TrialMode {
    /// Recall-source -> recall relative gain while the recall module drives
    /// the completion module. Probe trials use the weakened value so they lean
    /// on recall rather than on direct cueing.
    pub fn recall_source_gain(self, base: &GainSnapshot, probe_value: f32) -> f32 {
        match self {
            TrialMode::Study => base.recall_source_to_recall,
            TrialMode::Probe => probe_value,
        }
    }

    /// Clamp the target-representation module to the cue-time state during
    /// the Settle phase.
    pub fn teacher_forces(self) -> bool {
        match self {
            TrialMode::Study => true,
            TrialMode::Probe => false,
        }
    }

    /// Ask the engine for a weight update after a completed Settle phase.
    pub fn updates_weights(self) -> bool {
        match self {
            TrialMode::Study => true,
            TrialMode::Probe => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TrialMode::Study => "study",
            TrialMode::Probe => "probe",
        }
    }
}

impl core::fmt::Display for TrialMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_study_forces_and_learns() {
        assert!(TrialMode::Study.teacher_forces() && TrialMode::Study.updates_weights());
        assert!(!TrialMode::Probe.teacher_forces() && !TrialMode::Probe.updates_weights());
    }

    #[test]
    fn probe_uses_configured_recall_source_gain() {
        let base = GainSnapshot::default();
        assert_eq!(TrialMode::Study.recall_source_gain(&base, 0.5), 4.0);
        assert_eq!(TrialMode::Probe.recall_source_gain(&base, 0.5), 0.5);
    }
}
