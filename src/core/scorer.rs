//! Completion scoring.
//!
//! Compares the terminal state of the target-representation module with the
//! full studied pattern, splitting errors three ways:
//!
//! - target-on units that ended up off (`target_on_missed`),
//! - the same, restricted to units that were *not* visible in the cue and so
//!   had to be completed by recall (`target_on_missed_among_completion_units`),
//! - target-off units that ended up on (`target_off_falsely_on`).
//!
//! Study trials are judged on the all-units miss rate; probe trials only on the
//! completion units, so copying the visible cue earns no credit.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ScoreError;
use crate::mode::TrialMode;

/// Binary cut for "on" used for targets and activations alike.
pub const ON_CUTOFF: f32 = 0.5;

/// Thresholded recall judgment for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecallOutcome {
    Success,
    Failure,
    /// Probe trial whose cue already contained every target-on unit: there was
    /// nothing to complete.
    NotApplicable,
}

impl RecallOutcome {
    /// `Some(1.0)` / `Some(0.0)`, or `None` when not applicable.
    pub fn as_rate(self) -> Option<f32> {
        match self {
            RecallOutcome::Success => Some(1.0),
            RecallOutcome::Failure => Some(0.0),
            RecallOutcome::NotApplicable => None,
        }
    }

    fn from_bool(ok: bool) -> Self {
        if ok {
            RecallOutcome::Success
        } else {
            RecallOutcome::Failure
        }
    }
}

/// Result of scoring one trial. Proportions are `None` when their denominator
/// is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompletionRecord {
    pub target_on_missed: Option<f32>,
    pub target_on_missed_among_completion_units: Option<f32>,
    pub target_off_falsely_on: Option<f32>,

    pub target_on_count: usize,
    pub target_off_count: usize,
    pub completion_demand_count: usize,
    pub missed_all: usize,
    pub missed_completion: usize,
    pub falsely_on: usize,

    pub recall: RecallOutcome,
}

impl CompletionRecord {
    pub fn recall_success(&self) -> bool {
        self.recall == RecallOutcome::Success
    }
}

/// Score one trial.
///
/// `target` is the full studied pattern, `cue_time` the cue module's state at
/// the end of the Cue phase, `terminal` the target-representation module's
/// state when the Completion phase ends.
pub fn score(
    target: &[f32],
    cue_time: &[f32],
    terminal: &[f32],
    threshold: f32,
    mode: TrialMode,
) -> Result<CompletionRecord, ScoreError> {
    if target.len() != cue_time.len() || target.len() != terminal.len() {
        return Err(ScoreError::LengthMismatch {
            target: target.len(),
            cue_time: cue_time.len(),
            terminal: terminal.len(),
        });
    }
    if target.is_empty() {
        return Err(ScoreError::EmptyPattern);
    }
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ScoreError::InvalidThreshold(threshold));
    }

    let mut target_on_count = 0usize;
    let mut target_off_count = 0usize;
    let mut completion_demand_count = 0usize;
    let mut missed_all = 0usize;
    let mut missed_completion = 0usize;
    let mut falsely_on = 0usize;

    for ((&t, &cue), &act) in target.iter().zip(cue_time).zip(terminal) {
        if t >= ON_CUTOFF {
            target_on_count += 1;
            let missed = act < ON_CUTOFF;
            if missed {
                missed_all += 1;
            }
            if cue < ON_CUTOFF {
                completion_demand_count += 1;
                if missed {
                    missed_completion += 1;
                }
            }
        } else {
            target_off_count += 1;
            if act > ON_CUTOFF {
                falsely_on += 1;
            }
        }
    }

    let target_on_missed = ratio(missed_all, target_on_count);
    let target_on_missed_among_completion_units =
        ratio(missed_completion, completion_demand_count);
    let target_off_falsely_on = ratio(falsely_on, target_off_count);

    // Undefined proportions are left out of the check rather than compared.
    let below = |p: Option<f32>| p.map_or(true, |v| v < threshold);

    let recall = match mode {
        TrialMode::Study => {
            RecallOutcome::from_bool(below(target_on_missed) && below(target_off_falsely_on))
        }
        TrialMode::Probe => match target_on_missed_among_completion_units {
            None => RecallOutcome::NotApplicable,
            Some(missed) => {
                RecallOutcome::from_bool(missed < threshold && below(target_off_falsely_on))
            }
        },
    };

    Ok(CompletionRecord {
        target_on_missed,
        target_on_missed_among_completion_units,
        target_off_falsely_on,
        target_on_count,
        target_off_count,
        completion_demand_count,
        missed_all,
        missed_completion,
        falsely_on,
        recall,
    })
}

fn ratio(num: usize, den: usize) -> Option<f32> {
    if den == 0 {
        None
    } else {
        Some(num as f32 / den as f32)
    }
}
