#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One of the four fixed settling phases of a trial.
///
/// A trial always runs `Cue -> Recall -> Completion -> Settle`; no phase is
/// skipped and the count is not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Phase {
    /// The cue drives the completion module directly.
    Cue,
    /// The recall module drives the completion module.
    Recall,
    /// Recall continues; the last point at which the output is scored.
    Completion,
    /// Back to cue drive. Study trials clamp the target representation here.
    Settle,
}

impl Phase {
    pub const COUNT: usize = 4;

    pub const ALL: [Phase; Phase::COUNT] =
        [Phase::Cue, Phase::Recall, Phase::Completion, Phase::Settle];

    /// Zero-based position within the trial.
    pub fn index(self) -> usize {
        match self {
            Phase::Cue => 0,
            Phase::Recall => 1,
            Phase::Completion => 2,
            Phase::Settle => 3,
        }
    }

    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Cue => Some(Phase::Recall),
            Phase::Recall => Some(Phase::Completion),
            Phase::Completion => Some(Phase::Settle),
            Phase::Settle => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Cue => "cue",
            Phase::Recall => "recall",
            Phase::Completion => "completion",
            Phase::Settle => "settle",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
