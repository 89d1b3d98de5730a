//! Per-trial and per-epoch statistics.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::mode::TrialMode;
use crate::patterns::PatternPair;
use crate::scorer::{CompletionRecord, RecallOutcome, ON_CUTOFF};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrialStats {
    pub list: String,
    pub pair: String,
    pub mode: TrialMode,
    pub record: CompletionRecord,
    /// Summed squared error over units off by more than [`ON_CUTOFF`].
    pub sse: f32,
    pub avg_sse: f32,
    /// Cosine of terminal vs. target; 1 is identical.
    pub cos_diff: f32,
}

impl TrialStats {
    pub fn new(
        list: &str,
        pair: &PatternPair,
        mode: TrialMode,
        record: CompletionRecord,
        terminal: &[f32],
    ) -> Self {
        let sse = sse(&pair.target, terminal);
        let n = pair.target.len().max(1) as f32;
        Self {
            list: list.to_string(),
            pair: pair.name.clone(),
            mode,
            record,
            sse,
            avg_sse: sse / n,
            cos_diff: cosine(&pair.target, terminal),
        }
    }
}

pub fn sse(target: &[f32], actual: &[f32]) -> f32 {
    target
        .iter()
        .zip(actual)
        .map(|(t, a)| t - a)
        .filter(|d| d.abs() > ON_CUTOFF)
        .map(|d| d * d)
        .sum()
}

/// 0 when either vector has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

/// Aggregate over one list's trials in one epoch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EpochStats {
    pub list: String,
    pub trials: usize,
    // Means over the trials where each proportion is defined.
    pub target_on_missed: Option<f32>,
    pub target_on_missed_among_completion_units: Option<f32>,
    pub target_off_falsely_on: Option<f32>,
    /// Successes over applicable trials.
    pub recall_rate: Option<f32>,
    pub not_applicable: usize,
    pub mean_sse: f32,
}

impl EpochStats {
    pub fn aggregate(list: &str, trials: &[TrialStats]) -> Self {
        let recs = || trials.iter().map(|t| &t.record);
        Self {
            list: list.to_string(),
            trials: trials.len(),
            target_on_missed: mean_defined(recs().map(|r| r.target_on_missed)),
            target_on_missed_among_completion_units: mean_defined(
                recs().map(|r| r.target_on_missed_among_completion_units),
            ),
            target_off_falsely_on: mean_defined(recs().map(|r| r.target_off_falsely_on)),
            recall_rate: mean_defined(recs().map(|r| r.recall.as_rate())),
            not_applicable: recs()
                .filter(|r| r.recall == RecallOutcome::NotApplicable)
                .count(),
            mean_sse: if trials.is_empty() {
                0.0
            } else {
                trials.iter().map(|t| t.sse).sum::<f32>() / trials.len() as f32
            },
        }
    }
}

fn mean_defined(values: impl Iterator<Item = Option<f32>>) -> Option<f32> {
    let (sum, n) = values
        .flatten()
        .fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::score;

    fn pair() -> PatternPair {
        PatternPair {
            name: "p".into(),
            cue: vec![1.0, 0.0, 0.0, 0.0],
            target: vec![1.0, 1.0, 0.0, 0.0],
        }
    }

    fn trial(mode: TrialMode, cue_time: &[f32], terminal: &[f32]) -> TrialStats {
        let p = pair();
        let rec = score(&p.target, cue_time, terminal, 0.34, mode).unwrap();
        TrialStats::new("AB", &p, mode, rec, terminal)
    }

    #[test]
    fn sse_ignores_small_errors() {
        assert_eq!(sse(&[1.0, 0.0, 1.0], &[0.6, 0.4, 0.0]), 1.0);
        assert_eq!(sse(&[1.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_of_identical_and_orthogonal() {
        assert!((cosine(&[1.0, 1.0, 0.0], &[1.0, 1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn trial_stats_carry_names_and_errors() {
        let t = trial(TrialMode::Probe, &[1.0, 0.0, 0.0, 0.0], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(t.list, "AB");
        assert_eq!(t.pair, "p");
        assert_eq!(t.sse, 2.0);
        assert_eq!(t.avg_sse, 0.5);
        assert!((t.cos_diff - 0.5).abs() < 1e-6);
    }

    #[test]
    fn epoch_aggregation_skips_undefined_and_not_applicable() {
        let full = [1.0, 1.0, 0.0, 0.0];
        let trials = vec![
            // Recalled: success.
            trial(TrialMode::Probe, &[1.0, 0.0, 0.0, 0.0], &full),
            // Missed the completion unit: failure.
            trial(TrialMode::Probe, &[1.0, 0.0, 0.0, 0.0], &[1.0, 0.0, 0.0, 0.0]),
            // Cue already complete: not applicable, completion proportion undefined.
            trial(TrialMode::Probe, &full, &full),
        ];
        let e = EpochStats::aggregate("AB", &trials);
        assert_eq!(e.trials, 3);
        assert_eq!(e.not_applicable, 1);
        assert_eq!(e.recall_rate, Some(0.5));
        assert_eq!(e.target_on_missed_among_completion_units, Some(0.5));
        assert!((e.target_on_missed.unwrap() - 1.0 / 6.0).abs() < 1e-6);
        assert_eq!(e.target_off_falsely_on, Some(0.0));
        assert!((e.mean_sse - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn empty_epoch_has_no_rates() {
        let e = EpochStats::aggregate("Lure", &[]);
        assert_eq!(e.trials, 0);
        assert_eq!(e.recall_rate, None);
        assert_eq!(e.target_on_missed, None);
        assert_eq!(e.mean_sse, 0.0);
    }
}
