//! Paired-associate pattern lists.
//!
//! A pattern is an item half followed by an associate half. AB and AC share
//! their items and differ in associates, which is what makes AC learning
//! interfere with AB. Lures are fresh items with fresh associates.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::PatternConfig;
use crate::prng::Prng;

/// Input applied to the cue module plus the full pattern the trial is scored
/// against.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PatternPair {
    pub name: String,
    pub cue: Vec<f32>,
    pub target: Vec<f32>,
}

impl PatternPair {
    /// Study presentation: the whole pattern is visible.
    pub fn study(name: impl Into<String>, item: &[f32], associate: &[f32]) -> Self {
        let mut target = Vec::with_capacity(item.len() + associate.len());
        target.extend_from_slice(item);
        target.extend_from_slice(associate);
        Self {
            name: name.into(),
            cue: target.clone(),
            target,
        }
    }

    /// Probe presentation: units from `item_len` on are blanked in the cue.
    pub fn probe(&self, item_len: usize) -> Self {
        let mut cue = self.target.clone();
        for x in cue.iter_mut().skip(item_len) {
            *x = 0.0;
        }
        Self {
            name: self.name.clone(),
            cue,
            target: self.target.clone(),
        }
    }
}

/// One named list with matching study and probe presentations.
#[derive(Debug, Clone, PartialEq)]
pub struct PairList {
    pub name: String,
    pub study: Vec<PatternPair>,
    pub probe: Vec<PatternPair>,
}

impl PairList {
    fn new(name: &str, study: Vec<PatternPair>, item_len: usize) -> Self {
        let probe = study.iter().map(|p| p.probe(item_len)).collect();
        Self {
            name: name.to_string(),
            study,
            probe,
        }
    }

    pub fn len(&self) -> usize {
        self.study.len()
    }

    pub fn is_empty(&self) -> bool {
        self.study.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternLists {
    pub ab: PairList,
    pub ac: PairList,
    pub lure: PairList,
}

impl PatternLists {
    pub fn generate(cfg: &PatternConfig, rng: &mut Prng) -> Self {
        let n = cfg.pairs;
        let half = cfg.half_units;
        let on = cfg.active_per_half;

        let a = permuted_binary(n, half, on, rng);
        let b = permuted_binary(n, half, on, rng);
        let c = permuted_binary(n, half, on, rng);
        let lure_items = permuted_binary(n, half, on, rng);
        let lure_assoc = permuted_binary(n, half, on, rng);

        let ab = (0..n)
            .map(|i| PatternPair::study(format!("a{i}-b{i}"), &a[i], &b[i]))
            .collect();
        let ac = (0..n)
            .map(|i| PatternPair::study(format!("a{i}-c{i}"), &a[i], &c[i]))
            .collect();
        let lure = (0..n)
            .map(|i| PatternPair::study(format!("lure{i}"), &lure_items[i], &lure_assoc[i]))
            .collect();

        Self {
            ab: PairList::new("AB", ab, half),
            ac: PairList::new("AC", ac, half),
            lure: PairList::new("Lure", lure, half),
        }
    }

    /// Total width of one pattern.
    pub fn pattern_len(&self) -> usize {
        self.ab.study.first().map_or(0, |p| p.target.len())
    }
}

/// `n_patterns` binary patterns of `n_units`, each with exactly `n_on` ones at
/// independently permuted positions. `n_on` is capped at `n_units`.
pub fn permuted_binary(n_patterns: usize, n_units: usize, n_on: usize, rng: &mut Prng) -> Vec<Vec<f32>> {
    let n_on = n_on.min(n_units);
    (0..n_patterns)
        .map(|_| {
            let mut p = vec![0.0; n_units];
            for &i in rng.permutation(n_units).iter().take(n_on) {
                p[i] = 1.0;
            }
            p
        })
        .collect()
}
