//! Pathway gain gating.
//!
//! Three inter-module pathways have their gain rewritten at phase boundaries.
//! Each configuration is an immutable [`GainSnapshot`]; a trial computes a new
//! snapshot per transition and writes it to the engine's [`GainStore`]. The
//! configured base snapshot is written back when the trial's [`GainRestore`]
//! guard drops, so gating never leaks into the next trial.

use core::ops::{Deref, DerefMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::GainError;

/// A gated, directed inter-module pathway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pathway {
    /// Cue module -> completion module (absolute gain).
    CueToCompletion,
    /// Recall module -> completion module (absolute gain).
    RecallToCompletion,
    /// Recall-source module -> recall module (relative gain).
    RecallSourceToRecall,
}

/// How a gain enters the receiving module's net input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainKind {
    /// Multiplies the pathway's contribution directly.
    Absolute,
    /// Weighted against the other pathways into the same receiver.
    Relative,
}

impl Pathway {
    pub const ALL: [Pathway; 3] = [
        Pathway::CueToCompletion,
        Pathway::RecallToCompletion,
        Pathway::RecallSourceToRecall,
    ];

    pub fn kind(self) -> GainKind {
        match self {
            Pathway::CueToCompletion | Pathway::RecallToCompletion => GainKind::Absolute,
            Pathway::RecallSourceToRecall => GainKind::Relative,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Pathway::CueToCompletion => "cue->completion",
            Pathway::RecallToCompletion => "recall->completion",
            Pathway::RecallSourceToRecall => "recall_source->recall",
        }
    }

    fn slot(self) -> usize {
        match self {
            Pathway::CueToCompletion => 0,
            Pathway::RecallToCompletion => 1,
            Pathway::RecallSourceToRecall => 2,
        }
    }
}

impl core::fmt::Display for Pathway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Read/write access to the live gain of each gated pathway.
pub trait GainStore {
    fn pathway_gain(&self, pathway: Pathway) -> f32;
    fn set_pathway_gain(&mut self, pathway: Pathway, value: f32);
}

/// Plain in-memory gain store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainTable {
    values: [f32; 3],
}

impl GainTable {
    pub fn new(initial: GainSnapshot) -> Self {
        let mut t = Self { values: [0.0; 3] };
        initial.write_to(&mut t);
        t
    }
}

impl GainStore for GainTable {
    fn pathway_gain(&self, pathway: Pathway) -> f32 {
        self.values[pathway.slot()]
    }

    fn set_pathway_gain(&mut self, pathway: Pathway, value: f32) {
        self.values[pathway.slot()] = value;
    }
}

/// One complete, validated gain configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GainSnapshot {
    pub cue_to_completion: f32,
    pub recall_to_completion: f32,
    pub recall_source_to_recall: f32,
}

impl Default for GainSnapshot {
    /// Resting configuration: both completion drivers on, strong mossy-fibre
    /// style recall-source input.
    fn default() -> Self {
        Self {
            cue_to_completion: 1.0,
            recall_to_completion: 1.0,
            recall_source_to_recall: 4.0,
        }
    }
}

impl GainSnapshot {
    pub fn new(
        cue_to_completion: f32,
        recall_to_completion: f32,
        recall_source_to_recall: f32,
    ) -> Result<Self, GainError> {
        let s = Self {
            cue_to_completion,
            recall_to_completion,
            recall_source_to_recall,
        };
        s.validate()?;
        Ok(s)
    }

    pub fn get(&self, pathway: Pathway) -> f32 {
        match pathway {
            Pathway::CueToCompletion => self.cue_to_completion,
            Pathway::RecallToCompletion => self.recall_to_completion,
            Pathway::RecallSourceToRecall => self.recall_source_to_recall,
        }
    }

    /// Copy with one pathway replaced.
    pub fn with(mut self, pathway: Pathway, value: f32) -> Result<Self, GainError> {
        check(pathway, value)?;
        match pathway {
            Pathway::CueToCompletion => self.cue_to_completion = value,
            Pathway::RecallToCompletion => self.recall_to_completion = value,
            Pathway::RecallSourceToRecall => self.recall_source_to_recall = value,
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), GainError> {
        for p in Pathway::ALL {
            check(p, self.get(p))?;
        }
        Ok(())
    }

    /// Capture the live gains of a store.
    pub fn read_from<S: GainStore + ?Sized>(store: &S) -> Self {
        Self {
            cue_to_completion: store.pathway_gain(Pathway::CueToCompletion),
            recall_to_completion: store.pathway_gain(Pathway::RecallToCompletion),
            recall_source_to_recall: store.pathway_gain(Pathway::RecallSourceToRecall),
        }
    }

    pub fn write_to<S: GainStore + ?Sized>(&self, store: &mut S) {
        for p in Pathway::ALL {
            store.set_pathway_gain(p, self.get(p));
        }
    }
}

fn check(pathway: Pathway, value: f32) -> Result<(), GainError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GainError::Invalid { pathway, value })
    }
}

/// Which module drives the completion module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GatingProfile {
    /// The cue alone drives completion; the indirect recall-source pathway is
    /// silenced.
    CueDominant,
    /// Recall drives completion; the recall-source pathway runs at the given
    /// relative gain.
    RecallDominant { recall_source_gain: f32 },
}

/// Computes and applies gating snapshots against a fixed base configuration.
#[derive(Debug, Clone, Copy)]
pub struct GainController {
    base: GainSnapshot,
}

impl GainController {
    pub fn new(base: GainSnapshot) -> Result<Self, GainError> {
        base.validate()?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &GainSnapshot {
        &self.base
    }

    /// The snapshot a profile stands for. Independent of any previous state.
    pub fn gating(&self, profile: GatingProfile) -> Result<GainSnapshot, GainError> {
        match profile {
            GatingProfile::CueDominant => GainSnapshot::new(1.0, 0.0, 0.0),
            GatingProfile::RecallDominant { recall_source_gain } => {
                GainSnapshot::new(0.0, 1.0, recall_source_gain)
            }
        }
    }

    pub fn set_gating<S: GainStore + ?Sized>(
        &self,
        store: &mut S,
        profile: GatingProfile,
    ) -> Result<GainSnapshot, GainError> {
        let snap = self.gating(profile)?;
        snap.write_to(store);
        Ok(snap)
    }

    pub fn restore_base<S: GainStore + ?Sized>(&self, store: &mut S) {
        self.base.write_to(store);
    }

    /// Borrow `store` for the duration of a trial; base gains are written back
    /// when the guard drops, whichever way the trial ends.
    pub fn guard<'a, S: GainStore + ?Sized>(&self, store: &'a mut S) -> GainRestore<'a, S> {
        GainRestore {
            store,
            base: self.base,
        }
    }
}

/// Scoped gain configuration; see [`GainController::guard`].
pub struct GainRestore<'a, S: GainStore + ?Sized> {
    store: &'a mut S,
    base: GainSnapshot,
}

impl<S: GainStore + ?Sized> Deref for GainRestore<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.store
    }
}

impl<S: GainStore + ?Sized> DerefMut for GainRestore<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.store
    }
}

impl<S: GainStore + ?Sized> Drop for GainRestore<'_, S> {
    fn drop(&mut self) {
        self.base.write_to(&mut *self.store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> GainController {
        GainController::new(GainSnapshot::new(0.8, 1.2, 4.0).unwrap()).unwrap()
    }

    #[test]
    fn restore_base_is_idempotent() {
        let ctl = controller();
        let mut once = GainTable::new(GainSnapshot::new(0.0, 0.0, 9.0).unwrap());
        let mut twice = once;

        ctl.restore_base(&mut once);
        ctl.restore_base(&mut twice);
        ctl.restore_base(&mut twice);

        assert_eq!(once, twice);
        assert_eq!(GainSnapshot::read_from(&once), *ctl.base());
    }

    #[test]
    fn cue_dominant_is_exclusive_regardless_of_prior_state() {
        let ctl = controller();
        for prior in [
            GainSnapshot::new(0.0, 1.0, 2.0).unwrap(),
            GainSnapshot::new(3.0, 7.0, 0.0).unwrap(),
            *ctl.base(),
        ] {
            let mut t = GainTable::new(prior);
            ctl.set_gating(&mut t, GatingProfile::CueDominant).unwrap();
            assert_eq!(t.pathway_gain(Pathway::CueToCompletion), 1.0);
            assert_eq!(t.pathway_gain(Pathway::RecallToCompletion), 0.0);
            assert_eq!(t.pathway_gain(Pathway::RecallSourceToRecall), 0.0);
        }
    }

    #[test]
    fn recall_dominant_uses_directed_recall_source_gain() {
        let ctl = controller();
        let mut t = GainTable::new(*ctl.base());
        let snap = ctl
            .set_gating(
                &mut t,
                GatingProfile::RecallDominant {
                    recall_source_gain: 1.5,
                },
            )
            .unwrap();
        assert_eq!(snap, GainSnapshot::new(0.0, 1.0, 1.5).unwrap());
        assert_eq!(GainSnapshot::read_from(&t), snap);
    }

    #[test]
    fn negative_or_nan_gains_are_rejected() {
        assert!(GainSnapshot::new(-0.1, 1.0, 1.0).is_err());
        assert!(GainSnapshot::new(1.0, f32::NAN, 1.0).is_err());
        let ctl = controller();
        let err = ctl
            .gating(GatingProfile::RecallDominant {
                recall_source_gain: -2.0,
            })
            .unwrap_err();
        assert_eq!(
            err,
            GainError::Invalid {
                pathway: Pathway::RecallSourceToRecall,
                value: -2.0
            }
        );
    }

    #[test]
    fn guard_restores_base_on_drop() {
        let ctl = controller();
        let mut t = GainTable::new(*ctl.base());
        {
            let mut g = ctl.guard(&mut t);
            ctl.set_gating(&mut *g, GatingProfile::CueDominant).unwrap();
            assert_eq!(g.pathway_gain(Pathway::RecallToCompletion), 0.0);
        }
        assert_eq!(GainSnapshot::read_from(&t), *ctl.base());
    }

    #[test]
    fn with_replaces_a_single_pathway() {
        let s = GainSnapshot::default()
            .with(Pathway::RecallToCompletion, 0.25)
            .unwrap();
        assert_eq!(s.recall_to_completion, 0.25);
        assert_eq!(s.cue_to_completion, 1.0);
        assert_eq!(s.recall_source_to_recall, 4.0);
    }
}
