//! Trial sequencing over the AB / AC / lure lists.
//!
//! Training order is reshuffled each epoch; test order is list order.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::SettlingEngine;
use crate::error::TrialError;
use crate::mode::TrialMode;
use crate::patterns::{PairList, PatternLists, PatternPair};
use crate::prng::Prng;
use crate::scheduler::{CycleObserver, PhaseScheduler, TrialOutcome};
use crate::stats::TrialStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ListKind {
    AB,
    AC,
    Lure,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [ListKind::AB, ListKind::AC, ListKind::Lure];

    pub fn name(self) -> &'static str {
        match self {
            ListKind::AB => "AB",
            ListKind::AC => "AC",
            ListKind::Lure => "Lure",
        }
    }

    pub fn index(self) -> usize {
        match self {
            ListKind::AB => 0,
            ListKind::AC => 1,
            ListKind::Lure => 2,
        }
    }
}

impl core::fmt::Display for ListKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Trials of one list pass. `cancelled` is set when the stop flag cut the pass
/// short; `trials` then holds only the fully completed ones.
#[derive(Debug, Clone, Default)]
pub struct ListPass {
    pub trials: Vec<TrialStats>,
    pub cancelled: bool,
}

pub struct TrialDriver {
    lists: PatternLists,
    rng: Prng,
    train_order: Vec<usize>,
}

impl TrialDriver {
    pub fn new(lists: PatternLists, rng: Prng) -> Self {
        Self {
            lists,
            rng,
            train_order: Vec::new(),
        }
    }

    pub fn lists(&self) -> &PatternLists {
        &self.lists
    }

    pub fn list(&self, kind: ListKind) -> &PairList {
        match kind {
            ListKind::AB => &self.lists.ab,
            ListKind::AC => &self.lists.ac,
            ListKind::Lure => &self.lists.lure,
        }
    }

    /// Draw a fresh training order for `kind`.
    pub fn begin_train_epoch(&mut self, kind: ListKind) {
        let n = self.list(kind).len();
        self.train_order = self.rng.permutation(n);
    }

    /// Pair and mode of training trial `index` in the current epoch order.
    pub fn train_trial(&self, kind: ListKind, index: usize) -> Option<(&PatternPair, TrialMode)> {
        let &i = self.train_order.get(index)?;
        Some((self.list(kind).study.get(i)?, TrialMode::Study))
    }

    pub fn test_trial(&self, kind: ListKind, index: usize) -> Option<(&PatternPair, TrialMode)> {
        Some((self.list(kind).probe.get(index)?, TrialMode::Probe))
    }

    /// One shuffled study pass over `kind`.
    pub fn train_epoch<E, O>(
        &mut self,
        sched: &PhaseScheduler,
        engine: &mut E,
        kind: ListKind,
        observer: &mut O,
    ) -> Result<ListPass, TrialError>
    where
        E: SettlingEngine + ?Sized,
        O: CycleObserver<E> + ?Sized,
    {
        self.begin_train_epoch(kind);
        let mut pass = ListPass::default();
        for index in 0..self.train_order.len() {
            let Some((pair, mode)) = self.train_trial(kind, index) else {
                break;
            };
            match run_scored(sched, engine, kind, pair, mode, observer)? {
                Some(t) => pass.trials.push(t),
                None => {
                    pass.cancelled = true;
                    break;
                }
            }
        }
        Ok(pass)
    }

    /// One in-order probe pass over `kind`.
    pub fn test_list<E, O>(
        &self,
        sched: &PhaseScheduler,
        engine: &mut E,
        kind: ListKind,
        observer: &mut O,
    ) -> Result<ListPass, TrialError>
    where
        E: SettlingEngine + ?Sized,
        O: CycleObserver<E> + ?Sized,
    {
        let mut pass = ListPass::default();
        let mut index = 0;
        while let Some((pair, mode)) = self.test_trial(kind, index) {
            match run_scored(sched, engine, kind, pair, mode, observer)? {
                Some(t) => pass.trials.push(t),
                None => {
                    pass.cancelled = true;
                    break;
                }
            }
            index += 1;
        }
        Ok(pass)
    }
}

/// Run one trial and attach statistics; `None` if it was cancelled.
fn run_scored<E, O>(
    sched: &PhaseScheduler,
    engine: &mut E,
    kind: ListKind,
    pair: &PatternPair,
    mode: TrialMode,
    observer: &mut O,
) -> Result<Option<TrialStats>, TrialError>
where
    E: SettlingEngine + ?Sized,
    O: CycleObserver<E> + ?Sized,
{
    match sched.run_trial(engine, pair, mode, observer)? {
        TrialOutcome::Completed { record, terminal } => Ok(Some(TrialStats::new(
            kind.name(),
            pair,
            mode,
            record,
            &terminal,
        ))),
        TrialOutcome::Cancelled { .. } => Ok(None),
    }
}
