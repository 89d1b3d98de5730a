use crate::engine::{CircuitRoles, SettlingEngine};
use crate::patterns::PatternPair;
use crate::phase::Phase;
use crate::scheduler::CycleObserver;
use crate::scorer::ON_CUTOFF;

/// A read-only view of one module during a trial.
///
/// Design intent:
/// - Observers cannot mutate or steer the engine; they only see `&E`.
/// - Snapshotting allocates; the settling loop itself stays unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSnapshot {
    pub module: String,
    pub phase: Phase,
    pub cycle: usize,
    pub current: Vec<f32>,
    /// Cue-module state at the end of the Cue phase, once reached.
    pub cue_time: Option<Vec<f32>>,
    /// Full pattern the trial is scored against.
    pub target: Vec<f32>,
}

/// Activity summary for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleActivity {
    pub phase: Phase,
    pub cycle: usize,
    pub active_units: usize,
    pub mean_activation: f32,
}

/// Observer that follows one module through a trial.
pub struct ModuleWatch {
    module: String,
    cue_module: String,
    target: Vec<f32>,
    cycles_per_phase: usize,

    cue_time: Option<Vec<f32>>,
    latest: Option<NetworkSnapshot>,
    log: Vec<CycleActivity>,
}

impl ModuleWatch {
    pub fn new(
        module: impl Into<String>,
        cue_module: impl Into<String>,
        target: Vec<f32>,
        cycles_per_phase: usize,
    ) -> Self {
        Self {
            module: module.into(),
            cue_module: cue_module.into(),
            target,
            cycles_per_phase,
            cue_time: None,
            latest: None,
            log: Vec::new(),
        }
    }

    /// Watch the target-representation module for `pair`.
    pub fn for_target(roles: &CircuitRoles, pair: &PatternPair, cycles_per_phase: usize) -> Self {
        Self::new(
            roles.target.clone(),
            roles.cue.clone(),
            pair.target.clone(),
            cycles_per_phase,
        )
    }

    pub fn latest(&self) -> Option<&NetworkSnapshot> {
        self.latest.as_ref()
    }

    pub fn log(&self) -> &[CycleActivity] {
        &self.log
    }

    pub fn cue_time(&self) -> Option<&[f32]> {
        self.cue_time.as_deref()
    }
}

impl<E: SettlingEngine + ?Sized> CycleObserver<E> for ModuleWatch {
    fn on_cycle(&mut self, engine: &E, phase: Phase, cycle: usize) {
        if phase == Phase::Cue && cycle + 1 == self.cycles_per_phase {
            self.cue_time = engine.module_activations(&self.cue_module).ok();
        }

        let current = engine.module_activations(&self.module).unwrap_or_default();
        let active_units = current.iter().filter(|&&a| a > ON_CUTOFF).count();
        let mean_activation = if current.is_empty() {
            0.0
        } else {
            current.iter().sum::<f32>() / current.len() as f32
        };
        self.log.push(CycleActivity {
            phase,
            cycle,
            active_units,
            mean_activation,
        });

        self.latest = Some(NetworkSnapshot {
            module: self.module.clone(),
            phase,
            cycle,
            current,
            cue_time: self.cue_time.clone(),
            target: self.target.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::mode::TrialMode;
    use crate::network::Hippocampus;
    use crate::patterns::PatternLists;
    use crate::prng::Prng;
    use crate::scheduler::PhaseScheduler;

    #[test]
    fn watch_follows_target_module_through_a_study_trial() {
        let cfg = SimConfig::default().with_pairs(1).with_cycles_per_phase(5);
        let sched = PhaseScheduler::new(&cfg.trial).unwrap();
        let mut h = Hippocampus::new(&cfg, 3).unwrap();
        let pair = PatternLists::generate(&cfg.patterns, &mut Prng::new(1)).ab.study[0].clone();

        let mut watch = ModuleWatch::for_target(&cfg.trial.roles, &pair, 5);
        sched
            .run_trial(&mut h, &pair, TrialMode::Study, &mut watch)
            .unwrap();

        assert_eq!(watch.log().len(), 4 * 5);
        assert_eq!(watch.cue_time(), Some(pair.cue.as_slice()));

        let last = watch.latest().unwrap();
        assert_eq!(last.module, "ECout");
        assert_eq!((last.phase, last.cycle), (Phase::Settle, 4));
        assert_eq!(last.target, pair.target);
        // Teacher forcing holds the output at the cue-time state.
        assert_eq!(last.current, pair.cue);
        assert_eq!(
            watch.log().last().unwrap().active_units,
            cfg.patterns.pattern_active()
        );
    }

    #[test]
    fn unknown_module_yields_empty_snapshot() {
        let cfg = SimConfig::default().with_pairs(1).with_cycles_per_phase(2);
        let sched = PhaseScheduler::new(&cfg.trial).unwrap();
        let mut h = Hippocampus::new(&cfg, 3).unwrap();
        let pair = PatternLists::generate(&cfg.patterns, &mut Prng::new(1)).ab.probe[0].clone();

        let mut watch = ModuleWatch::new("nowhere", "ECin", pair.target.clone(), 2);
        sched
            .run_trial(&mut h, &pair, TrialMode::Probe, &mut watch)
            .unwrap();
        let last = watch.latest().unwrap();
        assert!(last.current.is_empty());
        assert_eq!(watch.log().last().unwrap().mean_activation, 0.0);
        assert_eq!(watch.cue_time(), Some(pair.cue.as_slice()));
    }
}
