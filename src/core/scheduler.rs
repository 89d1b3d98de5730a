//! The four-phase settling trial.
//!
//! ```text
//! phase       gating           extra
//! Cue         cue-dominant     apply cue input; latch cue-time state at end
//! Recall      recall-dominant  recall-source gain: trained (study) / weak (probe)
//! Completion  (unchanged)      score at end
//! Settle      cue-dominant     study: clamp target to cue-time state;
//!                              weight update at end
//! ```
//!
//! Base gains are restored by a scoped guard on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::TrialConfig;
use crate::engine::{CircuitRoles, SettlingEngine};
use crate::error::{ConfigError, TrialError};
use crate::gating::{GainController, GatingProfile};
use crate::mode::TrialMode;
use crate::patterns::PatternPair;
use crate::phase::Phase;
use crate::scorer::{self, CompletionRecord};

/// Per-cycle hook. Side effects only; must not steer the trial.
pub trait CycleObserver<E: ?Sized> {
    fn on_cycle(&mut self, engine: &E, phase: Phase, cycle: usize);
}

impl<E: ?Sized, F: FnMut(Phase, usize)> CycleObserver<E> for F {
    fn on_cycle(&mut self, _engine: &E, phase: Phase, cycle: usize) {
        self(phase, cycle)
    }
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl<E: ?Sized> CycleObserver<E> for NullObserver {
    fn on_cycle(&mut self, _engine: &E, _phase: Phase, _cycle: usize) {}
}

/// Cooperative cancellation, checked before every cycle.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    /// Every phase ran. `terminal` is the target module's state at the end of
    /// Completion, the state `record` was scored on.
    Completed {
        record: CompletionRecord,
        terminal: Vec<f32>,
    },
    /// Stopped before `cycle` of `phase` ran. `record` is present when the
    /// Completion phase had already been scored.
    Cancelled {
        phase: Phase,
        cycle: usize,
        record: Option<CompletionRecord>,
    },
}

impl TrialOutcome {
    pub fn record(&self) -> Option<&CompletionRecord> {
        match self {
            TrialOutcome::Completed { record, .. } => Some(record),
            TrialOutcome::Cancelled { record, .. } => record.as_ref(),
        }
    }

    pub fn terminal(&self) -> Option<&[f32]> {
        match self {
            TrialOutcome::Completed { terminal, .. } => Some(terminal),
            TrialOutcome::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TrialOutcome::Cancelled { .. })
    }
}

/// Mutable state of one trial in flight.
struct TrialState<'p> {
    pair: &'p PatternPair,
    mode: TrialMode,
    cue_time: Vec<f32>,
    terminal: Vec<f32>,
    record: Option<CompletionRecord>,
}

pub struct PhaseScheduler {
    cycles_per_phase: usize,
    threshold: f32,
    probe_recall_source_gain: f32,
    gains: GainController,
    roles: CircuitRoles,
    stop: StopFlag,
}

impl PhaseScheduler {
    pub fn new(cfg: &TrialConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cycles_per_phase: cfg.cycles_per_phase,
            threshold: cfg.mem_threshold,
            probe_recall_source_gain: cfg.probe_recall_source_gain,
            gains: GainController::new(cfg.base_gains)?,
            roles: cfg.roles.clone(),
            stop: StopFlag::new(),
        })
    }

    /// Share a cancellation flag with a viewer or controlling thread.
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    pub fn cycles_per_phase(&self) -> usize {
        self.cycles_per_phase
    }

    pub fn gains(&self) -> &GainController {
        &self.gains
    }

    pub fn roles(&self) -> &CircuitRoles {
        &self.roles
    }

    /// Run one trial of `pair` in `mode`.
    pub fn run_trial<E, O>(
        &self,
        engine: &mut E,
        pair: &PatternPair,
        mode: TrialMode,
        observer: &mut O,
    ) -> Result<TrialOutcome, TrialError>
    where
        E: SettlingEngine + ?Sized,
        O: CycleObserver<E> + ?Sized,
    {
        let mut engine = self.gains.guard(engine);
        let mut state = TrialState {
            pair,
            mode,
            cue_time: Vec::new(),
            terminal: Vec::new(),
            record: None,
        };

        engine.begin_trial();

        for phase in Phase::ALL {
            self.on_phase_start(&mut *engine, &mut state, phase)?;

            for cycle in 0..self.cycles_per_phase {
                if self.stop.is_raised() {
                    debug!(pair = %pair.name, %mode, %phase, cycle, "trial cancelled");
                    return Ok(TrialOutcome::Cancelled {
                        phase,
                        cycle,
                        record: state.record,
                    });
                }
                engine.run_cycle();
                observer.on_cycle(&*engine, phase, cycle);
            }

            engine.end_phase(phase);
            self.on_phase_end(&mut *engine, &mut state, phase)?;
        }

        let record = state.record.ok_or(TrialError::Unscored)?;
        Ok(TrialOutcome::Completed {
            record,
            terminal: state.terminal,
        })
    }

    fn on_phase_start<E: SettlingEngine + ?Sized>(
        &self,
        engine: &mut E,
        state: &mut TrialState<'_>,
        phase: Phase,
    ) -> Result<(), TrialError> {
        match phase {
            Phase::Cue => {
                engine.apply_external_input(&self.roles.cue, &state.pair.cue)?;
                self.gains.set_gating(engine, GatingProfile::CueDominant)?;
            }
            Phase::Recall => {
                let recall_source_gain = state
                    .mode
                    .recall_source_gain(self.gains.base(), self.probe_recall_source_gain);
                self.gains.set_gating(
                    engine,
                    GatingProfile::RecallDominant { recall_source_gain },
                )?;
            }
            Phase::Completion => {}
            Phase::Settle => {
                self.gains.set_gating(engine, GatingProfile::CueDominant)?;
                if state.mode.teacher_forces() {
                    engine.apply_external_input(&self.roles.target, &state.cue_time)?;
                }
            }
        }
        trace!(%phase, mode = %state.mode, "phase start");
        Ok(())
    }

    fn on_phase_end<E: SettlingEngine + ?Sized>(
        &self,
        engine: &mut E,
        state: &mut TrialState<'_>,
        phase: Phase,
    ) -> Result<(), TrialError> {
        match phase {
            Phase::Cue => {
                state.cue_time = engine.module_activations(&self.roles.cue)?;
            }
            Phase::Recall => {}
            Phase::Completion => {
                // Last point at which the full target is compared.
                let terminal = engine.module_activations(&self.roles.target)?;
                let record = scorer::score(
                    &state.pair.target,
                    &state.cue_time,
                    &terminal,
                    self.threshold,
                    state.mode,
                )?;
                trace!(pair = %state.pair.name, recall = ?record.recall, "scored");
                state.record = Some(record);
                state.terminal = terminal;
            }
            Phase::Settle => {
                if state.mode.updates_weights() {
                    engine.request_weight_update();
                }
            }
        }
        Ok(())
    }
}
