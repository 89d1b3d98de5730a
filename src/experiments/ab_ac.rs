//! AB-AC interference experiment.
//!
//! Each run trains on AB until its probe recall reaches `stop_mem`, then
//! switches to AC and trains until AC reaches it too (or epochs run out).
//! AB, AC and lure lists are probed after every training epoch, so the
//! epoch log shows AB being overwritten while AC is learned.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SimConfig;
use crate::driver::{ListKind, TrialDriver};
use crate::error::{ConfigError, ExperimentError};
use crate::network::Hippocampus;
use crate::patterns::PatternLists;
use crate::prng::Prng;
use crate::scheduler::{NullObserver, PhaseScheduler, StopFlag};
use crate::stats::EpochStats;

/// Outcome of one training epoch plus the probe tests that followed it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EpochRecord {
    pub run: usize,
    pub epoch: usize,
    pub train_list: ListKind,
    pub train: EpochStats,
    /// One entry per list, in [`ListKind::ALL`] order.
    pub tests: Vec<EpochStats>,
}

impl EpochRecord {
    pub fn test(&self, kind: ListKind) -> Option<&EpochStats> {
        self.tests.get(kind.index())
    }

    pub fn recall_rate(&self, kind: ListKind) -> f32 {
        self.test(kind).and_then(|s| s.recall_rate).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunReport {
    pub run: usize,
    pub seed: u64,
    pub epochs: Vec<EpochRecord>,
    /// Epoch after which training moved from AB to AC.
    pub switched_at: Option<usize>,
    /// AC reached the stop criterion.
    pub finished: bool,
    pub cancelled: bool,
}

impl RunReport {
    pub fn last(&self) -> Option<&EpochRecord> {
        self.epochs.last()
    }
}

pub struct Experiment {
    cfg: SimConfig,
    stop: StopFlag,
}

impl Experiment {
    pub fn new(cfg: SimConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            stop: StopFlag::new(),
        })
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    /// All runs. Independent runs share nothing but the stop flag.
    pub fn run(&self) -> Result<Vec<RunReport>, ExperimentError> {
        let runs = self.cfg.experiment.runs;
        info!(runs, max_epochs = self.cfg.experiment.max_epochs, "experiment start");

        #[cfg(feature = "parallel")]
        let reports = {
            use rayon::prelude::*;
            (0..runs)
                .into_par_iter()
                .map(|run| self.run_single(run))
                .collect::<Result<Vec<_>, _>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let reports = (0..runs)
            .map(|run| self.run_single(run))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(reports)
    }

    /// One run with seed `base + run`.
    pub fn run_single(&self, run: usize) -> Result<RunReport, ExperimentError> {
        let cfg = &self.cfg;
        let seed = cfg.experiment.seed.wrapping_add(run as u64);
        let mut rng = Prng::new(seed);

        let lists = PatternLists::generate(&cfg.patterns, &mut rng);
        let mut engine = Hippocampus::new(cfg, rng.next_u64())?;
        let sched = PhaseScheduler::new(&cfg.trial)?.with_stop_flag(self.stop.clone());
        let mut driver = TrialDriver::new(lists, rng.fork(run as u64));

        let mut report = RunReport {
            run,
            seed,
            epochs: Vec::new(),
            switched_at: None,
            finished: false,
            cancelled: false,
        };
        let trial_err = |source| ExperimentError::Trial { run, source };

        let mut training = ListKind::AB;
        'epochs: for epoch in 0..cfg.experiment.max_epochs {
            let train = driver
                .train_epoch(&sched, &mut engine, training, &mut NullObserver)
                .map_err(trial_err)?;
            if train.cancelled {
                report.cancelled = true;
                break;
            }

            let mut tests = Vec::with_capacity(ListKind::ALL.len());
            for kind in ListKind::ALL {
                let pass = driver
                    .test_list(&sched, &mut engine, kind, &mut NullObserver)
                    .map_err(trial_err)?;
                if pass.cancelled {
                    report.cancelled = true;
                    break 'epochs;
                }
                tests.push(EpochStats::aggregate(kind.name(), &pass.trials));
            }

            let record = EpochRecord {
                run,
                epoch,
                train_list: training,
                train: EpochStats::aggregate(training.name(), &train.trials),
                tests,
            };
            info!(
                run,
                epoch,
                train = %training,
                ab = record.recall_rate(ListKind::AB),
                ac = record.recall_rate(ListKind::AC),
                lure = record.recall_rate(ListKind::Lure),
                "epoch"
            );

            let reached = record.recall_rate(training) >= cfg.experiment.stop_mem;
            report.epochs.push(record);

            if reached {
                match training {
                    ListKind::AB => {
                        info!(run, epoch, "AB criterion reached; training AC");
                        report.switched_at = Some(epoch);
                        training = ListKind::AC;
                    }
                    ListKind::AC | ListKind::Lure => {
                        report.finished = true;
                        break;
                    }
                }
            }
        }

        if report.cancelled {
            warn!(run, epochs = report.epochs.len(), "run cancelled");
        } else if !report.finished {
            debug!(run, "max epochs reached before AC criterion");
        }
        Ok(report)
    }
}

/// Append every epoch of every run as one JSON object per line.
#[cfg(feature = "serde")]
pub fn write_epoch_log<W: std::io::Write>(out: &mut W, reports: &[RunReport]) -> Result<(), ExperimentError> {
    for r in reports {
        for e in &r.epochs {
            serde_json::to_writer(&mut *out, e)?;
            out.write_all(b"\n")?;
        }
    }
    out.flush()?;
    Ok(())
}

pub fn print_report(cfg: &SimConfig, reports: &[RunReport]) {
    println!("hipmem ab-ac");
    println!("runs={}", reports.len());
    println!("pairs={}", cfg.patterns.pairs);
    println!("cycles_per_phase={}", cfg.trial.cycles_per_phase);
    println!("mem_threshold={:.2}", cfg.trial.mem_threshold);
    println!("stop_mem={:.2}", cfg.experiment.stop_mem);
    for r in reports {
        let last = r.last();
        println!(
            "run={} seed={} epochs={} switched_at={:?} finished={} cancelled={}",
            r.run,
            r.seed,
            r.epochs.len(),
            r.switched_at,
            r.finished,
            r.cancelled
        );
        if let Some(e) = last {
            println!(
                "  final ab_recall={:.3} ac_recall={:.3} lure_recall={:.3}",
                e.recall_rate(ListKind::AB),
                e.recall_rate(ListKind::AC),
                e.recall_rate(ListKind::Lure)
            );
        }
    }
    let n = reports.iter().filter(|r| !r.epochs.is_empty()).count();
    if n > 0 {
        let mean = |kind: ListKind| {
            reports
                .iter()
                .filter_map(|r| r.last())
                .map(|e| e.recall_rate(kind))
                .sum::<f32>()
                / n as f32
        };
        println!("mean_final_ab_recall={:.3}", mean(ListKind::AB));
        println!("mean_final_ac_recall={:.3}", mean(ListKind::AC));
    }
}
