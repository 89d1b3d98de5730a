//! Reference settling engine: a small rate-coded hippocampal circuit.
//!
//! ```text
//! cue ──► recall_source ══► recall ◄─┐      (══ relative gain)
//!  │  └──────────────────►    │  ────┘
//!  │                          ▼ (abs)
//!  └────────(abs)────────► completion ──► target
//! ```
//!
//! Each cycle computes every module's net input from the previous cycle's
//! activity, applies k-winners inhibition and integrates toward the rate
//! function. Clamped modules simply hold their pattern.

use hashbrown::HashMap;

use crate::config::SimConfig;
use crate::engine::SettlingEngine;
use crate::error::{ConfigError, EngineError};
use crate::gating::{GainKind, GainStore, GainTable, Pathway};
use crate::phase::Phase;
use crate::prng::Prng;

pub type ModuleId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnRule {
    /// CPCA on the minus-phase code.
    Hebbian,
    /// Delta rule on the plus/minus difference of the receiver.
    ErrorDriven,
    /// Weights stay as drawn. The cue-driven completion code is then the same
    /// on every presentation of a pattern.
    Fixed,
}

#[derive(Debug, Clone)]
struct Module {
    name: String,
    // Winners allowed by inhibition; also the sender-side normalization.
    k: usize,
    act: Vec<f32>,
    net: Vec<f32>,
    clamp: Option<Vec<f32>>,
    act_minus: Vec<f32>,
    act_plus: Vec<f32>,
}

impl Module {
    fn new(name: &str, n: usize, k: usize) -> Self {
        Self {
            name: name.to_string(),
            k,
            act: vec![0.0; n],
            net: vec![0.0; n],
            clamp: None,
            act_minus: vec![0.0; n],
            act_plus: vec![0.0; n],
        }
    }

    fn len(&self) -> usize {
        self.act.len()
    }

    fn reset(&mut self) {
        self.act.fill(0.0);
        self.net.fill(0.0);
        self.act_minus.fill(0.0);
        self.act_plus.fill(0.0);
        self.clamp = None;
    }
}

#[derive(Debug, Clone)]
struct Projection {
    from: ModuleId,
    to: ModuleId,
    // Row-major [receiver][sender].
    weights: Vec<f32>,
    present: Vec<bool>,
    rule: LearnRule,
    gate: Option<Pathway>,
    rel: f32,
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub module_count: usize,
    pub connection_count: usize,
    pub avg_weight: f32,
    pub cycles: u64,
    pub weight_updates: u64,
}

pub struct Hippocampus {
    modules: Vec<Module>,
    index: HashMap<String, ModuleId>,
    projections: Vec<Projection>,

    gains: GainTable,

    dt: f32,
    act_gain: f32,
    hebb_rate: f32,
    error_rate: f32,

    age_cycles: u64,
    weight_updates: u64,
}

impl Hippocampus {
    /// Build the circuit named by `cfg.trial.roles`, weights drawn from `seed`.
    pub fn new(cfg: &SimConfig, seed: u64) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let net = &cfg.network;
        let roles = &cfg.trial.roles;

        let names = [
            &roles.cue,
            &roles.recall_source,
            &roles.recall,
            &roles.completion,
            &roles.target,
        ];
        for (i, a) in names.iter().enumerate() {
            if names[i + 1..].contains(a) {
                return Err(ConfigError::Invalid("circuit roles must name distinct modules"));
            }
        }

        let ec_n = cfg.patterns.pattern_units();
        let ec_k = cfg.patterns.pattern_active();

        let mut h = Self {
            modules: Vec::new(),
            index: HashMap::new(),
            projections: Vec::new(),
            gains: GainTable::new(cfg.trial.base_gains),
            dt: net.dt,
            act_gain: net.act_gain,
            hebb_rate: net.hebb_rate,
            error_rate: net.error_rate,
            age_cycles: 0,
            weight_updates: 0,
        };

        let cue = h.add_module(&roles.cue, ec_n, ec_k);
        let dg = h.add_module(
            &roles.recall_source,
            net.recall_source_units,
            winners(net.recall_source_pct_active, net.recall_source_units),
        );
        let ca3 = h.add_module(
            &roles.recall,
            net.recall_units,
            winners(net.recall_pct_active, net.recall_units),
        );
        let ca1 = h.add_module(
            &roles.completion,
            net.completion_units,
            winners(net.completion_pct_active, net.completion_units),
        );
        let out = h.add_module(&roles.target, ec_n, ec_k);

        let mut rng = Prng::new(seed);
        let (lo, hi) = (net.init_weight_min, net.init_weight_max);
        let pp = net.perforant_connectivity;

        use LearnRule::{ErrorDriven, Fixed, Hebbian};
        let specs = [
            (cue, dg, pp, Hebbian, None),
            (cue, ca3, pp, Hebbian, None),
            (dg, ca3, 1.0, Hebbian, Some(Pathway::RecallSourceToRecall)),
            (ca3, ca3, 1.0, Hebbian, None),
            (ca3, ca1, 1.0, ErrorDriven, Some(Pathway::RecallToCompletion)),
            (cue, ca1, 1.0, Fixed, Some(Pathway::CueToCompletion)),
            (ca1, out, 1.0, ErrorDriven, None),
        ];
        for (from, to, p_conn, rule, gate) in specs {
            let n = h.modules[from].len() * h.modules[to].len();
            let mut weights = Vec::with_capacity(n);
            let mut present = Vec::with_capacity(n);
            for _ in 0..n {
                let on = p_conn >= 1.0 || rng.next_f32_01() < p_conn;
                present.push(on);
                weights.push(if on { rng.gen_range_f32(lo, hi) } else { 0.0 });
            }
            h.projections.push(Projection {
                from,
                to,
                weights,
                present,
                rule,
                gate,
                rel: 1.0,
            });
        }

        Ok(h)
    }

    fn add_module(&mut self, name: &str, n: usize, k: usize) -> ModuleId {
        let id = self.modules.len();
        self.modules.push(Module::new(name, n, k));
        self.index.insert(name.to_string(), id);
        id
    }

    fn module(&self, name: &str) -> Result<&Module, EngineError> {
        self.index
            .get(name)
            .map(|&id| &self.modules[id])
            .ok_or_else(|| EngineError::UnknownModule(name.to_string()))
    }

    fn module_mut(&mut self, name: &str) -> Result<&mut Module, EngineError> {
        match self.index.get(name) {
            Some(&id) => Ok(&mut self.modules[id]),
            None => Err(EngineError::UnknownModule(name.to_string())),
        }
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }

    /// Winners allowed in `module` by k-winners inhibition.
    pub fn module_winners(&self, module: &str) -> Option<usize> {
        self.module(module).ok().map(|m| m.k)
    }

    /// Effective (absolute, relative) scale of a projection under the live gains.
    fn scales(&self, p: &Projection) -> (f32, f32) {
        match p.gate {
            None => (1.0, p.rel),
            Some(pathway) => {
                let g = self.gains.pathway_gain(pathway);
                match pathway.kind() {
                    GainKind::Absolute => (g, p.rel),
                    GainKind::Relative => (1.0, g),
                }
            }
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let mut connection_count = 0usize;
        let mut weight_sum = 0.0f64;
        for p in &self.projections {
            for (w, &on) in p.weights.iter().zip(&p.present) {
                if on {
                    connection_count += 1;
                    weight_sum += *w as f64;
                }
            }
        }
        Diagnostics {
            module_count: self.modules.len(),
            connection_count,
            avg_weight: if connection_count == 0 {
                0.0
            } else {
                (weight_sum / connection_count as f64) as f32
            },
            cycles: self.age_cycles,
            weight_updates: self.weight_updates,
        }
    }
}

fn winners(pct: f32, n: usize) -> usize {
    ((pct * n as f32).ceil() as usize).clamp(1, n.saturating_sub(1).max(1))
}

/// Inhibition threshold halfway between the k-th and (k+1)-th highest net input.
fn kwta_threshold(net: &[f32], k: usize) -> f32 {
    if net.is_empty() {
        return 0.0;
    }
    let mut sorted = net.to_vec();
    sorted.sort_unstable_by(|a, b| b.total_cmp(a));
    let k = k.clamp(1, sorted.len());
    match sorted.get(k) {
        Some(&next) => 0.5 * (sorted[k - 1] + next),
        None => sorted[k - 1] - 1.0,
    }
}

/// Saturating rate above threshold, zero below.
fn rate(above: f32, gain: f32) -> f32 {
    if above <= 0.0 {
        0.0
    } else {
        let x = gain * above;
        x / (x + 1.0)
    }
}

impl GainStore for Hippocampus {
    fn pathway_gain(&self, pathway: Pathway) -> f32 {
        self.gains.pathway_gain(pathway)
    }

    fn set_pathway_gain(&mut self, pathway: Pathway, value: f32) {
        self.gains.set_pathway_gain(pathway, value);
    }
}

impl SettlingEngine for Hippocampus {
    fn begin_trial(&mut self) {
        for m in &mut self.modules {
            m.reset();
        }
    }

    fn apply_external_input(&mut self, module: &str, pattern: &[f32]) -> Result<(), EngineError> {
        let m = self.module_mut(module)?;
        if pattern.len() != m.len() {
            return Err(EngineError::PatternLength {
                module: module.to_string(),
                expected: m.len(),
                actual: pattern.len(),
            });
        }
        m.act.copy_from_slice(pattern);
        m.clamp = Some(pattern.to_vec());
        Ok(())
    }

    fn clear_external_input(&mut self, module: &str) -> Result<(), EngineError> {
        self.module_mut(module)?.clamp = None;
        Ok(())
    }

    fn run_cycle(&mut self) {
        let mut rel_sum = vec![0.0f32; self.modules.len()];
        for p in &self.projections {
            rel_sum[p.to] += self.scales(p).1;
        }

        let mut nets: Vec<Vec<f32>> = self.modules.iter().map(|m| vec![0.0; m.len()]).collect();
        for p in &self.projections {
            let (abs, rel) = self.scales(p);
            if abs == 0.0 || rel == 0.0 {
                continue;
            }
            let sender = &self.modules[p.from];
            let scale = abs * rel / rel_sum[p.to] / sender.k as f32;
            let x = &sender.act;
            let n_from = x.len();
            for (net, row) in nets[p.to].iter_mut().zip(p.weights.chunks_exact(n_from)) {
                let s: f32 = row.iter().zip(x).map(|(w, a)| w * a).sum();
                *net += scale * s;
            }
        }

        for (m, net) in self.modules.iter_mut().zip(nets) {
            m.net = net;
            if let Some(c) = &m.clamp {
                m.act.copy_from_slice(c);
                continue;
            }
            let theta = kwta_threshold(&m.net, m.k);
            for (a, &n) in m.act.iter_mut().zip(&m.net) {
                *a += self.dt * (rate(n - theta, self.act_gain) - *a);
            }
        }

        self.age_cycles += 1;
    }

    fn end_phase(&mut self, phase: Phase) {
        match phase {
            Phase::Completion => {
                for m in &mut self.modules {
                    m.act_minus.copy_from_slice(&m.act);
                }
            }
            Phase::Settle => {
                for m in &mut self.modules {
                    m.act_plus.copy_from_slice(&m.act);
                }
            }
            Phase::Cue | Phase::Recall => {}
        }
    }

    fn unit_activation(&self, module: &str, unit: usize) -> Option<f32> {
        self.module(module).ok()?.act.get(unit).copied()
    }

    fn module_len(&self, module: &str) -> Option<usize> {
        self.module(module).ok().map(Module::len)
    }

    fn request_weight_update(&mut self) {
        let modules = &self.modules;
        for p in &mut self.projections {
            let send = &modules[p.from];
            let recv = &modules[p.to];
            let x = &send.act_minus;
            let n_from = x.len();

            let rows = p
                .weights
                .chunks_exact_mut(n_from)
                .zip(p.present.chunks_exact(n_from));
            for (i, (row, present)) in rows.enumerate() {
                let coef = match p.rule {
                    LearnRule::Hebbian => self.hebb_rate * recv.act_minus[i],
                    LearnRule::ErrorDriven => {
                        self.error_rate * (recv.act_plus[i] - recv.act_minus[i])
                    }
                    LearnRule::Fixed => 0.0,
                };
                if coef == 0.0 {
                    continue;
                }
                for ((w, &on), &xj) in row.iter_mut().zip(present).zip(x) {
                    if !on {
                        continue;
                    }
                    let dw = match p.rule {
                        LearnRule::Hebbian => coef * (xj - *w),
                        LearnRule::ErrorDriven | LearnRule::Fixed => coef * xj,
                    };
                    *w = (*w + dw).clamp(0.0, 1.0);
                }
            }
        }
        self.weight_updates += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrialConfig;
    use crate::gating::GainSnapshot;
    use crate::mode::TrialMode;
    use crate::patterns::{PatternLists, PatternPair};
    use crate::scheduler::{NullObserver, PhaseScheduler};
    use crate::scorer::RecallOutcome;

    fn small_cfg() -> SimConfig {
        SimConfig::default().with_pairs(1).with_cycles_per_phase(15)
    }

    fn one_pair(cfg: &SimConfig) -> PatternPair {
        let lists = PatternLists::generate(&cfg.patterns, &mut Prng::new(5));
        lists.ab.study[0].clone()
    }

    #[test]
    fn modules_follow_roles_and_sizes() {
        let cfg = SimConfig::default();
        let h = Hippocampus::new(&cfg, 1).unwrap();
        assert_eq!(
            h.module_names().collect::<Vec<_>>(),
            vec!["ECin", "DG", "CA3", "CA1", "ECout"]
        );
        assert_eq!(h.module_len("ECin"), Some(48));
        assert_eq!(h.module_len("DG"), Some(120));
        assert_eq!(h.module_winners("DG"), Some(6));
        assert_eq!(h.module_winners("ECout"), Some(8));
        assert_eq!(h.module_len("nope"), None);
        assert_eq!(h.diagnostics().module_count, 5);
    }

    #[test]
    fn duplicate_role_names_are_rejected() {
        let mut cfg = SimConfig::default();
        cfg.trial.roles.recall = cfg.trial.roles.completion.clone();
        assert!(matches!(
            Hippocampus::new(&cfg, 1),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn external_input_is_checked() {
        let mut h = Hippocampus::new(&SimConfig::default(), 1).unwrap();
        assert_eq!(
            h.apply_external_input("EC", &[1.0]),
            Err(EngineError::UnknownModule("EC".into()))
        );
        assert!(matches!(
            h.apply_external_input("ECin", &[1.0; 3]),
            Err(EngineError::PatternLength { expected: 48, actual: 3, .. })
        ));
    }

    #[test]
    fn clamped_module_holds_and_winners_are_bounded() {
        let cfg = SimConfig::default();
        let mut h = Hippocampus::new(&cfg, 2).unwrap();
        let pair = one_pair(&cfg);
        h.begin_trial();
        h.apply_external_input("ECin", &pair.cue).unwrap();
        for _ in 0..30 {
            h.run_cycle();
        }
        assert_eq!(h.module_activations("ECin").unwrap(), pair.cue);

        let dg = h.module_activations("DG").unwrap();
        let active = dg.iter().filter(|&&a| a > 0.0).count();
        assert!(active >= 1);
        assert!(active <= h.module_winners("DG").unwrap());
        assert!(dg.iter().all(|&a| (0.0..=1.0).contains(&a)));

        // Unclamped and without input, activity decays.
        h.clear_external_input("ECin").unwrap();
        h.run_cycle();
        assert!(h.module_activations("ECin").unwrap().iter().all(|&a| a <= 0.5));
    }

    #[test]
    fn closed_absolute_gates_silence_the_completion_module() {
        let cfg = SimConfig::default();
        let mut h = Hippocampus::new(&cfg, 3).unwrap();
        GainSnapshot::new(0.0, 0.0, 4.0).unwrap().write_to(&mut h);
        h.begin_trial();
        h.apply_external_input("ECin", &one_pair(&cfg).cue).unwrap();
        for _ in 0..20 {
            h.run_cycle();
        }
        assert!(h.module_activations("CA1").unwrap().iter().all(|&a| a == 0.0));
        assert!(h.module_activations("CA3").unwrap().iter().any(|&a| a > 0.0));
    }

    #[test]
    fn begin_trial_clears_activity_but_keeps_weights() {
        let cfg = small_cfg();
        let sched = PhaseScheduler::new(&cfg.trial).unwrap();
        let mut h = Hippocampus::new(&cfg, 4).unwrap();
        let pair = one_pair(&cfg);
        sched
            .run_trial(&mut h, &pair, TrialMode::Study, &mut NullObserver)
            .unwrap();
        let learned = h.diagnostics();
        assert_eq!(learned.weight_updates, 1);
        assert_eq!(learned.cycles, 4 * 15);

        h.begin_trial();
        for name in ["ECin", "DG", "CA3", "CA1", "ECout"] {
            assert!(h.module_activations(name).unwrap().iter().all(|&a| a == 0.0));
        }
        assert_eq!(h.diagnostics().avg_weight, learned.avg_weight);
    }

    #[test]
    fn probe_trials_leave_weights_alone() {
        let cfg = small_cfg();
        let sched = PhaseScheduler::new(&cfg.trial).unwrap();
        let mut h = Hippocampus::new(&cfg, 4).unwrap();
        let before = h.diagnostics().avg_weight;
        let probe = one_pair(&cfg).probe(cfg.patterns.half_units);
        sched
            .run_trial(&mut h, &probe, TrialMode::Probe, &mut NullObserver)
            .unwrap();
        let after = h.diagnostics();
        assert_eq!(after.avg_weight, before);
        assert_eq!(after.weight_updates, 0);
    }

    #[test]
    fn learns_a_single_pair() {
        let cfg = small_cfg();
        let sched = PhaseScheduler::new(&cfg.trial).unwrap();
        let mut h = Hippocampus::new(&cfg, 11).unwrap();
        let study = one_pair(&cfg);
        let probe = study.probe(cfg.patterns.half_units);

        for _ in 0..20 {
            sched
                .run_trial(&mut h, &study, TrialMode::Study, &mut NullObserver)
                .unwrap();
        }
        let out = sched
            .run_trial(&mut h, &probe, TrialMode::Probe, &mut NullObserver)
            .unwrap();
        let rec = *out.record().unwrap();
        assert_eq!(rec.recall, RecallOutcome::Success, "{rec:?}");
        assert_eq!(rec.completion_demand_count, cfg.patterns.active_per_half);
    }

    #[test]
    fn weights_stay_in_unit_range() {
        let mut cfg = small_cfg();
        cfg.network.hebb_rate = 1.0;
        cfg.network.error_rate = 1.0;
        let sched = PhaseScheduler::new(&cfg.trial).unwrap();
        let mut h = Hippocampus::new(&cfg, 8).unwrap();
        let pair = one_pair(&cfg);
        for _ in 0..5 {
            sched
                .run_trial(&mut h, &pair, TrialMode::Study, &mut NullObserver)
                .unwrap();
        }
        for p in &h.projections {
            assert!(p.weights.iter().all(|w| (0.0..=1.0).contains(w)));
            for (w, &on) in p.weights.iter().zip(&p.present) {
                if !on {
                    assert_eq!(*w, 0.0);
                }
            }
        }
    }

    #[test]
    fn cue_to_completion_weights_never_learn() {
        let cfg = small_cfg();
        let sched = PhaseScheduler::new(&cfg.trial).unwrap();
        let mut h = Hippocampus::new(&cfg, 9).unwrap();
        let fixed = |h: &Hippocampus| {
            h.projections
                .iter()
                .find(|p| p.gate == Some(Pathway::CueToCompletion))
                .map(|p| (p.rule, p.weights.clone()))
                .unwrap()
        };
        let (rule, before) = fixed(&h);
        assert_eq!(rule, LearnRule::Fixed);

        let pair = one_pair(&cfg);
        for _ in 0..5 {
            sched
                .run_trial(&mut h, &pair, TrialMode::Study, &mut NullObserver)
                .unwrap();
        }
        assert_eq!(fixed(&h).1, before);
        // Plastic projections did move.
        assert_eq!(h.diagnostics().weight_updates, 5);
        let out = h
            .projections
            .iter()
            .find(|p| h.modules[p.to].name == "ECout")
            .unwrap();
        assert_eq!(out.rule, LearnRule::ErrorDriven);
    }

    #[test]
    fn same_seed_same_weights() {
        let cfg = SimConfig::default();
        let a = Hippocampus::new(&cfg, 21).unwrap();
        let b = Hippocampus::new(&cfg, 21).unwrap();
        let c = Hippocampus::new(&cfg, 22).unwrap();
        assert_eq!(a.diagnostics().avg_weight, b.diagnostics().avg_weight);
        assert_ne!(a.diagnostics().avg_weight, c.diagnostics().avg_weight);
    }

    #[test]
    fn kwta_threshold_splits_kth_and_next() {
        assert!((kwta_threshold(&[0.1, 0.9, 0.5, 0.3], 2) - 0.4).abs() < 1e-6);
        assert_eq!(rate(-0.1, 40.0), 0.0);
        assert!(rate(0.1, 40.0) > 0.75);
        assert_eq!(winners(0.05, 120), 6);
        assert_eq!(winners(0.99, 4), 3);
    }

    #[test]
    fn default_trial_config_drives_engine() {
        // Scheduler and engine agree on module names out of the box.
        let cfg = SimConfig::default();
        let roles = TrialConfig::default().roles;
        let h = Hippocampus::new(&cfg, 1).unwrap();
        for name in [&roles.cue, &roles.recall_source, &roles.recall, &roles.completion, &roles.target] {
            assert!(h.module_len(name).is_some());
        }
    }
}
