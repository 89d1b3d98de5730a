//! Simulation configuration.
//!
//! Every field has a default, so a JSON config file only needs the values it
//! changes:
//!
//! ```json
//! { "trial": { "cycles_per_phase": 20 }, "experiment": { "runs": 4 } }
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::CircuitRoles;
use crate::error::ConfigError;
use crate::gating::GainSnapshot;

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    pub trial: TrialConfig,
    pub network: NetworkConfig,
    pub patterns: PatternConfig,
    pub experiment: ExperimentConfig,
}

/// Phase timing, gating and scoring.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrialConfig {
    /// Settling cycles in each of the four phases.
    pub cycles_per_phase: usize,
    /// Shared cut for the miss and false-alarm proportions.
    pub mem_threshold: f32,
    /// Resting gains, restored after every trial.
    pub base_gains: GainSnapshot,
    /// Recall-source -> recall relative gain during probe recall.
    pub probe_recall_source_gain: f32,
    pub roles: CircuitRoles,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            cycles_per_phase: 25,
            mem_threshold: 0.34,
            base_gains: GainSnapshot::default(),
            probe_recall_source_gain: 1.0,
            roles: CircuitRoles::default(),
        }
    }
}

impl TrialConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycles_per_phase == 0 {
            return Err(ConfigError::Invalid("cycles_per_phase must be >= 1"));
        }
        if !(self.mem_threshold > 0.0 && self.mem_threshold <= 1.0) {
            return Err(ConfigError::Invalid("mem_threshold must be in (0, 1]"));
        }
        if !self.probe_recall_source_gain.is_finite() || self.probe_recall_source_gain < 0.0 {
            return Err(ConfigError::Invalid(
                "probe_recall_source_gain must be finite and >= 0",
            ));
        }
        self.base_gains.validate()?;
        Ok(())
    }
}

/// Sizes and rates of the reference network.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NetworkConfig {
    pub recall_source_units: usize,
    pub recall_units: usize,
    pub completion_units: usize,

    // Fraction of each module allowed to be active (k-winners).
    pub recall_source_pct_active: f32,
    pub recall_pct_active: f32,
    pub completion_pct_active: f32,

    /// Probability that a cue -> recall-source / cue -> recall connection exists.
    pub perforant_connectivity: f32,

    /// Activation integration step per cycle, in (0, 1].
    pub dt: f32,
    /// Slope of the saturating rate function above the inhibition threshold.
    pub act_gain: f32,

    pub hebb_rate: f32,
    pub error_rate: f32,

    pub init_weight_min: f32,
    pub init_weight_max: f32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            recall_source_units: 120,
            recall_units: 60,
            completion_units: 60,
            recall_source_pct_active: 0.05,
            recall_pct_active: 0.1,
            completion_pct_active: 0.15,
            perforant_connectivity: 1.0,
            dt: 0.5,
            act_gain: 150.0,
            hebb_rate: 0.3,
            error_rate: 0.2,
            init_weight_min: 0.25,
            init_weight_max: 0.75,
        }
    }
}

impl NetworkConfig {
    pub const MIN_UNITS: usize = 2;

    pub fn validate(&self) -> Result<(), ConfigError> {
        for n in [
            self.recall_source_units,
            self.recall_units,
            self.completion_units,
        ] {
            if n < Self::MIN_UNITS {
                return Err(ConfigError::Invalid("module sizes must be >= 2"));
            }
        }
        for pct in [
            self.recall_source_pct_active,
            self.recall_pct_active,
            self.completion_pct_active,
        ] {
            if !(pct > 0.0 && pct < 1.0) {
                return Err(ConfigError::Invalid("pct_active must be in (0, 1)"));
            }
        }
        if !(self.perforant_connectivity > 0.0 && self.perforant_connectivity <= 1.0) {
            return Err(ConfigError::Invalid("perforant_connectivity must be in (0, 1]"));
        }
        if !(self.dt > 0.0 && self.dt <= 1.0) {
            return Err(ConfigError::Invalid("dt must be in (0, 1]"));
        }
        if !self.act_gain.is_finite() || self.act_gain <= 0.0 {
            return Err(ConfigError::Invalid("act_gain must be finite and > 0"));
        }
        if !(0.0..=1.0).contains(&self.hebb_rate) {
            return Err(ConfigError::Invalid("hebb_rate must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.error_rate) {
            return Err(ConfigError::Invalid("error_rate must be in [0, 1]"));
        }
        if !(0.0 <= self.init_weight_min
            && self.init_weight_min <= self.init_weight_max
            && self.init_weight_max <= 1.0)
        {
            return Err(ConfigError::Invalid(
                "initial weights must satisfy 0 <= min <= max <= 1",
            ));
        }
        Ok(())
    }
}

/// Shape of the generated pair lists.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PatternConfig {
    /// Pairs per list.
    pub pairs: usize,
    /// Units in the item half (and in the associate half).
    pub half_units: usize,
    pub active_per_half: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            pairs: 10,
            half_units: 24,
            active_per_half: 4,
        }
    }
}

impl PatternConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pairs == 0 {
            return Err(ConfigError::Invalid("pairs must be >= 1"));
        }
        if self.active_per_half == 0 || self.active_per_half >= self.half_units {
            return Err(ConfigError::Invalid(
                "active_per_half must be in [1, half_units)",
            ));
        }
        Ok(())
    }

    pub fn pattern_units(&self) -> usize {
        2 * self.half_units
    }

    pub fn pattern_active(&self) -> usize {
        2 * self.active_per_half
    }
}

/// Runs, epochs and the AB -> AC switch criterion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExperimentConfig {
    pub runs: usize,
    pub max_epochs: usize,
    /// Probe recall rate on the current training list that ends its phase.
    pub stop_mem: f32,
    pub seed: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            runs: 1,
            max_epochs: 30,
            stop_mem: 1.0,
            seed: 1,
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runs == 0 {
            return Err(ConfigError::Invalid("runs must be >= 1"));
        }
        if self.max_epochs == 0 {
            return Err(ConfigError::Invalid("max_epochs must be >= 1"));
        }
        if !(self.stop_mem > 0.0 && self.stop_mem <= 1.0) {
            return Err(ConfigError::Invalid("stop_mem must be in (0, 1]"));
        }
        Ok(())
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trial.validate()?;
        self.network.validate()?;
        self.patterns.validate()?;
        self.experiment.validate()?;
        Ok(())
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.experiment.seed = seed;
        self
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.experiment.runs = runs;
        self
    }

    pub fn with_max_epochs(mut self, epochs: usize) -> Self {
        self.experiment.max_epochs = epochs;
        self
    }

    pub fn with_pairs(mut self, pairs: usize) -> Self {
        self.patterns.pairs = pairs;
        self
    }

    pub fn with_cycles_per_phase(mut self, cycles: usize) -> Self {
        self.trial.cycles_per_phase = cycles;
        self
    }

    /// Read a (possibly partial) JSON config and validate it.
    #[cfg(feature = "serde")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: SimConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(feature = "serde")]
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
