//! Predictor configuration.
//!
//! Deserializes from TOML with every field optional:
//!
//! ```toml
//! precision = 0.001
//! max_iterations = 100
//! apparent_power_base_kva = 10000.0
//! root_voltage_pu = 1.02
//! forecast_horizon = 36
//! three_phase_split = "equal"
//! ```

use nsp_core::{KilovoltAmperes, NspError, NspResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::power_flow::SweepSolver;

/// How a three-phase resource's power is shared among phases A, B and C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThreePhaseSplit {
    /// Each phase gets P/3
    #[default]
    Equal,
    /// Each phase gets P/√3
    SqrtThree,
}

impl ThreePhaseSplit {
    pub fn divisor(self) -> f64 {
        match self {
            ThreePhaseSplit::Equal => 3.0,
            ThreePhaseSplit::SqrtThree => 3f64.sqrt(),
        }
    }
}

impl FromStr for ThreePhaseSplit {
    type Err = NspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equal" => Ok(ThreePhaseSplit::Equal),
            "sqrt-three" => Ok(ThreePhaseSplit::SqrtThree),
            other => Err(NspError::Config(format!(
                "unknown three-phase split '{}' (expected 'equal' or 'sqrt-three')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Stop when the largest phase-A voltage change drops to this (p.u.)
    pub precision: f64,
    /// Iteration cap per horizon step
    pub max_iterations: usize,
    pub apparent_power_base_kva: f64,
    pub root_voltage_pu: f64,
    /// Fallback horizon when no forecast has arrived yet
    pub forecast_horizon: usize,
    /// Forecasts required before an epoch runs; defaults to the customer table size
    pub expected_resources: Option<usize>,
    pub three_phase_split: ThreePhaseSplit,
    pub voltage_topic: String,
    pub current_topic: String,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            precision: 0.001,
            max_iterations: 100,
            apparent_power_base_kva: 10_000.0,
            root_voltage_pu: 1.02,
            forecast_horizon: 36,
            expected_resources: None,
            three_phase_split: ThreePhaseSplit::Equal,
            voltage_topic: "NetworkForecastState.Voltage".to_string(),
            current_topic: "NetworkForecastState.Current".to_string(),
        }
    }
}

impl PredictorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_apparent_power_base(mut self, kva: f64) -> Self {
        self.apparent_power_base_kva = kva;
        self
    }

    pub fn with_root_voltage(mut self, v_pu: f64) -> Self {
        self.root_voltage_pu = v_pu;
        self
    }

    pub fn with_forecast_horizon(mut self, horizon: usize) -> Self {
        self.forecast_horizon = horizon;
        self
    }

    pub fn with_expected_resources(mut self, count: usize) -> Self {
        self.expected_resources = Some(count);
        self
    }

    pub fn with_three_phase_split(mut self, split: ThreePhaseSplit) -> Self {
        self.three_phase_split = split;
        self
    }

    pub fn apparent_power_base(&self) -> KilovoltAmperes {
        KilovoltAmperes(self.apparent_power_base_kva)
    }

    /// Sweep solver carrying this configuration's stopping rule
    pub fn sweep_solver(&self) -> SweepSolver {
        SweepSolver::new()
            .with_precision(self.precision)
            .with_max_iterations(self.max_iterations)
    }

    pub fn validate(&self) -> NspResult<()> {
        if !(self.precision.is_finite() && self.precision > 0.0) {
            return Err(NspError::Config(format!(
                "precision must be positive, got {}",
                self.precision
            )));
        }
        if self.max_iterations == 0 {
            return Err(NspError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.apparent_power_base_kva.is_finite() && self.apparent_power_base_kva > 0.0) {
            return Err(NspError::Config(format!(
                "apparent power base must be positive, got {} kVA",
                self.apparent_power_base_kva
            )));
        }
        if !(self.root_voltage_pu.is_finite() && self.root_voltage_pu > 0.0) {
            return Err(NspError::Config(format!(
                "root voltage must be positive, got {} p.u.",
                self.root_voltage_pu
            )));
        }
        if self.forecast_horizon == 0 {
            return Err(NspError::Config(
                "forecast_horizon must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
