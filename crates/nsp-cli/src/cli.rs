use clap::{Args, Parser, Subcommand, ValueHint};
use nsp_algo::{PredictorConfig, ThreePhaseSplit};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Three-phase distribution network state predictor", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Forecast voltages and currents for every epoch in a message log
    Run(RunArgs),
    /// Validate the feeder topology in a message log and print its shape
    Topology {
        /// JSON array or JSON-lines message log
        #[arg(value_hint = ValueHint::FilePath)]
        messages: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// JSON array or JSON-lines message log
    #[arg(value_hint = ValueHint::FilePath)]
    pub messages: PathBuf,
    /// TOML predictor configuration
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Write forecast messages here instead of stdout
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,
    /// Also write voltages.csv and currents.csv into this directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub csv: Option<PathBuf>,
    /// Threading hint (`auto` or integer)
    #[arg(long, default_value = "auto")]
    pub threads: String,
    /// Convergence threshold on the phase-A voltage change (p.u.)
    #[arg(long, env = "POWER_FLOW_PRECISION")]
    pub precision: Option<f64>,
    /// Apparent-power base (kVA)
    #[arg(long, env = "APPARENT_POWER_BASE")]
    pub power_base: Option<f64>,
    /// Root bus voltage (p.u.)
    #[arg(long, env = "ROOT_BUS_VOLTAGE")]
    pub root_voltage: Option<f64>,
    /// Horizon used when no forecast has arrived
    #[arg(long, env = "FORECAST_HORIZON")]
    pub horizon: Option<usize>,
    /// Sweep iteration cap per step
    #[arg(long, env = "MAX_SWEEP_ITERATIONS")]
    pub max_iterations: Option<usize>,
    /// Forecasts required per epoch (default: customer table size)
    #[arg(long)]
    pub expected_resources: Option<usize>,
    /// Three-phase power split (`equal` or `sqrt-three`)
    #[arg(long)]
    pub three_phase_split: Option<ThreePhaseSplit>,
}

impl RunArgs {
    /// Layer flag and environment values over a file or default configuration
    pub fn apply_overrides(&self, mut config: PredictorConfig) -> PredictorConfig {
        if let Some(precision) = self.precision {
            config.precision = precision;
        }
        if let Some(kva) = self.power_base {
            config.apparent_power_base_kva = kva;
        }
        if let Some(v) = self.root_voltage {
            config.root_voltage_pu = v;
        }
        if let Some(horizon) = self.horizon {
            config.forecast_horizon = horizon;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(count) = self.expected_resources {
            config.expected_resources = Some(count);
        }
        if let Some(split) = self.three_phase_split {
            config.three_phase_split = split;
        }
        config
    }
}
