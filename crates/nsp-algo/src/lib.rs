//! # nsp-algo: Three-Phase Network State Prediction
//!
//! Forecasts bus voltages and branch currents of a radial, unbalanced distribution feeder
//! over a horizon of time steps, from per-resource real-power forecasts.
//!
//! ## Backward-Forward Sweep
//!
//! Each horizon step is an independent steady-state solve with the four-conductor
//! (A, B, C, neutral) backward-forward sweep in [`power_flow::bfs`]:
//!
//! | State | Work |
//! |-------|------|
//! | [`SweepState::ComputePower`] | constant-power nodal currents plus shunt currents |
//! | [`SweepState::BackwardSweep`] | accumulate bus currents along root paths, `ΔV = -I·Z` |
//! | [`SweepState::ForwardSweep`] | propagate voltages outward from the fixed root |
//! | [`SweepState::CheckConvergence`] | max phase-A voltage change against the precision |
//!
//! Steps share a read-only [`StaticModel`] and run in parallel on the rayon pool when the
//! `parallel` feature is enabled (the default).
//!
//! ## Epoch Processing
//!
//! [`Predictor`] collects topology, customer and resource messages, reports readiness and
//! turns a complete epoch into an [`EpochForecast`] of voltage and current messages.
//!
//! ## Example
//!
//! ```ignore
//! use nsp_algo::{Predictor, PredictorConfig};
//!
//! let mut predictor = Predictor::new(PredictorConfig::default())?;
//! predictor.start_epoch(Some(1));
//! for message in messages {
//!     predictor.ingest(message)?;
//! }
//! if let Some(forecast) = predictor.process_epoch()? {
//!     println!("{} voltage series", forecast.voltage_messages().len());
//! }
//! ```

pub mod config;
pub mod power_flow;
pub mod predictor;
pub mod test_utils;

pub use config::{PredictorConfig, ThreePhaseSplit};
pub use power_flow::*;
pub use predictor::{
    EpochContext, EpochForecast, Ingested, Predictor, StaticModel, StepSummary,
};
