//! Power Flow
//!
//! Building blocks of the three-phase backward-forward sweep:
//!
//! - [`per_unit`]: kV/kVA bases and conversions
//! - [`network_model`]: branch impedances, bus shunts and the balanced root source
//! - [`load_mapper`]: resource forecasts to bus/phase injections
//! - [`bfs`]: the sweep state machine
//! - [`assembler`]: per-unit solutions to published forecast records

pub mod assembler;
pub mod bfs;
pub mod load_mapper;
pub mod network_model;
pub mod per_unit;

pub use assembler::{assemble, AssembledForecast};
pub use bfs::{PhaseState, StepSolution, SweepError, SweepSolver, SweepState};
pub use load_mapper::{resolve_resources, Injections, LoadMapper, MappedResource};
pub use network_model::{balanced_source, NetworkModel};
pub use per_unit::PerUnitBase;
