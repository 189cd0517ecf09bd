//! Converts per-unit step solutions into physical forecast records.
//!
//! Voltages are scaled by the bus voltage base, currents by the sending-end bus current base.
//! Angles are published in degrees. The neutral stays internal.
//!
//! Branch currents are published with positive direction away from the root, so their angles
//! sit 180° from the current accumulated by the backward sweep.

use nsp_core::{
    CurrentForecast, Degrees, Network, PerUnit, Phase, Radians, VoltageForecast,
};

use crate::power_flow::{PerUnitBase, StepSolution};

/// Forecast records for one epoch, ordered by (bus, phase) and (branch, phase)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledForecast {
    pub voltages: Vec<VoltageForecast>,
    pub currents: Vec<CurrentForecast>,
}

pub fn assemble(
    network: &Network,
    per_unit: &PerUnitBase,
    solutions: &[StepSolution],
    horizon: usize,
) -> AssembledForecast {
    let mut voltages: Vec<VoltageForecast> = network
        .buses()
        .enumerate()
        .flat_map(|(index, bus)| {
            Phase::LIVE
                .into_iter()
                .map(move |phase| VoltageForecast::new(bus.name.clone(), index, phase, horizon))
        })
        .collect();

    let mut currents: Vec<CurrentForecast> = network
        .branches()
        .enumerate()
        .flat_map(|(index, branch)| {
            Phase::LIVE.into_iter().map(move |phase| {
                CurrentForecast::new(branch.device_id.clone(), index, phase, horizon)
            })
        })
        .collect();

    for solution in solutions.iter().filter(|s| s.step < horizon) {
        for record in voltages.iter_mut() {
            let v = solution.voltage(record.bus_index, record.phase);
            record.set(
                solution.step,
                per_unit.voltage_to_kv(record.bus_index, PerUnit(v.norm())),
                to_degrees(v.arg()),
            );
        }

        for record in currents.iter_mut() {
            let Some((sending, _)) = network.branch_endpoints(record.branch_index) else {
                continue;
            };
            let i = solution.current(record.branch_index, record.phase);
            record.set(
                solution.step,
                per_unit.current_to_amperes(sending, PerUnit(i.norm())),
                to_degrees(i.arg()),
            );
        }
    }

    AssembledForecast { voltages, currents }
}

#[inline]
fn to_degrees(angle: f64) -> Degrees {
    Radians(angle).to_degrees()
}
