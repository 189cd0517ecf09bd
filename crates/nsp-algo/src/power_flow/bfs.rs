//! # Three-Phase Backward-Forward Sweep
//!
//! Radial feeders are solved without a Jacobian: currents are summed from the leaves towards
//! the root, then voltages are propagated from the root back out. Each conductor (A, B, C and
//! the neutral) is swept independently over the same tree.
//!
//! ## State Machine
//!
//! ```text
//! ┌──────┐   ┌──────────────┐   ┌───────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ Init │──▶│ ComputePower │──▶│ BackwardSweep │──▶│ ForwardSweep │──▶│ CheckConvergence │
//! └──────┘   └──────────────┘   └───────────────┘   └──────────────┘   └──────────────────┘
//!                   ▲                                                      │          │
//!                   └──────────────────── not converged ───────────────────┘          ▼
//!                                                                                  ┌──────┐
//!                                                                                  │ Done │
//!                                                                                  └──────┘
//! ```
//!
//! 1. **Init**: every bus starts at the balanced source (A = V∠0°, B = V∠240°, C = V∠120°,
//!    N = 0). The root stays fixed at the source for the whole step.
//! 2. **ComputePower**: nodal current per phase `I_p = conj(P_p / (V_p − V_n))`, the neutral
//!    returns `I_n = −ΣI_p`, and the bus shunt draws `Y · V` on every conductor.
//! 3. **BackwardSweep**: each bus current is added to every branch on its root path, then
//!    `ΔV = −I · Z` per branch and conductor.
//! 4. **ForwardSweep**: in BFS order, `V = V_known − ΔV` when the bus is deeper than its known
//!    neighbour, `V = V_known + ΔV` otherwise.
//! 5. **CheckConvergence**: `err = max |V_old[A] − V_new[A]|` over all buses. Stop when
//!    `err ≤ precision` or the iteration cap is reached.
//!
//! Reaching the cap is not an error: the last iterate is returned with `converged = false`.
//!
//! ## References
//!
//! - **Kersting (2017)**: "Distribution System Modeling and Analysis", 4th ed., CRC Press.
//!   Chapter 10 covers the ladder (forward-backward) iterative technique.
//! - **Cheng & Shirmohammadi (1995)**: "A three-phase power flow method for real-time
//!   distribution system analysis", IEEE Trans. Power Systems, 10(2), 671-679.
//!   DOI: [10.1109/59.387902](https://doi.org/10.1109/59.387902)

use num_complex::Complex64;
use nsp_core::{NspError, Phase, Topology};
use thiserror::Error;
use tracing::{debug, warn};

use crate::power_flow::NetworkModel;

/// Phase-to-neutral differences below this are treated as zero
const SINGULAR_THRESHOLD: f64 = 1e-12;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SweepError {
    #[error("singular phase-to-neutral voltage at bus #{bus} phase {phase} (step {step})")]
    SingularVoltage { bus: usize, phase: Phase, step: usize },

    #[error("non-finite voltage at bus #{bus} after iteration {iteration} (step {step})")]
    NonFinite {
        bus: usize,
        iteration: usize,
        step: usize,
    },

    #[error("injection table covers {actual} buses, network has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl From<SweepError> for NspError {
    fn from(err: SweepError) -> Self {
        NspError::Solver(err.to_string())
    }
}

/// Sweep stages; see the module docs for the transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Init,
    ComputePower,
    BackwardSweep,
    ForwardSweep,
    CheckConvergence,
    Done,
}

/// Transient per-step buffers, indexed by bus (or branch) and `Phase::index()`
#[derive(Debug, Clone)]
pub struct PhaseState {
    /// Injected real power per live phase (p.u., load convention)
    pub power: Vec<[f64; 3]>,
    pub v_old: Vec<[Complex64; 4]>,
    pub v_new: Vec<[Complex64; 4]>,
    pub nodal_current: Vec<[Complex64; 4]>,
    pub branch_current: Vec<[Complex64; 4]>,
    pub delta_v: Vec<[Complex64; 4]>,
}

impl PhaseState {
    pub fn new(bus_count: usize, branch_count: usize) -> Self {
        Self {
            power: vec![[0.0; 3]; bus_count],
            v_old: vec![[ZERO; 4]; bus_count],
            v_new: vec![[ZERO; 4]; bus_count],
            nodal_current: vec![[ZERO; 4]; bus_count],
            branch_current: vec![[ZERO; 4]; branch_count],
            delta_v: vec![[ZERO; 4]; branch_count],
        }
    }

    /// Latest voltage of one conductor at a bus
    pub fn voltage(&self, bus: usize, phase: Phase) -> Complex64 {
        self.v_new[bus][phase.index()]
    }

    fn reset_accumulators(&mut self) {
        self.nodal_current.fill([ZERO; 4]);
        self.branch_current.fill([ZERO; 4]);
        self.delta_v.fill([ZERO; 4]);
    }
}

/// Per-unit solution of one horizon step
#[derive(Debug, Clone, PartialEq)]
pub struct StepSolution {
    pub step: usize,
    pub converged: bool,
    pub iterations: usize,
    /// Final max phase-A voltage change (p.u.)
    pub error: f64,
    /// Bus voltages per conductor
    pub voltages: Vec<[Complex64; 4]>,
    /// Branch currents per conductor, positive away from the root
    pub branch_currents: Vec<[Complex64; 4]>,
}

impl StepSolution {
    pub fn voltage(&self, bus: usize, phase: Phase) -> Complex64 {
        self.voltages[bus][phase.index()]
    }

    pub fn current(&self, branch: usize, phase: Phase) -> Complex64 {
        self.branch_currents[branch][phase.index()]
    }
}

/// Backward-forward sweep solver configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSolver {
    /// Convergence threshold on the phase-A voltage change (p.u.)
    pub precision: f64,
    pub max_iterations: usize,
}

impl Default for SweepSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepSolver {
    pub fn new() -> Self {
        Self {
            precision: 0.001,
            max_iterations: 100,
        }
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Solve one horizon step
    ///
    /// `injections` holds the real power per bus for phases A, B and C in per-unit, load
    /// convention (consumption negative).
    pub fn solve(
        &self,
        topology: &Topology,
        model: &NetworkModel,
        injections: &[[f64; 3]],
        step: usize,
    ) -> Result<StepSolution, SweepError> {
        let n = model.bus_count();
        if injections.len() != n {
            return Err(SweepError::DimensionMismatch {
                expected: n,
                actual: injections.len(),
            });
        }

        let root = model.root();
        let source = model.source();
        let mut ps = PhaseState::new(n, model.branch_count());
        let mut iterations = 0;
        let mut error = f64::INFINITY;
        let mut converged = false;
        let mut state = SweepState::Init;

        loop {
            state = match state {
                SweepState::Init => {
                    ps.power.copy_from_slice(injections);
                    ps.v_old.fill(source);
                    ps.v_new.fill([ZERO; 4]);
                    ps.v_new[root] = source;
                    SweepState::ComputePower
                }
                SweepState::ComputePower => {
                    ps.reset_accumulators();
                    for bus in 0..n {
                        ps.nodal_current[bus] =
                            nodal_current(&ps.power[bus], &ps.v_old[bus], model.shunt(bus))
                                .map_err(|phase| SweepError::SingularVoltage { bus, phase, step })?;
                    }
                    SweepState::BackwardSweep
                }
                SweepState::BackwardSweep => {
                    for bus in 0..n {
                        let current = ps.nodal_current[bus];
                        if current.iter().all(|i| *i == ZERO) {
                            continue;
                        }
                        for &branch in topology.root_path(bus) {
                            for c in 0..4 {
                                ps.branch_current[branch][c] += current[c];
                            }
                        }
                    }
                    for branch in 0..model.branch_count() {
                        let z = model.impedance(branch);
                        for c in 0..4 {
                            ps.delta_v[branch][c] = -ps.branch_current[branch][c] * z;
                        }
                    }
                    SweepState::ForwardSweep
                }
                SweepState::ForwardSweep => {
                    for &bus in topology.order() {
                        let Some((known, branch)) = topology.parent(bus) else {
                            continue;
                        };
                        let deeper = topology.depth(bus) > topology.depth(known);
                        for c in 0..4 {
                            let dv = ps.delta_v[branch][c];
                            ps.v_new[bus][c] = if deeper {
                                ps.v_new[known][c] - dv
                            } else {
                                ps.v_new[known][c] + dv
                            };
                        }
                    }
                    SweepState::CheckConvergence
                }
                SweepState::CheckConvergence => {
                    iterations += 1;

                    if let Some(bus) = ps
                        .v_new
                        .iter()
                        .position(|v| v.iter().any(|c| !c.re.is_finite() || !c.im.is_finite()))
                    {
                        return Err(SweepError::NonFinite {
                            bus,
                            iteration: iterations,
                            step,
                        });
                    }

                    let a = Phase::A.index();
                    error = ps
                        .v_old
                        .iter()
                        .zip(&ps.v_new)
                        .map(|(old, new)| (old[a] - new[a]).norm())
                        .fold(0.0, f64::max);
                    debug!(step, iteration = iterations, error, "sweep iteration");

                    if error <= self.precision {
                        converged = true;
                        SweepState::Done
                    } else if iterations >= self.max_iterations {
                        warn!(
                            step,
                            iterations,
                            error,
                            precision = self.precision,
                            "sweep reached the iteration cap without converging"
                        );
                        SweepState::Done
                    } else {
                        ps.v_old.clone_from(&ps.v_new);
                        ps.v_new.fill([ZERO; 4]);
                        ps.v_new[root] = source;
                        SweepState::ComputePower
                    }
                }
                SweepState::Done => break,
            };
        }

        debug!(step, iterations, converged, error, "sweep finished");

        // Accumulated injections point into the root; flip to report flow away from it
        let branch_currents = ps
            .branch_current
            .into_iter()
            .map(|currents| currents.map(|i| -i))
            .collect();

        Ok(StepSolution {
            step,
            converged,
            iterations,
            error,
            voltages: ps.v_new,
            branch_currents,
        })
    }
}

/// Nodal current per conductor; `Err` names the phase whose voltage difference is singular
fn nodal_current(
    power: &[f64; 3],
    v_old: &[Complex64; 4],
    shunt: Complex64,
) -> Result<[Complex64; 4], Phase> {
    let mut current = [ZERO; 4];
    let v_n = v_old[Phase::Neutral.index()];

    for phase in Phase::LIVE {
        let p = power[phase.index()];
        if p == 0.0 {
            continue;
        }
        let diff = v_old[phase.index()] - v_n;
        if diff.norm() < SINGULAR_THRESHOLD {
            return Err(phase);
        }
        current[phase.index()] = (Complex64::new(p, 0.0) / diff).conj();
    }
    current[Phase::Neutral.index()] = -(current[0] + current[1] + current[2]);

    if shunt != ZERO {
        for c in 0..4 {
            current[c] -= shunt * v_old[c];
        }
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsp_core::{Branch, Bus, BusKind, Kilovolts, Network};

    fn two_bus(r: f64, x: f64) -> (Network, Topology) {
        let network = Network::from_parts(
            vec![
                Bus::new("root", Kilovolts(20.0), BusKind::Root),
                Bus::new("load", Kilovolts(20.0), BusKind::UsagePoint),
            ],
            vec![Branch::new("l1", "root", "load").with_impedance(r, x)],
        )
        .unwrap();
        let topology = Topology::build(&network).unwrap();
        (network, topology)
    }

    #[test]
    fn test_nodal_current_single_phase() {
        let v = crate::power_flow::balanced_source(1.0);
        let current = nodal_current(&[-0.1, 0.0, 0.0], &v, ZERO).unwrap();

        assert!((current[0] - Complex64::new(-0.1, 0.0)).norm() < 1e-15);
        assert_eq!(current[1], ZERO);
        assert!((current[3] - Complex64::new(0.1, 0.0)).norm() < 1e-15);
    }

    #[test]
    fn test_nodal_current_balanced_neutral_is_zero() {
        let v = crate::power_flow::balanced_source(1.0);
        let current = nodal_current(&[-0.1, -0.1, -0.1], &v, ZERO).unwrap();
        assert!(current[3].norm() < 1e-15);
    }

    #[test]
    fn test_nodal_current_shunt_on_all_conductors() {
        let mut v = crate::power_flow::balanced_source(1.0);
        v[3] = Complex64::new(0.01, 0.0);
        let y = Complex64::new(0.0, 0.002);
        let current = nodal_current(&[0.0; 3], &v, y).unwrap();

        for c in 0..4 {
            assert!((current[c] + y * v[c]).norm() < 1e-15);
        }
    }

    #[test]
    fn test_singular_voltage_detected() {
        let (network, topology) = two_bus(0.01, 0.02);
        let model = NetworkModel::new(&network, &topology, 0.0);
        let err = SweepSolver::new()
            .solve(&topology, &model, &[[0.0; 3], [-0.01, 0.0, 0.0]], 5)
            .unwrap_err();

        assert_eq!(
            err,
            SweepError::SingularVoltage {
                bus: 1,
                phase: Phase::A,
                step: 5
            }
        );
    }

    #[test]
    fn test_zero_power_on_dead_phase_is_not_singular() {
        let (network, topology) = two_bus(0.01, 0.02);
        let model = NetworkModel::new(&network, &topology, 0.0);
        let solution = SweepSolver::new()
            .solve(&topology, &model, &[[0.0; 3], [0.0; 3]], 0)
            .unwrap();
        assert!(solution.converged);
    }

    #[test]
    fn test_dimension_mismatch() {
        let (network, topology) = two_bus(0.01, 0.02);
        let model = NetworkModel::new(&network, &topology, 1.0);
        let err = SweepSolver::new()
            .solve(&topology, &model, &[[0.0; 3]], 0)
            .unwrap_err();
        assert_eq!(
            err,
            SweepError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let (network, topology) = two_bus(0.05, 0.1);
        let model = NetworkModel::new(&network, &topology, 1.0);
        let solution = SweepSolver::new()
            .with_precision(1e-14)
            .with_max_iterations(1)
            .solve(&topology, &model, &[[0.0; 3], [-0.2, 0.0, 0.0]], 0)
            .unwrap();

        assert!(!solution.converged);
        assert_eq!(solution.iterations, 1);
        assert!(solution.error > 1e-14);
    }

    #[test]
    fn test_branch_current_flows_away_from_root() {
        let (network, topology) = two_bus(0.01, 0.0);
        let model = NetworkModel::new(&network, &topology, 1.0);
        let solution = SweepSolver::new()
            .with_precision(1e-12)
            .solve(&topology, &model, &[[0.0; 3], [-0.1, 0.0, 0.0]], 0)
            .unwrap();

        // A load draws current from the root: positive real part on phase A
        assert!(solution.current(0, Phase::A).re > 0.0);
        assert!(solution.current(0, Phase::Neutral).re < 0.0);
    }
}
