//! Electrical parameters the sweep reads on every iteration.

use num_complex::Complex64;
use nsp_core::{Network, Phase, Topology};

/// Balanced source voltage per conductor
///
/// A leads at 0°, B at 240°, C at 120°; the neutral is grounded.
pub fn balanced_source(magnitude: f64) -> [Complex64; 4] {
    let mut source = [Complex64::new(0.0, 0.0); 4];
    source[Phase::A.index()] = Complex64::new(magnitude, 0.0);
    source[Phase::B.index()] = Complex64::from_polar(magnitude, 240f64.to_radians());
    source[Phase::C.index()] = Complex64::from_polar(magnitude, 120f64.to_radians());
    source
}

/// Per-branch impedance and per-bus shunt admittance in per-unit
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkModel {
    impedance: Vec<Complex64>,
    shunt: Vec<Complex64>,
    source: [Complex64; 4],
    root: usize,
}

impl NetworkModel {
    pub fn new(network: &Network, topology: &Topology, root_voltage_pu: f64) -> Self {
        let mut impedance = vec![Complex64::new(0.0, 0.0); network.branch_count()];
        let mut shunt = vec![Complex64::new(0.0, 0.0); network.bus_count()];

        for (index, branch) in network.branches().enumerate() {
            impedance[index] = Complex64::new(branch.resistance, branch.reactance);

            // Half of G + jB lands on each end
            let half = Complex64::new(branch.shunt_conductance, branch.shunt_admittance) * 0.5;
            if let Some((from, to)) = network.branch_endpoints(index) {
                shunt[from] += half;
                shunt[to] += half;
            }
        }

        Self {
            impedance,
            shunt,
            source: balanced_source(root_voltage_pu),
            root: topology.root(),
        }
    }

    /// Series impedance, identical on every conductor
    pub fn impedance(&self, branch: usize) -> Complex64 {
        self.impedance[branch]
    }

    /// Accumulated shunt admittance, identical on every conductor
    pub fn shunt(&self, bus: usize) -> Complex64 {
        self.shunt[bus]
    }

    pub fn source(&self) -> [Complex64; 4] {
        self.source
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn bus_count(&self) -> usize {
        self.shunt.len()
    }

    pub fn branch_count(&self) -> usize {
        self.impedance.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsp_core::{Branch, Bus, BusKind, Kilovolts};

    #[test]
    fn test_balanced_source() {
        let source = balanced_source(1.02);
        assert_eq!(source[Phase::A.index()], Complex64::new(1.02, 0.0));
        assert_eq!(source[Phase::Neutral.index()], Complex64::new(0.0, 0.0));
        assert!((source[Phase::B.index()].norm() - 1.02).abs() < 1e-12);
        assert!((source[Phase::B.index()].arg().to_degrees() + 120.0).abs() < 1e-9);
        assert!((source[Phase::C.index()].arg().to_degrees() - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_shunt_split_to_both_ends() {
        let network = Network::from_parts(
            vec![
                Bus::new("root", Kilovolts(20.0), BusKind::Root),
                Bus::new("mid", Kilovolts(20.0), BusKind::Dummy),
                Bus::new("end", Kilovolts(20.0), BusKind::UsagePoint),
            ],
            vec![
                Branch::new("l1", "root", "mid")
                    .with_impedance(0.01, 0.02)
                    .with_shunt(0.002, 0.004),
                Branch::new("l2", "mid", "end")
                    .with_impedance(0.03, 0.01)
                    .with_shunt(0.0, 0.002),
            ],
        )
        .unwrap();
        let topology = Topology::build(&network).unwrap();
        let model = NetworkModel::new(&network, &topology, 1.0);

        assert_eq!(model.impedance(1), Complex64::new(0.03, 0.01));
        assert_eq!(model.shunt(0), Complex64::new(0.001, 0.002));
        assert_eq!(model.shunt(1), Complex64::new(0.001, 0.003));
        assert_eq!(model.shunt(2), Complex64::new(0.0, 0.001));
        assert_eq!(model.root(), 0);
    }
}
