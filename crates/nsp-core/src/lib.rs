//! # nsp-core: Distribution Network Model Core
//!
//! Domain types for forecasting the state of a radial, three-phase unbalanced distribution
//! network: buses, branches, phases and the resource connection points that feed them.
//!
//! ## Design Philosophy
//!
//! The feeder is modeled as an **undirected tree**:
//! - **Nodes**: [`Bus`] (root, usage-point or dummy)
//! - **Edges**: [`Branch`] (line segments with series impedance and shunt admittance)
//!
//! Bus and branch positions in the graph are stable, so `NodeIndex::index()` and
//! `EdgeIndex::index()` double as array indices for per-step solver buffers.
//!
//! ## Quick Start
//!
//! ```
//! use nsp_core::*;
//!
//! let mut network = Network::new();
//! network.add_bus(Bus::new("feeder", Kilovolts(20.0), BusKind::Root)).unwrap();
//! network.add_bus(Bus::new("house", Kilovolts(0.4), BusKind::UsagePoint)).unwrap();
//! network
//!     .add_branch(Branch::new("line-1", "feeder", "house").with_impedance(0.01, 0.02))
//!     .unwrap();
//!
//! let topology = Topology::build(&network).unwrap();
//! assert_eq!(topology.depth(1), 1);
//! ```
//!
//! ## Modules
//!
//! - [`units`] - Unit newtypes (kV, kVA, kW, A, degrees, per-unit)
//! - [`topology`] - Radial validation, BFS order and root paths
//! - [`messages`] - JSON message schema for inputs and published forecasts
//! - [`forecast`] - Per-(bus, phase) and per-(branch, phase) forecast records
//! - [`diagnostics`] - Recoverable issue reporting

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub mod diagnostics;
pub mod error;
pub mod forecast;
pub mod messages;
pub mod topology;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{NspError, NspResult};
pub use forecast::{CurrentForecast, VoltageForecast};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
pub use topology::{Topology, TopologyError};
pub use units::{
    Amperes, Degrees, KilovoltAmperes, Kilovolts, Kilowatts, Ohms, PerUnit, Radians,
};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(usize);

impl BusId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BusId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl BranchId {
    #[inline]
    pub fn new(value: usize) -> Self {
        BranchId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Role of a bus in the feeder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusKind {
    /// Slack bus at the substation; exactly one per network
    Root,
    /// Bus with customers attached
    UsagePoint,
    /// Junction without customers
    Dummy,
}

impl FromStr for BusKind {
    type Err = NspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(BusKind::Root),
            "usage-point" => Ok(BusKind::UsagePoint),
            "dummy" => Ok(BusKind::Dummy),
            other => Err(NspError::Message(format!("unknown bus type '{}'", other))),
        }
    }
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BusKind::Root => "root",
            BusKind::UsagePoint => "usage-point",
            BusKind::Dummy => "dummy",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Line-to-line voltage base
    pub base_kv: Kilovolts,
    pub kind: BusKind,
}

impl Bus {
    /// Create a bus; the id is assigned when it is added to a [`Network`]
    pub fn new(name: impl Into<String>, base_kv: Kilovolts, kind: BusKind) -> Self {
        Self {
            id: BusId::new(0),
            name: name.into(),
            base_kv,
            kind,
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind == BusKind::Root
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId::new(0),
            name: String::new(),
            base_kv: Kilovolts(1.0),
            kind: BusKind::Dummy,
        }
    }
}

/// A line segment between two buses.
///
/// Impedance and shunt values are per-unit and identical on the three phases and the neutral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub device_id: String,
    pub sending_bus: String,
    pub receiving_bus: String,
    pub resistance: f64,
    pub reactance: f64,
    /// Shunt susceptance B
    pub shunt_admittance: f64,
    /// Shunt conductance G
    pub shunt_conductance: f64,
    pub rated_current: f64,
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            id: BranchId::new(0),
            device_id: String::new(),
            sending_bus: String::new(),
            receiving_bus: String::new(),
            resistance: 0.0,
            reactance: 0.0,
            shunt_admittance: 0.0,
            shunt_conductance: 0.0,
            rated_current: 0.0,
        }
    }
}

impl Branch {
    pub fn new(
        device_id: impl Into<String>,
        sending_bus: impl Into<String>,
        receiving_bus: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            sending_bus: sending_bus.into(),
            receiving_bus: receiving_bus.into(),
            ..Self::default()
        }
    }

    pub fn with_impedance(mut self, resistance: f64, reactance: f64) -> Self {
        self.resistance = resistance;
        self.reactance = reactance;
        self
    }

    /// Set shunt conductance G and susceptance B
    pub fn with_shunt(mut self, conductance: f64, susceptance: f64) -> Self {
        self.shunt_conductance = conductance;
        self.shunt_admittance = susceptance;
        self
    }

    pub fn with_rated_current(mut self, rated_current: f64) -> Self {
        self.rated_current = rated_current;
        self
    }
}

/// One of the four conductors of a line segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    A,
    B,
    C,
    Neutral,
}

impl Phase {
    /// All four conductors, in buffer order
    pub const CONDUCTORS: [Phase; 4] = [Phase::A, Phase::B, Phase::C, Phase::Neutral];

    /// The three published phases
    pub const LIVE: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Phase::A => 0,
            Phase::B => 1,
            Phase::C => 2,
            Phase::Neutral => 3,
        }
    }

    /// Node number used in published messages (1, 2, 3; neutral is 4)
    #[inline]
    pub const fn node_number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn from_node_number(node: u8) -> Option<Self> {
        match node {
            1 => Some(Phase::A),
            2 => Some(Phase::B),
            3 => Some(Phase::C),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::A => "A",
            Phase::B => "B",
            Phase::C => "C",
            Phase::Neutral => "N",
        };
        f.write_str(label)
    }
}

/// Where a resource is connected: one phase, or all three.
///
/// On the wire this is `1`, `2`, `3` or `"three-phase"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "NodeRepr", into = "NodeRepr")]
pub enum PhaseNode {
    Single(Phase),
    #[default]
    ThreePhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum NodeRepr {
    Number(u8),
    Label(String),
}

impl TryFrom<NodeRepr> for PhaseNode {
    type Error = String;

    fn try_from(repr: NodeRepr) -> Result<Self, Self::Error> {
        match repr {
            NodeRepr::Number(n) => Phase::from_node_number(n)
                .map(PhaseNode::Single)
                .ok_or_else(|| format!("invalid node number {}", n)),
            NodeRepr::Label(label) if label == "three-phase" => Ok(PhaseNode::ThreePhase),
            NodeRepr::Label(label) => Err(format!("invalid node '{}'", label)),
        }
    }
}

impl From<PhaseNode> for NodeRepr {
    fn from(node: PhaseNode) -> Self {
        match node {
            PhaseNode::Single(phase) => NodeRepr::Number(phase.node_number()),
            PhaseNode::ThreePhase => NodeRepr::Label("three-phase".to_string()),
        }
    }
}

/// The distribution network graph
#[derive(Debug, Default)]
pub struct Network {
    pub graph: Graph<Bus, Branch, Undirected>,
    bus_lookup: HashMap<String, NodeIndex>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
            bus_lookup: HashMap::new(),
        }
    }

    /// Build a network from bus and branch lists, preserving their order as indices
    pub fn from_parts(
        buses: impl IntoIterator<Item = Bus>,
        branches: impl IntoIterator<Item = Branch>,
    ) -> Result<Self, TopologyError> {
        let mut network = Self::new();
        for bus in buses {
            network.add_bus(bus)?;
        }
        for branch in branches {
            network.add_branch(branch)?;
        }
        Ok(network)
    }

    /// Add a bus; its id becomes its position in the graph
    pub fn add_bus(&mut self, mut bus: Bus) -> Result<NodeIndex, TopologyError> {
        if self.bus_lookup.contains_key(&bus.name) {
            return Err(TopologyError::DuplicateBus(bus.name));
        }
        bus.id = BusId::new(self.graph.node_count());
        let name = bus.name.clone();
        let idx = self.graph.add_node(bus);
        self.bus_lookup.insert(name, idx);
        Ok(idx)
    }

    /// Connect two existing buses
    pub fn add_branch(&mut self, mut branch: Branch) -> Result<EdgeIndex, TopologyError> {
        let from = self.resolve(&branch.sending_bus, &branch.device_id)?;
        let to = self.resolve(&branch.receiving_bus, &branch.device_id)?;
        if from == to {
            return Err(TopologyError::SelfLoop {
                device_id: branch.device_id,
                bus: branch.sending_bus,
            });
        }
        branch.id = BranchId::new(self.graph.edge_count());
        Ok(self.graph.add_edge(from, to, branch))
    }

    fn resolve(&self, bus: &str, device_id: &str) -> Result<NodeIndex, TopologyError> {
        self.bus_lookup
            .get(bus)
            .copied()
            .ok_or_else(|| TopologyError::UnknownBus {
                device_id: device_id.to_string(),
                bus: bus.to_string(),
            })
    }

    pub fn bus_index(&self, name: &str) -> Option<NodeIndex> {
        self.bus_lookup.get(name).copied()
    }

    pub fn bus(&self, index: usize) -> Option<&Bus> {
        self.graph.node_weight(NodeIndex::new(index))
    }

    pub fn branch(&self, index: usize) -> Option<&Branch> {
        self.graph.edge_weight(EdgeIndex::new(index))
    }

    pub fn buses(&self) -> impl Iterator<Item = &Bus> {
        self.graph.node_weights()
    }

    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.graph.edge_weights()
    }

    pub fn bus_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn branch_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Endpoint bus indices of a branch as (sending, receiving)
    pub fn branch_endpoints(&self, index: usize) -> Option<(usize, usize)> {
        self.graph
            .edge_endpoints(EdgeIndex::new(index))
            .map(|(a, b)| (a.index(), b.index()))
    }

    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats {
            num_buses: self.bus_count(),
            num_branches: self.branch_count(),
            ..NetworkStats::default()
        };
        for bus in self.buses() {
            match bus.kind {
                BusKind::Root => stats.num_roots += 1,
                BusKind::UsagePoint => stats.num_usage_points += 1,
                BusKind::Dummy => {}
            }
        }
        stats
    }
}

/// Statistics about a network's size
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_branches: usize,
    pub num_roots: usize,
    pub num_usage_points: usize,
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buses ({} usage points), {} branches",
            self.num_buses, self.num_usage_points, self.num_branches
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus() -> Network {
        let mut network = Network::new();
        network
            .add_bus(Bus::new("root", Kilovolts(20.0), BusKind::Root))
            .unwrap();
        network
            .add_bus(Bus::new("load", Kilovolts(20.0), BusKind::UsagePoint))
            .unwrap();
        network
            .add_branch(Branch::new("l1", "root", "load").with_impedance(0.01, 0.02))
            .unwrap();
        network
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let network = two_bus();
        assert_eq!(network.bus(0).unwrap().id, BusId::new(0));
        assert_eq!(network.bus(1).unwrap().id, BusId::new(1));
        assert_eq!(network.branch(0).unwrap().id, BranchId::new(0));
        assert_eq!(network.bus_index("load"), Some(NodeIndex::new(1)));
        assert_eq!(network.branch_endpoints(0), Some((0, 1)));
    }

    #[test]
    fn test_unknown_bus_rejected() {
        let mut network = two_bus();
        let err = network
            .add_branch(Branch::new("l2", "load", "nowhere"))
            .unwrap_err();
        assert!(matches!(err, TopologyError::UnknownBus { .. }));
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut network = two_bus();
        let err = network.add_branch(Branch::new("l2", "load", "load")).unwrap_err();
        assert!(matches!(err, TopologyError::SelfLoop { .. }));
    }

    #[test]
    fn test_duplicate_bus_rejected() {
        let mut network = two_bus();
        let err = network
            .add_bus(Bus::new("load", Kilovolts(0.4), BusKind::Dummy))
            .unwrap_err();
        assert!(matches!(err, TopologyError::DuplicateBus(name) if name == "load"));
    }

    #[test]
    fn test_bus_kind_parse() {
        assert_eq!("root".parse::<BusKind>().unwrap(), BusKind::Root);
        assert_eq!("usage-point".parse::<BusKind>().unwrap(), BusKind::UsagePoint);
        assert_eq!("dummy".parse::<BusKind>().unwrap(), BusKind::Dummy);
        assert!("substation".parse::<BusKind>().is_err());
        assert_eq!(BusKind::UsagePoint.to_string(), "usage-point");
    }

    #[test]
    fn test_phase_indices() {
        for (i, phase) in Phase::CONDUCTORS.iter().enumerate() {
            assert_eq!(phase.index(), i);
        }
        assert_eq!(Phase::C.node_number(), 3);
        assert_eq!(Phase::from_node_number(2), Some(Phase::B));
        assert_eq!(Phase::from_node_number(4), None);
    }

    #[test]
    fn test_phase_node_serde() {
        let single: PhaseNode = serde_json::from_str("2").unwrap();
        assert_eq!(single, PhaseNode::Single(Phase::B));

        let three: PhaseNode = serde_json::from_str("\"three-phase\"").unwrap();
        assert_eq!(three, PhaseNode::ThreePhase);

        assert!(serde_json::from_str::<PhaseNode>("0").is_err());
        assert!(serde_json::from_str::<PhaseNode>("\"split\"").is_err());

        assert_eq!(serde_json::to_string(&PhaseNode::Single(Phase::A)).unwrap(), "1");
        assert_eq!(
            serde_json::to_string(&PhaseNode::ThreePhase).unwrap(),
            "\"three-phase\""
        );
    }

    #[test]
    fn test_stats() {
        let stats = two_bus().stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_branches, 1);
        assert_eq!(stats.num_roots, 1);
        assert_eq!(stats.to_string(), "2 buses (1 usage points), 1 branches");
    }
}
