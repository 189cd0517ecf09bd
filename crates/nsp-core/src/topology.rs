//! Radial topology tables derived once from the network graph.
//!
//! [`Topology::build`] walks the feeder breadth-first from the root bus with an explicit queue
//! and a visited table sized to the bus count. In one pass it checks the graph is a tree and
//! records, for every bus:
//!
//! - its position in BFS order (the forward-sweep order),
//! - its parent bus and the branch leading to it,
//! - its depth (number of branches from the root),
//! - its root path as a list of branch indices (the backward-sweep accumulation path).
//!
//! ```text
//!   root ──b0── n1 ──b1── n2
//!                └──b2── n3
//!
//!   path(n2) = [b0, b1]    depth(n2) = 2
//!   path(n3) = [b0, b2]    depth(n3) = 2
//! ```

use petgraph::visit::EdgeRef;
use std::collections::VecDeque;
use thiserror::Error;

use crate::{BusKind, Network};

/// Violations of the single-root radial tree requirement
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("network has no root bus")]
    NoRoot,

    #[error("network has several root buses: {}", .0.join(", "))]
    MultipleRoots(Vec<String>),

    #[error("bus '{0}' is not reachable from the root")]
    Disconnected(String),

    #[error("branch '{device_id}' closes a loop; the network must be radial")]
    Cycle { device_id: String },

    #[error("branch '{device_id}' references unknown bus '{bus}'")]
    UnknownBus { device_id: String, bus: String },

    #[error("branch '{device_id}' connects bus '{bus}' to itself")]
    SelfLoop { device_id: String, bus: String },

    #[error("bus '{0}' is defined more than once")]
    DuplicateBus(String),
}

/// Immutable radial tables indexed by bus and branch position
#[derive(Debug, Clone)]
pub struct Topology {
    root: usize,
    order: Vec<usize>,
    parent: Vec<Option<(usize, usize)>>,
    depth: Vec<usize>,
    paths: Vec<Vec<usize>>,
}

impl Topology {
    /// Validate the network as a single-root tree and precompute the sweep tables
    pub fn build(network: &Network) -> Result<Self, TopologyError> {
        let graph = &network.graph;
        let n = graph.node_count();

        let roots: Vec<_> = graph
            .node_indices()
            .filter(|&idx| graph[idx].kind == BusKind::Root)
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(TopologyError::NoRoot),
            [root] => *root,
            _ => {
                return Err(TopologyError::MultipleRoots(
                    roots.iter().map(|&idx| graph[idx].name.clone()).collect(),
                ))
            }
        };

        let mut visited = vec![false; n];
        let mut parent = vec![None; n];
        let mut depth = vec![0; n];
        let mut paths = vec![Vec::new(); n];
        let mut order = Vec::with_capacity(n);
        let mut queue = VecDeque::new();

        visited[root.index()] = true;
        queue.push_back(root);

        while let Some(node) = queue.pop_front() {
            let u = node.index();
            order.push(u);
            let parent_edge = parent[u].map(|(_, edge)| edge);

            for edge in graph.edges(node) {
                let e = edge.id().index();
                if Some(e) == parent_edge {
                    continue;
                }
                let other = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                let v = other.index();
                if visited[v] {
                    return Err(TopologyError::Cycle {
                        device_id: edge.weight().device_id.clone(),
                    });
                }
                visited[v] = true;
                parent[v] = Some((u, e));
                depth[v] = depth[u] + 1;
                let mut path = paths[u].clone();
                path.push(e);
                paths[v] = path;
                queue.push_back(other);
            }
        }

        if let Some(unreached) = visited.iter().position(|&seen| !seen) {
            return Err(TopologyError::Disconnected(
                network
                    .bus(unreached)
                    .map(|bus| bus.name.clone())
                    .unwrap_or_default(),
            ));
        }

        Ok(Self {
            root: root.index(),
            order,
            parent,
            depth,
            paths,
        })
    }

    /// Index of the root (slack) bus
    pub fn root(&self) -> usize {
        self.root
    }

    /// Bus indices in BFS order starting at the root
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Parent bus and connecting branch; `None` for the root
    pub fn parent(&self, bus: usize) -> Option<(usize, usize)> {
        self.parent[bus]
    }

    pub fn depth(&self, bus: usize) -> usize {
        self.depth[bus]
    }

    pub fn max_depth(&self) -> usize {
        self.depth.iter().copied().max().unwrap_or(0)
    }

    /// Branch indices on the path from the root to `bus`
    pub fn root_path(&self, bus: usize) -> &[usize] {
        &self.paths[bus]
    }

    pub fn bus_count(&self) -> usize {
        self.order.len()
    }
}
