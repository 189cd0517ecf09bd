//! Maps resource forecasts onto bus/phase injections for one horizon step.
//!
//! Resolution runs once per epoch: resource → customer row → bus index, plus the connection
//! node from the latest `ResourceState`. Resources that cannot be placed are skipped with a
//! warning and a diagnostic; the rest of the epoch still runs.

use nsp_core::messages::CustomerRecord;
use nsp_core::{DiagnosticIssue, Diagnostics, Kilowatts, Network, Phase, PhaseNode, Severity};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::ThreePhaseSplit;
use crate::power_flow::PerUnitBase;

/// Real-power injection per bus for phases A, B, C (p.u.)
pub type Injections = Vec<[f64; 3]>;

/// A resource with a resolved bus and connection node
#[derive(Debug, Clone, PartialEq)]
pub struct MappedResource {
    pub resource_id: String,
    pub bus: usize,
    pub node: PhaseNode,
    pub power: Vec<Kilowatts>,
}

/// Resolve forecasts to buses, skipping resources that cannot be placed
pub fn resolve_resources<'a>(
    forecasts: impl IntoIterator<Item = (&'a str, &'a [f64])>,
    customers: &HashMap<String, CustomerRecord>,
    nodes: &HashMap<String, PhaseNode>,
    network: &Network,
    diagnostics: &mut Diagnostics,
) -> Vec<MappedResource> {
    let mut mapped = Vec::new();

    for (resource_id, power) in forecasts {
        let Some(customer) = customers.get(resource_id) else {
            warn!(resource_id, "resource missing from customer table; skipping");
            diagnostics.add_warning_with_entity(
                "mapping",
                "resource missing from customer table",
                resource_id,
            );
            continue;
        };
        let Some(bus) = network.bus_index(&customer.bus) else {
            warn!(
                resource_id,
                bus = %customer.bus,
                "resource is attached to an unknown bus; skipping"
            );
            diagnostics.add_warning_with_entity(
                "mapping",
                &format!("customer bus '{}' not found in network", customer.bus),
                resource_id,
            );
            continue;
        };

        let node = match nodes.get(resource_id) {
            Some(&node) => node,
            None => {
                debug!(resource_id, "no resource state received; assuming three-phase");
                PhaseNode::ThreePhase
            }
        };

        mapped.push(MappedResource {
            resource_id: resource_id.to_string(),
            bus: bus.index(),
            node,
            power: power.iter().copied().map(Kilowatts).collect(),
        });
    }

    mapped
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadMapper {
    split: ThreePhaseSplit,
}

impl LoadMapper {
    pub fn new(split: ThreePhaseSplit) -> Self {
        Self { split }
    }

    /// Bus/phase injections for `step`
    ///
    /// A resource whose series is shorter than the horizon contributes nothing at the missing
    /// steps and leaves a diagnostic.
    pub fn injections(
        &self,
        resources: &[MappedResource],
        per_unit: &PerUnitBase,
        bus_count: usize,
        step: usize,
        diagnostics: &mut Diagnostics,
    ) -> Injections {
        let mut injections = vec![[0.0; 3]; bus_count];

        for resource in resources {
            let Some(&power) = resource.power.get(step) else {
                warn!(
                    resource_id = %resource.resource_id,
                    step,
                    "forecast has no value for step; skipping"
                );
                diagnostics.add(
                    DiagnosticIssue::new(
                        Severity::Warning,
                        "forecast",
                        "forecast series shorter than horizon",
                    )
                    .with_entity(resource.resource_id.clone())
                    .with_step(step),
                );
                continue;
            };

            let p = per_unit.power_to_pu(power).value();
            let bus = &mut injections[resource.bus];
            match resource.node {
                PhaseNode::Single(Phase::Neutral) => {}
                PhaseNode::Single(phase) => bus[phase.index()] += p,
                PhaseNode::ThreePhase => {
                    let share = p / self.split.divisor();
                    for phase in Phase::LIVE {
                        bus[phase.index()] += share;
                    }
                }
            }
        }

        injections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsp_core::{Bus, BusKind, KilovoltAmperes, Kilovolts};

    fn network() -> Network {
        Network::from_parts(
            vec![
                Bus::new("root", Kilovolts(20.0), BusKind::Root),
                Bus::new("house", Kilovolts(20.0), BusKind::UsagePoint),
            ],
            vec![],
        )
        .unwrap()
    }

    fn customers() -> HashMap<String, CustomerRecord> {
        [("load-1", "house"), ("pv-1", "house"), ("ghost", "attic")]
            .into_iter()
            .map(|(resource, bus)| {
                (
                    resource.to_string(),
                    CustomerRecord {
                        resource_id: resource.to_string(),
                        customer_id: "c1".to_string(),
                        bus: bus.to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_resolution_skips_unplaceable_resources() {
        let load = [-100.0];
        let ghost = [5.0];
        let stranger = [1.0];
        let mut diagnostics = Diagnostics::new();
        let nodes = HashMap::from([("load-1".to_string(), PhaseNode::Single(Phase::B))]);

        let mapped = resolve_resources(
            vec![
                ("load-1", &load[..]),
                ("ghost", &ghost[..]),
                ("stranger", &stranger[..]),
            ],
            &customers(),
            &nodes,
            &network(),
            &mut diagnostics,
        );

        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0].bus, 1);
        assert_eq!(mapped[0].node, PhaseNode::Single(Phase::B));
        assert_eq!(diagnostics.warning_count(), 2);
        assert_eq!(diagnostics.issues_by_category("mapping").count(), 2);
    }

    #[test]
    fn test_missing_state_defaults_to_three_phase() {
        let pv = [30.0];
        let mut diagnostics = Diagnostics::new();
        let mapped = resolve_resources(
            vec![("pv-1", &pv[..])],
            &customers(),
            &HashMap::new(),
            &network(),
            &mut diagnostics,
        );
        assert_eq!(mapped[0].node, PhaseNode::ThreePhase);
    }

    fn resource(node: PhaseNode, power: &[f64]) -> MappedResource {
        MappedResource {
            resource_id: "r".to_string(),
            bus: 1,
            node,
            power: power.iter().copied().map(Kilowatts).collect(),
        }
    }

    #[test]
    fn test_single_phase_injection() {
        let per_unit = PerUnitBase::new(&network(), KilovoltAmperes(10_000.0));
        let mapper = LoadMapper::new(ThreePhaseSplit::Equal);
        let mut diagnostics = Diagnostics::new();

        let injections = mapper.injections(
            &[
                resource(PhaseNode::Single(Phase::A), &[-100.0, -50.0]),
                resource(PhaseNode::Single(Phase::A), &[20.0, 0.0]),
            ],
            &per_unit,
            2,
            0,
            &mut diagnostics,
        );

        assert_eq!(injections[0], [0.0; 3]);
        assert!((injections[1][0] + 0.008).abs() < 1e-15);
        assert_eq!(injections[1][1], 0.0);
        assert!(diagnostics.issues.is_empty());
    }

    #[test]
    fn test_three_phase_split_policies() {
        let per_unit = PerUnitBase::new(&network(), KilovoltAmperes(10_000.0));
        let resources = [resource(PhaseNode::ThreePhase, &[-300.0])];
        let mut diagnostics = Diagnostics::new();

        let equal = LoadMapper::new(ThreePhaseSplit::Equal).injections(
            &resources,
            &per_unit,
            2,
            0,
            &mut diagnostics,
        );
        for phase in 0..3 {
            assert!((equal[1][phase] + 0.01).abs() < 1e-15);
        }

        let sqrt = LoadMapper::new(ThreePhaseSplit::SqrtThree).injections(
            &resources,
            &per_unit,
            2,
            0,
            &mut diagnostics,
        );
        for phase in 0..3 {
            assert!((sqrt[1][phase] + 0.03 / 3f64.sqrt()).abs() < 1e-15);
        }
    }

    #[test]
    fn test_short_series_records_step_diagnostic() {
        let per_unit = PerUnitBase::new(&network(), KilovoltAmperes(10_000.0));
        let mut diagnostics = Diagnostics::new();

        let injections = LoadMapper::new(ThreePhaseSplit::Equal).injections(
            &[resource(PhaseNode::Single(Phase::C), &[-10.0])],
            &per_unit,
            2,
            3,
            &mut diagnostics,
        );

        assert_eq!(injections[1], [0.0; 3]);
        assert_eq!(diagnostics.issues[0].step, Some(3));
        assert_eq!(diagnostics.issues[0].entity.as_deref(), Some("r"));
    }
}
