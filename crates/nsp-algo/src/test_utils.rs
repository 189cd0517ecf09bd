//! Feeder fixtures shared by unit and integration tests.

use chrono::{DateTime, Duration, Utc};
use nsp_core::messages::{
    BusInfoMessage, ComponentInfoMessage, CustomerInfoMessage, InputMessage, PowerSeries,
    QuantityArrayBlock, QuantityBlock, ResourceForecastMessage, ResourceStateMessage,
    TimeSeriesBlock,
};
use nsp_core::{Branch, BusKind, PhaseNode};

/// 2024-01-01T00:00:00Z
const FIXTURE_START: i64 = 1_704_067_200;

/// Hourly time index starting at the fixture start time
pub fn time_index(horizon: usize) -> Vec<DateTime<Utc>> {
    let start = DateTime::<Utc>::from_timestamp(FIXTURE_START, 0).unwrap_or_default();
    (0..horizon)
        .map(|h| start + Duration::hours(h as i64))
        .collect()
}

#[derive(Debug, Clone)]
struct FixtureResource {
    resource_id: String,
    bus: String,
    node: Option<PhaseNode>,
    power_kw: Vec<f64>,
}

/// Builder producing the message stream for a small feeder
#[derive(Debug, Clone)]
pub struct FeederFixture {
    buses: Vec<(String, BusKind, f64)>,
    branches: Vec<Branch>,
    power_base_kva: f64,
    resources: Vec<FixtureResource>,
}

impl Default for FeederFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl FeederFixture {
    pub fn new() -> Self {
        Self {
            buses: Vec::new(),
            branches: Vec::new(),
            power_base_kva: 10_000.0,
            resources: Vec::new(),
        }
    }

    pub fn bus(mut self, name: &str, kind: BusKind, base_kv: f64) -> Self {
        self.buses.push((name.to_string(), kind, base_kv));
        self
    }

    pub fn branch(mut self, branch: Branch) -> Self {
        self.branches.push(branch);
        self
    }

    pub fn power_base(mut self, kva: f64) -> Self {
        self.power_base_kva = kva;
        self
    }

    /// Attach a resource; `node = None` sends no `ResourceState` for it
    pub fn resource(
        mut self,
        resource_id: &str,
        bus: &str,
        node: Option<PhaseNode>,
        power_kw: Vec<f64>,
    ) -> Self {
        self.resources.push(FixtureResource {
            resource_id: resource_id.to_string(),
            bus: bus.to_string(),
            node,
            power_kw,
        });
        self
    }

    pub fn bus_message(&self, epoch: u64) -> InputMessage {
        InputMessage::Bus(BusInfoMessage {
            epoch_number: Some(epoch),
            message_id: Some(format!("nis-bus-{}", epoch)),
            bus_name: self.buses.iter().map(|(name, _, _)| name.clone()).collect(),
            bus_type: self.buses.iter().map(|(_, kind, _)| kind.to_string()).collect(),
            bus_voltage_base: QuantityArrayBlock::new(
                "kV",
                self.buses.iter().map(|(_, _, kv)| *kv).collect(),
            ),
        })
    }

    pub fn component_message(&self, epoch: u64) -> InputMessage {
        let column = |f: fn(&Branch) -> f64| {
            QuantityArrayBlock::new("{pu}", self.branches.iter().map(f).collect())
        };
        InputMessage::Component(ComponentInfoMessage {
            epoch_number: Some(epoch),
            message_id: Some(format!("nis-component-{}", epoch)),
            device_id: self.branches.iter().map(|b| b.device_id.clone()).collect(),
            sending_end_bus: self.branches.iter().map(|b| b.sending_bus.clone()).collect(),
            receiving_end_bus: self
                .branches
                .iter()
                .map(|b| b.receiving_bus.clone())
                .collect(),
            resistance: column(|b| b.resistance),
            reactance: column(|b| b.reactance),
            shunt_admittance: column(|b| b.shunt_admittance),
            shunt_conductance: column(|b| b.shunt_conductance),
            rated_current: column(|b| b.rated_current),
            power_base: QuantityBlock {
                unit: "kV.A".to_string(),
                value: self.power_base_kva,
            },
        })
    }

    pub fn customer_message(&self, epoch: u64) -> InputMessage {
        InputMessage::Customer(CustomerInfoMessage {
            epoch_number: Some(epoch),
            message_id: Some(format!("cis-{}", epoch)),
            resource_id: self
                .resources
                .iter()
                .map(|r| r.resource_id.clone())
                .collect(),
            customer_id: self
                .resources
                .iter()
                .map(|r| format!("customer-{}", r.resource_id))
                .collect(),
            bus_name: self.resources.iter().map(|r| r.bus.clone()).collect(),
        })
    }

    /// Resource states followed by one forecast per resource
    pub fn epoch_messages(&self, epoch: u64) -> Vec<InputMessage> {
        let states = self.resources.iter().filter_map(|r| {
            r.node.map(|node| {
                InputMessage::ResourceState(ResourceStateMessage {
                    epoch_number: Some(epoch),
                    message_id: None,
                    resource_id: r.resource_id.clone(),
                    node,
                })
            })
        });
        let forecasts = self
            .resources
            .iter()
            .map(|r| self.forecast_message(epoch, &r.resource_id, r.power_kw.clone()));

        states.chain(forecasts).collect()
    }

    pub fn forecast_message(
        &self,
        epoch: u64,
        resource_id: &str,
        power_kw: Vec<f64>,
    ) -> InputMessage {
        InputMessage::ResourceForecast(ResourceForecastMessage {
            epoch_number: Some(epoch),
            message_id: Some(format!("forecast-{}-{}", resource_id, epoch)),
            resource_id: resource_id.to_string(),
            forecast: TimeSeriesBlock {
                time_index: time_index(power_kw.len()),
                series: PowerSeries {
                    real_power: QuantityArrayBlock::new("kW", power_kw),
                },
            },
        })
    }

    /// Full stream for one epoch: topology first, then states and forecasts
    pub fn messages(&self, epoch: u64) -> Vec<InputMessage> {
        let mut messages = vec![
            self.bus_message(epoch),
            self.component_message(epoch),
            self.customer_message(epoch),
        ];
        messages.extend(self.epoch_messages(epoch));
        messages
    }
}

/// Root plus `n` buses in series, every branch with impedance `r + jx`
pub fn series_feeder(n: usize, r: f64, x: f64) -> FeederFixture {
    let mut fixture = FeederFixture::new().bus("root", BusKind::Root, 20.0);
    let mut previous = "root".to_string();
    for i in 1..=n {
        let name = format!("n{}", i);
        let kind = if i == n {
            BusKind::UsagePoint
        } else {
            BusKind::Dummy
        };
        fixture = fixture.bus(&name, kind, 20.0).branch(
            Branch::new(format!("line-{}", i), previous.as_str(), name.as_str())
                .with_impedance(r, x),
        );
        previous = name;
    }
    fixture
}

/// Three buses in series, 100 kW drawn on phase A at the far end
pub fn three_bus_feeder() -> FeederFixture {
    series_feeder(2, 0.01, 0.02).resource(
        "load-1",
        "n2",
        Some(PhaseNode::Single(nsp_core::Phase::A)),
        vec![-100.0],
    )
}
