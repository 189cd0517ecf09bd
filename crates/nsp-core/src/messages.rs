//! JSON message schema.
//!
//! Input messages are a tagged union on the `Type` field. Attribute names follow the
//! PascalCase convention of the simulation platform (`BusName`, `SendingEndBus`, ...), and
//! numeric attributes come as quantity blocks carrying a unit:
//!
//! ```json
//! {
//!   "Type": "Init.NIS.NetworkBusInfo",
//!   "EpochNumber": 1,
//!   "BusName": ["feeder", "house"],
//!   "BusType": ["root", "usage-point"],
//!   "BusVoltageBase": {"UnitOfMeasure": "kV", "Values": [20.0, 20.0]}
//! }
//! ```
//!
//! Published forecasts ([`VoltageForecastMessage`], [`CurrentForecastMessage`]) use the same
//! block layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Branch, Bus, BusKind, Kilovolts, NspError, NspResult, PhaseNode};

/// `{"UnitOfMeasure": ..., "Values": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityArrayBlock {
    #[serde(rename = "UnitOfMeasure")]
    pub unit: String,
    #[serde(rename = "Values")]
    pub values: Vec<f64>,
}

impl QuantityArrayBlock {
    pub fn new(unit: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            unit: unit.into(),
            values,
        }
    }
}

/// `{"UnitOfMeasure": ..., "Value": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityBlock {
    #[serde(rename = "UnitOfMeasure")]
    pub unit: String,
    #[serde(rename = "Value")]
    pub value: f64,
}

/// Horizon-length series sharing one time index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesBlock<S> {
    #[serde(rename = "TimeIndex")]
    pub time_index: Vec<DateTime<Utc>>,
    #[serde(rename = "Series")]
    pub series: S,
}

// ============================================================================
// Input messages
// ============================================================================

/// Every message the predictor consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum InputMessage {
    #[serde(rename = "Init.NIS.NetworkBusInfo")]
    Bus(BusInfoMessage),
    #[serde(rename = "Init.NIS.NetworkComponentInfo")]
    Component(ComponentInfoMessage),
    #[serde(rename = "Init.CIS.CustomerInfo")]
    Customer(CustomerInfoMessage),
    #[serde(rename = "ResourceState")]
    ResourceState(ResourceStateMessage),
    #[serde(rename = "ResourceForecastState.Power")]
    ResourceForecast(ResourceForecastMessage),
}

impl InputMessage {
    pub fn epoch_number(&self) -> Option<u64> {
        match self {
            InputMessage::Bus(m) => m.epoch_number,
            InputMessage::Component(m) => m.epoch_number,
            InputMessage::Customer(m) => m.epoch_number,
            InputMessage::ResourceState(m) => m.epoch_number,
            InputMessage::ResourceForecast(m) => m.epoch_number,
        }
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            InputMessage::Bus(_) => "Init.NIS.NetworkBusInfo",
            InputMessage::Component(_) => "Init.NIS.NetworkComponentInfo",
            InputMessage::Customer(_) => "Init.CIS.CustomerInfo",
            InputMessage::ResourceState(_) => "ResourceState",
            InputMessage::ResourceForecast(_) => "ResourceForecastState.Power",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BusInfoMessage {
    #[serde(default)]
    pub epoch_number: Option<u64>,
    #[serde(default)]
    pub message_id: Option<String>,
    pub bus_name: Vec<String>,
    pub bus_type: Vec<String>,
    pub bus_voltage_base: QuantityArrayBlock,
}

impl BusInfoMessage {
    /// Convert to buses, checking bus types, the single root, voltage bases and array lengths
    pub fn to_buses(&self) -> NspResult<Vec<Bus>> {
        let n = self.bus_name.len();
        if self.bus_type.len() != n || self.bus_voltage_base.values.len() != n {
            return Err(NspError::Message(format!(
                "bus info arrays differ in length: {} names, {} types, {} voltage bases",
                n,
                self.bus_type.len(),
                self.bus_voltage_base.values.len()
            )));
        }

        let kinds = self
            .bus_type
            .iter()
            .map(|t| t.parse::<BusKind>())
            .collect::<NspResult<Vec<_>>>()?;
        let roots = kinds.iter().filter(|&&k| k == BusKind::Root).count();
        if roots != 1 {
            return Err(NspError::Message(format!(
                "bus info must contain exactly one root bus, found {}",
                roots
            )));
        }

        if let Some((name, base)) = self
            .bus_name
            .iter()
            .zip(&self.bus_voltage_base.values)
            .find(|(_, base)| !(base.is_finite() && **base > 0.0))
        {
            return Err(NspError::Message(format!(
                "bus '{}' has voltage base {} kV; bases must be positive",
                name, base
            )));
        }

        Ok(self
            .bus_name
            .iter()
            .zip(kinds)
            .zip(&self.bus_voltage_base.values)
            .map(|((name, kind), &base)| Bus::new(name.clone(), Kilovolts(base), kind))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComponentInfoMessage {
    #[serde(default)]
    pub epoch_number: Option<u64>,
    #[serde(default)]
    pub message_id: Option<String>,
    pub device_id: Vec<String>,
    pub sending_end_bus: Vec<String>,
    pub receiving_end_bus: Vec<String>,
    pub resistance: QuantityArrayBlock,
    pub reactance: QuantityArrayBlock,
    pub shunt_admittance: QuantityArrayBlock,
    pub shunt_conductance: QuantityArrayBlock,
    pub rated_current: QuantityArrayBlock,
    /// Apparent-power base in kVA
    pub power_base: QuantityBlock,
}

impl ComponentInfoMessage {
    /// Convert to branches, checking that every array has one entry per device
    pub fn to_branches(&self) -> NspResult<Vec<Branch>> {
        let n = self.device_id.len();
        let lengths = [
            ("SendingEndBus", self.sending_end_bus.len()),
            ("ReceivingEndBus", self.receiving_end_bus.len()),
            ("Resistance", self.resistance.values.len()),
            ("Reactance", self.reactance.values.len()),
            ("ShuntAdmittance", self.shunt_admittance.values.len()),
            ("ShuntConductance", self.shunt_conductance.values.len()),
            ("RatedCurrent", self.rated_current.values.len()),
        ];
        if let Some((field, len)) = lengths.iter().find(|(_, len)| *len != n) {
            return Err(NspError::Message(format!(
                "component info {} has {} entries, expected {}",
                field, len, n
            )));
        }

        Ok((0..n)
            .map(|i| {
                Branch::new(
                    self.device_id[i].clone(),
                    self.sending_end_bus[i].clone(),
                    self.receiving_end_bus[i].clone(),
                )
                .with_impedance(self.resistance.values[i], self.reactance.values[i])
                .with_shunt(
                    self.shunt_conductance.values[i],
                    self.shunt_admittance.values[i],
                )
                .with_rated_current(self.rated_current.values[i])
            })
            .collect())
    }
}

/// One row of the customer table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRecord {
    pub resource_id: String,
    pub customer_id: String,
    pub bus: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerInfoMessage {
    #[serde(default)]
    pub epoch_number: Option<u64>,
    #[serde(default)]
    pub message_id: Option<String>,
    pub resource_id: Vec<String>,
    pub customer_id: Vec<String>,
    pub bus_name: Vec<String>,
}

impl CustomerInfoMessage {
    pub fn to_records(&self) -> NspResult<Vec<CustomerRecord>> {
        let n = self.resource_id.len();
        if self.customer_id.len() != n || self.bus_name.len() != n {
            return Err(NspError::Message(format!(
                "customer info arrays differ in length: {} resources, {} customers, {} buses",
                n,
                self.customer_id.len(),
                self.bus_name.len()
            )));
        }

        Ok(self
            .resource_id
            .iter()
            .zip(&self.customer_id)
            .zip(&self.bus_name)
            .map(|((resource, customer), bus)| CustomerRecord {
                resource_id: resource.clone(),
                customer_id: customer.clone(),
                bus: bus.clone(),
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceStateMessage {
    #[serde(default)]
    pub epoch_number: Option<u64>,
    #[serde(default)]
    pub message_id: Option<String>,
    pub resource_id: String,
    pub node: PhaseNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSeries {
    #[serde(rename = "RealPower")]
    pub real_power: QuantityArrayBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceForecastMessage {
    #[serde(default)]
    pub epoch_number: Option<u64>,
    #[serde(default)]
    pub message_id: Option<String>,
    pub resource_id: String,
    pub forecast: TimeSeriesBlock<PowerSeries>,
}

impl ResourceForecastMessage {
    /// Real power series in kW
    pub fn real_power(&self) -> &[f64] {
        &self.forecast.series.real_power.values
    }

    pub fn horizon(&self) -> usize {
        self.forecast.time_index.len()
    }
}

// ============================================================================
// Output messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageSeries {
    #[serde(rename = "Magnitude")]
    pub magnitude: QuantityArrayBlock,
    #[serde(rename = "Angle")]
    pub angle: QuantityArrayBlock,
}

/// Voltage forecast for one (bus, phase)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoltageForecastMessage {
    #[serde(rename = "Type")]
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub epoch_number: Option<u64>,
    pub bus: String,
    pub node: u8,
    pub forecast: TimeSeriesBlock<VoltageSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CurrentSeries {
    pub magnitude_sending_end: QuantityArrayBlock,
    pub magnitude_receiving_end: QuantityArrayBlock,
    pub angle_sending_end: QuantityArrayBlock,
    pub angle_receiving_end: QuantityArrayBlock,
}

/// Current forecast for one (branch, phase)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CurrentForecastMessage {
    #[serde(rename = "Type")]
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub epoch_number: Option<u64>,
    pub device_id: String,
    pub phase: u8,
    pub forecast: TimeSeriesBlock<CurrentSeries>,
}
