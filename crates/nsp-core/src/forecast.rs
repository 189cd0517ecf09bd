//! Forecast records filled step by step during an epoch.
//!
//! One [`VoltageForecast`] exists per (bus, live phase) and one [`CurrentForecast`] per
//! (branch, live phase). Each holds a horizon-length magnitude/angle series in physical units.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::messages::{
    CurrentForecastMessage, CurrentSeries, QuantityArrayBlock, TimeSeriesBlock,
    VoltageForecastMessage, VoltageSeries,
};
use crate::{Amperes, Degrees, Kilovolts, Phase};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoltageForecast {
    pub bus: String,
    pub bus_index: usize,
    pub phase: Phase,
    pub magnitude: Vec<Kilovolts>,
    pub angle: Vec<Degrees>,
}

impl VoltageForecast {
    /// Zero-filled record for `horizon` steps
    pub fn new(bus: impl Into<String>, bus_index: usize, phase: Phase, horizon: usize) -> Self {
        Self {
            bus: bus.into(),
            bus_index,
            phase,
            magnitude: vec![Kilovolts(0.0); horizon],
            angle: vec![Degrees(0.0); horizon],
        }
    }

    pub fn set(&mut self, step: usize, magnitude: Kilovolts, angle: Degrees) {
        self.magnitude[step] = magnitude;
        self.angle[step] = angle;
    }

    pub fn horizon(&self) -> usize {
        self.magnitude.len()
    }

    pub fn to_message(
        &self,
        topic: &str,
        epoch_number: Option<u64>,
        time_index: &[DateTime<Utc>],
    ) -> VoltageForecastMessage {
        VoltageForecastMessage {
            message_type: topic.to_string(),
            epoch_number,
            bus: self.bus.clone(),
            node: self.phase.node_number(),
            forecast: TimeSeriesBlock {
                time_index: time_index.to_vec(),
                series: VoltageSeries {
                    magnitude: QuantityArrayBlock::new(
                        "kV",
                        self.magnitude.iter().map(|v| v.value()).collect(),
                    ),
                    angle: QuantityArrayBlock::new(
                        "deg",
                        self.angle.iter().map(|a| a.value()).collect(),
                    ),
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentForecast {
    pub device_id: String,
    pub branch_index: usize,
    pub phase: Phase,
    pub magnitude: Vec<Amperes>,
    pub angle: Vec<Degrees>,
}

impl CurrentForecast {
    pub fn new(
        device_id: impl Into<String>,
        branch_index: usize,
        phase: Phase,
        horizon: usize,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            branch_index,
            phase,
            magnitude: vec![Amperes(0.0); horizon],
            angle: vec![Degrees(0.0); horizon],
        }
    }

    pub fn set(&mut self, step: usize, magnitude: Amperes, angle: Degrees) {
        self.magnitude[step] = magnitude;
        self.angle[step] = angle;
    }

    pub fn horizon(&self) -> usize {
        self.magnitude.len()
    }

    /// Sending and receiving ends carry the same series
    pub fn to_message(
        &self,
        topic: &str,
        epoch_number: Option<u64>,
        time_index: &[DateTime<Utc>],
    ) -> CurrentForecastMessage {
        let magnitude: Vec<f64> = self.magnitude.iter().map(|i| i.value()).collect();
        let angle: Vec<f64> = self.angle.iter().map(|a| a.value()).collect();

        CurrentForecastMessage {
            message_type: topic.to_string(),
            epoch_number,
            device_id: self.device_id.clone(),
            phase: self.phase.node_number(),
            forecast: TimeSeriesBlock {
                time_index: time_index.to_vec(),
                series: CurrentSeries {
                    magnitude_sending_end: QuantityArrayBlock::new("A", magnitude.clone()),
                    magnitude_receiving_end: QuantityArrayBlock::new("A", magnitude),
                    angle_sending_end: QuantityArrayBlock::new("deg", angle.clone()),
                    angle_receiving_end: QuantityArrayBlock::new("deg", angle),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn time_index(n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|h| Utc.with_ymd_and_hms(2024, 1, 1, h as u32, 0, 0).unwrap())
            .collect()
    }

    #[test]
    fn test_voltage_message() {
        let mut record = VoltageForecast::new("house", 2, Phase::B, 2);
        record.set(1, Kilovolts(0.398), Degrees(-120.5));

        let msg = record.to_message("NetworkForecastState.Voltage", Some(3), &time_index(2));
        assert_eq!(msg.node, 2);
        assert_eq!(msg.epoch_number, Some(3));
        assert_eq!(msg.forecast.series.magnitude.unit, "kV");
        assert_eq!(msg.forecast.series.magnitude.values, vec![0.0, 0.398]);
        assert_eq!(msg.forecast.series.angle.values, vec![0.0, -120.5]);

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["Type"], "NetworkForecastState.Voltage");
        assert_eq!(json["Bus"], "house");
        assert_eq!(json["Forecast"]["TimeIndex"][0], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_current_message_ends_match() {
        let mut record = CurrentForecast::new("l1", 0, Phase::A, 1);
        record.set(0, Amperes(12.5), Degrees(-3.0));

        let msg = record.to_message("NetworkForecastState.Current", None, &time_index(1));
        let series = &msg.forecast.series;
        assert_eq!(msg.phase, 1);
        assert_eq!(series.magnitude_sending_end, series.magnitude_receiving_end);
        assert_eq!(series.angle_sending_end, series.angle_receiving_end);
        assert_eq!(series.magnitude_sending_end.values, vec![12.5]);

        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("EpochNumber").is_none());
        assert_eq!(json["DeviceId"], "l1");
        assert_eq!(
            json["Forecast"]["Series"]["MagnitudeReceivingEnd"]["UnitOfMeasure"],
            "A"
        );
    }
}
