//! Forecast export.
//!
//! JSON output is one object keyed by topic, each topic holding the messages of every epoch in
//! order. CSV output flattens the same data into `voltages.csv` and `currents.csv`, one row per
//! (record, step).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::Writer;
use nsp_algo::EpochForecast;
use nsp_core::messages::{CurrentForecastMessage, VoltageForecastMessage};
use nsp_core::DiagnosticIssue;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Output messages of several epochs, grouped by topic
#[derive(Debug, Clone, Default)]
pub struct ForecastOutput {
    pub voltage_topic: String,
    pub current_topic: String,
    pub voltages: Vec<VoltageForecastMessage>,
    pub currents: Vec<CurrentForecastMessage>,
    pub diagnostics: Vec<DiagnosticIssue>,
}

impl ForecastOutput {
    pub fn new(voltage_topic: impl Into<String>, current_topic: impl Into<String>) -> Self {
        Self {
            voltage_topic: voltage_topic.into(),
            current_topic: current_topic.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, forecast: &EpochForecast) {
        self.voltages.extend(forecast.voltage_messages());
        self.currents.extend(forecast.current_messages());
        self.diagnostics
            .extend(forecast.diagnostics.issues.iter().cloned());
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        let mut topics = serde_json::Map::new();
        topics.insert(
            self.voltage_topic.clone(),
            serde_json::to_value(&self.voltages).context("serializing voltage forecasts")?,
        );
        topics.insert(
            self.current_topic.clone(),
            serde_json::to_value(&self.currents).context("serializing current forecasts")?,
        );
        Ok(serde_json::Value::Object(topics))
    }
}

pub fn write_json(output: &ForecastOutput, path: &Path) -> Result<()> {
    create_parent(path)?;
    let file =
        File::create(path).with_context(|| format!("creating output file {}", path.display()))?;
    serde_json::to_writer_pretty(file, &output.to_json_value()?)
        .with_context(|| format!("writing forecasts to {}", path.display()))?;
    info!(
        path = %path.display(),
        voltages = output.voltages.len(),
        currents = output.currents.len(),
        "wrote forecast messages"
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct VoltageRow<'a> {
    epoch: Option<u64>,
    step: usize,
    time: Option<DateTime<Utc>>,
    bus: &'a str,
    node: u8,
    magnitude_kv: f64,
    angle_deg: f64,
}

#[derive(Debug, Serialize)]
struct CurrentRow<'a> {
    epoch: Option<u64>,
    step: usize,
    time: Option<DateTime<Utc>>,
    device_id: &'a str,
    phase: u8,
    magnitude_a: f64,
    angle_deg: f64,
}

/// Write `voltages.csv` and `currents.csv` into `dir`
pub fn write_csv(forecasts: &[EpochForecast], dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating CSV directory {}", dir.display()))?;

    let voltage_path = dir.join("voltages.csv");
    let mut writer = csv_writer(&voltage_path)?;
    for forecast in forecasts {
        for record in &forecast.voltages {
            for step in 0..record.horizon() {
                writer
                    .serialize(VoltageRow {
                        epoch: forecast.epoch,
                        step,
                        time: forecast.time_index.get(step).copied(),
                        bus: &record.bus,
                        node: record.phase.node_number(),
                        magnitude_kv: record.magnitude[step].value(),
                        angle_deg: record.angle[step].value(),
                    })
                    .context("writing voltage row")?;
            }
        }
    }
    writer.flush().context("flushing voltages.csv")?;

    let current_path = dir.join("currents.csv");
    let mut writer = csv_writer(&current_path)?;
    for forecast in forecasts {
        for record in &forecast.currents {
            for step in 0..record.horizon() {
                writer
                    .serialize(CurrentRow {
                        epoch: forecast.epoch,
                        step,
                        time: forecast.time_index.get(step).copied(),
                        device_id: &record.device_id,
                        phase: record.phase.node_number(),
                        magnitude_a: record.magnitude[step].value(),
                        angle_deg: record.angle[step].value(),
                    })
                    .context("writing current row")?;
            }
        }
    }
    writer.flush().context("flushing currents.csv")?;

    info!(dir = %dir.display(), epochs = forecasts.len(), "wrote CSV forecasts");
    Ok(())
}

fn csv_writer(path: &Path) -> Result<Writer<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(Writer::from_writer(file))
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if parent != Path::new("") {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsp_algo::test_utils::three_bus_feeder;
    use nsp_algo::{Predictor, PredictorConfig};

    fn forecast() -> EpochForecast {
        let config = PredictorConfig::default().with_forecast_horizon(1);
        let mut predictor = Predictor::new(config).unwrap();
        predictor.start_epoch(Some(4));
        for message in three_bus_feeder().messages(4) {
            predictor.ingest(message).unwrap();
        }
        predictor.process_epoch().unwrap().unwrap()
    }

    #[test]
    fn test_json_keyed_by_topic() {
        let forecast = forecast();
        let mut output = ForecastOutput::new(&forecast.voltage_topic, &forecast.current_topic);
        output.push(&forecast);

        let value = output.to_json_value().unwrap();
        let voltages = value["NetworkForecastState.Voltage"].as_array().unwrap();
        let currents = value["NetworkForecastState.Current"].as_array().unwrap();
        assert_eq!(voltages.len(), 9);
        assert_eq!(currents.len(), 6);
        assert_eq!(voltages[0]["Type"], "NetworkForecastState.Voltage");
        assert_eq!(voltages[0]["EpochNumber"], 4);
        assert_eq!(voltages[0]["Forecast"]["Series"]["Magnitude"]["UnitOfMeasure"], "kV");
        assert_eq!(currents[0]["DeviceId"], "line-1");
    }

    #[test]
    fn test_write_json_creates_parent() {
        let forecast = forecast();
        let mut output = ForecastOutput::new(&forecast.voltage_topic, &forecast.current_topic);
        output.push(&forecast);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("forecasts.json");
        write_json(&output, &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, output.to_json_value().unwrap());
    }

    #[test]
    fn test_write_csv_tables() {
        let forecast = forecast();
        let dir = tempfile::tempdir().unwrap();
        write_csv(&[forecast], dir.path()).unwrap();

        let voltages = std::fs::read_to_string(dir.path().join("voltages.csv")).unwrap();
        let mut lines = voltages.lines();
        assert_eq!(
            lines.next().unwrap(),
            "epoch,step,time,bus,node,magnitude_kv,angle_deg"
        );
        assert_eq!(lines.count(), 9);
        assert!(voltages.contains("2024-01-01T00:00:00Z"));

        let currents = std::fs::read_to_string(dir.path().join("currents.csv")).unwrap();
        assert_eq!(currents.lines().count(), 7);
        assert!(currents.contains(",line-2,"));
    }
}
