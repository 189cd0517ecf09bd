//! Message log round trip through the predictor

use nsp_algo::test_utils::three_bus_feeder;
use nsp_algo::{Predictor, PredictorConfig};
use nsp_io::{group_by_epoch, read_messages, write_csv, write_json, ForecastOutput};
use std::io::Write;

#[test]
fn test_log_to_forecast_files() {
    let fixture = three_bus_feeder();
    let mut messages = fixture.messages(1);
    messages.extend(fixture.epoch_messages(2));

    let mut log = tempfile::NamedTempFile::new().unwrap();
    for message in &messages {
        writeln!(log, "{}", serde_json::to_string(message).unwrap()).unwrap();
    }

    let read = read_messages(log.path()).unwrap();
    assert_eq!(read, messages);

    let batches = group_by_epoch(read);
    assert_eq!(batches.len(), 2);

    let config = PredictorConfig::default().with_forecast_horizon(1);
    let mut predictor = Predictor::new(config.clone()).unwrap();
    let mut output = ForecastOutput::new(&config.voltage_topic, &config.current_topic);
    let mut forecasts = Vec::new();
    for batch in batches {
        predictor.start_epoch(batch.epoch);
        for message in batch.messages {
            predictor.ingest(message).unwrap();
        }
        let forecast = predictor.process_epoch().unwrap().unwrap();
        output.push(&forecast);
        forecasts.push(forecast);
    }

    let dir = tempfile::tempdir().unwrap();
    write_json(&output, &dir.path().join("forecasts.json")).unwrap();
    write_csv(&forecasts, dir.path()).unwrap();

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("forecasts.json")).unwrap(),
    )
    .unwrap();
    let voltages = json["NetworkForecastState.Voltage"].as_array().unwrap();
    assert_eq!(voltages.len(), 18);
    assert_eq!(voltages[9]["EpochNumber"], 2);

    let rows = std::fs::read_to_string(dir.path().join("voltages.csv")).unwrap();
    assert_eq!(rows.lines().count(), 1 + 18);
}

#[test]
fn test_json_array_log() {
    let messages = three_bus_feeder().messages(1);
    let mut log = tempfile::NamedTempFile::new().unwrap();
    write!(log, "{}", serde_json::to_string_pretty(&messages).unwrap()).unwrap();

    let read = read_messages(log.path()).unwrap();
    assert_eq!(read.len(), messages.len());
    assert_eq!(group_by_epoch(read).len(), 1);
}
