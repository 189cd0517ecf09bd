use anyhow::{bail, Context, Result};
use nsp_algo::{EpochForecast, Predictor};
use nsp_cli::RunArgs;
use nsp_io::{group_by_epoch, load_config, read_messages, write_csv, write_json, ForecastOutput};
use std::time::Instant;
use tracing::{info, warn};

use crate::commands::util::configure_threads;

pub fn handle(args: &RunArgs) -> Result<()> {
    let start = Instant::now();
    let threads = configure_threads(&args.threads);

    let config = args.apply_overrides(load_config(args.config.as_deref())?);
    config.validate()?;
    info!(?config, threads, "predictor configuration");

    let batches = group_by_epoch(read_messages(&args.messages)?);
    let mut predictor = Predictor::new(config.clone())?;
    let mut output = ForecastOutput::new(&config.voltage_topic, &config.current_topic);
    let mut forecasts: Vec<EpochForecast> = Vec::new();

    for batch in batches {
        predictor.start_epoch(batch.epoch);
        for message in batch.messages {
            let message_type = message.message_type();
            predictor
                .ingest(message)
                .with_context(|| format!("ingesting {} (epoch {:?})", message_type, batch.epoch))?;
        }

        match predictor
            .process_epoch()
            .with_context(|| format!("processing epoch {:?}", batch.epoch))?
        {
            Some(forecast) => {
                for issue in &forecast.diagnostics.issues {
                    warn!(epoch = ?forecast.epoch, "{}", issue);
                }
                output.push(&forecast);
                forecasts.push(forecast);
            }
            None => info!(epoch = ?batch.epoch, "epoch inputs incomplete; nothing to forecast"),
        }
    }

    if forecasts.is_empty() {
        bail!(
            "no epoch in {} had complete inputs",
            args.messages.display()
        );
    }

    match &args.out {
        Some(path) => write_json(&output, path)?,
        None => println!(
            "{}",
            serde_json::to_string_pretty(&output.to_json_value()?)
                .context("serializing forecasts")?
        ),
    }
    if let Some(dir) = &args.csv {
        write_csv(&forecasts, dir)?;
    }

    let steps: usize = forecasts.iter().map(EpochForecast::horizon).sum();
    let converged: usize = forecasts
        .iter()
        .map(|f| f.steps.iter().filter(|s| s.converged).count())
        .sum();
    eprintln!(
        "Forecast {} epoch(s): {}/{} steps converged, {} diagnostic(s) in {:.1} ms",
        forecasts.len(),
        converged,
        steps,
        output.diagnostics.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}
