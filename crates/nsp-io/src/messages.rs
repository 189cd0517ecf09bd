//! Message log reading.
//!
//! A log is either one JSON array of messages or one message per line (blank lines and lines
//! starting with `#` are skipped).

use anyhow::{Context, Result};
use nsp_core::messages::InputMessage;
use std::path::Path;
use tracing::debug;

/// Messages sharing one epoch number, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub struct EpochBatch {
    pub epoch: Option<u64>,
    pub messages: Vec<InputMessage>,
}

pub fn read_messages(path: &Path) -> Result<Vec<InputMessage>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading message log {}", path.display()))?;
    let messages = parse_messages(&contents)
        .with_context(|| format!("parsing message log {}", path.display()))?;
    debug!(path = %path.display(), messages = messages.len(), "read message log");
    Ok(messages)
}

pub fn parse_messages(contents: &str) -> Result<Vec<InputMessage>> {
    if contents.trim_start().starts_with('[') {
        return serde_json::from_str(contents).context("parsing JSON message array");
    }

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(number, line)| {
            serde_json::from_str(line).with_context(|| format!("parsing message on line {}", number + 1))
        })
        .collect()
}

/// Split a message stream into epochs
///
/// Batches keep the order in which their epoch first appears. A message without an epoch
/// number joins the most recent batch.
pub fn group_by_epoch(messages: Vec<InputMessage>) -> Vec<EpochBatch> {
    let mut batches: Vec<EpochBatch> = Vec::new();

    for message in messages {
        let target = match message.epoch_number() {
            Some(epoch) => batches.iter().position(|b| b.epoch == Some(epoch)),
            None => batches.len().checked_sub(1),
        };
        match target {
            Some(index) => batches[index].messages.push(message),
            None => batches.push(EpochBatch {
                epoch: message.epoch_number(),
                messages: vec![message],
            }),
        }
    }

    batches
}
