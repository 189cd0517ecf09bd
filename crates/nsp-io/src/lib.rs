//! # nsp-io: Message Logs and Forecast Export
//!
//! File-level I/O around the predictor:
//!
//! - [`messages`]: read a JSON array or JSON-lines message log and split it into epochs
//! - [`config`]: load a [`PredictorConfig`](nsp_algo::PredictorConfig) from TOML
//! - [`export`]: write forecast messages keyed by topic (JSON) or as flat CSV tables
//!
//! Everything here returns `anyhow::Result` with the offending path in the error context.

pub mod config;
pub mod export;
pub mod messages;

pub use config::load_config;
pub use export::{write_csv, write_json, ForecastOutput};
pub use messages::{group_by_epoch, parse_messages, read_messages, EpochBatch};
