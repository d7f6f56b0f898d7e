//! Process-wide tracing setup: human-readable output on stderr plus a
//! JSON-formatted copy appended to [`Config::log_path`], mirroring the
//! stderr-only subscriber the original server entry point installed but
//! adding the on-disk trail this library's embedders can't otherwise see.

use std::fs::{File, OpenOptions};
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::error::{CodexfiError, Result};

/// Builds and installs the global subscriber. Call once, near process
/// start, before any other `tracing` call; a second call returns an
/// error rather than panicking.
pub fn init(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| CodexfiError::Config(format!("creating data dir for log file: {e}")))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .map_err(|e| CodexfiError::Config(format!("opening log file: {e}")))?;
    let file = Arc::new(file);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(move || clone_handle(&file))
        .with_ansi(false)
        .json();

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .map_err(|e| CodexfiError::Config(format!("installing tracing subscriber: {e}")))
}

fn clone_handle(file: &Arc<File>) -> File {
    file.try_clone()
        .expect("cloning log file descriptor should not fail")
}
