//! jjgate binary entry point.
//!
//! ```text
//! stdin (JSON line) -> Host::handle_line -> Gatekeeper / ToolRegistry -> stdout (JSON line)
//! ```
//!
//! Requests are handled strictly one at a time, so responses come back in
//! request order. Logs go to a file because stdout carries the protocol.

use anyhow::{Context, Result};
use jjgate::Host;
use jjgate_config::{JjgateConfig, jjgate_dir};
use jjgate_tools::{Gatekeeper, JjDriver};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(config: &JjgateConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_filter().unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (log_file, init_warnings) = open_log_file(config.log_file());

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than corrupt the protocol on stdout.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file(configured: Option<&Path>) -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates(configured) {
        if let Some(parent) = candidate.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = configured {
        candidates.push(path.to_path_buf());
    }

    // Primary: ~/.jjgate/logs/jjgate.log
    if let Some(dir) = jjgate_dir() {
        candidates.push(dir.join("logs").join("jjgate.log"));
    }

    // Fallback: ./.jjgate/logs/jjgate.log
    candidates.push(PathBuf::from(".jjgate").join("logs").join("jjgate.log"));

    candidates
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_error) = match JjgateConfig::load() {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(err) => (JjgateConfig::default(), Some(err)),
    };

    init_tracing(&config);
    if let Some(err) = config_error {
        tracing::warn!(path = %err.path().display(), %err, "using default configuration");
    }

    let settings = config.vcs_settings();
    tracing::info!(
        binary = %settings.binary,
        remote = %settings.remote,
        bookmark = %settings.bookmark,
        timeout_ms = settings.timeout.as_millis(),
        "jjgate starting"
    );

    let driver = Arc::new(JjDriver::new(settings.clone()));
    let gate = Arc::new(Gatekeeper::new(driver, settings));
    let host = Host::new(gate).context("registering tools")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let Some(response) = host.handle_line(&line).await else {
            continue;
        };
        stdout
            .write_all(response.as_bytes())
            .await
            .context("writing response")?;
        stdout.write_all(b"\n").await.context("writing response")?;
        stdout.flush().await.context("flushing stdout")?;
    }

    tracing::info!("stdin closed, exiting");
    Ok(())
}
