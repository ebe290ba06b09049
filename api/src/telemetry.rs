use std::{fs::OpenOptions, path::Path, sync::Mutex};

use anyhow::{Context, Result};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Installs the global subscriber. Filtering follows `RUST_LOG` (default
/// `info`); inside CI the console output is JSON. When `log_file` is given
/// every line is also appended there as plain text.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned());
    // Naive check on env:GITHUB_ACTIONS to see if this is running inside a workflow
    let is_ci_env = std::env::var("GITHUB_ACTIONS").is_ok();

    let console = if is_ci_env {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    } else {
        fmt::layer().with_span_events(FmtSpan::CLOSE).boxed()
    };

    let file = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("unable to create log folder {}", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("unable to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(EnvFilter::new(filter))
        .try_init()
        .context("unable to install tracing subscriber")?;

    Ok(())
}
