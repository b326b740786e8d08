use anyhow::Result;
use chrono::{DateTime, Local};
use std::{fs::OpenOptions, io::Write, path::Path};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over the `info` default.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    // try_init: a second call (tests, embedding hosts) is not an error.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

pub fn append_line(path: impl AsRef<Path>, line: &str) -> Result<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{line}")?;
    Ok(())
}

pub fn heartbeat_line(tracked_tokens: usize) -> String {
    let now: DateTime<Local> = Local::now();
    format!("{} heartbeat tokens={tracked_tokens}", now.to_rfc3339())
}
