//! Tracing/logging initialization.
//!
//! Filtering follows `RUST_LOG` and falls back to `info`.

use core::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable, multi-line output for local runs.
    Pretty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown log format '{0}' (expected 'json' or 'pretty')")]
pub struct UnknownLogFormat(pub String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(UnknownLogFormat(s.to_string())),
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let _ = match format {
        LogFormat::Json => builder.json().with_target(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}
