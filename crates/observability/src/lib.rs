//! Tracing and logging setup shared by identra binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, UnknownLogFormat};

/// Initialize process-wide tracing/logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    crate::tracing::init(format);
}
