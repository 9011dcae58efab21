//! Process-wide tracing/logging setup shared by Roastah binaries.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize tracing with the format named by `ROASTAH_LOG_FORMAT`
/// (`json` by default, `pretty` for human-readable output).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    let format = std::env::var("ROASTAH_LOG_FORMAT")
        .map(|v| LogFormat::parse(&v))
        .unwrap_or_default();
    tracing::init(format);
}
