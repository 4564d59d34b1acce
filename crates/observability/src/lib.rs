//! Process-wide logging setup shared by the service binaries.

/// Initialize tracing for the process from `RUST_LOG` and `LOG_FORMAT`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Subscriber configuration (filter, output format).
pub mod tracing;
