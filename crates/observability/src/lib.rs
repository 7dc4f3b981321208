//! Process-wide tracing setup shared by every binary.

/// Initialize process-wide tracing.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber configuration (filter and output format).
pub mod tracing;

pub use tracing::LogFormat;
