//! Tracing and logging setup shared by every binary.

/// Initialize process-wide logging.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(options: &LogOptions) {
    tracing::init(options);
}

pub use self::tracing::LogOptions;

/// Tracing configuration (filters, formats).
pub mod tracing;
