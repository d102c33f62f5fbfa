//! Tracing/logging initialization.
//!
//! `RUST_LOG` wins over the configured level when set.

use tracing_subscriber::EnvFilter;

/// How log lines are rendered and which level passes by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// JSON lines with timestamps (for collection) instead of human-readable text.
    pub json: bool,
    /// Default filter directive, e.g. `info` or `tonerledger_infra=debug,info`.
    pub level: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}

impl LogOptions {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(options: &LogOptions) {
    let filter = options.filter();

    let _ = if options.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        let options = LogOptions {
            json: true,
            level: "debug".into(),
        };
        init(&options);
        init(&LogOptions::default());
    }

    #[test]
    fn invalid_level_falls_back_to_info() {
        let options = LogOptions {
            json: false,
            level: "not a directive ===".into(),
        };
        // must not panic
        let _ = options.filter();
    }
}
