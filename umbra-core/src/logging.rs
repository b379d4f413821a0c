//! Logging utilities and configuration for Umbra.
//!
//! Explorations log through the `tracing` crate; this module provides the
//! knobs for performance-sensitive logging and a convenience subscriber setup
//! for binaries and tests.

use tracing::Level;

/// Logging configuration for Umbra.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for exploration components.
    pub base_level: Level,
    /// Whether to log submitted query statements.
    pub log_statements: bool,
    /// Whether to log published metrics.
    pub log_metrics: bool,
    /// Maximum length for logged statement text, to keep logs bounded.
    pub max_statement_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_statements: true,
            log_metrics: false,
            max_statement_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_statements: true,
            log_metrics: true,
            max_statement_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_statements: false,
            log_metrics: false,
            max_statement_length: 128,
        }
    }
}

/// Truncates a string to the maximum field length if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        value.to_string()
    } else {
        let truncated = &value[..max_length];
        format!("{truncated}...(truncated)")
    }
}

/// Utilities for setting up structured logging.
pub mod setup {
    use tracing_subscriber::EnvFilter;

    /// Installs a global fmt subscriber honoring `RUST_LOG`, falling back to
    /// the given default directive.
    ///
    /// Returns quietly when a subscriber is already installed, so tests can
    /// call it repeatedly.
    pub fn init_logging(default_directive: &str) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    }
}
