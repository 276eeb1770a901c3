//! Logging setup with a reloadable filter.
//!
//! Hosts that embed the agent usually own the global subscriber; this module
//! is for hosts (and the CLI) that want the agent to install one. The
//! returned [`LoggingConfig`] switches verbosity at runtime, which backs the
//! tracker's "verbose output" toggle.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt,
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "qoe_agent=info,playback_model=warn,reqwest=warn";

/// Filter used when verbose output is switched on.
pub const VERBOSE_LOG_FILTER: &str = "qoe_agent=debug,playback_model=debug,reqwest=info";

/// Type alias for the reload handle.
pub type FilterHandle = Handle<EnvFilter, tracing_subscriber::Registry>;

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Initial directive; falls back to `RUST_LOG`, then [`DEFAULT_LOG_FILTER`].
    pub filter: Option<String>,
}

/// Handle to the installed subscriber's filter.
pub struct LoggingConfig {
    handle: FilterHandle,
}

impl LoggingConfig {
    /// Get the current filter directive string.
    pub fn get_filter(&self) -> String {
        self.handle
            .with_current(|filter| filter.to_string())
            .unwrap_or_default()
    }

    /// Set a new filter directive.
    ///
    /// # Arguments
    /// * `directive` - Filter string (e.g., "qoe_agent=debug")
    ///
    /// # Returns
    /// Error if the directive is invalid.
    pub fn set_filter(&self, directive: &str) -> crate::Result<()> {
        let new_filter = EnvFilter::try_new(directive)
            .map_err(|e| crate::Error::Other(format!("Invalid filter directive: {}", e)))?;

        self.handle
            .reload(new_filter)
            .map_err(|e| crate::Error::Other(format!("Failed to reload filter: {}", e)))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }

    /// Switch between the verbose and the default filter.
    pub fn set_verbose(&self, verbose: bool) -> crate::Result<()> {
        self.set_filter(if verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        })
    }
}

/// Install the global subscriber.
///
/// Fails if another global subscriber is already set.
pub fn init_logging(options: LoggingOptions) -> crate::Result<Arc<LoggingConfig>> {
    let initial_filter = match options.filter.as_deref() {
        Some(directive) => EnvFilter::try_new(directive)
            .map_err(|e| crate::Error::Other(format!("Invalid filter directive: {}", e)))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter);

    let output = if options.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_ansi(true).with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(output)
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    Ok(Arc::new(LoggingConfig {
        handle: filter_handle,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("qoe_agent=info"));
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
        assert!(EnvFilter::try_new(VERBOSE_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_invalid_directive_is_rejected() {
        let result = init_logging(LoggingOptions {
            json: false,
            filter: Some("qoe_agent=loud".into()),
        });
        assert!(result.is_err());
    }
}
