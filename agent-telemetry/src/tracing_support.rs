//! Structured tracing bootstrap.

use tracing_subscriber::EnvFilter;

/// Options for the global `fmt` subscriber.
#[derive(Debug, Clone)]
pub struct TracingOptions {
    default_filter: String,
    with_target: bool,
}

impl TracingOptions {
    /// Creates options using `default_filter` when `RUST_LOG` is unset.
    #[must_use]
    pub fn new(default_filter: impl Into<String>) -> Self {
        Self {
            default_filter: default_filter.into(),
            with_target: false,
        }
    }

    /// Includes the event target (module path) in every line.
    #[must_use]
    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }

    /// Returns the fallback filter directive.
    #[must_use]
    pub fn default_filter(&self) -> &str {
        &self.default_filter
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self::new("info")
    }
}

/// Installs the global subscriber. Returns `false` when one was already set.
pub fn init_tracing(options: &TracingOptions) -> bool {
    let filter = options.env_filter();
    let directives = filter.to_string();
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(options.with_target)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(filter = %directives, "tracing initialized");
    }
    installed
}
