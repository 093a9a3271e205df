//! Coordinator configuration.

use std::time::Duration;

/// Default quiet period before a field edit is patched.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Configuration for a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Collection driven by route changes (e.g. `"issues"`).
    pub collection: String,
    /// Route model that triggers a list refetch (e.g. `"issue"`).
    pub route_model: String,
    /// Quiet period before a field edit is sent.
    pub debounce: Duration,
}

impl SyncConfig {
    /// Create a config routing `route_model` to `collection`.
    #[must_use]
    pub fn new(collection: impl Into<String>, route_model: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            route_model: route_model.into(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Override the debounce quiet period.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("issues", "issue")
    }
}
