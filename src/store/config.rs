use std::sync::Arc;
use std::time::Duration;

/// Per-store settings.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Label used in log events. Defaults to `store#<id>`.
    pub name: Option<Arc<str>>,
    /// How long downstream link syncs wait after the last remote change.
    /// Zero means "next scheduling tick".
    pub link_delay: Duration,
}

impl StoreConfig {
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn link_delay(mut self, delay: Duration) -> Self {
        self.link_delay = delay;
        self
    }
}
