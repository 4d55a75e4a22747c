//! Dispatcher configuration

use std::time::Duration;

/// How tasks targeting the same capability are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingPolicy {
    /// One task at a time per `(agent_id, capability)`, in submission order
    #[default]
    PerCapabilitySerialized,

    /// No ordering between tasks; handlers may run concurrently
    Concurrent,
}

/// Configuration for a [`Dispatcher`](super::Dispatcher)
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Upper bound on a single handler invocation; `None` disables the limit
    pub handler_timeout: Option<Duration>,

    /// How long finished tasks are kept for retrieval; `None` keeps them until taken
    pub retention: Option<Duration>,

    /// Scheduling of tasks that target the same capability
    pub ordering: OrderingPolicy,
}

impl DispatcherConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            handler_timeout: Some(Duration::from_secs(30)),
            retention: None,
            ordering: OrderingPolicy::default(),
        }
    }

    /// Set the handler timeout
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    /// Let handlers run without a time limit
    pub fn without_handler_timeout(mut self) -> Self {
        self.handler_timeout = None;
        self
    }

    /// Set how long finished tasks are retained
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Set the ordering policy
    pub fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new()
    }
}
