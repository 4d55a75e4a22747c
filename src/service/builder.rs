//! Builder for constructing dispatchers

use std::time::Duration;

use crate::{
    registry::AgentRegistry,
    service::{
        config::{DispatcherConfig, OrderingPolicy},
        dispatcher::Dispatcher,
    },
};

/// Builder for [`Dispatcher`]
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use calendar_a2a::prelude::*;
///
/// let dispatcher = Dispatcher::builder()
///     .handler_timeout(Duration::from_secs(5))
///     .retention(Duration::from_secs(300))
///     .ordering(OrderingPolicy::PerCapabilitySerialized)
///     .build();
///
/// assert_eq!(dispatcher.config().handler_timeout, Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Default)]
pub struct DispatcherBuilder {
    registry: Option<AgentRegistry>,
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve tasks against an existing registry (a fresh one otherwise)
    pub fn registry(mut self, registry: AgentRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the handler timeout
    pub fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_handler_timeout(timeout);
        self
    }

    /// Let handlers run without a time limit
    pub fn no_handler_timeout(mut self) -> Self {
        self.config = self.config.without_handler_timeout();
        self
    }

    /// Set how long finished tasks are retained
    pub fn retention(mut self, retention: Duration) -> Self {
        self.config = self.config.with_retention(retention);
        self
    }

    /// Set the ordering policy
    pub fn ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.config = self.config.with_ordering(ordering);
        self
    }

    /// Build the dispatcher
    pub fn build(self) -> Dispatcher {
        Dispatcher::with_config(self.registry.unwrap_or_default(), self.config)
    }
}
