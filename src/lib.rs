//! # Calendar A2A
//!
//! Agent-to-agent task dispatch with a calendar capability provider.
//!
//! Agents publish an [`AgentCard`](protocol::AgentCard) describing their
//! capabilities and register one handler per capability. The
//! [`Dispatcher`](service::Dispatcher) routes each [`A2ATask`](protocol::A2ATask)
//! to the handler for its recipient and capability, validates the input
//! against the declared schema and drives the task to a terminal status.
//!
//! ## Features
//!
//! - **Typed protocol records**: messages, parts, cards and tasks with a stable JSON form
//! - **Schema checked**: inputs are validated before any handler runs
//! - **Ordered**: tasks for one agent capability run in submission order by default
//! - **Tower native**: the dispatcher is a `Service<A2ATask>`
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use calendar_a2a::prelude::*;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = AgentRegistry::new();
//! CalendarAgent::new(Arc::new(InMemoryCalendar::new()))
//!     .register(&registry, "calendar")
//!     .await?;
//!
//! let dispatcher = Dispatcher::new(registry);
//! let request = A2AMessage::data(
//!     "planner",
//!     "calendar",
//!     json!({
//!         "title": "Sync",
//!         "start_time": "2024-01-01T10:00",
//!         "end_time": "2024-01-01T10:30",
//!         "attendees": ["a@x"]
//!     }),
//! );
//!
//! let task = dispatcher.submit(A2ATask::request("create_event", request)).await?;
//! assert_eq!(task.status, TaskStatus::Completed);
//! assert_eq!(task.result_data(), Some(&json!({"event_id": "evt-1"})));
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod protocol;
pub mod registry;
pub mod service;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        calendar::{CalendarAgent, CalendarBackend, InMemoryCalendar},
        protocol::{
            A2AError, A2AMessage, A2ATask, AgentCapability, AgentCard, CapabilityError,
            CapabilitySchema, FieldKind, FieldSchema, MessagePart, PartSchema, PartType,
            TaskError, TaskErrorKind, TaskStatus,
        },
        registry::{AgentRegistry, CapabilityHandler, HandlerMap, Typed, TypedCapability},
        service::{CancelOutcome, Dispatcher, DispatcherConfig, OrderingPolicy},
    };
}
