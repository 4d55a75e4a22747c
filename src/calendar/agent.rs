//! Calendar agent: capability declarations and their adapters

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BusySlot, CalendarBackend, Event, NewEvent, TimeRange};
use crate::{
    protocol::{
        AgentCapability, AgentCard, CapabilityError, CapabilitySchema, FieldKind, FieldSchema,
        RegistryError,
    },
    registry::{AgentRegistry, HandlerMap, Typed, TypedCapability},
};

/// Create a single event
pub const CREATE_EVENT: &str = "create_event";
/// List events within a time range
pub const LIST_EVENTS: &str = "list_events";
/// Report busy intervals within a time range
pub const GET_AVAILABILITY: &str = "get_availability";

/// Exposes a [`CalendarBackend`] as A2A capabilities
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use calendar_a2a::{calendar::{CalendarAgent, InMemoryCalendar}, registry::AgentRegistry};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = AgentRegistry::new();
/// let agent = CalendarAgent::new(Arc::new(InMemoryCalendar::new()));
/// agent.register(&registry, "calendar").await?;
/// assert!(registry.contains("calendar").await);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CalendarAgent {
    backend: Arc<dyn CalendarBackend>,
}

impl CalendarAgent {
    /// Create an agent backed by `backend`
    pub fn new(backend: Arc<dyn CalendarBackend>) -> Self {
        Self { backend }
    }

    /// The card advertising this agent's capabilities
    pub fn card(agent_id: impl Into<String>) -> AgentCard {
        AgentCard::new(agent_id)
            .with_name("Calendar Agent")
            .with_description("Creates and lists calendar events")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_capability(create_event_capability())
            .with_capability(list_events_capability())
            .with_capability(availability_capability())
    }

    /// One handler per capability on the card
    pub fn handlers(&self) -> HandlerMap {
        let backend = &self.backend;
        HandlerMap::from([
            (
                CREATE_EVENT.to_string(),
                Typed::shared(CreateEvent {
                    backend: backend.clone(),
                }),
            ),
            (
                LIST_EVENTS.to_string(),
                Typed::shared(ListEvents {
                    backend: backend.clone(),
                }),
            ),
            (
                GET_AVAILABILITY.to_string(),
                Typed::shared(GetAvailability {
                    backend: backend.clone(),
                }),
            ),
        ])
    }

    /// Register the card and handlers under `agent_id`
    pub async fn register(
        &self,
        registry: &AgentRegistry,
        agent_id: impl Into<String>,
    ) -> Result<(), RegistryError> {
        registry
            .register(Self::card(agent_id), self.handlers())
            .await
    }
}

fn time_range_field() -> FieldSchema {
    FieldSchema::required(
        "time_range",
        FieldKind::object(vec![
            FieldSchema::required("start", FieldKind::Timestamp),
            FieldSchema::required("end", FieldKind::Timestamp),
        ]),
    )
}

fn create_event_capability() -> AgentCapability {
    AgentCapability::new(
        CREATE_EVENT,
        CapabilitySchema::data(vec![
            FieldSchema::required("title", FieldKind::String),
            FieldSchema::required("start_time", FieldKind::Timestamp),
            FieldSchema::required("end_time", FieldKind::Timestamp),
            FieldSchema::optional("attendees", FieldKind::array(FieldKind::String)),
        ]),
        CapabilitySchema::data(vec![FieldSchema::required("event_id", FieldKind::String)]),
    )
    .with_description("Create an event and return its id")
}

fn list_events_capability() -> AgentCapability {
    let event = FieldKind::object(vec![
        FieldSchema::required("event_id", FieldKind::String),
        FieldSchema::required("title", FieldKind::String),
        FieldSchema::required("start_time", FieldKind::Timestamp),
        FieldSchema::required("end_time", FieldKind::Timestamp),
        FieldSchema::required("attendees", FieldKind::array(FieldKind::String)),
    ]);
    AgentCapability::new(
        LIST_EVENTS,
        CapabilitySchema::data(vec![time_range_field()]),
        CapabilitySchema::data(vec![FieldSchema::required(
            "events",
            FieldKind::array(event),
        )]),
    )
    .with_description("List events in a time range, earliest first")
}

fn availability_capability() -> AgentCapability {
    let slot = FieldKind::object(vec![
        FieldSchema::required("start", FieldKind::Timestamp),
        FieldSchema::required("end", FieldKind::Timestamp),
    ]);
    AgentCapability::new(
        GET_AVAILABILITY,
        CapabilitySchema::data(vec![time_range_field()]),
        CapabilitySchema::data(vec![FieldSchema::required("busy", FieldKind::array(slot))]),
    )
    .with_description("Busy intervals in a time range")
}

fn check_range(range: &TimeRange) -> Result<(), CapabilityError> {
    if range.end < range.start {
        return Err(CapabilityError::InvalidInput(
            "time_range end is before its start".into(),
        ));
    }
    Ok(())
}

struct CreateEvent {
    backend: Arc<dyn CalendarBackend>,
}

#[derive(Debug, Serialize)]
struct CreateEventOutput {
    event_id: String,
}

#[async_trait]
impl TypedCapability for CreateEvent {
    type Input = NewEvent;
    type Output = CreateEventOutput;

    async fn call(&self, input: NewEvent) -> Result<CreateEventOutput, CapabilityError> {
        if input.title.trim().is_empty() {
            return Err(CapabilityError::InvalidInput("title cannot be empty".into()));
        }
        if input.end_time <= input.start_time {
            return Err(CapabilityError::InvalidInput(
                "end_time must be after start_time".into(),
            ));
        }

        let event_id = self.backend.create(input).await?;
        debug!(%event_id, "Event created");
        Ok(CreateEventOutput { event_id })
    }
}

#[derive(Debug, Deserialize)]
struct RangeInput {
    time_range: TimeRange,
}

struct ListEvents {
    backend: Arc<dyn CalendarBackend>,
}

#[derive(Debug, Serialize)]
struct ListEventsOutput {
    events: Vec<Event>,
}

#[async_trait]
impl TypedCapability for ListEvents {
    type Input = RangeInput;
    type Output = ListEventsOutput;

    async fn call(&self, input: RangeInput) -> Result<ListEventsOutput, CapabilityError> {
        check_range(&input.time_range)?;
        if input.time_range.is_empty() {
            return Ok(ListEventsOutput { events: Vec::new() });
        }

        let mut events = self.backend.query(input.time_range).await?;
        events.sort_by_key(|event| event.start_time);
        Ok(ListEventsOutput { events })
    }
}

struct GetAvailability {
    backend: Arc<dyn CalendarBackend>,
}

#[derive(Debug, Serialize)]
struct AvailabilityOutput {
    busy: Vec<BusySlot>,
}

#[async_trait]
impl TypedCapability for GetAvailability {
    type Input = RangeInput;
    type Output = AvailabilityOutput;

    async fn call(&self, input: RangeInput) -> Result<AvailabilityOutput, CapabilityError> {
        check_range(&input.time_range)?;
        if input.time_range.is_empty() {
            return Ok(AvailabilityOutput { busy: Vec::new() });
        }

        let busy = self.backend.busy(input.time_range).await?;
        Ok(AvailabilityOutput { busy })
    }
}
