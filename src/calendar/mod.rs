//! Calendar capability provider
//!
//! The calendar agent is a thin adapter: every capability decodes its input,
//! calls the [`CalendarBackend`] and encodes the answer. Storage and
//! scheduling rules belong to the backend.

pub mod agent;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::protocol::{parse_timestamp, CapabilityError};

pub use agent::{CalendarAgent, CREATE_EVENT, GET_AVAILABILITY, LIST_EVENTS};
pub use memory::InMemoryCalendar;

/// Failure reported by a calendar backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend could not be reached
    #[error("calendar backend unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the request
    #[error("calendar backend rejected the request: {0}")]
    Rejected(String),
}

impl From<BackendError> for CapabilityError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(reason) => CapabilityError::BackendUnavailable(reason),
            BackendError::Rejected(reason) => CapabilityError::Failed(reason),
        }
    }
}

/// Store of calendar events
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Create an event and return its id
    async fn create(&self, event: NewEvent) -> Result<String, BackendError>;

    /// Events overlapping `range`, ordered by start time
    async fn query(&self, range: TimeRange) -> Result<Vec<Event>, BackendError>;

    /// Busy intervals within `range`
    ///
    /// The default merges overlapping events returned by [`query`](Self::query).
    async fn busy(&self, range: TimeRange) -> Result<Vec<BusySlot>, BackendError> {
        let events = self.query(range).await?;
        Ok(merge_busy(range, &events))
    }
}

/// A stored calendar event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub title: String,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

/// Fields of an event to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub attendees: Vec<String>,
}

impl NewEvent {
    /// Attach an id, producing the stored form
    pub fn into_event(self, event_id: impl Into<String>) -> Event {
        Event {
            event_id: event_id.into(),
            title: self.title,
            start_time: self.start_time,
            end_time: self.end_time,
            attendees: self.attendees,
        }
    }
}

/// Half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(deserialize_with = "flexible_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether the range covers no time at all
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether `[start, end)` intersects this range
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

/// A busy interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusySlot {
    #[serde(deserialize_with = "flexible_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub end: DateTime<Utc>,
}

/// Clip events to `range` and merge the overlapping or touching ones
pub fn merge_busy(range: TimeRange, events: &[Event]) -> Vec<BusySlot> {
    let mut slots: Vec<BusySlot> = events
        .iter()
        .filter(|event| range.overlaps(event.start_time, event.end_time))
        .map(|event| BusySlot {
            start: event.start_time.max(range.start),
            end: event.end_time.min(range.end),
        })
        .collect();
    slots.sort_by_key(|slot| slot.start);

    let mut merged: Vec<BusySlot> = Vec::with_capacity(slots.len());
    for slot in slots {
        match merged.last_mut() {
            Some(last) if slot.start <= last.end => last.end = last.end.max(slot.end),
            _ => merged.push(slot),
        }
    }
    merged
}

fn flexible_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}
