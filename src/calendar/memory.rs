//! In-memory calendar backend for tests and demos

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{BackendError, CalendarBackend, Event, NewEvent, TimeRange};

/// Calendar kept in process memory
///
/// Event ids are `evt-1`, `evt-2`, ... in creation order. The backend can be
/// switched offline to exercise unavailability handling.
#[derive(Debug, Clone)]
pub struct InMemoryCalendar {
    events: Arc<RwLock<Vec<Event>>>,
    next_id: Arc<AtomicU64>,
    online: Arc<AtomicBool>,
}

impl InMemoryCalendar {
    /// Create an empty calendar
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a calendar pre-filled with `events`
    ///
    /// New ids continue after the highest `evt-N` among the seeded events.
    pub fn with_events(events: Vec<Event>) -> Self {
        let highest = events
            .iter()
            .filter_map(|event| event.event_id.strip_prefix("evt-")?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Self {
            next_id: Arc::new(AtomicU64::new(highest + 1)),
            events: Arc::new(RwLock::new(events)),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate the backend going offline (`false`) or coming back (`true`)
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of stored events
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Whether the calendar holds no events
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    fn ensure_online(&self) -> Result<(), BackendError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("in-memory calendar is offline".into()))
        }
    }
}

impl Default for InMemoryCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarBackend for InMemoryCalendar {
    async fn create(&self, event: NewEvent) -> Result<String, BackendError> {
        self.ensure_online()?;
        let event_id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        debug!(%event_id, title = %event.title, "Storing event");
        self.events.write().await.push(event.into_event(event_id.clone()));
        Ok(event_id)
    }

    async fn query(&self, range: TimeRange) -> Result<Vec<Event>, BackendError> {
        self.ensure_online()?;
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let mut found: Vec<Event> = self
            .events
            .read()
            .await
            .iter()
            .filter(|event| range.overlaps(event.start_time, event.end_time))
            .cloned()
            .collect();
        found.sort_by_key(|event| event.start_time);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::parse_timestamp;

    use super::*;

    fn new_event(title: &str, start: &str, end: &str) -> NewEvent {
        NewEvent {
            title: title.into(),
            start_time: parse_timestamp(start).unwrap(),
            end_time: parse_timestamp(end).unwrap(),
            attendees: vec![],
        }
    }

    fn day() -> TimeRange {
        TimeRange::new(
            parse_timestamp("2024-01-01T00:00").unwrap(),
            parse_timestamp("2024-01-02T00:00").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_create_and_query_in_start_order() {
        let calendar = InMemoryCalendar::new();
        let late = calendar
            .create(new_event("Retro", "2024-01-01T15:00", "2024-01-01T16:00"))
            .await
            .unwrap();
        let early = calendar
            .create(new_event("Standup", "2024-01-01T09:00", "2024-01-01T09:15"))
            .await
            .unwrap();
        assert_eq!((late.as_str(), early.as_str()), ("evt-1", "evt-2"));

        let events = calendar.query(day()).await.unwrap();
        let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Standup", "Retro"]);
    }

    #[tokio::test]
    async fn test_empty_range_yields_nothing() {
        let calendar = InMemoryCalendar::new();
        calendar
            .create(new_event("Standup", "2024-01-01T09:00", "2024-01-01T09:15"))
            .await
            .unwrap();

        let at = parse_timestamp("2024-01-01T09:05").unwrap();
        assert!(calendar
            .query(TimeRange::new(at, at))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_offline_backend() {
        let calendar = InMemoryCalendar::new();
        calendar.set_online(false);

        let err = calendar.query(day()).await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
        assert!(calendar
            .create(new_event("x", "2024-01-01T09:00", "2024-01-01T10:00"))
            .await
            .is_err());
        assert!(calendar.is_empty().await);
    }

    #[tokio::test]
    async fn test_seeded_calendar_continues_ids() {
        let seeded = new_event("Seed", "2024-01-01T08:00", "2024-01-01T08:30").into_event("evt-1");
        let calendar = InMemoryCalendar::with_events(vec![seeded]);

        let id = calendar
            .create(new_event("Next", "2024-01-01T10:00", "2024-01-01T10:30"))
            .await
            .unwrap();
        assert_eq!(id, "evt-2");
        assert_eq!(calendar.len().await, 2);
    }

    #[tokio::test]
    async fn test_seeded_ids_are_never_reused() {
        let calendar = InMemoryCalendar::with_events(vec![
            new_event("Imported", "2024-01-01T08:00", "2024-01-01T08:30").into_event("evt-7"),
            new_event("External", "2024-01-01T09:00", "2024-01-01T09:30").into_event("ext-42"),
        ]);

        let id = calendar
            .create(new_event("Next", "2024-01-01T10:00", "2024-01-01T10:30"))
            .await
            .unwrap();
        assert_eq!(id, "evt-8");
    }
}
