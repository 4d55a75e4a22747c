//! End-to-end dispatch against the calendar agent

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use calendar_a2a::{
    calendar::{BackendError, Event, NewEvent, TimeRange},
    prelude::*,
    protocol::{parse_timestamp, RegistryError},
    registry::SharedHandler,
};
use chrono::{DateTime, Utc};
use mockall::{mock, predicate::always};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

mock! {
    pub Backend {}

    #[async_trait]
    impl CalendarBackend for Backend {
        async fn create(&self, event: NewEvent) -> Result<String, BackendError>;
        async fn query(&self, range: TimeRange) -> Result<Vec<Event>, BackendError>;
    }
}

async fn dispatcher_for(backend: impl CalendarBackend + 'static) -> Dispatcher {
    let registry = AgentRegistry::new();
    assert_ok!(
        CalendarAgent::new(Arc::new(backend))
            .register(&registry, "calendar")
            .await
    );
    Dispatcher::new(registry)
}

fn request(capability: &str, data: serde_json::Value) -> A2ATask {
    A2ATask::request(capability, A2AMessage::data("planner", "calendar", data))
}

fn at(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap()
}

fn day() -> serde_json::Value {
    json!({"time_range": {"start": "2024-01-01T00:00", "end": "2024-01-02T00:00"}})
}

#[tokio::test]
async fn test_create_event_completes_with_backend_id() {
    let mut backend = MockBackend::new();
    backend
        .expect_create()
        .withf(|event| event.title == "Sync" && event.attendees == ["a@x"])
        .times(1)
        .returning(|_| Ok("evt-1".to_string()));
    let dispatcher = dispatcher_for(backend).await;

    let task = assert_ok!(
        dispatcher
            .submit(request(
                "create_event",
                json!({
                    "title": "Sync",
                    "start_time": "2024-01-01T10:00",
                    "end_time": "2024-01-01T10:30",
                    "attendees": ["a@x"]
                }),
            ))
            .await
    );

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.error.is_none());
    assert_eq!(task.result_data(), Some(&json!({"event_id": "evt-1"})));

    let reply = task.result_message.as_ref().unwrap();
    assert_eq!(reply.sender_agent_id, "calendar");
    assert_eq!(reply.recipient_agent_id, "planner");
}

#[tokio::test]
async fn test_list_events_with_no_matches_is_empty() {
    let mut backend = MockBackend::new();
    backend
        .expect_query()
        .with(always())
        .times(1)
        .returning(|_| Ok(vec![]));
    let dispatcher = dispatcher_for(backend).await;

    let task = assert_ok!(dispatcher.submit(request("list_events", day())).await);
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result_data(), Some(&json!({"events": []})));
}

#[tokio::test]
async fn test_list_events_orders_backend_results() {
    let mut backend = MockBackend::new();
    backend.expect_query().returning(|_| {
        Ok(vec![
            Event {
                event_id: "evt-2".into(),
                title: "Retro".into(),
                start_time: at("2024-01-01T15:00"),
                end_time: at("2024-01-01T16:00"),
                attendees: vec![],
            },
            Event {
                event_id: "evt-1".into(),
                title: "Standup".into(),
                start_time: at("2024-01-01T09:00"),
                end_time: at("2024-01-01T09:15"),
                attendees: vec!["a@x".into()],
            },
        ])
    });
    let dispatcher = dispatcher_for(backend).await;

    let task = assert_ok!(dispatcher.submit(request("list_events", day())).await);
    let events = task.result_data().unwrap()["events"].as_array().unwrap().clone();
    let ids: Vec<_> = events.iter().map(|e| e["event_id"].clone()).collect();
    assert_eq!(ids, vec![json!("evt-1"), json!("evt-2")]);
    assert_eq!(events[0]["start_time"], "2024-01-01T09:00:00Z");
}

#[tokio::test]
async fn test_backend_failure_fails_task() {
    let mut backend = MockBackend::new();
    backend
        .expect_query()
        .returning(|_| Err(BackendError::Unavailable("connection refused".into())));
    let dispatcher = dispatcher_for(backend).await;

    let task = assert_ok!(dispatcher.submit(request("list_events", day())).await);
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.result_message.is_none());

    let error = task.error.unwrap();
    assert_eq!(error.kind, TaskErrorKind::CapabilityExecution);
    let details = error.details.unwrap();
    assert_eq!(details["causeKind"], "BACKEND_UNAVAILABLE");
    assert!(details["cause"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn test_invalid_input_never_reaches_backend() {
    let mut backend = MockBackend::new();
    backend.expect_create().never();
    let dispatcher = dispatcher_for(backend).await;

    // missing title
    let task = assert_ok!(
        dispatcher
            .submit(request(
                "create_event",
                json!({"start_time": "2024-01-01T10:00", "end_time": "2024-01-01T10:30"}),
            ))
            .await
    );
    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.unwrap();
    assert_eq!(error.kind, TaskErrorKind::SchemaValidation);
    assert!(error.message.contains("title"));

    // well-formed but semantically invalid
    let task = assert_ok!(
        dispatcher
            .submit(request(
                "create_event",
                json!({
                    "title": "Sync",
                    "start_time": "2024-01-01T11:00",
                    "end_time": "2024-01-01T10:00"
                }),
            ))
            .await
    );
    let error = task.error.unwrap();
    assert_eq!(error.kind, TaskErrorKind::CapabilityExecution);
    assert_eq!(error.details.unwrap()["causeKind"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_unknown_capability_and_agent() {
    let dispatcher = dispatcher_for(MockBackend::new()).await;

    let task = assert_ok!(dispatcher.submit(request("delete_event", json!({}))).await);
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.unwrap().kind, TaskErrorKind::UnknownCapability);

    let stray = A2AMessage::data("planner", "mail", json!({}));
    let task = assert_ok!(
        dispatcher
            .submit(A2ATask::request("create_event", stray))
            .await
    );
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.unwrap().kind, TaskErrorKind::UnknownAgent);
}

#[tokio::test]
async fn test_unregistered_agent_stops_receiving_tasks() {
    let dispatcher = dispatcher_for(InMemoryCalendar::new()).await;
    let registry = dispatcher.registry();

    let card = registry.card("calendar").await.unwrap();
    assert_eq!(card.capability_names().count(), 3);
    assert_ok!(registry.lookup("calendar", "create_event").await);

    assert!(registry.unregister("calendar").await);
    assert!(!registry.unregister("calendar").await);
    assert!(matches!(
        registry.lookup("calendar", "create_event").await,
        Err(RegistryError::UnknownAgent { .. })
    ));

    let task = assert_ok!(dispatcher.submit(request("list_events", day())).await);
    assert_eq!(task.error.unwrap().kind, TaskErrorKind::UnknownAgent);

    // the id is free again
    assert_ok!(
        CalendarAgent::new(Arc::new(InMemoryCalendar::new()))
            .register(registry, "calendar")
            .await
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_capability_runs_in_submission_order() {
    let calendar = InMemoryCalendar::new();
    let dispatcher = dispatcher_for(calendar.clone()).await;

    let titles: Vec<String> = (1..=40).map(|n| format!("meeting {n}")).collect();
    let mut joins = Vec::new();
    for title in &titles {
        let task = request(
            "create_event",
            json!({"title": title, "start_time": "2024-01-01T10:00", "end_time": "2024-01-01T11:00"}),
        );
        joins.push(assert_ok!(dispatcher.spawn(task).await));
    }

    for (i, join) in joins.into_iter().enumerate() {
        let task = join.await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(
            task.result_data(),
            Some(&json!({"event_id": format!("evt-{}", i + 1)}))
        );
    }

    let task = assert_ok!(dispatcher.submit(request("list_events", day())).await);
    let listed: Vec<_> = task.result_data().unwrap()["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(listed, titles);
    assert_eq!(calendar.len().await, 40);
}

struct Blocking {
    calls: AtomicUsize,
}

#[async_trait]
impl CapabilityHandler for Blocking {
    async fn handle(&self, _input: A2AMessage) -> Result<Vec<MessagePart>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(vec![MessagePart::text("done")])
    }
}

#[tokio::test]
async fn test_cancel_queued_task_and_ignore_running_one() {
    let handler = Arc::new(Blocking {
        calls: AtomicUsize::new(0),
    });
    let registry = AgentRegistry::new();
    let card = AgentCard::new("worker").with_capability(AgentCapability::new(
        "work",
        CapabilitySchema::default(),
        CapabilitySchema::new(vec![PartSchema::text()]),
    ));
    let shared: SharedHandler = handler.clone();
    let handlers = HandlerMap::from([("work".to_string(), shared)]);
    assert_ok!(registry.register(card, handlers).await);
    let dispatcher = Dispatcher::new(registry);

    let work = |id: &str| A2ATask::new(id, "work", A2AMessage::new("caller", "worker", vec![]));
    let first = assert_ok!(dispatcher.spawn(work("t1")).await);
    while dispatcher.get_task("t1").await.unwrap().status != TaskStatus::Running {
        tokio::task::yield_now().await;
    }
    let second = assert_ok!(dispatcher.spawn(work("t2")).await);

    assert_eq!(
        dispatcher.cancel("t2").await.unwrap(),
        CancelOutcome::Cancelled
    );
    assert_eq!(dispatcher.cancel("t1").await.unwrap(), CancelOutcome::Ignored);

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status, TaskStatus::Completed);

    let second = second.await.unwrap().unwrap();
    assert_eq!(second.status, TaskStatus::Cancelled);
    assert_eq!(second.error.unwrap().kind, TaskErrorKind::Cancelled);
    assert!(second.result_message.is_none());

    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_ok!(dispatcher.take_task("t2").await);
    assert_err!(dispatcher.get_task("t2").await);
    assert_eq!(
        dispatcher
            .list_tasks(Some(TaskStatus::Cancelled))
            .await
            .len(),
        1
    );
}
