use std::{sync::Arc, time::Duration};

use anyhow::Context;
use calendar_a2a::prelude::*;
use serde_json::json;
use tower::{Service, ServiceBuilder, ServiceExt};
use tracing_subscriber::EnvFilter;

const PLANNER: &str = "planner";
const CALENDAR: &str = "calendar";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=calendar_a2a=debug for per-task spans
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = AgentRegistry::new();
    CalendarAgent::new(Arc::new(InMemoryCalendar::new()))
        .register(&registry, CALENDAR)
        .await
        .context("registering the calendar agent")?;

    for card in registry.cards().await {
        println!(
            "Agent {} ({})",
            card.agent_id,
            card.name.as_deref().unwrap_or("unnamed")
        );
        for capability in &card.capabilities {
            println!(
                "  - {}: {}",
                capability.name,
                capability.description.as_deref().unwrap_or_default()
            );
        }
    }
    println!();

    let dispatcher = Dispatcher::builder()
        .registry(registry)
        .handler_timeout(Duration::from_secs(5))
        .retention(Duration::from_secs(60))
        .build();

    let mut service = ServiceBuilder::new()
        .concurrency_limit(4)
        .service(dispatcher.clone());

    let bookings = [
        ("Standup", "2024-01-01T09:00", "2024-01-01T09:15"),
        ("Design review", "2024-01-01T10:00", "2024-01-01T11:00"),
        ("Pairing", "2024-01-01T10:30", "2024-01-01T12:00"),
    ];
    for (title, start, end) in bookings {
        let request = A2AMessage::data(
            PLANNER,
            CALENDAR,
            json!({
                "title": title,
                "start_time": start,
                "end_time": end,
                "attendees": ["a@example.com"]
            }),
        );
        let task = service
            .ready()
            .await?
            .call(A2ATask::request("create_event", request))
            .await?;
        println!("create_event {title:?} -> {:?} {:?}", task.status, task.result_data());
    }

    let day = json!({"time_range": {"start": "2024-01-01T00:00", "end": "2024-01-02T00:00"}});
    for capability in ["list_events", "get_availability"] {
        let request = A2AMessage::data(PLANNER, CALENDAR, day.clone());
        let task = service
            .ready()
            .await?
            .call(A2ATask::request(capability, request))
            .await?;
        println!(
            "{capability} -> {:?}\n{}",
            task.status,
            serde_json::to_string_pretty(&task.result_data())?
        );
    }

    // Unknown capabilities fail the task instead of erroring the call
    let request = A2AMessage::data(PLANNER, CALENDAR, json!({}));
    let task = dispatcher
        .submit(A2ATask::request("delete_event", request))
        .await?;
    if let Some(error) = &task.error {
        println!("delete_event -> {:?} ({:?}: {})", task.status, error.kind, error.message);
    }

    println!(
        "\n{} tasks tracked, {} completed",
        dispatcher.list_tasks(None).await.len(),
        dispatcher
            .list_tasks(Some(TaskStatus::Completed))
            .await
            .len()
    );

    Ok(())
}
