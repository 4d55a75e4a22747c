//! JSON shape of the protocol records

use calendar_a2a::prelude::*;
use serde_json::json;

#[test]
fn test_message_field_names() {
    let message = A2AMessage::builder()
        .message_id("m-1")
        .sender("planner")
        .recipient("calendar")
        .part(MessagePart::text("book it"))
        .part(MessagePart::data(json!({"title": "Sync"})))
        .build()
        .unwrap();

    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["messageId"], "m-1");
    assert_eq!(json["senderAgentId"], "planner");
    assert_eq!(json["recipientAgentId"], "calendar");
    assert_eq!(json["parts"][0], json!({"text": "book it"}));
    assert_eq!(json["parts"][1], json!({"data": {"title": "Sync"}}));
    assert!(json["timestamp"].is_string());
}

#[test]
fn test_file_part_shape() {
    let part = MessagePart::file("agenda.pdf", "https://example.com/agenda.pdf");
    let json = serde_json::to_value(&part).unwrap();

    assert_eq!(json["file"]["name"], "agenda.pdf");
    assert_eq!(json["file"]["fileWithUri"], "https://example.com/agenda.pdf");
    assert!(json["file"].get("fileWithBytes").is_none());

    let parsed: MessagePart = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.part_type(), PartType::File);
}

#[test]
fn test_task_field_names_and_status() {
    let input = A2AMessage::data("planner", "calendar", json!({}));
    let mut task = A2ATask::new("t-1", "list_events", input);

    let json = serde_json::to_value(&task).unwrap();
    assert_eq!(json["taskId"], "t-1");
    assert_eq!(json["requestedCapability"], "list_events");
    assert_eq!(json["status"], "pending");
    assert!(json["inputMessage"].is_object());
    assert!(json.get("resultMessage").is_none());
    assert!(json.get("error").is_none());

    task.start().unwrap();
    task.time_out(
        TaskError::new(TaskErrorKind::Timeout, "too slow").with_details(json!({"timeoutMs": 10})),
    )
    .unwrap();

    let json = serde_json::to_value(&task).unwrap();
    assert_eq!(json["status"], "timed-out");
    assert_eq!(json["error"]["kind"], "TIMEOUT");
    assert_eq!(json["error"]["details"]["timeoutMs"], 10);

    let parsed: A2ATask = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, task);
}

#[test]
fn test_error_kind_names() {
    let names: Vec<_> = [
        TaskErrorKind::UnknownAgent,
        TaskErrorKind::UnknownCapability,
        TaskErrorKind::SchemaValidation,
        TaskErrorKind::CapabilityExecution,
        TaskErrorKind::Timeout,
        TaskErrorKind::Cancelled,
    ]
    .iter()
    .map(|kind| serde_json::to_value(kind).unwrap())
    .collect();

    assert_eq!(
        names,
        vec![
            json!("UNKNOWN_AGENT"),
            json!("UNKNOWN_CAPABILITY"),
            json!("SCHEMA_VALIDATION"),
            json!("CAPABILITY_EXECUTION"),
            json!("TIMEOUT"),
            json!("CANCELLED"),
        ]
    );
}

#[test]
fn test_calendar_card_schema_shape() {
    let card = CalendarAgent::card("calendar");
    let json = serde_json::to_value(&card).unwrap();

    assert_eq!(json["agentId"], "calendar");
    let create = &json["capabilities"][0];
    assert_eq!(create["name"], "create_event");

    let part = &create["inputSchema"]["parts"][0];
    assert_eq!(part["partType"], "data");
    assert_eq!(
        part["fields"][1],
        json!({"name": "start_time", "type": "timestamp", "required": true})
    );
    assert_eq!(
        part["fields"][3],
        json!({"name": "attendees", "type": "array", "items": {"type": "string"}, "required": false})
    );

    let parsed: AgentCard = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, card);
}
