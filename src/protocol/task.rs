//! A2A task types and lifecycle management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{
    error::{A2AError, TaskError, TaskErrorKind},
    message::A2AMessage,
};

/// A request to execute one capability of one agent
///
/// Only the dispatcher moves a task through its lifecycle. `result_message`
/// and `error` are mutually exclusive and both stay empty until the task
/// reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct A2ATask {
    /// Unique identifier for the task
    #[serde(rename = "taskId")]
    pub task_id: String,

    /// Capability of the recipient agent to run
    #[serde(rename = "requestedCapability")]
    pub requested_capability: String,

    /// Message carrying the capability input
    #[serde(rename = "inputMessage")]
    pub input_message: A2AMessage,

    /// Current status of the task
    pub status: TaskStatus,

    /// Output message (present when task is completed)
    #[serde(rename = "resultMessage", skip_serializing_if = "Option::is_none")]
    pub result_message: Option<A2AMessage>,

    /// Error information (present if task did not complete)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,

    /// When the task was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl A2ATask {
    /// Create a pending task
    pub fn new(
        task_id: impl Into<String>,
        requested_capability: impl Into<String>,
        input_message: A2AMessage,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            requested_capability: requested_capability.into(),
            input_message,
            status: TaskStatus::Pending,
            result_message: None,
            error: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Create a pending task with a generated id
    pub fn request(requested_capability: impl Into<String>, input_message: A2AMessage) -> Self {
        Self::new(
            Uuid::now_v7().to_string(),
            requested_capability,
            input_message,
        )
    }

    /// Agent the task is addressed to
    pub fn recipient(&self) -> &str {
        &self.input_message.recipient_agent_id
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// First data part of the result message, if the task completed with one
    pub fn result_data(&self) -> Option<&Value> {
        self.result_message.as_ref().and_then(A2AMessage::first_data)
    }

    /// `Pending -> Running`
    pub fn start(&mut self) -> Result<(), A2AError> {
        self.transition(TaskStatus::Running)
    }

    /// `Running -> Completed` with the handler's output
    pub fn complete(&mut self, result: A2AMessage) -> Result<(), A2AError> {
        self.transition(TaskStatus::Completed)?;
        self.result_message = Some(result);
        Ok(())
    }

    /// `Pending | Running -> Failed`
    pub fn fail(&mut self, error: TaskError) -> Result<(), A2AError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    /// `Running -> TimedOut`
    pub fn time_out(&mut self, error: TaskError) -> Result<(), A2AError> {
        self.transition(TaskStatus::TimedOut)?;
        self.error = Some(error);
        Ok(())
    }

    /// `Pending | Running -> Cancelled`
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), A2AError> {
        self.transition(TaskStatus::Cancelled)?;
        self.error = Some(TaskError::new(TaskErrorKind::Cancelled, reason));
        Ok(())
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), A2AError> {
        if !self.status.can_transition_to(to) {
            return Err(A2AError::InvalidTransition {
                task_id: self.task_id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Some(Utc::now());
        Ok(())
    }
}

/// Task status in the dispatch lifecycle
///
/// `pending → running → completed | failed | timed-out`. Validation failures
/// go straight from `pending` to `failed`; `cancelled` is reachable from
/// `pending`, and from `running` only when the handler supports cancellation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Task has been submitted and is waiting to run
    Pending,

    /// Handler is executing
    Running,

    /// Task completed successfully
    Completed,

    /// Task failed with an error
    Failed,

    /// Handler exceeded its time budget
    TimedOut,

    /// Task was cancelled by the caller
    Cancelled,
}

impl TaskStatus {
    /// Check if this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::TimedOut | TaskStatus::Cancelled
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, TimedOut)
                | (Running, Cancelled)
        )
    }
}
