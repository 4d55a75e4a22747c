//! Error types for A2A dispatch

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{message::PartType, task::TaskStatus};

/// Error type for local API misuse and bookkeeping failures
///
/// Protocol outcomes never surface through this type: a task that fails is
/// returned as a task whose `error` field is populated.
#[derive(Debug, Error)]
pub enum A2AError {
    /// Validation error (malformed message or task)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Task not found error
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// The task has not reached a terminal status yet
    #[error("Task still in progress: {task_id}")]
    TaskInProgress { task_id: String },

    /// A task with the same id is already tracked
    #[error("Task already submitted: {task_id}")]
    DuplicateTask { task_id: String },

    /// Task status change not allowed by the lifecycle
    #[error("Invalid task transition for {task_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// The background dispatch of a task ended without reporting a result
    #[error("Dispatch of task {task_id} aborted: {reason}")]
    Aborted { task_id: String, reason: String },
}

/// Errors raised by the agent registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An agent with this id is already registered
    #[error("agent already registered: {agent_id}")]
    DuplicateAgent { agent_id: String },

    /// The handler map does not line up with the declared capabilities
    #[error(
        "handlers for agent {agent_id} do not match its card (missing: {missing:?}, unexpected: {unexpected:?}, duplicated: {duplicated:?})"
    )]
    CapabilityMismatch {
        agent_id: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
        duplicated: Vec<String>,
    },

    /// No agent with this id
    #[error("unknown agent: {agent_id}")]
    UnknownAgent { agent_id: String },

    /// The agent exists but does not expose this capability
    #[error("agent {agent_id} has no capability named {capability}")]
    UnknownCapability {
        agent_id: String,
        capability: String,
    },
}

/// A message part that does not satisfy a capability schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A required part is absent
    #[error("missing required part #{index} ({expected})")]
    MissingPart { index: usize, expected: PartType },

    /// More parts than the schema declares
    #[error("unexpected part #{index}: schema declares {declared} part(s)")]
    UnexpectedPart { index: usize, declared: usize },

    /// Part of the wrong kind
    #[error("part #{index} should be {expected} but is {actual}")]
    WrongPartType {
        index: usize,
        expected: PartType,
        actual: PartType,
    },

    /// A required field is absent
    #[error("part #{index}: missing required field '{field}'")]
    MissingField { index: usize, field: String },

    /// A field holds a value of the wrong shape
    #[error("part #{index}: field '{field}' should be {expected}")]
    InvalidField {
        index: usize,
        field: String,
        expected: String,
    },

    /// Part content is structurally invalid (empty text, file without content, ...)
    #[error("part #{index}: {reason}")]
    InvalidPart { index: usize, reason: String },
}

/// Application-level failure reported by a capability handler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// Input decoded but is semantically invalid
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backing collaborator could not be reached
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Any other handler failure
    #[error("{0}")]
    Failed(String),
}

impl CapabilityError {
    /// Stable machine-readable name of the cause
    pub fn kind(&self) -> &'static str {
        match self {
            CapabilityError::InvalidInput(_) => "INVALID_INPUT",
            CapabilityError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            CapabilityError::Failed(_) => "FAILED",
        }
    }
}

/// Classification of a task failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskErrorKind {
    /// Recipient agent is not registered
    UnknownAgent,

    /// Recipient agent does not expose the requested capability
    UnknownCapability,

    /// Input parts do not match the capability's input schema
    SchemaValidation,

    /// The handler ran and reported a failure
    CapabilityExecution,

    /// The handler did not finish within the configured timeout
    Timeout,

    /// The task was cancelled before completing
    Cancelled,
}

/// Task-specific error with structured information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct TaskError {
    /// Error classification
    pub kind: TaskErrorKind,

    /// Human-readable error message
    pub message: String,

    /// Additional error details as structured data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl TaskError {
    /// Create a new task error
    pub fn new(kind: TaskErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Add details to the task error
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Wrap a handler failure as a capability execution error
    pub fn execution(capability: &str, cause: &CapabilityError) -> Self {
        Self::new(
            TaskErrorKind::CapabilityExecution,
            format!("capability '{capability}' failed: {cause}"),
        )
        .with_details(serde_json::json!({
            "cause": cause.to_string(),
            "causeKind": cause.kind(),
        }))
    }
}

impl From<RegistryError> for TaskError {
    fn from(err: RegistryError) -> Self {
        let kind = match err {
            RegistryError::UnknownAgent { .. } => TaskErrorKind::UnknownAgent,
            RegistryError::UnknownCapability { .. } => TaskErrorKind::UnknownCapability,
            // registration errors never reach a task; classify as execution failures
            RegistryError::DuplicateAgent { .. } | RegistryError::CapabilityMismatch { .. } => {
                TaskErrorKind::CapabilityExecution
            }
        };
        Self::new(kind, err.to_string())
    }
}

impl From<SchemaError> for TaskError {
    fn from(err: SchemaError) -> Self {
        Self::new(TaskErrorKind::SchemaValidation, err.to_string())
    }
}
