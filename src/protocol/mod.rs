//! Core A2A protocol types and definitions

pub mod agent;
pub mod error;
pub mod message;
pub mod schema;
pub mod task;

pub use agent::{AgentCapability, AgentCard};
pub use error::{A2AError, CapabilityError, RegistryError, SchemaError, TaskError, TaskErrorKind};
pub use message::{A2AMessage, FileContent, MessageBuilder, MessagePart, PartType};
pub use schema::{parse_timestamp, CapabilitySchema, FieldKind, FieldSchema, PartSchema};
pub use task::{A2ATask, TaskStatus};
