//! Agent identity and capability advertisement

use serde::{Deserialize, Serialize};

use super::schema::CapabilitySchema;

/// Agent Card describing an agent's identity and the capabilities it exposes
///
/// Cards are built once at agent startup and are immutable after registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCard {
    /// Unique agent identifier
    #[serde(rename = "agentId")]
    pub agent_id: String,

    /// Human readable display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Human-readable description of the agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Agent version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Capabilities in declaration order
    pub capabilities: Vec<AgentCapability>,
}

impl AgentCard {
    /// Create a new agent card with no capabilities
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: None,
            description: None,
            version: None,
            capabilities: Vec::new(),
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the agent version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Append a capability
    pub fn with_capability(mut self, capability: AgentCapability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Find a capability by name
    pub fn capability(&self, name: &str) -> Option<&AgentCapability> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    /// Capability names in declaration order
    pub fn capability_names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(|c| c.name.as_str())
    }
}

/// A named, schema-typed operation an agent can perform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCapability {
    /// Name, unique within the agent
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Accepted input parts
    #[serde(rename = "inputSchema")]
    pub input_schema: CapabilitySchema,

    /// Produced output parts
    #[serde(rename = "outputSchema")]
    pub output_schema: CapabilitySchema,
}

impl AgentCapability {
    /// Create a capability
    pub fn new(
        name: impl Into<String>,
        input_schema: CapabilitySchema,
        output_schema: CapabilitySchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
            output_schema,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
