//! Capability handler contracts

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::protocol::{A2AMessage, CapabilityError, MessagePart};

/// Shared handle to a capability implementation
pub type SharedHandler = Arc<dyn CapabilityHandler>;

/// Capability name to handler, as supplied by a capability provider
pub type HandlerMap = HashMap<String, SharedHandler>;

/// Executes one capability
///
/// The dispatcher only calls `handle` with a message whose parts already match
/// the capability's declared input schema.
#[async_trait]
pub trait CapabilityHandler: Send + Sync + 'static {
    /// Run the capability and return the output parts
    async fn handle(&self, input: A2AMessage) -> Result<Vec<MessagePart>, CapabilityError>;

    /// Whether an in-flight call may be abandoned when its task is cancelled
    ///
    /// Handlers that return `false` always run to completion; cancellation
    /// requests against their running tasks are ignored.
    fn supports_cancellation(&self) -> bool {
        false
    }
}

/// A capability with statically typed input and output
///
/// Wrap it in [`Typed`] to register it. The first data part of the incoming
/// message is decoded into `Input`; `Output` is encoded as a single data part.
#[async_trait]
pub trait TypedCapability: Send + Sync + 'static {
    type Input: DeserializeOwned + Send + 'static;
    type Output: Serialize + Send + 'static;

    async fn call(&self, input: Self::Input) -> Result<Self::Output, CapabilityError>;

    fn supports_cancellation(&self) -> bool {
        false
    }
}

/// Adapter turning a [`TypedCapability`] into a [`CapabilityHandler`]
#[derive(Debug, Clone)]
pub struct Typed<C>(pub C);

impl<C: TypedCapability> Typed<C> {
    /// Wrap and share in one step
    pub fn shared(capability: C) -> SharedHandler {
        Arc::new(Typed(capability))
    }
}

#[async_trait]
impl<C: TypedCapability> CapabilityHandler for Typed<C> {
    async fn handle(&self, input: A2AMessage) -> Result<Vec<MessagePart>, CapabilityError> {
        let data = input
            .first_data()
            .cloned()
            .ok_or_else(|| CapabilityError::InvalidInput("expected a data part".into()))?;
        let input: C::Input = serde_json::from_value(data)
            .map_err(|e| CapabilityError::InvalidInput(e.to_string()))?;

        let output = self.0.call(input).await?;

        let value = serde_json::to_value(output)
            .map_err(|e| CapabilityError::Failed(format!("could not encode output: {e}")))?;
        Ok(vec![MessagePart::data(value)])
    }

    fn supports_cancellation(&self) -> bool {
        self.0.supports_cancellation()
    }
}
