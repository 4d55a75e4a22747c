//! Agent capability registry
//!
//! Maps agent ids to their cards, and within each card, capability names to
//! the handlers that implement them. Reads are shared; `register` and
//! `unregister` take the write lock.

pub mod handler;

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::protocol::{AgentCapability, AgentCard, RegistryError};

pub use handler::{CapabilityHandler, HandlerMap, SharedHandler, Typed, TypedCapability};

struct RegisteredAgent {
    card: Arc<AgentCard>,
    handlers: HashMap<String, SharedHandler>,
}

/// A capability declaration together with its implementation
#[derive(Clone)]
pub struct ResolvedCapability {
    card: Arc<AgentCard>,
    index: usize,
    handler: SharedHandler,
}

impl ResolvedCapability {
    /// Card of the agent exposing the capability
    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    /// The capability declaration
    pub fn capability(&self) -> &AgentCapability {
        &self.card.capabilities[self.index]
    }

    /// The handler implementing it
    pub fn handler(&self) -> &SharedHandler {
        &self.handler
    }
}

/// Registry of agents and their capability handlers
///
/// Cloning is cheap and clones share the same underlying table.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: Arc<RwLock<HashMap<String, RegisteredAgent>>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent card with one handler per declared capability
    ///
    /// # Errors
    ///
    /// - `DuplicateAgent` if the agent id is already registered
    /// - `CapabilityMismatch` if the handler names differ from the card's
    ///   capability names, or the card declares a name twice
    pub async fn register(&self, card: AgentCard, handlers: HandlerMap) -> Result<(), RegistryError> {
        let mut agents = self.agents.write().await;
        if agents.contains_key(&card.agent_id) {
            return Err(RegistryError::DuplicateAgent {
                agent_id: card.agent_id,
            });
        }

        check_handlers(&card, &handlers)?;

        info!(
            agent_id = %card.agent_id,
            capabilities = card.capabilities.len(),
            "Registered agent"
        );
        agents.insert(
            card.agent_id.clone(),
            RegisteredAgent {
                card: Arc::new(card),
                handlers,
            },
        );
        Ok(())
    }

    /// Find the handler for `capability` on `agent_id`
    pub async fn lookup(
        &self,
        agent_id: &str,
        capability: &str,
    ) -> Result<SharedHandler, RegistryError> {
        self.resolve(agent_id, capability)
            .await
            .map(|resolved| resolved.handler)
    }

    /// Find both the declaration and the handler for `capability` on `agent_id`
    pub async fn resolve(
        &self,
        agent_id: &str,
        capability: &str,
    ) -> Result<ResolvedCapability, RegistryError> {
        let agents = self.agents.read().await;
        let agent = agents
            .get(agent_id)
            .ok_or_else(|| RegistryError::UnknownAgent {
                agent_id: agent_id.to_string(),
            })?;

        let unknown = || RegistryError::UnknownCapability {
            agent_id: agent_id.to_string(),
            capability: capability.to_string(),
        };
        let index = agent
            .card
            .capabilities
            .iter()
            .position(|c| c.name == capability)
            .ok_or_else(unknown)?;
        let handler = agent.handlers.get(capability).cloned().ok_or_else(unknown)?;

        Ok(ResolvedCapability {
            card: agent.card.clone(),
            index,
            handler,
        })
    }

    /// Remove an agent; removing an unknown agent is a no-op
    ///
    /// Returns whether an agent was actually removed.
    pub async fn unregister(&self, agent_id: &str) -> bool {
        let removed = self.agents.write().await.remove(agent_id).is_some();
        if removed {
            info!(agent_id, "Unregistered agent");
        } else {
            debug!(agent_id, "Unregister of unknown agent ignored");
        }
        removed
    }

    /// Card of a registered agent
    pub async fn card(&self, agent_id: &str) -> Option<Arc<AgentCard>> {
        self.agents
            .read()
            .await
            .get(agent_id)
            .map(|agent| agent.card.clone())
    }

    /// Cards of all registered agents, sorted by agent id
    pub async fn cards(&self) -> Vec<Arc<AgentCard>> {
        let agents = self.agents.read().await;
        let mut cards: Vec<_> = agents.values().map(|agent| agent.card.clone()).collect();
        cards.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        cards
    }

    /// Whether an agent is registered
    pub async fn contains(&self, agent_id: &str) -> bool {
        self.agents.read().await.contains_key(agent_id)
    }

    /// Number of registered agents
    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    /// Whether no agent is registered
    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("AgentRegistry");
        match self.agents.try_read() {
            Ok(agents) => debug.field("agents", &agents.len()),
            Err(_) => debug.field("agents", &"<locked>"),
        };
        debug.finish()
    }
}

fn check_handlers(card: &AgentCard, handlers: &HandlerMap) -> Result<(), RegistryError> {
    let mut declared = BTreeSet::new();
    let mut duplicated = BTreeSet::new();
    for name in card.capability_names() {
        if !declared.insert(name) {
            duplicated.insert(name.to_string());
        }
    }

    let missing: Vec<String> = declared
        .iter()
        .filter(|name| !handlers.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    let mut unexpected: Vec<String> = handlers
        .keys()
        .filter(|name| !declared.contains(name.as_str()))
        .cloned()
        .collect();
    unexpected.sort();

    if missing.is_empty() && unexpected.is_empty() && duplicated.is_empty() {
        return Ok(());
    }
    Err(RegistryError::CapabilityMismatch {
        agent_id: card.agent_id.clone(),
        missing,
        unexpected,
        duplicated: duplicated.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::protocol::{A2AMessage, CapabilityError, CapabilitySchema, MessagePart};

    use super::*;

    struct Noop;

    #[async_trait]
    impl CapabilityHandler for Noop {
        async fn handle(&self, _input: A2AMessage) -> Result<Vec<MessagePart>, CapabilityError> {
            Ok(vec![])
        }
    }

    fn capability(name: &str) -> AgentCapability {
        AgentCapability::new(name, CapabilitySchema::default(), CapabilitySchema::default())
    }

    fn card(agent_id: &str, names: &[&str]) -> AgentCard {
        names
            .iter()
            .fold(AgentCard::new(agent_id), |card, name| {
                card.with_capability(capability(name))
            })
    }

    fn handlers(names: &[&str]) -> HandlerMap {
        names
            .iter()
            .map(|name| (name.to_string(), Arc::new(Noop) as SharedHandler))
            .collect()
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = AgentRegistry::new();
        let map = handlers(&["create_event", "list_events"]);
        let create = map["create_event"].clone();
        let list = map["list_events"].clone();

        registry
            .register(card("calendar", &["create_event", "list_events"]), map)
            .await
            .unwrap();

        let found = registry.lookup("calendar", "create_event").await.unwrap();
        assert!(Arc::ptr_eq(&found, &create));
        let found = registry.lookup("calendar", "list_events").await.unwrap();
        assert!(Arc::ptr_eq(&found, &list));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_agent() {
        let registry = AgentRegistry::new();
        registry
            .register(card("calendar", &["a"]), handlers(&["a"]))
            .await
            .unwrap();

        let err = registry
            .register(card("calendar", &["a"]), handlers(&["a"]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateAgent {
                agent_id: "calendar".into()
            }
        );
    }

    #[tokio::test]
    async fn test_capability_mismatch() {
        let registry = AgentRegistry::new();
        let err = registry
            .register(card("calendar", &["a", "b"]), handlers(&["b", "c"]))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RegistryError::CapabilityMismatch {
                agent_id: "calendar".into(),
                missing: vec!["a".into()],
                unexpected: vec!["c".into()],
                duplicated: vec![],
            }
        );
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_capability_names_rejected() {
        let registry = AgentRegistry::new();
        let err = registry
            .register(card("calendar", &["a", "a"]), handlers(&["a"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::CapabilityMismatch { duplicated, .. } if duplicated == vec!["a".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_unknown_agent_and_capability() {
        let registry = AgentRegistry::new();
        registry
            .register(card("calendar", &["list_events"]), handlers(&["list_events"]))
            .await
            .unwrap();

        assert!(matches!(
            registry.lookup("ghost", "list_events").await,
            Err(RegistryError::UnknownAgent { .. })
        ));
        assert!(matches!(
            registry.lookup("calendar", "delete_event").await,
            Err(RegistryError::UnknownCapability { .. })
        ));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = AgentRegistry::new();
        registry
            .register(card("calendar", &["a"]), handlers(&["a"]))
            .await
            .unwrap();

        assert!(registry.unregister("calendar").await);
        assert!(!registry.unregister("calendar").await);
        assert!(!registry.unregister("never-registered").await);
        assert!(!registry.contains("calendar").await);
    }

    #[tokio::test]
    async fn test_resolve_and_cards() {
        let registry = AgentRegistry::new();
        registry
            .register(card("zeta", &["x"]), handlers(&["x"]))
            .await
            .unwrap();
        registry
            .register(card("alpha", &["y", "z"]), handlers(&["y", "z"]))
            .await
            .unwrap();

        let resolved = registry.resolve("alpha", "z").await.unwrap();
        assert_eq!(resolved.capability().name, "z");
        assert_eq!(resolved.card().agent_id, "alpha");

        let ids: Vec<_> = registry
            .cards()
            .await
            .iter()
            .map(|card| card.agent_id.clone())
            .collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
        assert!(registry.card("zeta").await.is_some());
    }
}
