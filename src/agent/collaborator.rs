//! Boundary to the component that plans and invokes capabilities.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::RelayError;
use crate::tools::{capability_names, Capability};

use super::events::{AgentEvent, Content};

/// Agent definition handed to a collaborator for one run.
#[derive(Clone)]
pub struct AgentSpec {
    pub model: String,
    pub name: String,
    pub instruction: String,
    pub capabilities: Vec<Capability>,
}

impl AgentSpec {
    /// Find a capability by the name the model used.
    ///
    /// Names are not namespaced per endpoint; the first match wins.
    pub fn capability(&self, name: &str) -> Option<&Capability> {
        self.capabilities
            .iter()
            .find(|capability| capability.name() == name)
    }
}

impl std::fmt::Debug for AgentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSpec")
            .field("model", &self.model)
            .field("name", &self.name)
            .field("capabilities", &capability_names(&self.capabilities))
            .finish()
    }
}

/// Fresh conversation context created for every query.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSession {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub state: HashMap<String, serde_json::Value>,
}

impl ConversationSession {
    pub fn new(app_name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            app_name: app_name.into(),
            user_id: user_id.into(),
            state: HashMap::new(),
        }
    }
}

/// Runs an agent over a conversation and reports each step as an event.
///
/// Errors from `run` mean the run never started; errors inside the stream
/// end the run partway through.
#[async_trait]
pub trait ReasoningCollaborator: Send + Sync {
    async fn run(
        &self,
        agent: AgentSpec,
        session: ConversationSession,
        message: Content,
    ) -> Result<BoxStream<'static, Result<AgentEvent, RelayError>>, RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::test_support::fake_capability;

    #[test]
    fn sessions_are_fresh_per_construction() {
        let first = ConversationSession::new("my-app", "user-123");
        let second = ConversationSession::new("my-app", "user-123");

        assert_ne!(first.id, second.id);
        assert_eq!(first.app_name, "my-app");
        assert_eq!(first.user_id, "user-123");
        assert!(first.state.is_empty());
    }

    #[test]
    fn capability_lookup_takes_first_match() {
        let spec = AgentSpec {
            model: "gemini-2.0-flash".into(),
            name: "MCP_agent".into(),
            instruction: String::new(),
            capabilities: vec![fake_capability("get_code"), fake_capability("get_code")],
        };

        let found = spec.capability("get_code").unwrap();
        assert!(std::sync::Arc::ptr_eq(found, &spec.capabilities[0]));
        assert!(spec.capability("missing").is_none());
    }
}
