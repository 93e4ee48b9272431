//! Capabilities: the opaque callables handed to the reasoning collaborator.
//!
//! The relay never looks inside a capability. It collects, orders and
//! forwards them; only the collaborator calls [`Tool::execute`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// A named callable handed to the reasoning collaborator.
pub type Capability = Arc<dyn Tool>;

/// Names of the given capabilities, in order.
pub fn capability_names(capabilities: &[Capability]) -> Vec<String> {
    capabilities
        .iter()
        .map(|capability| capability.name().to_owned())
        .collect()
}

/// Something a model can call by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call this tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &AgentToolParameters;

    /// Run the tool. The returned JSON goes back to the model as the
    /// function response's `result`.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, RelayError>;
}

/// Context of one tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Conversation session the call belongs to, when known.
    pub session_id: Option<String>,
}

impl ToolExecutionContext {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
        }
    }
}

/// Arguments the model supplied for one call, as received.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }
}

impl From<serde_json::Value> for ToolArguments {
    fn from(value: serde_json::Value) -> Self {
        Self::new(value)
    }
}

/// JSON Schema describing a tool's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentToolParameters {
    pub schema: serde_json::Value,
}

impl AgentToolParameters {
    pub fn from_schema(schema: serde_json::Value) -> Self {
        Self { schema }
    }

    /// An object schema with no properties.
    pub fn empty() -> Self {
        Self::from_schema(serde_json::json!({ "type": "object", "properties": {} }))
    }

    /// Whether the schema declares at least one property.
    pub fn has_properties(&self) -> bool {
        self.schema
            .get("properties")
            .and_then(serde_json::Value::as_object)
            .is_some_and(|properties| !properties.is_empty())
    }
}
