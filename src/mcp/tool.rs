//! MCP tools exposed as capabilities.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

use super::client::{MCPClient, MCPToolCallResult};
use super::endpoint::EndpointAddress;
use super::schema::MCPToolSchema;

/// MCP client shared by every tool of one server and by its release handle.
///
/// Closing interrupts calls in flight before it waits for the client.
pub struct SharedMCPClient {
    client: Mutex<MCPClient>,
    closing: CancellationToken,
}

impl SharedMCPClient {
    pub fn new(client: MCPClient) -> Arc<Self> {
        Arc::new(Self {
            client: Mutex::new(client),
            closing: CancellationToken::new(),
        })
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<MCPToolCallResult, RelayError> {
        tokio::select! {
            _ = self.closing.cancelled() => {
                Err(RelayError::Stream("MCP session is closed".into()))
            }
            result = async { self.client.lock().await.call_tool(name, arguments).await } => result,
        }
    }

    pub async fn close(&self) -> Result<(), RelayError> {
        self.closing.cancel();
        self.client.lock().await.close().await
    }
}

/// One tool listed by an MCP server, callable through the server's session.
pub struct MCPTool {
    endpoint: EndpointAddress,
    name: String,
    description: String,
    parameters: AgentToolParameters,
    client: Arc<SharedMCPClient>,
}

impl MCPTool {
    pub fn new(
        endpoint: EndpointAddress,
        schema: MCPToolSchema,
        client: Arc<SharedMCPClient>,
    ) -> Self {
        Self {
            endpoint,
            name: schema.name,
            description: schema.description.unwrap_or_default(),
            parameters: AgentToolParameters::from_schema(schema.input_schema),
            client,
        }
    }

    pub fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }
}

#[async_trait]
impl Tool for MCPTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, RelayError> {
        let result = self.client.call_tool(&self.name, args.raw().clone()).await?;
        Ok(result.into_payload())
    }
}

impl std::fmt::Debug for MCPTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MCPTool")
            .field("endpoint", &self.endpoint)
            .field("name", &self.name)
            .finish()
    }
}
