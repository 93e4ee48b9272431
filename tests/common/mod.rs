//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use serde_json::json;
use wiremock::{Request, ResponseTemplate};

use toolrelay::agent::{
    AgentEvent, AgentSpec, Content, ContentRole, ConversationSession, FunctionResponse, Part,
    ReasoningCollaborator,
};
use toolrelay::error::{RelayError, Result};
use toolrelay::mcp::{Connection, EndpointAddress, EndpointConnector};
use toolrelay::session::ResourceHandle;
use toolrelay::tools::{
    AgentToolParameters, Capability, Tool, ToolArguments, ToolExecutionContext,
};

/// Shared record of successful releases, in call order.
#[derive(Debug, Clone, Default)]
pub struct ReleaseLog {
    released: Arc<Mutex<Vec<String>>>,
}

impl ReleaseLog {
    pub fn released(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

pub struct FakeHandle {
    endpoint: EndpointAddress,
    log: ReleaseLog,
}

#[async_trait]
impl ResourceHandle for FakeHandle {
    fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    async fn release(&self) -> Result<()> {
        self.log
            .released
            .lock()
            .unwrap()
            .push(self.endpoint.to_string());
        Ok(())
    }
}

/// Connector serving fixed tool lists. Unknown endpoints refuse the connection.
#[derive(Default)]
pub struct FakeConnector {
    endpoints: HashMap<String, Vec<&'static str>>,
    log: ReleaseLog,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, address: &str, tools: Vec<&'static str>) -> Self {
        self.endpoints.insert(address.to_string(), tools);
        self
    }

    pub fn release_log(&self) -> ReleaseLog {
        self.log.clone()
    }
}

#[async_trait]
impl EndpointConnector for FakeConnector {
    async fn connect(&self, endpoint: &EndpointAddress) -> Result<Connection> {
        let tools = self
            .endpoints
            .get(endpoint.as_str())
            .ok_or_else(|| RelayError::Stream("connection refused".into()))?;

        Ok(Connection {
            capabilities: tools.iter().copied().map(text_capability).collect(),
            handle: Box::new(FakeHandle {
                endpoint: endpoint.clone(),
                log: self.log.clone(),
            }),
        })
    }
}

/// Capability answering with an MCP-shaped text result `"<name>:<code>"`.
pub struct TextTool {
    name: &'static str,
    description: String,
    parameters: AgentToolParameters,
}

#[async_trait]
impl Tool for TextTool {
    fn name(&self) -> &str {
        self.name
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
    ) -> Result<serde_json::Value> {
        let code = args
            .raw()
            .get("code")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        Ok(json!({
            "content": [{ "type": "text", "text": format!("{}:{code}", self.name) }],
            "isError": false
        }))
    }
}

pub fn text_capability(name: &'static str) -> Capability {
    Arc::new(TextTool {
        name,
        description: format!("{name} tool"),
        parameters: AgentToolParameters::from_schema(json!({
            "type": "object",
            "properties": { "code": { "type": "string", "description": "A code to look up" } }
        })),
    })
}

fn response_event(agent: &str, response: FunctionResponse) -> AgentEvent {
    AgentEvent::new(
        agent,
        Some(Content {
            role: ContentRole::Function,
            parts: vec![Part::function_response(response)],
        }),
    )
}

/// Replies with a single function response whose text is the query itself.
#[derive(Default)]
pub struct EchoCollaborator {
    pub seen_capabilities: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl ReasoningCollaborator for EchoCollaborator {
    async fn run(
        &self,
        agent: AgentSpec,
        _session: ConversationSession,
        message: Content,
    ) -> Result<BoxStream<'static, Result<AgentEvent>>> {
        self.seen_capabilities.lock().unwrap().push(
            agent
                .capabilities
                .iter()
                .map(|capability| capability.name().to_string())
                .collect(),
        );
        let echo = FunctionResponse::result(
            "echo",
            None,
            json!({ "content": [{ "type": "text", "text": message.text() }] }),
        );
        Ok(Box::pin(stream::iter(vec![
            Ok(AgentEvent::new(&agent.name, Some(message))),
            Ok(response_event(&agent.name, echo)),
        ])))
    }
}

/// Calls every capability once, in order, then optionally fails.
pub struct SweepCollaborator {
    pub fail_after: bool,
}

#[async_trait]
impl ReasoningCollaborator for SweepCollaborator {
    async fn run(
        &self,
        agent: AgentSpec,
        session: ConversationSession,
        _message: Content,
    ) -> Result<BoxStream<'static, Result<AgentEvent>>> {
        let ctx = ToolExecutionContext::for_session(session.id);
        let mut events = Vec::new();
        for capability in &agent.capabilities {
            let payload = capability
                .execute(&ToolArguments::new(json!({ "code": "A-17" })), &ctx)
                .await?;
            events.push(Ok(response_event(
                &agent.name,
                FunctionResponse::result(capability.name(), None, payload),
            )));
        }
        if self.fail_after {
            events.push(Err(RelayError::Stream("model connection dropped".into())));
        }
        Ok(Box::pin(stream::iter(events)))
    }
}

/// wiremock responder speaking enough streamable-HTTP MCP for a client session.
pub fn mcp_handler(
    server_name: &'static str,
    tools: &'static [&'static str],
) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    move |request: &Request| {
        let body: serde_json::Value = request.body_json().unwrap_or_else(|_| json!({}));
        let method = body.get("method").and_then(|m| m.as_str()).unwrap_or_default();
        let id = body.get("id").cloned().unwrap_or_else(|| json!(1));

        match method {
            "initialize" => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": server_name, "version": "0.1.0" }
                }
            })),
            "tools/list" => {
                let definitions: Vec<_> = tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "name": tool,
                            "description": format!("{server_name} {tool}"),
                            "inputSchema": {
                                "type": "object",
                                "properties": { "code": { "type": "string" } }
                            }
                        })
                    })
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": { "tools": definitions, "nextCursor": null }
                }))
            }
            "tools/call" => {
                let params = body.get("params").cloned().unwrap_or_else(|| json!({}));
                let tool = params.get("name").and_then(|n| n.as_str()).unwrap_or_default();
                let code = params
                    .get("arguments")
                    .and_then(|args| args.get("code"))
                    .and_then(|code| code.as_str())
                    .unwrap_or_default();
                ResponseTemplate::new(200).set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "content": [{ "type": "text", "text": format!("{server_name}:{tool}:{code}") }],
                        "isError": false
                    }
                }))
            }
            "notifications/initialized" => ResponseTemplate::new(202),
            _ => ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {}
            })),
        }
    }
}
