use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use rmcp::{
    model::{ClientInfo, ProtocolVersion, ServerJsonRpcMessage},
    service::{
        serve_directly, ClientInitializeError, RoleClient, RxJsonRpcMessage, ServiceExt,
        TxJsonRpcMessage,
    },
    transport::Transport as RmcpTransport,
};
use serde_json::json;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::connection::{Connection, EndpointConnector};
use super::endpoint::EndpointAddress;
use super::transport::{MCPRunningService, MCPTransport};
use crate::error::RelayError;
use crate::session::test_support::{RecordingHandle, ReleaseLog};
use crate::tools::{
    AgentToolParameters, Capability, Tool, ToolArguments, ToolExecutionContext,
};

struct ChannelRmcpTransport {
    outbound: UnboundedSender<TxJsonRpcMessage<RoleClient>>,
    inbound: UnboundedReceiver<RxJsonRpcMessage<RoleClient>>,
}

impl RmcpTransport<RoleClient> for ChannelRmcpTransport {
    type Error = io::Error;

    fn send(
        &mut self,
        item: TxJsonRpcMessage<RoleClient>,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send + 'static {
        let tx = self.outbound.clone();
        async move {
            tx.send(item).map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "mock rmcp channel closed")
            })
        }
    }

    async fn receive(&mut self) -> Option<RxJsonRpcMessage<RoleClient>> {
        self.inbound.recv().await
    }

    fn close(&mut self) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send {
        self.inbound.close();
        std::future::ready(Ok(()))
    }
}

/// Tool name the scripted server lists but never answers a call for.
pub(crate) const UNANSWERED_TOOL: &str = "hang";

/// An rmcp client service wired to an in-process fake server.
///
/// The fake answers `tools/list` with `tool_names` and answers `tools/call`
/// with a text block `"<tool>:<comma separated string arguments>"`, except
/// for [`UNANSWERED_TOOL`].
pub(crate) fn scripted_running_service(tool_names: Vec<&'static str>) -> MCPRunningService {
    let (outbound_tx, mut outbound_rx) = unbounded_channel::<TxJsonRpcMessage<RoleClient>>();
    let (inbound_tx, inbound_rx) = unbounded_channel::<RxJsonRpcMessage<RoleClient>>();
    let transport = ChannelRmcpTransport {
        outbound: outbound_tx,
        inbound: inbound_rx,
    };

    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let Ok(value) = serde_json::to_value(message) else {
                continue;
            };
            let Some(method) = value.get("method").and_then(|m| m.as_str()) else {
                continue;
            };
            let id = value.get("id").cloned().unwrap_or(serde_json::Value::Null);

            let result = match method {
                "tools/list" => {
                    let tools: Vec<_> = tool_names
                        .iter()
                        .map(|name| {
                            json!({
                                "name": name,
                                "description": format!("{name} tool"),
                                "inputSchema": { "type": "object", "properties": {} }
                            })
                        })
                        .collect();
                    json!({ "tools": tools, "nextCursor": null })
                }
                "tools/call" => {
                    let params = value.get("params").cloned().unwrap_or_default();
                    let tool = params
                        .get("name")
                        .and_then(|name| name.as_str())
                        .unwrap_or_default()
                        .to_owned();
                    if tool == UNANSWERED_TOOL {
                        continue;
                    }
                    let arguments = params
                        .get("arguments")
                        .and_then(|args| args.as_object())
                        .map(|args| {
                            args.values()
                                .filter_map(|v| v.as_str())
                                .collect::<Vec<_>>()
                                .join(",")
                        })
                        .unwrap_or_default();
                    json!({
                        "content": [{ "type": "text", "text": format!("{tool}:{arguments}") }],
                        "isError": false
                    })
                }
                _ => continue,
            };

            let response: ServerJsonRpcMessage = serde_json::from_value(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result
            }))
            .expect("scripted response should deserialize");
            let _ = inbound_tx.send(response);
        }
    });

    serve_directly(().into_dyn(), transport, None)
}

pub(crate) struct MockBootstrapTransport {
    endpoint: EndpointAddress,
    connect_results: VecDeque<Result<MCPRunningService, ClientInitializeError>>,
    attempted_protocols: Arc<Mutex<Vec<ProtocolVersion>>>,
}

impl MockBootstrapTransport {
    pub(crate) fn new(
        connect_results: Vec<Result<MCPRunningService, ClientInitializeError>>,
    ) -> Self {
        Self {
            endpoint: EndpointAddress::new("mock://server"),
            connect_results: connect_results.into(),
            attempted_protocols: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn attempted_protocols(&self) -> Arc<Mutex<Vec<ProtocolVersion>>> {
        Arc::clone(&self.attempted_protocols)
    }
}

#[async_trait]
impl MCPTransport for MockBootstrapTransport {
    fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError> {
        self.attempted_protocols
            .lock()
            .expect("protocol mutex should lock")
            .push(client_info.protocol_version);

        self.connect_results.pop_front().unwrap_or_else(|| {
            Err(ClientInitializeError::ConnectionClosed(
                "missing mock connect result".into(),
            ))
        })
    }
}

/// Planned behavior of one endpoint behind [`FakeConnector`].
pub(crate) struct FakeEndpoint {
    tools: Result<Vec<&'static str>, &'static str>,
    delay: Option<Duration>,
    failing_release: bool,
    release_delay: Option<Duration>,
}

impl FakeEndpoint {
    pub(crate) fn ok(tools: Vec<&'static str>) -> Self {
        Self {
            tools: Ok(tools),
            delay: None,
            failing_release: false,
            release_delay: None,
        }
    }

    pub(crate) fn err(message: &'static str) -> Self {
        Self {
            tools: Err(message),
            delay: None,
            failing_release: false,
            release_delay: None,
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn failing_release(mut self) -> Self {
        self.failing_release = true;
        self
    }

    pub(crate) fn slow_release(mut self, delay: Duration) -> Self {
        self.release_delay = Some(delay);
        self
    }
}

/// Connector with scripted per-endpoint results. Unknown endpoints are unreachable.
pub(crate) struct FakeConnector {
    endpoints: HashMap<String, FakeEndpoint>,
    log: ReleaseLog,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self {
            endpoints: HashMap::new(),
            log: ReleaseLog::default(),
        }
    }

    pub(crate) fn endpoint(mut self, address: &str, plan: FakeEndpoint) -> Self {
        self.endpoints.insert(address.to_owned(), plan);
        self
    }

    pub(crate) fn release_log(&self) -> ReleaseLog {
        self.log.clone()
    }
}

/// Local capability answering with a text block `"<name> ok"`.
pub(crate) struct FakeTool {
    name: String,
    description: String,
    parameters: AgentToolParameters,
}

#[async_trait]
impl Tool for FakeTool {
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
        _args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, RelayError> {
        Ok(json!({ "content": [{ "type": "text", "text": format!("{} ok", self.name) }] }))
    }
}

pub(crate) fn fake_capability(name: &str) -> Capability {
    fake_capability_with_schema(name, AgentToolParameters::empty().schema)
}

pub(crate) fn fake_capability_with_schema(name: &str, schema: serde_json::Value) -> Capability {
    Arc::new(FakeTool {
        name: name.to_owned(),
        description: format!("{name} tool"),
        parameters: AgentToolParameters::from_schema(schema),
    })
}

#[async_trait]
impl EndpointConnector for FakeConnector {
    async fn connect(&self, endpoint: &EndpointAddress) -> Result<Connection, RelayError> {
        let Some(plan) = self.endpoints.get(endpoint.as_str()) else {
            return Err(RelayError::Stream("connection refused".into()));
        };
        if let Some(delay) = plan.delay {
            tokio::time::sleep(delay).await;
        }
        let tools = plan
            .tools
            .as_ref()
            .map_err(|message| RelayError::Stream((*message).to_owned()))?;

        let mut handle = if plan.failing_release {
            RecordingHandle::failing(endpoint.as_str(), self.log.clone())
        } else {
            RecordingHandle::new(endpoint.as_str(), self.log.clone())
        };
        if let Some(delay) = plan.release_delay {
            handle = handle.with_delay(delay);
        }
        Ok(Connection {
            capabilities: tools.iter().copied().map(fake_capability).collect(),
            handle: Box::new(handle),
        })
    }
}
