//! Connecting to one capability endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::session::handle::ResourceHandle;
use crate::tools::Capability;
use crate::util::timeout::with_timeout;

use super::client::MCPClient;
use super::endpoint::EndpointAddress;
use super::tool::{MCPTool, SharedMCPClient};
use super::transport::{transport_for, MCPTransport};

/// Capabilities retrieved from one endpoint plus the handle keeping them alive.
pub struct Connection {
    pub capabilities: Vec<Capability>,
    pub handle: Box<dyn ResourceHandle>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", self.handle.endpoint())
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}

/// Result of one connection attempt. Failures are values, not errors.
#[derive(Debug)]
pub enum ConnectOutcome {
    Connected {
        endpoint: EndpointAddress,
        connection: Connection,
    },
    Failed {
        endpoint: EndpointAddress,
        reason: RelayError,
    },
}

impl ConnectOutcome {
    pub fn endpoint(&self) -> &EndpointAddress {
        match self {
            Self::Connected { endpoint, .. } | Self::Failed { endpoint, .. } => endpoint,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Wire-level seam: dial an endpoint and list its capabilities.
#[async_trait]
pub trait EndpointConnector: Send + Sync {
    async fn connect(&self, endpoint: &EndpointAddress) -> Result<Connection, RelayError>;
}

/// One connection attempt against one endpoint.
#[derive(Debug, Clone)]
pub struct CapabilityConnection {
    endpoint: EndpointAddress,
    timeout: Option<Duration>,
}

impl CapabilityConnection {
    pub fn new(endpoint: EndpointAddress) -> Self {
        Self {
            endpoint,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attempt the connection. Never returns an error to the caller.
    pub async fn connect(self, connector: &dyn EndpointConnector) -> ConnectOutcome {
        let attempt = connector.connect(&self.endpoint);
        let result = match self.timeout {
            Some(timeout) => with_timeout(timeout, attempt).await,
            None => attempt.await,
        };

        match result {
            Ok(connection) => {
                debug!(
                    endpoint = %self.endpoint,
                    tools = connection.capabilities.len(),
                    "endpoint connected"
                );
                ConnectOutcome::Connected {
                    endpoint: self.endpoint,
                    connection,
                }
            }
            Err(err) => {
                warn!(endpoint = %self.endpoint, error = %err, "failed to connect to endpoint");
                let reason = match err {
                    connection @ RelayError::Connection { .. } => connection,
                    other => RelayError::Connection {
                        endpoint: self.endpoint.to_string(),
                        message: other.to_string(),
                    },
                };
                ConnectOutcome::Failed {
                    endpoint: self.endpoint,
                    reason,
                }
            }
        }
    }
}

/// Builds the transport used to dial an endpoint.
pub type TransportFactory = Arc<dyn Fn(&EndpointAddress) -> Box<dyn MCPTransport> + Send + Sync>;

/// Production connector speaking MCP over legacy SSE or streamable HTTP.
pub struct MCPConnector {
    transport_factory: TransportFactory,
}

impl MCPConnector {
    pub fn new() -> Self {
        Self::with_transport_factory(Arc::new(transport_for))
    }

    pub fn with_transport_factory(transport_factory: TransportFactory) -> Self {
        Self { transport_factory }
    }
}

impl Default for MCPConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EndpointConnector for MCPConnector {
    async fn connect(&self, endpoint: &EndpointAddress) -> Result<Connection, RelayError> {
        let mut transport = (self.transport_factory)(endpoint);
        let mut client = MCPClient::connect(transport.as_mut()).await?;

        let tools = match client.list_tools().await {
            Ok(tools) => tools,
            Err(err) => {
                // Half-open sessions must not outlive a failed attempt.
                if let Err(close_err) = client.close().await {
                    warn!(endpoint = %endpoint, error = %close_err, "failed to close MCP session after listing failed");
                }
                return Err(err);
            }
        };

        let client = SharedMCPClient::new(client);
        let capabilities = tools
            .into_iter()
            .map(|schema| {
                Arc::new(MCPTool::new(endpoint.clone(), schema, Arc::clone(&client))) as Capability
            })
            .collect();

        Ok(Connection {
            capabilities,
            handle: Box::new(MCPSessionHandle::new(endpoint.clone(), client)),
        })
    }
}

/// Release handle for one MCP session.
pub struct MCPSessionHandle {
    endpoint: EndpointAddress,
    client: Arc<SharedMCPClient>,
    released: AtomicBool,
}

impl MCPSessionHandle {
    pub fn new(endpoint: EndpointAddress, client: Arc<SharedMCPClient>) -> Self {
        Self {
            endpoint,
            client,
            released: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ResourceHandle for MCPSessionHandle {
    fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    async fn release(&self) -> Result<(), RelayError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.client.close().await
    }
}
