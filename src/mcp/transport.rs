//! MCP transport layer.

use async_trait::async_trait;
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceExt};
use rmcp::transport::StreamableHttpClientTransport;

use super::endpoint::EndpointAddress;
use super::sse::SseClientTransport;

pub type DynClientService = Box<dyn DynService<RoleClient>>;
pub type MCPRunningService = RunningService<RoleClient, DynClientService>;

/// Transport trait for MCP communication.
#[async_trait]
pub trait MCPTransport: Send {
    /// Address this transport dials.
    fn endpoint(&self) -> &EndpointAddress;

    /// Create and initialize a new rmcp running service for this transport.
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError>;
}

/// Pick the transport for an endpoint.
///
/// URLs whose path ends in `/sse` speak the legacy HTTP+SSE protocol;
/// everything else is treated as streamable HTTP.
pub fn transport_for(endpoint: &EndpointAddress) -> Box<dyn MCPTransport> {
    if speaks_legacy_sse(endpoint) {
        Box::new(SSETransport::new(endpoint.clone()))
    } else {
        Box::new(StreamableHttpTransport::new(endpoint.clone()))
    }
}

fn speaks_legacy_sse(endpoint: &EndpointAddress) -> bool {
    reqwest::Url::parse(endpoint.as_str())
        .map(|url| url.path().trim_end_matches('/').ends_with("/sse"))
        .unwrap_or(false)
}

/// Legacy MCP transport: a `GET` event stream plus `POST`s to the
/// URL announced in its `endpoint` event.
pub struct SSETransport {
    endpoint: EndpointAddress,
    http: reqwest::Client,
}

impl SSETransport {
    pub fn new(endpoint: impl Into<EndpointAddress>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MCPTransport for SSETransport {
    fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError> {
        let transport = SseClientTransport::connect(self.http.clone(), self.endpoint.as_str())
            .await
            .map_err(|e| {
                ClientInitializeError::ConnectionClosed(format!(
                    "SSE endpoint discovery failed: {e}"
                ))
            })?;
        client_info.into_dyn().serve(transport).await
    }
}

/// MCP transport over streamable HTTP.
pub struct StreamableHttpTransport {
    endpoint: EndpointAddress,
}

impl StreamableHttpTransport {
    pub fn new(endpoint: impl Into<EndpointAddress>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl MCPTransport for StreamableHttpTransport {
    fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError> {
        let transport = StreamableHttpClientTransport::from_uri(self.endpoint.as_str().to_owned());
        client_info.into_dyn().serve(transport).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_transport_keeps_endpoint() {
        let transport = SSETransport::new("http://localhost:8000/sse");
        assert_eq!(transport.endpoint().as_str(), "http://localhost:8000/sse");
    }

    #[test]
    fn sse_paths_select_the_legacy_transport() {
        for url in ["http://localhost:8000/sse", "http://localhost:8000/sse/", "http://h/a/sse?x=1"] {
            assert!(speaks_legacy_sse(&EndpointAddress::new(url)), "{url}");
        }
        for url in ["http://localhost:8000/mcp", "http://h/sse-proxy/mcp", "not a url"] {
            assert!(!speaks_legacy_sse(&EndpointAddress::new(url)), "{url}");
        }
        let transport = transport_for(&EndpointAddress::new("http://localhost:8000/sse"));
        assert_eq!(transport.endpoint().as_str(), "http://localhost:8000/sse");
    }
}
