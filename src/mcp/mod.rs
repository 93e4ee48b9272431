//! Model Context Protocol (MCP) endpoints as capability sources.

pub mod aggregate;
pub mod client;
pub mod connection;
pub mod endpoint;
pub mod schema;
pub mod sse;
pub mod tool;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregate::{AggregationResult, CapabilityAggregator, FanOut};
pub use client::MCPClient;
pub use connection::{
    CapabilityConnection, ConnectOutcome, Connection, EndpointConnector, MCPConnector,
    MCPSessionHandle,
};
pub use endpoint::EndpointAddress;
pub use tool::MCPTool;
pub use sse::{SseClientTransport, SseTransportError};
pub use transport::{transport_for, MCPTransport, SSETransport, StreamableHttpTransport};
