//! Multi-endpoint capability aggregation with deterministic ordering.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{info, warn};

use crate::error::RelayError;
use crate::session::handle::HandleRegistry;
use crate::tools::{capability_names, Capability};

use super::connection::{CapabilityConnection, ConnectOutcome, EndpointConnector, MCPConnector};
use super::endpoint::EndpointAddress;

/// How connection attempts are scheduled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FanOut {
    /// One endpoint at a time, in list order.
    #[default]
    Sequential,
    /// All endpoints at once; results are still merged in list order.
    Concurrent,
}

/// Every capability gathered across endpoints plus the handles keeping them valid.
///
/// Outcomes are recorded as they arrive, each at its endpoint's position in
/// the address list, so a partially finished load still owns every handle
/// acquired so far.
#[derive(Default)]
pub struct AggregationResult {
    capabilities: Vec<Capability>,
    /// `(address index, capability count)` per loaded endpoint, parallel to `handles`.
    segments: Vec<(usize, usize)>,
    handles: HandleRegistry,
    failed_ranks: Vec<usize>,
    failures: Vec<RelayError>,
}

impl AggregationResult {
    /// Capabilities in endpoint order, then per-endpoint retrieval order.
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Endpoints that connected, in list order.
    pub fn loaded_endpoints(&self) -> Vec<EndpointAddress> {
        self.handles.endpoints()
    }

    /// Connection failures in list order, for diagnostics only.
    pub fn failures(&self) -> &[RelayError] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty() && self.handles.is_empty()
    }

    /// Drop the capabilities and hand over every handle for release.
    pub(crate) fn take_for_release(&mut self) -> HandleRegistry {
        self.capabilities.clear();
        self.segments.clear();
        std::mem::take(&mut self.handles)
    }

    fn record(&mut self, rank: usize, outcome: ConnectOutcome) {
        match outcome {
            ConnectOutcome::Connected {
                endpoint,
                connection,
            } => {
                info!(
                    endpoint = %endpoint,
                    tools = connection.capabilities.len(),
                    "loaded tools from endpoint"
                );
                let slot = self.segments.partition_point(|(r, _)| *r < rank);
                let offset: usize = self.segments[..slot].iter().map(|(_, count)| count).sum();
                let count = connection.capabilities.len();
                self.capabilities
                    .splice(offset..offset, connection.capabilities);
                self.segments.insert(slot, (rank, count));
                self.handles.insert(slot, connection.handle);
            }
            ConnectOutcome::Failed { reason, .. } => {
                let slot = self.failed_ranks.partition_point(|r| *r < rank);
                self.failed_ranks.insert(slot, rank);
                self.failures.insert(slot, reason);
            }
        }
    }
}

impl std::fmt::Debug for AggregationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationResult")
            .field("capabilities", &capability_names(&self.capabilities))
            .field("handles", &self.handles)
            .field("failures", &self.failures.len())
            .finish()
    }
}

/// Fans connection attempts out over endpoints and merges what they expose.
pub struct CapabilityAggregator {
    connector: Arc<dyn EndpointConnector>,
    fan_out: FanOut,
    connect_timeout: Option<Duration>,
}

impl CapabilityAggregator {
    pub fn new(connector: Arc<dyn EndpointConnector>) -> Self {
        Self {
            connector,
            fan_out: FanOut::default(),
            connect_timeout: None,
        }
    }

    /// Aggregator dialing real MCP servers.
    pub fn mcp() -> Self {
        Self::new(Arc::new(MCPConnector::new()))
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn fan_out(&self) -> FanOut {
        self.fan_out
    }

    /// Connect to every address and merge the results.
    ///
    /// Never fails: unreachable endpoints are logged and contribute nothing.
    pub async fn load(&self, addresses: &[EndpointAddress]) -> AggregationResult {
        let mut result = AggregationResult::default();
        self.load_into(addresses, &mut result).await;
        result
    }

    /// Like [`CapabilityAggregator::load`], recording into `result` as each
    /// attempt finishes.
    ///
    /// If this future is dropped partway, `result` already holds the handle
    /// of every endpoint that connected.
    pub async fn load_into(&self, addresses: &[EndpointAddress], result: &mut AggregationResult) {
        let connector = self.connector.as_ref();
        let attempts = addresses.iter().cloned().enumerate().map(|(rank, endpoint)| {
            let attempt = CapabilityConnection::new(endpoint).with_timeout(self.connect_timeout);
            async move { (rank, attempt.connect(connector).await) }
        });

        match self.fan_out {
            FanOut::Sequential => {
                for attempt in attempts {
                    let (rank, outcome) = attempt.await;
                    result.record(rank, outcome);
                }
            }
            FanOut::Concurrent => {
                let mut pending: FuturesUnordered<_> = attempts.collect();
                while let Some((rank, outcome)) = pending.next().await {
                    result.record(rank, outcome);
                }
            }
        }

        if !result.failures.is_empty() {
            warn!(
                failed = result.failures.len(),
                total = addresses.len(),
                "some endpoints could not be loaded"
            );
        }
        info!(
            endpoints = result.handle_count(),
            tools = result.capabilities.len(),
            "capability aggregation finished"
        );
    }
}
