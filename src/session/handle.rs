//! Releasable per-connection resources.

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::RelayError;
use crate::mcp::endpoint::EndpointAddress;

/// An owned resource tied to one successful endpoint connection.
#[async_trait]
pub trait ResourceHandle: Send + Sync {
    /// Endpoint this handle keeps alive.
    fn endpoint(&self) -> &EndpointAddress;

    /// Release the underlying resource.
    async fn release(&self) -> Result<(), RelayError>;
}

/// Outcome of releasing every handle in a registry.
#[derive(Debug, Default)]
pub struct ReleaseReport {
    /// Endpoints released successfully, in release order.
    pub released: Vec<EndpointAddress>,
    /// Release failures, in release order. Each is a `RelayError::Release`.
    pub failures: Vec<RelayError>,
}

impl ReleaseReport {
    pub fn attempted(&self) -> usize {
        self.released.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered registry of acquired handles.
///
/// Handles are kept in acquisition order and released in reverse.
#[derive(Default)]
pub struct HandleRegistry {
    handles: Vec<Box<dyn ResourceHandle>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: Box<dyn ResourceHandle>) {
        self.handles.push(handle);
    }

    /// Place `handle` at `index`, shifting later handles back.
    pub(crate) fn insert(&mut self, index: usize, handle: Box<dyn ResourceHandle>) {
        self.handles.insert(index, handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Endpoints held by this registry, in acquisition order.
    pub fn endpoints(&self) -> Vec<EndpointAddress> {
        self.handles
            .iter()
            .map(|handle| handle.endpoint().clone())
            .collect()
    }

    /// Release every handle, newest first.
    ///
    /// A failing release is logged and recorded; the remaining handles are
    /// still released. Consumes the registry so no handle can be released
    /// twice through it.
    pub async fn release_all(self) -> ReleaseReport {
        let mut report = ReleaseReport::default();

        for handle in self.handles.into_iter().rev() {
            let endpoint = handle.endpoint().clone();
            match handle.release().await {
                Ok(()) => {
                    debug!(endpoint = %endpoint, "released endpoint resources");
                    report.released.push(endpoint);
                }
                Err(err) => {
                    error!(endpoint = %endpoint, error = %err, "failed to release endpoint resources");
                    let failure = match err {
                        release @ RelayError::Release { .. } => release,
                        other => RelayError::Release {
                            endpoint: endpoint.to_string(),
                            message: other.to_string(),
                        },
                    };
                    report.failures.push(failure);
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("endpoints", &self.endpoints())
            .finish()
    }
}
