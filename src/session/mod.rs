//! Scoped acquisition and release of aggregated capabilities.
//!
//! A [`ScopedSession`] opens every configured endpoint, exposes the merged
//! capability list while it is open, and releases all per-connection
//! handles in reverse acquisition order when it closes. Release also runs
//! when the session is dropped while open.

pub mod handle;

#[cfg(test)]
pub(crate) mod test_support;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{RelayError, Result};
use crate::mcp::aggregate::{AggregationResult, CapabilityAggregator};
use crate::mcp::endpoint::EndpointAddress;
use crate::tools::Capability;

pub use handle::{HandleRegistry, ReleaseReport, ResourceHandle};

/// Lifecycle of a [`ScopedSession`]. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Unopened,
    Open,
    Closed,
}

/// Owns the aggregated capabilities and their handles for one scope.
pub struct ScopedSession {
    aggregator: CapabilityAggregator,
    endpoints: Vec<EndpointAddress>,
    state: SessionState,
    loaded: AggregationResult,
}

impl ScopedSession {
    pub fn new(aggregator: CapabilityAggregator, endpoints: Vec<EndpointAddress>) -> Self {
        Self {
            aggregator,
            endpoints,
            state: SessionState::Unopened,
            loaded: AggregationResult::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn endpoints(&self) -> &[EndpointAddress] {
        &self.endpoints
    }

    /// Capabilities of the open session. Empty before open and after close.
    pub fn capabilities(&self) -> &[Capability] {
        self.loaded.capabilities()
    }

    /// Connect to every endpoint and keep what loaded.
    pub async fn open(&mut self) -> Result<&AggregationResult> {
        if self.state != SessionState::Unopened {
            return Err(RelayError::InvalidState(format!(
                "cannot open a session that is {}",
                self.state
            )));
        }

        // Open before connecting: if this future is dropped, `close` or
        // `Drop` still releases whatever connected.
        self.state = SessionState::Open;
        self.aggregator
            .load_into(&self.endpoints, &mut self.loaded)
            .await;
        info!(
            endpoints = self.loaded.handle_count(),
            tools = self.loaded.capabilities().len(),
            "session opened"
        );
        Ok(&self.loaded)
    }

    /// Release every handle, newest first. Idempotent.
    ///
    /// Release runs on its own task, so dropping this future partway does
    /// not cut it short.
    pub async fn close(&mut self) -> ReleaseReport {
        let was_open = self.state == SessionState::Open;
        self.state = SessionState::Closed;
        if !was_open {
            return ReleaseReport::default();
        }

        let report = release_detached(self.loaded.take_for_release()).await;
        if report.is_clean() {
            info!(released = report.released.len(), "session closed");
        } else {
            warn!(
                released = report.released.len(),
                failed = report.failures.len(),
                "session closed with release failures"
            );
        }
        report
    }

    /// Open, run `body` with the capabilities, then always close.
    ///
    /// The body's result is returned unchanged once release has finished.
    pub async fn scope<T, F>(mut self, body: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c [Capability]) -> BoxFuture<'c, Result<T>>,
    {
        self.open().await?;
        let outcome = body(self.loaded.capabilities()).await;
        self.close().await;
        outcome
    }

    /// Like [`ScopedSession::scope`], but stops the body when `cancel` fires.
    ///
    /// On cancellation the session is closed before `RelayError::Cancelled`
    /// is returned.
    pub async fn scope_with_cancel<T, F>(mut self, cancel: CancellationToken, body: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c [Capability]) -> BoxFuture<'c, Result<T>>,
    {
        if cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }

        let opened = tokio::select! {
            _ = cancel.cancelled() => None,
            opened = async { self.open().await.map(|_| ()) } => Some(opened),
        };
        match opened {
            Some(result) => result?,
            None => {
                self.close().await;
                return Err(RelayError::Cancelled);
            }
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = body(self.loaded.capabilities()) => Some(result),
        };
        self.close().await;
        outcome.unwrap_or(Err(RelayError::Cancelled))
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if self.state != SessionState::Open {
            return;
        }
        self.state = SessionState::Closed;
        let handles = self.loaded.take_for_release();
        if handles.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(handles = handles.len(), "session dropped while open, releasing in background");
                runtime.spawn(async move {
                    let report = handles.release_all().await;
                    if !report.is_clean() {
                        warn!(failed = report.failures.len(), "background release had failures");
                    }
                });
            }
            Err(_) => {
                warn!(
                    endpoints = ?handles.endpoints(),
                    "session dropped outside a Tokio runtime, handles dropped without release"
                );
            }
        }
    }
}

async fn release_detached(handles: HandleRegistry) -> ReleaseReport {
    if handles.is_empty() {
        return ReleaseReport::default();
    }
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        return handles.release_all().await;
    };

    let endpoints = handles.endpoints();
    match runtime.spawn(handles.release_all()).await {
        Ok(report) => report,
        Err(err) => {
            error!(error = %err, "release task failed");
            ReleaseReport {
                released: Vec::new(),
                failures: endpoints
                    .into_iter()
                    .rev()
                    .map(|endpoint| RelayError::Release {
                        endpoint: endpoint.to_string(),
                        message: format!("release task failed: {err}"),
                    })
                    .collect(),
            }
        }
    }
}

impl std::fmt::Debug for ScopedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSession")
            .field("endpoints", &self.endpoints)
            .field("state", &self.state)
            .field("loaded", &self.loaded)
            .finish()
    }
}
