use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::handle::ResourceHandle;
use crate::error::RelayError;
use crate::mcp::endpoint::EndpointAddress;

/// Shared record of release attempts across fake handles.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReleaseLog {
    entries: Arc<Mutex<Vec<(String, bool)>>>,
}

impl ReleaseLog {
    fn record(&self, endpoint: &str, ok: bool) {
        self.entries
            .lock()
            .expect("release log lock should not be poisoned")
            .push((endpoint.to_owned(), ok));
    }

    /// Every release attempt, in call order.
    pub(crate) fn attempted(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("release log lock should not be poisoned")
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }

    /// Successful releases, in call order.
    pub(crate) fn released(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("release log lock should not be poisoned")
            .iter()
            .filter(|(_, ok)| *ok)
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }
}

/// Handle that records every release attempt and can be told to fail.
///
/// It does not guard against double release, so tests can observe one.
pub(crate) struct RecordingHandle {
    endpoint: EndpointAddress,
    log: ReleaseLog,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingHandle {
    pub(crate) fn new(endpoint: &str, log: ReleaseLog) -> Self {
        Self {
            endpoint: EndpointAddress::new(endpoint),
            log,
            fail: false,
            delay: None,
        }
    }

    pub(crate) fn failing(endpoint: &str, log: ReleaseLog) -> Self {
        Self {
            fail: true,
            ..Self::new(endpoint, log)
        }
    }

    /// Make every release take `delay` before it is recorded.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ResourceHandle for RecordingHandle {
    fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    async fn release(&self) -> Result<(), RelayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log.record(self.endpoint.as_str(), !self.fail);
        if self.fail {
            return Err(RelayError::Stream("injected release failure".into()));
        }
        Ok(())
    }
}
