//! Legacy MCP HTTP+SSE client transport.
//!
//! The client opens a long-lived `GET` event stream. The server announces
//! where to `POST` requests in an `endpoint` event, then delivers every
//! JSON-RPC reply as a `message` event on the same stream.

use futures::StreamExt;
use reqwest::Url;
use reqwest_eventsource::{retry, Event, EventSource};
use rmcp::service::{RoleClient, RxJsonRpcMessage, TxJsonRpcMessage};
use rmcp::transport::Transport;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const ENDPOINT_EVENT: &str = "endpoint";
const MESSAGE_EVENT: &str = "message";

#[derive(Debug, thiserror::Error)]
pub enum SseTransportError {
    #[error("invalid SSE url: {0}")]
    InvalidUrl(String),

    #[error("SSE stream error: {0}")]
    Stream(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint rejected message with status {0}")]
    Status(u16),
}

/// Client side of one legacy SSE session.
pub struct SseClientTransport {
    http: reqwest::Client,
    post_url: Url,
    inbound: UnboundedReceiver<RxJsonRpcMessage<RoleClient>>,
    stop: CancellationToken,
}

impl SseClientTransport {
    /// Open the event stream at `sse_url` and wait for the `endpoint` event.
    pub async fn connect(http: reqwest::Client, sse_url: &str) -> Result<Self, SseTransportError> {
        let base = Url::parse(sse_url).map_err(|e| SseTransportError::InvalidUrl(e.to_string()))?;
        let mut events = EventSource::new(http.get(base.clone()))
            .map_err(|e| SseTransportError::Stream(e.to_string()))?;
        events.set_retry_policy(Box::new(retry::Never));

        let post_url = loop {
            match events.next().await {
                Some(Ok(Event::Open)) => {}
                Some(Ok(Event::Message(message))) if message.event == ENDPOINT_EVENT => {
                    match base.join(message.data.trim()) {
                        Ok(url) => break url,
                        Err(e) => {
                            events.close();
                            return Err(SseTransportError::InvalidUrl(e.to_string()));
                        }
                    }
                }
                Some(Ok(Event::Message(message))) => {
                    debug!(event = %message.event, "ignoring SSE event before endpoint");
                }
                Some(Err(err)) => {
                    events.close();
                    return Err(SseTransportError::Stream(err.to_string()));
                }
                None => {
                    return Err(SseTransportError::Stream(
                        "stream ended before endpoint event".into(),
                    ))
                }
            }
        };
        debug!(sse = %base, post = %post_url, "SSE endpoint announced");

        let (tx, inbound) = unbounded_channel();
        let stop = CancellationToken::new();
        tokio::spawn(forward_messages(events, tx, stop.clone()));

        Ok(Self {
            http,
            post_url,
            inbound,
            stop,
        })
    }

    /// URL the server announced for client messages.
    pub fn post_url(&self) -> &Url {
        &self.post_url
    }
}

async fn forward_messages(
    mut events: EventSource,
    tx: UnboundedSender<RxJsonRpcMessage<RoleClient>>,
    stop: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = stop.cancelled() => break,
            event = events.next() => event,
        };
        match event {
            Some(Ok(Event::Message(message))) if message.event == MESSAGE_EVENT => {
                match serde_json::from_str::<RxJsonRpcMessage<RoleClient>>(&message.data) {
                    Ok(parsed) => {
                        if tx.send(parsed).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(error = %err, "dropping unparseable SSE message"),
                }
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                debug!(error = %err, "SSE stream ended");
                break;
            }
            None => break,
        }
    }
    events.close();
}

impl Transport<RoleClient> for SseClientTransport {
    type Error = SseTransportError;

    fn send(
        &mut self,
        item: TxJsonRpcMessage<RoleClient>,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send + 'static {
        let request = self.http.post(self.post_url.clone()).json(&item);
        async move {
            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(SseTransportError::Status(status.as_u16()))
            }
        }
    }

    async fn receive(&mut self) -> Option<RxJsonRpcMessage<RoleClient>> {
        self.inbound.recv().await
    }

    fn close(&mut self) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send {
        self.stop.cancel();
        self.inbound.close();
        std::future::ready(Ok(()))
    }
}

impl Drop for SseClientTransport {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
