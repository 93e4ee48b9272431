//! High-level client tying configuration, aggregation and query processing together.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::info;

use crate::agent::{QueryProcessor, ReasoningCollaborator};
use crate::config::{AiProvider, RelayConfig};
use crate::error::{RelayError, Result};
use crate::mcp::aggregate::CapabilityAggregator;
use crate::mcp::connection::{EndpointConnector, MCPConnector};
use crate::session::ScopedSession;
use crate::tools::Capability;

/// Connects to the configured endpoints and answers queries with their tools.
///
/// ```no_run
/// use toolrelay::client::RelayClient;
/// use toolrelay::config::RelayConfig;
///
/// # async fn example() -> toolrelay::error::Result<()> {
/// let client = RelayClient::gemini(RelayConfig::from_env()?)?;
/// client
///     .run("Get a code and get its code phrase", |fragment| {
///         print!("{fragment}");
///         Ok(())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct RelayClient {
    config: RelayConfig,
    connector: Arc<dyn EndpointConnector>,
    processor: QueryProcessor,
}

impl RelayClient {
    /// Build a client around an explicit collaborator.
    ///
    /// Only the Gemini provider is implemented; `openai` is recognised and
    /// rejected.
    pub fn new(config: RelayConfig, collaborator: Arc<dyn ReasoningCollaborator>) -> Result<Self> {
        ensure_supported(config.provider)?;

        let processor = QueryProcessor::builder()
            .collaborator(collaborator)
            .app_name(config.app_name.clone())
            .user_id(config.user_id.clone())
            .model(config.model.clone())
            .agent_name(config.agent_name.clone())
            .instruction(config.instruction.clone())
            .build();

        Ok(Self {
            config,
            connector: Arc::new(MCPConnector::new()),
            processor,
        })
    }

    /// Build a client backed by the Gemini API.
    #[cfg(feature = "google")]
    pub fn gemini(config: RelayConfig) -> Result<Self> {
        ensure_supported(config.provider)?;
        let collaborator = crate::agent::GeminiCollaborator::from_config(&config)?;
        Self::new(config, Arc::new(collaborator))
    }

    /// Replace how endpoints are dialed.
    pub fn with_connector(mut self, connector: Arc<dyn EndpointConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// A fresh, unopened session over the configured endpoints.
    pub fn session(&self) -> ScopedSession {
        let aggregator = CapabilityAggregator::new(Arc::clone(&self.connector))
            .with_fan_out(self.config.fan_out)
            .with_connect_timeout(Some(self.config.connect_timeout));
        ScopedSession::new(aggregator, self.config.endpoints.clone())
    }

    /// Stream the fragments `query` produces using `capabilities`.
    pub fn process_query<'a>(
        &'a self,
        query: impl Into<String>,
        capabilities: &'a [Capability],
    ) -> BoxStream<'a, Result<String>> {
        self.processor.process(query, capabilities)
    }

    /// Open a session, feed every fragment to `on_fragment`, then close.
    ///
    /// Returns the number of fragments delivered. An error from
    /// `on_fragment` stops the query and is returned. The session is closed
    /// whether or not the query succeeded.
    pub async fn run(
        &self,
        query: &str,
        mut on_fragment: impl FnMut(&str) -> Result<()>,
    ) -> Result<usize> {
        let mut session = self.session();
        session.open().await?;

        let mut delivered = 0;
        let mut outcome = Ok(());
        {
            let mut fragments = self.process_query(query, session.capabilities());
            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(fragment) => {
                        if let Err(err) = on_fragment(&fragment) {
                            outcome = Err(err);
                            break;
                        }
                        delivered += 1;
                    }
                    Err(err) => {
                        outcome = Err(err);
                        break;
                    }
                }
            }
        }

        let report = session.close().await;
        info!(
            fragments = delivered,
            released = report.released.len(),
            release_failures = report.failures.len(),
            "query finished"
        );
        outcome.map(|()| delivered)
    }
}

fn ensure_supported(provider: AiProvider) -> Result<()> {
    match provider {
        AiProvider::Gemini => Ok(()),
        AiProvider::OpenAi => Err(RelayError::Configuration(format!(
            "AI provider '{provider}' is not yet supported"
        ))),
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("config", &self.config)
            .field("processor", &self.processor)
            .finish()
    }
}
