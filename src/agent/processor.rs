//! Turns a user query into a stream of capability-result fragments.

use std::sync::Arc;

use bon::Builder;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, error, info};

use crate::config::{DEFAULT_AGENT_NAME, DEFAULT_INSTRUCTION, DEFAULT_MODEL};
use crate::error::{RelayError, Result};
use crate::tools::Capability;

use super::collaborator::{AgentSpec, ConversationSession, ReasoningCollaborator};
use super::events::{Content, FunctionResponse};

/// Drives one reasoning run per query and yields the text of every
/// capability result the run produces.
#[derive(Builder)]
pub struct QueryProcessor {
    collaborator: Arc<dyn ReasoningCollaborator>,
    #[builder(into)]
    app_name: String,
    #[builder(into)]
    user_id: String,
    #[builder(into, default = DEFAULT_MODEL.to_owned())]
    model: String,
    #[builder(into, default = DEFAULT_AGENT_NAME.to_owned())]
    agent_name: String,
    #[builder(into, default = DEFAULT_INSTRUCTION.to_owned())]
    instruction: String,
}

impl QueryProcessor {
    fn agent_spec(&self, capabilities: &[Capability]) -> AgentSpec {
        AgentSpec {
            model: self.model.clone(),
            name: self.agent_name.clone(),
            instruction: self.instruction.clone(),
            capabilities: capabilities.to_vec(),
        }
    }

    /// Run `query` against `capabilities`.
    ///
    /// The stream is lazy: nothing happens until it is polled. It ends after
    /// the run finishes or after the first `Err`, which is always a
    /// `RelayError::Query`.
    pub fn process<'a>(
        &'a self,
        query: impl Into<String>,
        capabilities: &'a [Capability],
    ) -> BoxStream<'a, Result<String>> {
        let query = query.into();

        let stream = async_stream::stream! {
            info!(query = %query, "processing query");
            let session = ConversationSession::new(&self.app_name, &self.user_id);
            let agent = self.agent_spec(capabilities);
            debug!(
                session_id = %session.id,
                agent = %agent.name,
                tools = agent.capabilities.len(),
                "agent prepared"
            );

            let mut events = match self
                .collaborator
                .run(agent, session, Content::user(query))
                .await
            {
                Ok(events) => events,
                Err(err) => {
                    error!(error = %err, "failed to start query");
                    yield Err(into_query_error(err));
                    return;
                }
            };

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        error!(error = %err, "error processing query");
                        yield Err(into_query_error(err));
                        return;
                    }
                };

                for response in event.function_responses() {
                    match extract_fragment(response) {
                        Ok(fragment) => yield Ok(fragment),
                        Err(err) => {
                            error!(error = %err, tool = %response.name, "unusable function response");
                            yield Err(err);
                            return;
                        }
                    }
                }
            }
        };

        Box::pin(stream)
    }
}

impl std::fmt::Debug for QueryProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryProcessor")
            .field("app_name", &self.app_name)
            .field("user_id", &self.user_id)
            .field("model", &self.model)
            .field("agent_name", &self.agent_name)
            .finish()
    }
}

/// Text of a function response: `response.result.content[0].text`.
pub fn extract_fragment(response: &FunctionResponse) -> Result<String> {
    if let Some(failure) = response.response.get("error") {
        let message = failure
            .as_str()
            .map(str::to_owned)
            .unwrap_or_else(|| failure.to_string());
        return Err(RelayError::Query(format!(
            "capability '{}' failed: {message}",
            response.name
        )));
    }

    response
        .response
        .pointer("/result/content/0/text")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            RelayError::Query(format!(
                "function response from '{}' has no result text",
                response.name
            ))
        })
}

fn into_query_error(err: RelayError) -> RelayError {
    match err {
        query @ RelayError::Query(_) => query,
        other => RelayError::Query(other.to_string()),
    }
}
