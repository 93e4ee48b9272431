//! Google Gemini as a reasoning collaborator.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{RelayConfig, DEFAULT_MAX_TURNS};
use crate::error::{RelayError, Result};
use crate::tools::{Capability, ToolArguments, ToolExecutionContext};

use super::collaborator::{AgentSpec, ConversationSession, ReasoningCollaborator};
use super::events::{AgentEvent, Content, ContentRole, FunctionCall, FunctionResponse, Part};
use super::http::{shared_client, status_to_error};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Schema keywords the Gemini function-declaration dialect rejects.
const UNSUPPORTED_SCHEMA_KEYS: [&str; 4] = ["$schema", "additionalProperties", "$defs", "$ref"];

/// Runs the model/tool loop against the `generateContent` REST API.
pub struct GeminiCollaborator {
    api_key: String,
    base_url: String,
    max_turns: usize,
    http: reqwest::Client,
}

impl GeminiCollaborator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            http: shared_client().clone(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let mut collaborator = Self::new(config.require_api_key()?).with_max_turns(config.max_turns);
        if let Some(base_url) = &config.base_url {
            collaborator = collaborator.with_base_url(base_url);
        }
        Ok(collaborator)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Upper bound on model calls per run.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }
}

impl std::fmt::Debug for GeminiCollaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiCollaborator")
            .field("base_url", &self.base_url)
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

#[async_trait]
impl ReasoningCollaborator for GeminiCollaborator {
    async fn run(
        &self,
        agent: AgentSpec,
        session: ConversationSession,
        message: Content,
    ) -> Result<BoxStream<'static, Result<AgentEvent>>> {
        let url = format!("{}/models/{}:generateContent", self.base_url, agent.model);
        let declarations = function_declarations(&agent.capabilities);
        let http = self.http.clone();
        let api_key = self.api_key.clone();
        let max_turns = self.max_turns;

        debug!(
            model = %agent.model,
            session_id = %session.id,
            tools = declarations.len(),
            "Gemini run"
        );

        let stream = async_stream::try_stream! {
            let ctx = ToolExecutionContext::for_session(session.id.clone());
            let mut contents = vec![message];
            let mut answered = false;

            for turn in 1..=max_turns {
                let body = request_body(&agent.instruction, &contents, &declarations);
                let reply = generate(&http, &url, &api_key, &body).await?;
                let calls: Vec<FunctionCall> = reply.function_calls().cloned().collect();
                debug!(turn, calls = calls.len(), "Gemini reply");

                contents.push(reply.clone());
                yield AgentEvent::new(&agent.name, Some(reply));

                if calls.is_empty() {
                    answered = true;
                    break;
                }

                let mut responses = Vec::with_capacity(calls.len());
                for call in calls {
                    let response = invoke(&agent, &call, &ctx).await;
                    let part = Part::function_response(response);
                    yield AgentEvent::new(
                        &agent.name,
                        Some(Content {
                            role: ContentRole::Function,
                            parts: vec![part.clone()],
                        }),
                    );
                    responses.push(part);
                }
                contents.push(Content {
                    role: ContentRole::Function,
                    parts: responses,
                });
            }

            if !answered {
                Err::<(), RelayError>(RelayError::Query(format!(
                    "agent did not finish within {max_turns} model turns"
                )))?;
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Run one requested call. Failures are reported back to the model.
async fn invoke(agent: &AgentSpec, call: &FunctionCall, ctx: &ToolExecutionContext) -> FunctionResponse {
    let Some(capability) = agent.capability(&call.name) else {
        warn!(tool = %call.name, "model called an unknown function");
        return FunctionResponse::error(
            call.name.clone(),
            call.id.clone(),
            format!("unknown function '{}'", call.name),
        );
    };

    match capability
        .execute(&ToolArguments::new(call.args.clone()), ctx)
        .await
    {
        Ok(payload) => FunctionResponse::result(call.name.clone(), call.id.clone(), payload),
        Err(err) => {
            warn!(tool = %call.name, error = %err, "capability call failed");
            FunctionResponse::error(call.name.clone(), call.id.clone(), err.to_string())
        }
    }
}

async fn generate(
    http: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<Content> {
    let resp = http
        .post(url)
        .header("x-goog-api-key", api_key)
        .json(body)
        .send()
        .await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let body_text = resp.text().await.unwrap_or_default();
        return Err(status_to_error(status, &body_text));
    }

    let data: GeminiResponse = resp.json().await?;
    let candidate = data
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| RelayError::api(200, "No candidates in Gemini response"))?;

    candidate.content.ok_or_else(|| {
        RelayError::api(
            200,
            format!(
                "Gemini candidate has no content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        )
    })
}

fn request_body(
    instruction: &str,
    contents: &[Content],
    declarations: &[serde_json::Value],
) -> serde_json::Value {
    let mut body = serde_json::json!({ "contents": contents });
    if let Some(obj) = body.as_object_mut() {
        if !instruction.is_empty() {
            obj.insert(
                "systemInstruction".into(),
                serde_json::json!({ "parts": [{ "text": instruction }] }),
            );
        }
        if !declarations.is_empty() {
            obj.insert(
                "tools".into(),
                serde_json::json!([{ "functionDeclarations": declarations }]),
            );
        }
    }
    body
}

fn function_declarations(capabilities: &[Capability]) -> Vec<serde_json::Value> {
    capabilities
        .iter()
        .map(|capability| {
            let mut declaration = serde_json::json!({
                "name": capability.name(),
                "description": capability.description(),
            });
            let parameters = capability.parameters();
            // Gemini rejects object schemas without properties.
            if parameters.has_properties() {
                declaration["parameters"] = sanitize_schema(&parameters.schema);
            }
            declaration
        })
        .collect()
}

fn sanitize_schema(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => map
            .iter()
            .filter(|(key, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), sanitize_schema(value)))
            .collect::<serde_json::Map<_, _>>()
            .into(),
        serde_json::Value::Array(items) => items.iter().map(sanitize_schema).collect(),
        other => other.clone(),
    }
}

// Internal Gemini response types

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}
