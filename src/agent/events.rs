//! Conversation content and the events a reasoning run emits.
//!
//! `Content` and `Part` serialize to the Gemini `contents` wire shape, so the
//! same values flow through the conversation history and the HTTP body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a piece of content.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentRole {
    User,
    #[default]
    Model,
    Function,
}

/// A message in a conversation: a role and ordered parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default)]
    pub role: ContentRole,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ContentRole::User,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect()
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|part| part.function_call.as_ref())
    }

    pub fn function_responses(&self) -> impl Iterator<Item = &FunctionResponse> {
        self.parts
            .iter()
            .filter_map(|part| part.function_response.as_ref())
    }
}

/// One part of a [`Content`]. Normally exactly one field is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Self::default()
        }
    }

    pub fn function_response(response: FunctionResponse) -> Self {
        Self {
            function_response: Some(response),
            ..Self::default()
        }
    }
}

/// A capability invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// The outcome of a capability invocation, as reported back to the model.
///
/// `response` is `{"result": <payload>}` on success or `{"error": <message>}`
/// when the capability failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Value,
}

impl FunctionResponse {
    pub fn result(name: impl Into<String>, id: Option<String>, payload: serde_json::Value) -> Self {
        Self {
            id,
            name: name.into(),
            response: serde_json::json!({ "result": payload }),
        }
    }

    pub fn error(name: impl Into<String>, id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            response: serde_json::json!({ "error": message.into() }),
        }
    }
}

/// One step of a reasoning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentEvent {
    pub id: String,
    /// Agent name, or `"user"` for echoed input.
    pub author: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
}

impl AgentEvent {
    pub fn new(author: impl Into<String>, content: Option<Content>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author: author.into(),
            timestamp: Utc::now(),
            content,
        }
    }

    /// Function responses carried by this event, in part order.
    pub fn function_responses(&self) -> impl Iterator<Item = &FunctionResponse> {
        self.content
            .iter()
            .flat_map(|content| content.function_responses())
    }
}
