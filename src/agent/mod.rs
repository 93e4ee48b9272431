//! Query processing over aggregated capabilities.

pub mod collaborator;
pub mod events;
pub mod processor;

#[cfg(feature = "google")]
pub mod gemini;
#[cfg(feature = "google")]
pub mod http;

pub use collaborator::{AgentSpec, ConversationSession, ReasoningCollaborator};
pub use events::{AgentEvent, Content, ContentRole, FunctionCall, FunctionResponse, Part};
pub use processor::{extract_fragment, QueryProcessor};

#[cfg(feature = "google")]
pub use gemini::GeminiCollaborator;
