//! Convenience re-exports for common use.

pub use crate::agent::{AgentEvent, Content, QueryProcessor, ReasoningCollaborator};
pub use crate::client::RelayClient;
pub use crate::config::{AiProvider, RelayConfig};
pub use crate::error::{RelayError, Result};
pub use crate::mcp::{CapabilityAggregator, EndpointAddress, FanOut};
pub use crate::session::{ReleaseReport, ScopedSession, SessionState};
pub use crate::tools::{AgentToolParameters, Capability, Tool, ToolArguments, ToolExecutionContext};
