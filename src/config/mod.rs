//! Relay configuration (code > env > defaults).

use std::fmt;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{RelayError, Result};
use crate::mcp::aggregate::FanOut;
use crate::mcp::endpoint::EndpointAddress;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_AGENT_NAME: &str = "MCP_agent";
pub const DEFAULT_INSTRUCTION: &str = "Help user interact with available tools.";
pub const DEFAULT_USER_ID: &str = "user-123";
pub const DEFAULT_APP_NAME: &str = "my-app";
pub const DEFAULT_ENDPOINTS: [&str; 2] = ["http://localhost:8000/sse", "http://localhost:8001/sse"];
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Reasoning backend selected by the user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AiProvider {
    #[default]
    Gemini,
    OpenAi,
}

impl AiProvider {
    /// Parse a provider name, case-insensitively.
    pub fn from_name(name: &str) -> Result<Self> {
        name.trim().parse().map_err(|_| {
            RelayError::Configuration(format!(
                "invalid AI provider '{name}', use one of: 'gemini', 'openai'"
            ))
        })
    }
}

fn default_endpoints() -> Vec<EndpointAddress> {
    DEFAULT_ENDPOINTS.iter().copied().map(EndpointAddress::new).collect()
}

/// Everything needed to build a [`crate::client::RelayClient`].
#[derive(Clone, Builder)]
pub struct RelayConfig {
    #[builder(default)]
    pub provider: AiProvider,
    #[builder(default = default_endpoints())]
    pub endpoints: Vec<EndpointAddress>,
    #[builder(into, default = DEFAULT_USER_ID.to_owned())]
    pub user_id: String,
    #[builder(into, default = DEFAULT_APP_NAME.to_owned())]
    pub app_name: String,
    #[builder(into, default = DEFAULT_MODEL.to_owned())]
    pub model: String,
    #[builder(into, default = DEFAULT_AGENT_NAME.to_owned())]
    pub agent_name: String,
    #[builder(into, default = DEFAULT_INSTRUCTION.to_owned())]
    pub instruction: String,
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    pub connect_timeout: Duration,
    #[builder(default)]
    pub fan_out: FanOut,
    #[builder(default = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,
    #[builder(into)]
    pub api_key: Option<String>,
    /// Overrides the Gemini API base URL.
    #[builder(into)]
    pub base_url: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("provider", &self.provider)
            .field("endpoints", &self.endpoints)
            .field("user_id", &self.user_id)
            .field("app_name", &self.app_name)
            .field("model", &self.model)
            .field("agent_name", &self.agent_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("fan_out", &self.fan_out)
            .field("max_turns", &self.max_turns)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl RelayConfig {
    /// Load from `.env` and the process environment.
    ///
    /// Recognised variables: `TOOLRELAY_PROVIDER`, `TOOLRELAY_ENDPOINTS`
    /// (comma separated), `TOOLRELAY_USER_ID`, `TOOLRELAY_APP_NAME`,
    /// `TOOLRELAY_MODEL`, `TOOLRELAY_FAN_OUT`, `TOOLRELAY_CONNECT_TIMEOUT_SECS`,
    /// `GEMINI_API_KEY` / `GOOGLE_API_KEY` and `GEMINI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(provider) = lookup("TOOLRELAY_PROVIDER") {
            config.provider = AiProvider::from_name(&provider)?;
        }
        if let Some(endpoints) = lookup("TOOLRELAY_ENDPOINTS") {
            config.endpoints = EndpointAddress::parse_list(&endpoints);
        }
        if let Some(user_id) = lookup("TOOLRELAY_USER_ID") {
            config.user_id = user_id;
        }
        if let Some(app_name) = lookup("TOOLRELAY_APP_NAME") {
            config.app_name = app_name;
        }
        if let Some(model) = lookup("TOOLRELAY_MODEL") {
            config.model = model;
        }
        if let Some(fan_out) = lookup("TOOLRELAY_FAN_OUT") {
            config.fan_out = fan_out.trim().parse().map_err(|_| {
                RelayError::Configuration(format!(
                    "invalid fan-out '{fan_out}', use 'sequential' or 'concurrent'"
                ))
            })?;
        }
        if let Some(secs) = lookup("TOOLRELAY_CONNECT_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                RelayError::Configuration(format!("invalid connect timeout '{secs}'"))
            })?;
            config.connect_timeout = Duration::from_secs(secs);
        }

        config.api_key = lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY"));
        config.base_url = lookup("GEMINI_BASE_URL");

        Ok(config)
    }

    /// The API key, or a configuration error naming the variables to set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty()).ok_or_else(|| {
            RelayError::Configuration(
                "missing API key, set GEMINI_API_KEY or GOOGLE_API_KEY".to_string(),
            )
        })
    }
}
