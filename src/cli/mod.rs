//! Command-line interface for toolrelay.

use std::time::Duration;

use clap::Parser;

use crate::config::{AiProvider, RelayConfig, DEFAULT_ENDPOINTS};
use crate::error::Result;
use crate::mcp::aggregate::FanOut;
use crate::mcp::endpoint::EndpointAddress;

pub const DEFAULT_QUERY: &str = "Get a code and get its code phrase";

/// Ask an agent a question using tools from several MCP servers.
#[derive(Parser, Debug)]
#[command(name = "toolrelay", version, about = "Relay a query through tools from several MCP servers")]
pub struct Cli {
    /// AI provider (gemini, openai)
    #[arg(long, env = "TOOLRELAY_PROVIDER", default_value = "gemini")]
    pub provider: String,

    /// MCP server URL; repeat or comma-separate for several servers
    #[arg(
        long = "endpoint",
        value_name = "URL",
        env = "TOOLRELAY_ENDPOINTS",
        value_delimiter = ',',
        default_values_t = DEFAULT_ENDPOINTS.map(String::from)
    )]
    pub endpoints: Vec<String>,

    #[arg(long, env = "TOOLRELAY_USER_ID")]
    pub user_id: Option<String>,

    #[arg(long, env = "TOOLRELAY_APP_NAME")]
    pub app_name: Option<String>,

    /// Model identifier passed to the provider
    #[arg(short, long, env = "TOOLRELAY_MODEL")]
    pub model: Option<String>,

    /// Connect to all endpoints at once
    #[arg(long)]
    pub concurrent: bool,

    /// Per-endpoint connect timeout
    #[arg(long, value_name = "SECS")]
    pub connect_timeout_secs: Option<u64>,

    /// User query (positional)
    #[arg(default_value = DEFAULT_QUERY)]
    pub query: String,
}

impl Cli {
    /// Apply command-line overrides on top of `base`.
    pub fn into_config(self, mut base: RelayConfig) -> Result<RelayConfig> {
        base.provider = AiProvider::from_name(&self.provider)?;
        base.endpoints = self.endpoints.into_iter().map(EndpointAddress::new).collect();
        if let Some(user_id) = self.user_id {
            base.user_id = user_id;
        }
        if let Some(app_name) = self.app_name {
            base.app_name = app_name;
        }
        if let Some(model) = self.model {
            base.model = model;
        }
        if self.concurrent {
            base.fan_out = FanOut::Concurrent;
        }
        if let Some(secs) = self.connect_timeout_secs {
            base.connect_timeout = Duration::from_secs(secs);
        }
        Ok(base)
    }
}
