//! toolrelay: aggregate tools from several MCP servers and stream what an
//! agent does with them.
//!
//! A [`session::ScopedSession`] connects to every configured endpoint,
//! merges the tools they expose in endpoint order, and releases each
//! connection in reverse order when it closes. A
//! [`agent::QueryProcessor`] hands those tools to a reasoning
//! collaborator and yields the text of every tool result.
//!
//! # Quick Start
//!
//! ```no_run
//! use toolrelay::prelude::*;
//!
//! # async fn example() -> toolrelay::error::Result<()> {
//! let client = RelayClient::gemini(RelayConfig::from_env()?)?;
//! let delivered = client
//!     .run("Get a code and get its code phrase", |fragment| {
//!         print!("{fragment}");
//!         Ok(())
//!     })
//!     .await?;
//! println!("\n{delivered} fragments");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod mcp;
pub mod prelude;
pub mod session;
pub mod tools;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
