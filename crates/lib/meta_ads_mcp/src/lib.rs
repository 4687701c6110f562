//! # meta_ads_mcp
//!
//! MCP (Model Context Protocol) layer for Meta Ads.
//!
//! Parses JSON-RPC envelopes, answers the handshake and tool listing, and
//! routes `tools/call` through the tool registry after making sure the
//! caller holds a fresh Meta credential. The crate is transport-agnostic;
//! `meta_ads_api` mounts the dispatcher at `POST /mcp`.

pub mod dispatcher;
pub mod protocol;
pub mod tools;

pub use dispatcher::{CallerHints, DispatchError, Dispatcher, UpstreamMode};
pub use tools::{ToolDefaults, ToolRegistry};

/// Name reported in the `initialize` handshake.
pub const SERVER_NAME: &str = "meta-ads-mcp";

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
