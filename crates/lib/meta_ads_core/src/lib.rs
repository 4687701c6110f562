//! # meta_ads_core
//!
//! Core domain logic for Meta Ads MCP.
//!
//! Owns the per-user credential lifecycle (OAuth code exchange, proactive
//! refresh) and the typed client for the Meta Graph API, either called
//! directly or through a Pipedream Connect proxy.

pub mod auth;
pub mod config;
pub mod connect;
pub mod graph;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
