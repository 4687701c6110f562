//! Request handlers.

pub mod health;
pub mod mcp;
pub mod oauth;
pub mod status;
