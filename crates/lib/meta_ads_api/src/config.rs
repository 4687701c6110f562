//! API server configuration.

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:3000").
    pub bind_addr: String,
}

impl ApiConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            bind_addr: format!("{host}:{port}"),
        }
    }
}
