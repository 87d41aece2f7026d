//! HTTP client factory
//!
//! All outbound HTTP (providers, upstream managers, translation sidecar)
//! goes through clients built here so the User-Agent and timeout policy
//! stay uniform.

use std::time::Duration;

use anyhow::{Context, Result};

/// Build a reqwest client with a total-request timeout and our User-Agent
pub fn create_http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")
}

/// Client without a total timeout, for calls whose deadline is enforced by
/// the caller (`tokio::time::timeout` around the whole operation)
pub fn create_untimed_http_client(user_agent: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")
}
