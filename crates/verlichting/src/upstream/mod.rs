//! Access to the home-automation controller's REST API.

mod client;
mod http;

pub use client::select_target;
#[cfg(test)]
pub use client::MockUpstream;
pub use client::Upstream;
pub use http::HttpUpstream;

/// Failure talking to the controller. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream returned status {status} for {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("failed to reach upstream at {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode upstream response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
