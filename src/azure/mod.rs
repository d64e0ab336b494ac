//! Azure Resource Manager access: credentials, REST client, wire types.
//!
//! `ArmClient` implements the `AuditApi` trait over the ARM REST endpoints,
//! authenticating with OAuth2 client credentials read from the environment.

mod auth;
mod client;
mod types;

pub use auth::Credentials;
pub use client::ArmClient;

/// Error type for management API access.
#[derive(Debug)]
pub enum FetchError {
    /// Required credential environment variable missing or unusable.
    Credentials(String),
    /// Token endpoint refused or returned an unusable response.
    Token(String),
    /// Transport-level request failure (connect, timeout, TLS).
    Request(String),
    /// Non-success HTTP status from the management API.
    Status { status: u16, url: String },
    /// Response body did not match the expected shape.
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Credentials(msg) => write!(f, "Azure credentials: {}", msg),
            FetchError::Token(msg) => write!(f, "Azure token: {}", msg),
            FetchError::Request(msg) => write!(f, "request failed: {}", msg),
            FetchError::Status { status, url } => {
                write!(f, "management API returned {} for {}", status, url)
            }
            FetchError::Decode(msg) => write!(f, "decode error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}
