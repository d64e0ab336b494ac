//! OAuth2 client-credentials bootstrap from environment variables.
//!
//! Mirrors the usual Azure service-principal environment contract:
//! `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`. Tokens
//! for the management resource are cached and refreshed shortly before they
//! expire.

use std::env;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::FetchError;

const LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";
const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// Refresh the cached token this long before it actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Token lifetime assumed when the endpoint omits `expires_in`.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Service-principal credentials read from the environment.
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Reads credentials from the environment. A missing variable is a
    /// fatal configuration error surfaced before the first scrape.
    pub fn from_env() -> Result<Self, FetchError> {
        Ok(Self {
            tenant_id: require("AZURE_TENANT_ID")?,
            client_id: require("AZURE_CLIENT_ID")?,
            client_secret: require("AZURE_CLIENT_SECRET")?,
        })
    }
}

fn require(var: &str) -> Result<String, FetchError> {
    match env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(FetchError::Credentials(format!("{} not set", var))),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    // The v1 token endpoint returns this as a decimal string.
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error_description: String,
}

struct CachedToken {
    token: String,
    valid_until: Instant,
}

/// Acquires and caches bearer tokens for the management API.
pub(super) struct TokenProvider {
    credentials: Credentials,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub(super) fn new(credentials: Credentials, http: reqwest::Client) -> Self {
        Self {
            credentials,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, fetching a fresh one when the cached
    /// token is absent or close to expiry. Concurrent fetch tasks share the
    /// cache, so one refresh serves a whole cycle.
    pub(super) async fn bearer_token(&self) -> Result<String, FetchError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref()
            && Instant::now() < entry.valid_until
        {
            return Ok(entry.token.clone());
        }

        let url = format!(
            "{}/{}/oauth2/token",
            LOGIN_ENDPOINT, self.credentials.tenant_id
        );
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("resource", MANAGEMENT_RESOURCE),
        ];

        let resp = self.http.post(&url).form(&params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| e.error_description)
                .unwrap_or(body);
            return Err(FetchError::Token(format!(
                "token endpoint returned {}: {}",
                status,
                detail.lines().next().unwrap_or("")
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Token(e.to_string()))?;

        let ttl = body
            .expires_in
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        debug!(ttl_secs = ttl.as_secs(), "acquired management API token");

        let token = body.access_token;
        *cached = Some(CachedToken {
            token: token.clone(),
            valid_until: Instant::now() + ttl.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(token)
    }
}
