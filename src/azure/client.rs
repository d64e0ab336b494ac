//! REST client for the Azure Resource Manager management API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::collector::record::{
    ComplianceRecord, RecommendationRecord, ResourceGroupRecord, SubscriptionRecord,
};
use crate::collector::traits::AuditApi;

use super::FetchError;
use super::auth::{Credentials, TokenProvider};
use super::types::{Compliance, Page, Recommendation, ResourceGroup, Subscription};

const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
const SUBSCRIPTION_API_VERSION: &str = "2020-01-01";
const RESOURCE_GROUP_API_VERSION: &str = "2021-04-01";
const COMPLIANCE_API_VERSION: &str = "2017-08-01-preview";
const RECOMMENDATION_API_VERSION: &str = "2020-01-01";

/// Upper bound on any single management API call, so one unresponsive
/// remote call cannot indefinitely delay snapshot installation.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated client for the management API.
///
/// Cheap to share: fetch tasks clone an `Arc` of it and issue independent
/// requests over the pooled `reqwest` client.
pub struct ArmClient {
    http: Client,
    tokens: TokenProvider,
    endpoint: String,
}

impl ArmClient {
    /// Builds a client from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and
    /// `AZURE_CLIENT_SECRET`. Fails fast on missing credentials; the first
    /// token is acquired lazily on the first request.
    pub fn from_env() -> Result<Self, FetchError> {
        Self::new(Credentials::from_env()?)
    }

    /// Builds a client from explicit credentials.
    pub fn new(credentials: Credentials) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self {
            tokens: TokenProvider::new(credentials, http.clone()),
            http,
            endpoint: MANAGEMENT_ENDPOINT.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let token = self.tokens.bearer_token().await?;
        let resp = self.http.get(url).bearer_auth(token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Fetches a paged list, following `nextLink` until exhausted.
    async fn get_paged<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>, FetchError> {
        let mut items = Vec::new();
        let mut url = Some(first_url);
        while let Some(current) = url {
            let page: Page<T> = self.get_json(&current).await?;
            items.extend(page.value);
            url = page.next_link;
        }
        Ok(items)
    }
}

#[async_trait]
impl AuditApi for ArmClient {
    async fn list_subscription_ids(&self) -> Result<Vec<String>, FetchError> {
        let url = format!(
            "{}/subscriptions?api-version={}",
            self.endpoint, SUBSCRIPTION_API_VERSION
        );
        let subscriptions: Vec<Subscription> = self.get_paged(url).await?;
        Ok(subscriptions
            .into_iter()
            .map(|s| s.subscription_id)
            .collect())
    }

    async fn subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionRecord, FetchError> {
        let url = format!(
            "{}/subscriptions/{}?api-version={}",
            self.endpoint, subscription_id, SUBSCRIPTION_API_VERSION
        );
        let subscription: Subscription = self.get_json(&url).await?;
        Ok(subscription.into_record())
    }

    async fn resource_groups(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<ResourceGroupRecord>, FetchError> {
        let url = format!(
            "{}/subscriptions/{}/resourcegroups?api-version={}",
            self.endpoint, subscription_id, RESOURCE_GROUP_API_VERSION
        );
        let groups: Vec<ResourceGroup> = self.get_paged(url).await?;
        Ok(groups
            .into_iter()
            .map(|g| g.into_record(subscription_id))
            .collect())
    }

    async fn security_compliance(
        &self,
        subscription_id: &str,
        location: &str,
    ) -> Result<Vec<ComplianceRecord>, FetchError> {
        // The compliance resource is named after the UTC day. The location
        // only dimensions the fan-out; it never reaches the URL.
        let compliance_name = Utc::now().format("%Y-%m-%dZ");
        let url = format!(
            "{}/subscriptions/{}/providers/Microsoft.Security/compliances/{}?api-version={}",
            self.endpoint, subscription_id, compliance_name, COMPLIANCE_API_VERSION
        );
        debug!(subscription = %subscription_id, location = %location, "fetching compliance");
        let compliance: Compliance = self.get_json(&url).await?;
        Ok(compliance.into_records(subscription_id))
    }

    async fn advisor_recommendations(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<RecommendationRecord>, FetchError> {
        let url = format!(
            "{}/subscriptions/{}/providers/Microsoft.Advisor/recommendations?api-version={}",
            self.endpoint, subscription_id, RECOMMENDATION_API_VERSION
        );
        let recommendations: Vec<Recommendation> = self.get_paged(url).await?;
        Ok(recommendations
            .into_iter()
            .map(|r| r.into_record(subscription_id))
            .collect())
    }
}
