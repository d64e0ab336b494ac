//! Abstraction over the management API to enable testing and mocking.
//!
//! The `AuditApi` trait lets the collection cycle fetch audit facts from the
//! real Azure Resource Manager REST API or from a mock implementation in
//! tests, without knowing anything about HTTP or authentication.

use async_trait::async_trait;

use crate::azure::FetchError;

use super::record::{
    ComplianceRecord, RecommendationRecord, ResourceGroupRecord, SubscriptionRecord,
};

/// One fetch operation per audit category, plus subscription discovery.
///
/// Every operation returns a finite sequence of flat-string records
/// (possibly empty) or an error. Implementations must be shareable across
/// concurrently running fetch tasks.
#[async_trait]
pub trait AuditApi: Send + Sync {
    /// Lists the IDs of all subscriptions visible to the credentials.
    /// Used for startup discovery when no subscriptions are configured.
    async fn list_subscription_ids(&self) -> Result<Vec<String>, FetchError>;

    /// Fetches metadata for a single subscription.
    async fn subscription(&self, subscription_id: &str)
    -> Result<SubscriptionRecord, FetchError>;

    /// Fetches all resource groups of a subscription.
    async fn resource_groups(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<ResourceGroupRecord>, FetchError>;

    /// Fetches today's Security Center compliance segments for a
    /// subscription. `location` is a fan-out dimension; segments from
    /// several locations may target the same label tuple and accumulate.
    async fn security_compliance(
        &self,
        subscription_id: &str,
        location: &str,
    ) -> Result<Vec<ComplianceRecord>, FetchError>;

    /// Fetches all Advisor recommendations of a subscription.
    async fn advisor_recommendations(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<RecommendationRecord>, FetchError>;
}
