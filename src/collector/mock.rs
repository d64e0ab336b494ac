//! In-memory mock of the management API for testing the collection cycle.
//!
//! `MockApi` serves fixture records per subscription and can inject a
//! failure for any (subscription, category) pair, allowing tests to exercise
//! error containment without real credentials or HTTP.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::azure::FetchError;

use super::record::{
    ComplianceRecord, RecommendationRecord, ResourceGroupRecord, SubscriptionRecord,
};
use super::traits::AuditApi;

#[derive(Default)]
struct Fixtures {
    subscriptions: HashMap<String, SubscriptionRecord>,
    resource_groups: HashMap<String, Vec<ResourceGroupRecord>>,
    compliance: HashMap<(String, String), Vec<ComplianceRecord>>,
    recommendations: HashMap<String, Vec<RecommendationRecord>>,
    failures: HashSet<(String, String)>,
}

/// Mock implementation of `AuditApi` backed by in-memory fixtures.
///
/// All mutators take `&self` so tests can reshape the fixtures between
/// cycles while the collection path holds the same shared instance.
#[derive(Default)]
pub struct MockApi {
    inner: Mutex<Fixtures>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscription; it becomes visible to discovery and serves
    /// its own metadata record.
    pub fn add_subscription(&self, record: SubscriptionRecord) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .subscriptions
            .insert(record.subscription_id.clone(), record);
    }

    pub fn add_resource_group(&self, record: ResourceGroupRecord) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .resource_groups
            .entry(record.subscription_id.clone())
            .or_default()
            .push(record);
    }

    /// Replaces a subscription's resource-group list wholesale, simulating
    /// resources disappearing between cycles.
    pub fn set_resource_groups(&self, subscription_id: &str, records: Vec<ResourceGroupRecord>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .resource_groups
            .insert(subscription_id.to_string(), records);
    }

    pub fn add_compliance(&self, location: &str, record: ComplianceRecord) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .compliance
            .entry((record.subscription_id.clone(), location.to_string()))
            .or_default()
            .push(record);
    }

    pub fn add_recommendation(&self, record: RecommendationRecord) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .recommendations
            .entry(record.subscription_id.clone())
            .or_default()
            .push(record);
    }

    /// Makes every fetch of `category` ("subscription", "resourcegroup",
    /// "compliance", "recommendation") fail for one subscription.
    pub fn fail(&self, subscription_id: &str, category: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .failures
            .insert((subscription_id.to_string(), category.to_string()));
    }

    fn check_failure(
        inner: &Fixtures,
        subscription_id: &str,
        category: &str,
    ) -> Result<(), FetchError> {
        if inner
            .failures
            .contains(&(subscription_id.to_string(), category.to_string()))
        {
            Err(FetchError::Request(format!(
                "injected {} failure for {}",
                category, subscription_id
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AuditApi for MockApi {
    async fn list_subscription_ids(&self) -> Result<Vec<String>, FetchError> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<String> = inner.subscriptions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionRecord, FetchError> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner, subscription_id, "subscription")?;
        inner
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: format!("/subscriptions/{}", subscription_id),
            })
    }

    async fn resource_groups(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<ResourceGroupRecord>, FetchError> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner, subscription_id, "resourcegroup")?;
        Ok(inner
            .resource_groups
            .get(subscription_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn security_compliance(
        &self,
        subscription_id: &str,
        location: &str,
    ) -> Result<Vec<ComplianceRecord>, FetchError> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner, subscription_id, "compliance")?;
        Ok(inner
            .compliance
            .get(&(subscription_id.to_string(), location.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn advisor_recommendations(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<RecommendationRecord>, FetchError> {
        let inner = self.inner.lock().unwrap();
        Self::check_failure(&inner, subscription_id, "recommendation")?;
        Ok(inner
            .recommendations
            .get(subscription_id)
            .cloned()
            .unwrap_or_default())
    }
}
