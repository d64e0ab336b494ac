//! Prometheus snapshot registry with whole-snapshot atomic replacement.
//!
//! Each collection cycle assembles an `AuditMetrics` bundle (a private
//! `prometheus::Registry` holding one gauge series per audit category)
//! from scratch and installs it into the `SnapshotRegistry` in a single
//! swap. The exposition path only ever sees a fully assembled bundle, so a
//! scrape arriving mid-cycle reads the previous complete snapshot, never a
//! mix of two cycles' data.

use std::sync::{Arc, RwLock};

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::collector::record::AuditRecord;

/// One complete metrics snapshot: a registry with the four audit series.
///
/// A fresh bundle starts with every series empty; `apply` upserts one record
/// at a time. Compliance and recommendation entries accumulate by addition,
/// so same-tuple records from different fetch tasks sum regardless of
/// arrival order.
pub struct AuditMetrics {
    registry: Registry,
    subscription_info: GaugeVec,
    resource_group_info: GaugeVec,
    securitycenter_compliance: GaugeVec,
    advisor_recommendations: GaugeVec,
}

impl AuditMetrics {
    /// Creates an empty bundle with all series registered.
    pub fn new() -> Self {
        let registry = Registry::new();

        let subscription_info = GaugeVec::new(
            Opts::new("azurerm_subscription_info", "Azure Audit Subscription info"),
            &[
                "subscriptionID",
                "subscriptionName",
                "spendingLimit",
                "quotaID",
                "locationPlacementID",
            ],
        )
        .expect("subscription info gauge");
        registry
            .register(Box::new(subscription_info.clone()))
            .expect("register subscription info gauge");

        let resource_group_info = GaugeVec::new(
            Opts::new("azurerm_resourcegroup_info", "Azure Audit ResourceGroup info"),
            &["subscriptionID", "resourceGroup", "location"],
        )
        .expect("resourcegroup info gauge");
        registry
            .register(Box::new(resource_group_info.clone()))
            .expect("register resourcegroup info gauge");

        let securitycenter_compliance = GaugeVec::new(
            Opts::new(
                "azurerm_securitycenter_compliance",
                "Azure Audit SecurityCenter compliance status",
            ),
            &["subscriptionID", "assessmentType"],
        )
        .expect("securitycenter compliance gauge");
        registry
            .register(Box::new(securitycenter_compliance.clone()))
            .expect("register securitycenter compliance gauge");

        let advisor_recommendations = GaugeVec::new(
            Opts::new(
                "azurerm_advisor_recommendation",
                "Azure Audit Advisor recommendation",
            ),
            &[
                "subscriptionID",
                "category",
                "resourceType",
                "resourceName",
                "resourceGroup",
                "impact",
                "risk",
            ],
        )
        .expect("advisor recommendation gauge");
        registry
            .register(Box::new(advisor_recommendations.clone()))
            .expect("register advisor recommendation gauge");

        Self {
            registry,
            subscription_info,
            resource_group_info,
            securitycenter_compliance,
            advisor_recommendations,
        }
    }

    /// Upserts one record into its series.
    ///
    /// Presence categories set the gauge to 1; compliance and
    /// recommendation tuples accumulate by commutative addition.
    pub fn apply(&self, record: &AuditRecord) {
        match record {
            AuditRecord::Subscription(r) => {
                self.subscription_info
                    .with_label_values(&[
                        &r.subscription_id,
                        &r.subscription_name,
                        &r.spending_limit,
                        &r.quota_id,
                        &r.location_placement_id,
                    ])
                    .set(1.0);
            }
            AuditRecord::ResourceGroup(r) => {
                self.resource_group_info
                    .with_label_values(&[&r.subscription_id, &r.resource_group, &r.location])
                    .set(1.0);
            }
            AuditRecord::Compliance(r) => {
                self.securitycenter_compliance
                    .with_label_values(&[&r.subscription_id, &r.assessment_type])
                    .add(r.percentage);
            }
            AuditRecord::Recommendation(r) => {
                self.advisor_recommendations
                    .with_label_values(&[
                        &r.subscription_id,
                        &r.category,
                        &r.resource_type,
                        &r.resource_name,
                        &r.resource_group,
                        &r.impact,
                        &r.risk,
                    ])
                    .add(1.0);
            }
        }
    }

    /// Gathered metric families, for value assertions in tests.
    #[cfg(test)]
    pub(crate) fn families(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Renders every series in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Default for AuditMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the currently exposed snapshot.
///
/// `install` replaces the live bundle in one visible step; `current` hands
/// out the live `Arc` so the exposition path renders without holding the
/// lock while a new cycle installs.
pub struct SnapshotRegistry {
    live: RwLock<Arc<AuditMetrics>>,
}

impl SnapshotRegistry {
    /// Creates a registry with an empty initial snapshot, so the endpoint
    /// answers before the first cycle completes.
    pub fn new() -> Self {
        Self {
            live: RwLock::new(Arc::new(AuditMetrics::new())),
        }
    }

    /// Atomically replaces the live snapshot.
    pub fn install(&self, bundle: AuditMetrics) {
        *self.live.write().unwrap() = Arc::new(bundle);
    }

    /// Returns the live snapshot.
    pub fn current(&self) -> Arc<AuditMetrics> {
        self.live.read().unwrap().clone()
    }
}

impl Default for SnapshotRegistry {
    fn default() -> Self {
        Self::new()
    }
}
