//! Audit observation records produced by fetch tasks.
//!
//! Each record is a flat tuple of owned string label fields plus a numeric
//! value where one is measured (compliance percentages). Records are
//! immutable once produced and flow from fetch tasks to snapshot assembly
//! through the cycle's result channel.

/// Subscription metadata, one per audited subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRecord {
    pub subscription_id: String,
    pub subscription_name: String,
    pub spending_limit: String,
    pub quota_id: String,
    pub location_placement_id: String,
}

/// One resource group within a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceGroupRecord {
    pub subscription_id: String,
    pub resource_group: String,
    pub location: String,
}

/// One Security Center compliance segment. `assessment_type` is empty when
/// the API omits the segment type.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceRecord {
    pub subscription_id: String,
    pub assessment_type: String,
    pub percentage: f64,
}

/// One Advisor recommendation. `resource_group` is extracted from the
/// recommendation's resource ID and may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRecord {
    pub subscription_id: String,
    pub category: String,
    pub resource_type: String,
    pub resource_name: String,
    pub resource_group: String,
    pub impact: String,
    pub risk: String,
}

/// A single observation emitted by a fetch task.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditRecord {
    Subscription(SubscriptionRecord),
    ResourceGroup(ResourceGroupRecord),
    Compliance(ComplianceRecord),
    Recommendation(RecommendationRecord),
}
