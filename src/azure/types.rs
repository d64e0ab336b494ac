//! Serde models for ARM REST responses and their conversion to records.
//!
//! Optional fields the API may omit (`segmentType`, subscription policy
//! fields) default to empty strings, never errors.

use serde::Deserialize;

use crate::collector::record::{
    ComplianceRecord, RecommendationRecord, ResourceGroupRecord, SubscriptionRecord,
};
use crate::util::extract_resource_group;

/// A paged list response; follow `nextLink` until absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(super) struct Page<T> {
    #[serde(default)]
    pub(super) value: Vec<T>,
    #[serde(default)]
    pub(super) next_link: Option<String>,
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Subscription {
    #[serde(default)]
    pub(super) subscription_id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    subscription_policies: SubscriptionPolicies,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionPolicies {
    #[serde(default)]
    location_placement_id: String,
    #[serde(default)]
    quota_id: String,
    #[serde(default)]
    spending_limit: String,
}

impl Subscription {
    pub(super) fn into_record(self) -> SubscriptionRecord {
        SubscriptionRecord {
            subscription_id: self.subscription_id,
            subscription_name: self.display_name,
            spending_limit: self.subscription_policies.spending_limit,
            quota_id: self.subscription_policies.quota_id,
            location_placement_id: self.subscription_policies.location_placement_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource groups
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct ResourceGroup {
    #[serde(default)]
    name: String,
    #[serde(default)]
    location: String,
}

impl ResourceGroup {
    pub(super) fn into_record(self, subscription_id: &str) -> ResourceGroupRecord {
        ResourceGroupRecord {
            subscription_id: subscription_id.to_string(),
            resource_group: self.name,
            location: self.location,
        }
    }
}

// ---------------------------------------------------------------------------
// Security Center compliance
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct Compliance {
    #[serde(default)]
    properties: ComplianceProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComplianceProperties {
    #[serde(default)]
    assessment_result: Vec<ComplianceSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComplianceSegment {
    #[serde(default)]
    segment_type: String,
    #[serde(default)]
    percentage: f64,
}

impl Compliance {
    pub(super) fn into_records(self, subscription_id: &str) -> Vec<ComplianceRecord> {
        self.properties
            .assessment_result
            .into_iter()
            .map(|segment| ComplianceRecord {
                subscription_id: subscription_id.to_string(),
                assessment_type: segment.segment_type,
                percentage: segment.percentage,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Advisor recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct Recommendation {
    #[serde(default)]
    id: String,
    #[serde(default)]
    properties: RecommendationProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationProperties {
    #[serde(default)]
    category: String,
    #[serde(default)]
    impact: String,
    #[serde(default)]
    risk: String,
    #[serde(default)]
    impacted_field: String,
    #[serde(default)]
    impacted_value: String,
}

impl Recommendation {
    pub(super) fn into_record(self, subscription_id: &str) -> RecommendationRecord {
        RecommendationRecord {
            subscription_id: subscription_id.to_string(),
            category: self.properties.category,
            resource_type: self.properties.impacted_field,
            resource_name: self.properties.impacted_value,
            resource_group: extract_resource_group(&self.id),
            impact: self.properties.impact,
            risk: self.properties.risk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_payload() {
        let body = r#"{
            "id": "/subscriptions/sub-a",
            "subscriptionId": "sub-a",
            "displayName": "Production",
            "state": "Enabled",
            "subscriptionPolicies": {
                "locationPlacementId": "Public_2014-09-01",
                "quotaId": "EnterpriseAgreement_2014-09-01",
                "spendingLimit": "Off"
            }
        }"#;
        let record = serde_json::from_str::<Subscription>(body)
            .unwrap()
            .into_record();
        assert_eq!(record.subscription_id, "sub-a");
        assert_eq!(record.subscription_name, "Production");
        assert_eq!(record.spending_limit, "Off");
        assert_eq!(record.quota_id, "EnterpriseAgreement_2014-09-01");
        assert_eq!(record.location_placement_id, "Public_2014-09-01");
    }

    #[test]
    fn test_subscription_payload_without_policies() {
        let body = r#"{"subscriptionId": "sub-a", "displayName": "Dev"}"#;
        let record = serde_json::from_str::<Subscription>(body)
            .unwrap()
            .into_record();
        assert_eq!(record.spending_limit, "");
        assert_eq!(record.quota_id, "");
        assert_eq!(record.location_placement_id, "");
    }

    #[test]
    fn test_resource_group_page() {
        let body = r#"{
            "value": [
                {"id": "/subscriptions/sub-a/resourceGroups/rg-1", "name": "rg-1", "location": "westeurope"},
                {"id": "/subscriptions/sub-a/resourceGroups/rg-2", "name": "rg-2", "location": "northeurope"}
            ],
            "nextLink": "https://management.azure.com/subscriptions/sub-a/resourcegroups?page=2"
        }"#;
        let page: Page<ResourceGroup> = serde_json::from_str(body).unwrap();
        assert_eq!(page.value.len(), 2);
        assert!(page.next_link.is_some());

        let record = page
            .value
            .into_iter()
            .next()
            .unwrap()
            .into_record("sub-a");
        assert_eq!(record.resource_group, "rg-1");
        assert_eq!(record.location, "westeurope");
        assert_eq!(record.subscription_id, "sub-a");
    }

    #[test]
    fn test_page_without_next_link() {
        let page: Page<ResourceGroup> = serde_json::from_str(r#"{"value": []}"#).unwrap();
        assert!(page.value.is_empty());
        assert!(page.next_link.is_none());
    }

    #[test]
    fn test_compliance_payload() {
        let body = r#"{
            "properties": {
                "resourceCount": 10,
                "assessmentResult": [
                    {"segmentType": "Compliant", "percentage": 81.5},
                    {"percentage": 18.5}
                ]
            }
        }"#;
        let records = serde_json::from_str::<Compliance>(body)
            .unwrap()
            .into_records("sub-a");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].assessment_type, "Compliant");
        assert_eq!(records[0].percentage, 81.5);
        // Absent segment type becomes an empty label, not an error.
        assert_eq!(records[1].assessment_type, "");
        assert_eq!(records[1].subscription_id, "sub-a");
    }

    #[test]
    fn test_compliance_payload_without_results() {
        let records = serde_json::from_str::<Compliance>(r#"{"properties": {}}"#)
            .unwrap()
            .into_records("sub-a");
        assert!(records.is_empty());
    }

    #[test]
    fn test_recommendation_payload() {
        let body = r#"{
            "id": "/subscriptions/sub-a/resourceGroups/myRG/providers/Microsoft.Advisor/recommendations/rec-1",
            "properties": {
                "category": "HighAvailability",
                "impact": "Medium",
                "risk": "Warning",
                "impactedField": "Microsoft.Compute/virtualMachines",
                "impactedValue": "vm1"
            }
        }"#;
        let record = serde_json::from_str::<Recommendation>(body)
            .unwrap()
            .into_record("sub-a");
        assert_eq!(record.category, "HighAvailability");
        assert_eq!(record.resource_type, "Microsoft.Compute/virtualMachines");
        assert_eq!(record.resource_name, "vm1");
        assert_eq!(record.resource_group, "myRG");
        assert_eq!(record.impact, "Medium");
        assert_eq!(record.risk, "Warning");
    }

    #[test]
    fn test_recommendation_without_resource_group() {
        let body = r#"{
            "id": "/subscriptions/sub-a/providers/Microsoft.Advisor/recommendations/rec-2",
            "properties": {"category": "Cost"}
        }"#;
        let record = serde_json::from_str::<Recommendation>(body)
            .unwrap()
            .into_record("sub-a");
        assert_eq!(record.resource_group, "");
        assert_eq!(record.impact, "");
    }
}
