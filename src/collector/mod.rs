//! Concurrent audit collection.
//!
//! One collection cycle fans out independent fetch tasks, one per
//! (subscription, category) combination (compliance additionally per
//! location), and funnels their records through a single channel. The
//! channel closes once every task has finished, the drained records are
//! assembled into a fresh metrics bundle, and the bundle replaces the live
//! snapshot in one atomic step.
//!
//! The scrape scheduler fires cycles on a fixed interval, fire-and-forget:
//! an overrunning cycle never delays the next one. Overlap is safe because
//! every cycle assembles into its own private bundle; it only costs
//! duplicate remote calls.

pub mod mock;
pub mod record;
pub mod traits;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::metrics::{AuditMetrics, SnapshotRegistry};

use record::AuditRecord;
use traits::AuditApi;

/// Static collection configuration: what to audit and which categories are
/// enabled. Fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Subscription IDs enumerated at startup.
    pub subscription_ids: Vec<String>,
    /// Locations fanned out for compliance collection.
    pub locations: Vec<String>,
    pub collect_subscription: bool,
    pub collect_resource_group: bool,
    pub collect_compliance: bool,
    pub collect_recommendation: bool,
}

/// Shared application context handed to the scheduler and each cycle.
///
/// Replaces process-wide globals with one explicit structure: the audit
/// configuration, the management API handle, and the snapshot registry the
/// exposition endpoint reads from.
pub struct AppContext {
    pub settings: CollectorSettings,
    pub api: Arc<dyn AuditApi>,
    pub registry: SnapshotRegistry,
}

/// Runs one full collection cycle and installs the resulting snapshot.
/// Returns the number of records collected.
pub async fn run_cycle(ctx: Arc<AppContext>) -> usize {
    let started = Instant::now();
    let (results, mut records_rx) = mpsc::unbounded_channel::<AuditRecord>();

    for subscription_id in &ctx.settings.subscription_ids {
        if ctx.settings.collect_subscription {
            spawn_subscription_task(ctx.clone(), subscription_id.clone(), results.clone());
        }
        if ctx.settings.collect_resource_group {
            spawn_resource_group_task(ctx.clone(), subscription_id.clone(), results.clone());
        }
        if ctx.settings.collect_compliance {
            for location in &ctx.settings.locations {
                spawn_compliance_task(
                    ctx.clone(),
                    subscription_id.clone(),
                    location.clone(),
                    results.clone(),
                );
            }
        }
        if ctx.settings.collect_recommendation {
            spawn_recommendation_task(ctx.clone(), subscription_id.clone(), results.clone());
        }
    }
    drop(results);

    // Every fetch task holds a sender clone; the channel closes when the
    // last one finishes. Draining to completion is the cycle barrier.
    let mut records = Vec::new();
    while let Some(record) = records_rx.recv().await {
        records.push(record);
    }

    // Assemble into a private bundle and publish with a single swap, so a
    // scrape arriving mid-cycle still reads the previous complete snapshot.
    let bundle = AuditMetrics::new();
    for record in &records {
        bundle.apply(record);
    }
    ctx.registry.install(bundle);

    debug!(
        records = records.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "audit cycle finished"
    );
    records.len()
}

/// Fires collection cycles on a fixed interval, starting immediately.
///
/// Cycles are spawned fire-and-forget; if one overruns the interval the
/// next tick launches a concurrent cycle rather than waiting.
pub async fn scrape_loop(ctx: Arc<AppContext>, interval: Duration) {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut cycle_count: u64 = 0;

    loop {
        tick.tick().await;
        cycle_count += 1;
        let first = cycle_count == 1;

        let ctx = ctx.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let records = run_cycle(ctx).await;
            let elapsed = started.elapsed();
            if first {
                info!(
                    records,
                    duration_ms = elapsed.as_millis() as u64,
                    "first audit cycle finished"
                );
            }
            if elapsed > interval {
                warn!(
                    duration_ms = elapsed.as_millis() as u64,
                    interval_ms = interval.as_millis() as u64,
                    "audit cycle exceeded scrape interval"
                );
            }
        });
    }
}

fn spawn_subscription_task(
    ctx: Arc<AppContext>,
    subscription_id: String,
    results: mpsc::UnboundedSender<AuditRecord>,
) {
    tokio::spawn(async move {
        match ctx.api.subscription(&subscription_id).await {
            Ok(record) => {
                let _ = results.send(AuditRecord::Subscription(record));
                debug!(subscription = %subscription_id, "finished subscription collection");
            }
            Err(e) => {
                warn!(subscription = %subscription_id, error = %e, "subscription collection failed");
            }
        }
    });
}

fn spawn_resource_group_task(
    ctx: Arc<AppContext>,
    subscription_id: String,
    results: mpsc::UnboundedSender<AuditRecord>,
) {
    tokio::spawn(async move {
        match ctx.api.resource_groups(&subscription_id).await {
            Ok(groups) => {
                // Emit records one by one, so a subscription with thousands
                // of groups does not block behind slower siblings.
                for record in groups {
                    let _ = results.send(AuditRecord::ResourceGroup(record));
                }
                debug!(subscription = %subscription_id, "finished resource group collection");
            }
            Err(e) => {
                warn!(subscription = %subscription_id, error = %e, "resource group collection failed");
            }
        }
    });
}

fn spawn_compliance_task(
    ctx: Arc<AppContext>,
    subscription_id: String,
    location: String,
    results: mpsc::UnboundedSender<AuditRecord>,
) {
    tokio::spawn(async move {
        match ctx
            .api
            .security_compliance(&subscription_id, &location)
            .await
        {
            Ok(segments) => {
                for record in segments {
                    let _ = results.send(AuditRecord::Compliance(record));
                }
                debug!(
                    subscription = %subscription_id,
                    location = %location,
                    "finished compliance collection"
                );
            }
            Err(e) => {
                warn!(
                    subscription = %subscription_id,
                    location = %location,
                    error = %e,
                    "compliance collection failed"
                );
            }
        }
    });
}

fn spawn_recommendation_task(
    ctx: Arc<AppContext>,
    subscription_id: String,
    results: mpsc::UnboundedSender<AuditRecord>,
) {
    tokio::spawn(async move {
        match ctx.api.advisor_recommendations(&subscription_id).await {
            Ok(recommendations) => {
                for record in recommendations {
                    let _ = results.send(AuditRecord::Recommendation(record));
                }
                debug!(subscription = %subscription_id, "finished recommendation collection");
            }
            Err(e) => {
                warn!(subscription = %subscription_id, error = %e, "recommendation collection failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::mock::MockApi;
    use super::record::{
        ComplianceRecord, RecommendationRecord, ResourceGroupRecord, SubscriptionRecord,
    };

    fn settings(subscription_ids: &[&str]) -> CollectorSettings {
        CollectorSettings {
            subscription_ids: subscription_ids.iter().map(|s| s.to_string()).collect(),
            locations: vec!["westeurope".into(), "northeurope".into()],
            collect_subscription: true,
            collect_resource_group: true,
            collect_compliance: true,
            collect_recommendation: true,
        }
    }

    fn context(api: Arc<MockApi>, settings: CollectorSettings) -> Arc<AppContext> {
        Arc::new(AppContext {
            settings,
            api,
            registry: SnapshotRegistry::new(),
        })
    }

    fn subscription(id: &str) -> SubscriptionRecord {
        SubscriptionRecord {
            subscription_id: id.into(),
            subscription_name: format!("{} name", id),
            spending_limit: "Off".into(),
            quota_id: "PayAsYouGo_2014-09-01".into(),
            location_placement_id: "Public_2014-09-01".into(),
        }
    }

    fn resource_group(subscription_id: &str, name: &str) -> ResourceGroupRecord {
        ResourceGroupRecord {
            subscription_id: subscription_id.into(),
            resource_group: name.into(),
            location: "westeurope".into(),
        }
    }

    fn compliance(subscription_id: &str, value: f64) -> ComplianceRecord {
        ComplianceRecord {
            subscription_id: subscription_id.into(),
            assessment_type: "Compliant".into(),
            percentage: value,
        }
    }

    fn recommendation(subscription_id: &str) -> RecommendationRecord {
        RecommendationRecord {
            subscription_id: subscription_id.into(),
            category: "Security".into(),
            resource_type: "Microsoft.Compute/virtualMachines".into(),
            resource_name: "vm1".into(),
            resource_group: "rg-1".into(),
            impact: "High".into(),
            risk: "Error".into(),
        }
    }

    /// Reads one gauge value from the live snapshot by metric name and
    /// label subset.
    fn live_value(
        ctx: &AppContext,
        name: &str,
        labels: &[(&str, &str)],
    ) -> Option<f64> {
        for family in ctx.registry.current().families() {
            if family.get_name() != name {
                continue;
            }
            for metric in family.get_metric() {
                let matches = labels.iter().all(|(k, v)| {
                    metric
                        .get_label()
                        .iter()
                        .any(|pair| pair.get_name() == *k && pair.get_value() == *v)
                });
                if matches {
                    return Some(metric.get_gauge().get_value());
                }
            }
        }
        None
    }

    #[tokio::test]
    async fn test_cycle_collects_all_categories() {
        let api = Arc::new(MockApi::new());
        api.add_subscription(subscription("sub-a"));
        api.add_resource_group(resource_group("sub-a", "rg-1"));
        api.add_compliance("westeurope", compliance("sub-a", 80.0));
        api.add_recommendation(recommendation("sub-a"));

        let ctx = context(api, settings(&["sub-a"]));
        let records = run_cycle(ctx.clone()).await;
        assert_eq!(records, 4);

        assert_eq!(
            live_value(
                &ctx,
                "azurerm_subscription_info",
                &[("subscriptionID", "sub-a")],
            ),
            Some(1.0)
        );
        assert_eq!(
            live_value(
                &ctx,
                "azurerm_resourcegroup_info",
                &[("resourceGroup", "rg-1")],
            ),
            Some(1.0)
        );
        assert_eq!(
            live_value(
                &ctx,
                "azurerm_securitycenter_compliance",
                &[("subscriptionID", "sub-a")],
            ),
            Some(80.0)
        );
        assert_eq!(
            live_value(
                &ctx,
                "azurerm_advisor_recommendation",
                &[("resourceName", "vm1")],
            ),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn test_compliance_accumulates_across_locations() {
        let api = Arc::new(MockApi::new());
        api.add_subscription(subscription("sub-a"));
        api.add_compliance("westeurope", compliance("sub-a", 30.0));
        api.add_compliance("northeurope", compliance("sub-a", 70.0));

        let ctx = context(api, settings(&["sub-a"]));
        run_cycle(ctx.clone()).await;

        assert_eq!(
            live_value(
                &ctx,
                "azurerm_securitycenter_compliance",
                &[("subscriptionID", "sub-a"), ("assessmentType", "Compliant")],
            ),
            Some(100.0)
        );
    }

    #[tokio::test]
    async fn test_task_failure_does_not_abort_siblings() {
        let api = Arc::new(MockApi::new());
        api.add_subscription(subscription("sub-a"));
        api.add_subscription(subscription("sub-b"));
        api.add_resource_group(resource_group("sub-a", "rg-a"));
        api.add_resource_group(resource_group("sub-b", "rg-b"));
        api.add_compliance("westeurope", compliance("sub-a", 50.0));
        api.add_compliance("westeurope", compliance("sub-b", 60.0));
        api.fail("sub-a", "compliance");

        let ctx = context(api, settings(&["sub-a", "sub-b"]));
        run_cycle(ctx.clone()).await;

        // The failed category contributes nothing for sub-a...
        assert_eq!(
            live_value(
                &ctx,
                "azurerm_securitycenter_compliance",
                &[("subscriptionID", "sub-a")],
            ),
            None
        );
        // ...while sibling categories and subscriptions are unaffected.
        assert_eq!(
            live_value(
                &ctx,
                "azurerm_resourcegroup_info",
                &[("subscriptionID", "sub-a"), ("resourceGroup", "rg-a")],
            ),
            Some(1.0)
        );
        assert_eq!(
            live_value(
                &ctx,
                "azurerm_resourcegroup_info",
                &[("subscriptionID", "sub-b"), ("resourceGroup", "rg-b")],
            ),
            Some(1.0)
        );
        assert_eq!(
            live_value(
                &ctx,
                "azurerm_securitycenter_compliance",
                &[("subscriptionID", "sub-b")],
            ),
            Some(60.0)
        );
    }

    #[tokio::test]
    async fn test_zero_subscriptions_installs_empty_snapshot() {
        let api = Arc::new(MockApi::new());
        let ctx = context(api, settings(&[]));

        let records = run_cycle(ctx.clone()).await;
        assert_eq!(records, 0);

        let text = ctx.registry.current().encode().unwrap();
        assert!(!text.contains("subscriptionID="));
    }

    #[tokio::test]
    async fn test_stale_entries_removed_between_cycles() {
        let api = Arc::new(MockApi::new());
        api.add_subscription(subscription("sub-a"));
        for name in ["rg-1", "rg-2", "rg-3"] {
            api.add_resource_group(resource_group("sub-a", name));
        }

        let ctx = context(api.clone(), settings(&["sub-a"]));
        run_cycle(ctx.clone()).await;
        assert_eq!(
            live_value(&ctx, "azurerm_resourcegroup_info", &[("resourceGroup", "rg-3")]),
            Some(1.0)
        );

        // The list shrinks to one group; the next cycle must fully replace
        // the series, not merge into it.
        api.set_resource_groups("sub-a", vec![resource_group("sub-a", "rg-1")]);
        run_cycle(ctx.clone()).await;

        let text = ctx.registry.current().encode().unwrap();
        assert!(text.contains("resourceGroup=\"rg-1\""));
        assert!(!text.contains("rg-2"));
        assert!(!text.contains("rg-3"));
    }

    #[tokio::test]
    async fn test_disabled_categories_are_skipped() {
        let api = Arc::new(MockApi::new());
        api.add_subscription(subscription("sub-a"));
        api.add_resource_group(resource_group("sub-a", "rg-1"));

        let mut settings = settings(&["sub-a"]);
        settings.collect_subscription = false;
        settings.collect_resource_group = false;
        let ctx = context(api, settings);
        run_cycle(ctx.clone()).await;

        let text = ctx.registry.current().encode().unwrap();
        assert!(!text.contains("azurerm_subscription_info{"));
        assert!(!text.contains("rg-1"));
    }

    #[tokio::test]
    async fn test_scrape_loop_fires_immediately() {
        let api = Arc::new(MockApi::new());
        api.add_subscription(subscription("sub-a"));
        let ctx = context(api, settings(&["sub-a"]));

        // The first tick fires at once; the interval itself is far longer
        // than the test, so exactly one cycle runs.
        tokio::spawn(scrape_loop(ctx.clone(), Duration::from_secs(300)));

        let mut installed = None;
        for _ in 0..100 {
            installed = live_value(
                &ctx,
                "azurerm_subscription_info",
                &[("subscriptionID", "sub-a")],
            );
            if installed.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(installed, Some(1.0));
    }
}
