//! azure-audit-exporter - Prometheus exporter for Azure audit facts.
//!
//! Polls the Azure Resource Manager APIs on a fixed interval and
//! republishes subscription metadata, resource-group inventory, Security
//! Center compliance and Advisor recommendations as gauge metrics.

use tikv_jemallocator::Jemalloc;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use azure_audit_exporter::VERSION;
use azure_audit_exporter::azure::{ArmClient, FetchError};
use azure_audit_exporter::collector::traits::AuditApi;
use azure_audit_exporter::collector::{self, AppContext, CollectorSettings};
use azure_audit_exporter::metrics::SnapshotRegistry;
use azure_audit_exporter::server;

// ============================================================
// CLI
// ============================================================

/// Azure audit metrics exporter.
#[derive(Parser)]
#[command(name = "azure-audit-exporter", about = "Azure audit metrics exporter", version)]
struct Args {
    /// Listen address for the metrics endpoint.
    #[arg(long, default_value = "0.0.0.0:8080", env = "SERVER_BIND")]
    bind: String,

    /// HTTP path serving the metrics exposition.
    #[arg(long, default_value = "/metrics", env = "METRICS_PATH")]
    metrics_path: String,

    /// Scrape interval in seconds.
    #[arg(long, default_value = "300", env = "SCRAPE_TIME")]
    scrape_time: u64,

    /// Azure subscription IDs to audit. Empty = discover all visible ones.
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID", value_delimiter = ',')]
    azure_subscription: Vec<String>,

    /// Azure locations for Security Center compliance collection.
    #[arg(
        long,
        env = "AZURE_LOCATION",
        value_delimiter = ',',
        default_value = "westeurope,northeurope"
    )]
    azure_location: Vec<String>,

    /// Collect subscription info metrics.
    #[arg(long, env = "COLLECT_SUBSCRIPTION")]
    collect_subscription: bool,

    /// Collect resource-group inventory metrics.
    #[arg(long, env = "COLLECT_RESOURCEGROUP")]
    collect_resourcegroup: bool,

    /// Collect Security Center compliance metrics.
    /// Disable with --collect-compliance=false.
    #[arg(
        long,
        env = "COLLECT_COMPLIANCE",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    collect_compliance: bool,

    /// Collect Advisor recommendation metrics.
    /// Disable with --collect-recommendation=false.
    #[arg(
        long,
        env = "COLLECT_RECOMMENDATION",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    collect_recommendation: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("azure_audit_exporter={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(args));
}

async fn async_main(args: Args) {
    info!(version = VERSION, "starting azure-audit-exporter");

    // Credential bootstrap and subscription enumeration are fatal: the
    // process must not start serving without them.
    let api: Arc<dyn AuditApi> = match ArmClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Azure credential bootstrap failed");
            process::exit(1);
        }
    };

    let subscription_ids =
        match enumerate_subscriptions(api.as_ref(), &args.azure_subscription).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "subscription enumeration failed");
                process::exit(1);
            }
        };
    info!(
        subscriptions = subscription_ids.len(),
        "subscription enumeration finished"
    );

    let settings = CollectorSettings {
        subscription_ids,
        locations: args.azure_location.clone(),
        collect_subscription: args.collect_subscription,
        collect_resource_group: args.collect_resourcegroup,
        collect_compliance: args.collect_compliance,
        collect_recommendation: args.collect_recommendation,
    };
    let ctx = Arc::new(AppContext {
        settings,
        api,
        registry: SnapshotRegistry::new(),
    });

    info!(interval_secs = args.scrape_time, "starting metrics collection");
    let interval = Duration::from_secs(args.scrape_time);
    tokio::spawn(collector::scrape_loop(ctx.clone(), interval));

    let app = server::router(ctx, &args.metrics_path);
    let addr: SocketAddr = args.bind.parse().expect("invalid listen address");
    info!(%addr, path = %args.metrics_path, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}

/// Resolves the set of subscriptions to audit: the configured list (each ID
/// validated with a metadata fetch) or full discovery when none are given.
async fn enumerate_subscriptions(
    api: &dyn AuditApi,
    configured: &[String],
) -> Result<Vec<String>, FetchError> {
    if configured.is_empty() {
        api.list_subscription_ids().await
    } else {
        for subscription_id in configured {
            api.subscription(subscription_id).await?;
        }
        Ok(configured.to_vec())
    }
}
