//! azure-audit-exporter - Azure audit facts as Prometheus metrics.
//!
//! Provides:
//! - `azure` - ARM credentials, REST client, wire types
//! - `collector` - concurrent collection cycle and scrape scheduler
//! - `metrics` - snapshot registry with atomic whole-snapshot replacement
//! - `server` - HTTP exposition endpoint
//! - `util` - helper utilities

pub mod azure;
pub mod collector;
pub mod metrics;
pub mod server;
pub mod util;

/// Crate version, exposed for logging and the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
