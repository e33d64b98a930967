use std::net::SocketAddr;

// ── Store writes ────────────────────────────────────────────────

/// Counter: committed store writes. Labels: op, status.
pub const STORE_WRITES_TOTAL: &str = "homeday_store_writes_total";

/// Histogram: store write latency in seconds, WAL included. Labels: op.
pub const STORE_WRITE_DURATION_SECONDS: &str = "homeday_store_write_duration_seconds";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "homeday_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "homeday_wal_flush_batch_size";

// ── Session ─────────────────────────────────────────────────────

/// Counter: snapshots applied to a session mirror. Labels: collection.
pub const SNAPSHOTS_APPLIED_TOTAL: &str = "homeday_snapshots_applied_total";

/// Counter: snapshots dropped because a newer version was already applied.
pub const SNAPSHOTS_STALE_TOTAL: &str = "homeday_snapshots_stale_total";

/// Gauge: live store subscriptions held by sessions.
pub const SUBSCRIPTIONS_ACTIVE: &str = "homeday_subscriptions_active";

/// Counter: session writes rejected by the store. Labels: op.
pub const REMOTE_FAILURES_TOTAL: &str = "homeday_remote_failures_total";

/// Counter: session writes rejected before reaching the store. Labels: op.
pub const VALIDATION_FAILURES_TOTAL: &str = "homeday_validation_failures_total";

// ── Accounts & migration ────────────────────────────────────────

/// Gauge: accounts with an open store.
pub const ACCOUNTS_ACTIVE: &str = "homeday_accounts_active";

/// Counter: legacy migration runs. Labels: outcome.
pub const MIGRATIONS_TOTAL: &str = "homeday_migrations_total";

/// Counter: WAL compactions. Labels: status.
pub const COMPACTIONS_TOTAL: &str = "homeday_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus metrics exporter: {e}"),
    }
}
