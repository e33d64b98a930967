use std::sync::Arc;

use tracing::info;

use homeday::accounts::AccountManager;
use homeday::calendar::{build_range, month_start, today_utc};
use homeday::config::Config;
use homeday::legacy::{JsonFileLegacyStore, LegacyStore, MemoryLegacyStore};
use homeday::migration::Migrator;
use homeday::session::Session;
use homeday::store::DocumentStore;

fn log_totals(session: &Session) {
    let month = month_start(today_utc());
    let totals = session.project_totals(month);
    info!(
        "{month}: {} apartments, reserved {} / occupied {} days, revenue {:.2}, expenses {:.2}, net {:.2}, occupancy {:.1}%",
        session.apartments().len(),
        totals.reserved,
        totals.occupied,
        totals.revenue,
        totals.expenses,
        totals.net,
        totals.occupancy_rate * 100.0
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    homeday::observability::init(config.metrics_port);

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let accounts = AccountManager::new(config.data_dir.clone(), config.compact_threshold);
    let store: Arc<dyn DocumentStore> = accounts.get_or_open(&config.user)?;
    info!("homeday starting for {}", config.user);
    info!("  data_dir: {}", config.data_dir.display());
    info!("  lang: {}", config.lang.code());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let legacy: Arc<dyn LegacyStore> = match &config.legacy_file {
        Some(path) => Arc::new(JsonFileLegacyStore::new(path)),
        None => Arc::new(MemoryLegacyStore::new()),
    };
    Migrator::new(store.clone(), legacy, config.user.clone())
        .migrate_if_empty()
        .await;

    let session = Session::open(store, config.user.clone(), config.lang);
    let range = build_range(today_utc(), config.history);
    if let (Some(first), Some(last)) = (range.first(), range.last()) {
        info!("calendar window {first} .. {last} ({} days)", range.days.len());
    }
    for (apartment, row) in session.grid(&range.days[range.today_index..=range.today_index]) {
        let today = row.first().map(|c| c.label.as_str()).unwrap_or_default();
        info!("  {}: {:?} {today}", apartment.name, row.first().map(|c| c.status));
    }
    log_totals(&session);

    // Graceful shutdown on SIGTERM/ctrl-c
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("no SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    let mut changes = session.changes();
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                log_totals(&session);
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    session.close();
    info!("homeday stopped");
    Ok(())
}
