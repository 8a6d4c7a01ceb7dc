use anyhow::Result;
use fleetgw::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let sqlite_store = store::SqliteStatsStore::connect(
        &app_config.database.path,
        app_config.database.max_pool_size,
    )
    .await?;
    sqlite_store.init().await?;
    let stats_store: Arc<dyn store::StatsStore> = Arc::new(sqlite_store);

    let registry = Arc::new(registry::DeviceRegistry::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let stats_logger = worker::spawn_stats_logger(
        registry.clone(),
        app_config.monitoring.stats_log_interval_secs,
        shutdown_rx,
    );

    let app = routes::app(registry.clone(), stats_store, &app_config);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
            let saved = registry.save_all().await;
            tracing::info!(devices_saved = saved, "lifetime stats flushed");
            let _ = shutdown_tx.send(());
            let _ = stats_logger.await;
        }
    }

    Ok(())
}
