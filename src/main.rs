use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use rota::clock::SystemClock;
use rota::days::{DayManager, DaySettings};
use rota::snapshot;
use rota::wire;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = env_parse("ROTA_METRICS_PORT");
    rota::observability::init(metrics_port);

    let port = std::env::var("ROTA_PORT").unwrap_or_else(|_| "5433".into());
    let bind = std::env::var("ROTA_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("ROTA_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let password = std::env::var("ROTA_PASSWORD").unwrap_or_else(|_| "rota".into());
    let max_connections: usize = env_parse("ROTA_MAX_CONNECTIONS").unwrap_or(256);
    let offset_minutes: i32 = env_parse("ROTA_UTC_OFFSET_MINUTES").unwrap_or(0);
    let tick_secs: u64 = env_parse("ROTA_TICK_SECS").unwrap_or(30);
    let stale_minutes: i64 = env_parse("ROTA_STALE_MINUTES").unwrap_or(30);

    let utc_offset = FixedOffset::east_opt(offset_minutes * 60)
        .ok_or_else(|| format!("ROTA_UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;
    let settings = DaySettings {
        utc_offset,
        tick_every: Duration::from_secs(tick_secs.max(1)),
        stale_after: chrono::Duration::minutes(stale_minutes),
    };

    let catalog = match std::env::var("ROTA_CATALOG") {
        Ok(path) => snapshot::load_catalog(&PathBuf::from(path))?,
        Err(_) => snapshot::default_catalog(),
    };

    let tls_cert = std::env::var("ROTA_TLS_CERT").ok();
    let tls_key = std::env::var("ROTA_TLS_KEY").ok();
    let tls_acceptor =
        rota::tls::load_tls_acceptor(tls_cert.as_deref(), tls_key.as_deref())?;

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;

    let days = Arc::new(DayManager::new(
        PathBuf::from(&data_dir),
        catalog.clone(),
        Arc::new(SystemClock),
        settings,
    ));
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("rota listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  max_connections: {max_connections}");
    info!("  catalog: {} services", catalog.len());
    info!("  today: {} (utc offset {utc_offset})", days.resolve("today")?);
    info!("  tls: {}", if tls_acceptor.is_some() { "enabled" } else { "disabled" });
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(rota::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(rota::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(rota::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let days = days.clone();
                let pw = password.clone();
                let tls = tls_acceptor.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, days, pw, tls).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(rota::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(std::time::Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }

    info!("rota stopped ({} days loaded)", days.loaded_days().len());
    Ok(())
}
