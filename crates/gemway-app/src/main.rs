//! gemway fetch proxy.
//!
//! Serves `POST /api/gemini/fetch` for browser front ends that cannot
//! speak Gemini themselves. Config comes from the first CLI argument or
//! `GEMWAY_CONFIG`; everything has a default.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;

use gemway_app::routes::{self, AppState};
use gemway_net::{ClientOptions, FixedWindowQuota, GeminiClient, RustlsTlsProvider, SecurityGate};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = gemway_app::load_config()?;

    let tls = Arc::new(RustlsTlsProvider::new()?);
    let client = GeminiClient::new(tls, ClientOptions::from(&config.client));
    let quota = Arc::new(FixedWindowQuota::new(&config.rate_limit));
    let state = AppState {
        gate: Arc::new(SecurityGate::new(&config.security)),
        quota: Arc::clone(&quota) as _,
        fetcher: Arc::new(client),
    };

    // Expired rate-limit windows are only reset lazily; sweep the rest.
    let every = config.rate_limit.prune_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let pruned = quota.prune();
            if pruned > 0 {
                log::debug!("Pruned {pruned} expired rate-limit records");
            }
        }
    });

    let listener = TcpListener::bind(&config.server.bind).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        routes::app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    log::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
