//! roles-coordinator binary entrypoint wiring the REST, WebSocket and coordination store layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roles_coordinator::{
    config::AppConfig,
    dao::presence_store::{PresenceStore, memory::MemoryPresenceStore},
    routes,
    services::{election_sweep, store_supervisor},
    state::{AppState, SharedState, clock::SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let (store, store_kind) = select_store().await?;
    let sweep_interval = config.sweep_interval();

    let app_state = AppState::new(config, store, store_kind, Arc::new(SystemClock));

    tokio::spawn(store_supervisor::run(app_state.clone()));
    let sweep = election_sweep::spawn(app_state.clone(), sweep_interval);

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, store = store_kind, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    sweep.shutdown().await;
    Ok(())
}

/// Connect to Redis when `REDIS_URL` is set, otherwise fall back to the in-process store.
#[cfg(feature = "redis-store")]
async fn select_store() -> anyhow::Result<(Arc<dyn PresenceStore>, &'static str)> {
    use roles_coordinator::dao::presence_store::redis::{RedisConfig, RedisPresenceStore};

    if env::var_os("REDIS_URL").is_none() {
        return Ok(memory_store());
    }
    let config = RedisConfig::from_env().context("reading Redis configuration")?;
    let store = RedisPresenceStore::connect(config)
        .await
        .context("connecting to Redis")?;
    info!("connected to Redis coordination store");
    Ok((Arc::new(store), "redis"))
}

#[cfg(not(feature = "redis-store"))]
async fn select_store() -> anyhow::Result<(Arc<dyn PresenceStore>, &'static str)> {
    if env::var_os("REDIS_URL").is_some() {
        warn!("REDIS_URL is set but this build has no Redis support");
    }
    Ok(memory_store())
}

fn memory_store() -> (Arc<dyn PresenceStore>, &'static str) {
    warn!("using in-memory coordination store; roles are not shared across instances");
    (Arc::new(MemoryPresenceStore::new()), "memory")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
