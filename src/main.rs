//! Service binary: configuration, adapter wiring, background tasks, and
//! the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::middleware;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::{mpsc, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use classroom_live::adapters::auth::JwtAuthProvider;
use classroom_live::adapters::bus::{AblyBus, PusherBus};
use classroom_live::adapters::directory::PostgresSessionDirectory;
use classroom_live::adapters::http::{auth_middleware, live_routes, AuthState, LiveHandlers};
use classroom_live::adapters::registry::InMemorySessionRegistry;
use classroom_live::adapters::store::RedisSnapshotStore;
use classroom_live::application::{
    ControlHandoff, SessionLifecycle, SessionPolicy, SignalRelay, SnapshotBridge, SweepService,
    WhiteboardSync,
};
use classroom_live::config::{AppConfig, BusProvider};
use classroom_live::ports::{MessageBus, SessionDirectory, SessionRegistry, SnapshotStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    // One bus backend is active per deployment; the contract is identical
    // either way, so nothing downstream knows which.
    let bus: Arc<dyn MessageBus> = match config.messaging.provider {
        BusProvider::Pusher => Arc::new(PusherBus::new(
            &config.messaging.pusher,
            config.messaging.publish_timeout(),
        )?),
        BusProvider::Ably => Arc::new(AblyBus::new(
            &config.messaging.ably,
            config.messaging.publish_timeout(),
        )?),
    };
    tracing::info!(provider = ?config.messaging.provider, "Message bus configured");

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!().run(&pool).await?;
    }
    let directory: Arc<dyn SessionDirectory> = Arc::new(PostgresSessionDirectory::new(pool));

    let store: Arc<dyn SnapshotStore> = Arc::new(RedisSnapshotStore::connect(&config.redis).await?);

    let registry: Arc<dyn SessionRegistry> = Arc::new(InMemorySessionRegistry::new());

    // Store-to-bus bridge queue for whiteboard fan-out.
    let (fanout_tx, fanout_rx) = mpsc::channel(config.session.fanout_capacity);

    let policy = SessionPolicy::from(&config.session);
    let lifecycle = Arc::new(SessionLifecycle::new(
        registry.clone(),
        directory,
        bus.clone(),
        policy,
    ));
    let relay = Arc::new(SignalRelay::new(registry.clone(), bus.clone()));
    let whiteboard = Arc::new(WhiteboardSync::new(registry.clone(), store, fanout_tx));
    let control = Arc::new(ControlHandoff::new(registry.clone(), bus.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bridge = SnapshotBridge::new(bus.clone(), fanout_rx);
    let bridge_task = tokio::spawn(bridge.run(shutdown_rx.clone()));

    let sweeper = SweepService::new(lifecycle.clone(), config.session.sweep_interval());
    let sweeper_task = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    let auth_provider: AuthState = Arc::new(JwtAuthProvider::new(&config.auth));
    let handlers = LiveHandlers::new(lifecycle, relay, whiteboard, control, registry, bus);

    let app = axum::Router::new()
        .nest("/api/live", live_routes(handlers))
        .layer(middleware::from_fn_with_state(
            auth_provider,
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors_layer(&config));

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, "Realtime coordination service listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Server drained; stop the background stages.
    let _ = shutdown_tx.send(true);
    let _ = bridge_task.await;
    let _ = sweeper_task.await;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to install shutdown handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
