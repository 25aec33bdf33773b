//! Stride Storefront - customer-facing e-commerce service.
//!
//! # Architecture
//!
//! - Axum JSON API over the cart, checkout, order, and auth flows
//! - `PostgreSQL` (sqlx) as the durable store, or an explicit in-memory
//!   backend for local development without a database
//! - Payment provider hosted checkout; signed webhooks drive order
//!   materialization
//! - Tower-sessions for the signed-in user and the guest identity token
//!
//! The store backend is fixed at startup from configuration. A failing
//! database is surfaced as an error, never silently replaced with
//! in-memory data.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use sentry::integrations::tracing as sentry_tracing;
use tower_http::trace::TraceLayer;
use tower_sessions::MemoryStore as MemorySessionStore;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stride_storefront::config::{StoreBackendKind, StorefrontConfig};
use stride_storefront::payments::PaymentClient;
use stride_storefront::state::AppState;
use stride_storefront::store::{MemoryStore, PgStore, Store};
use stride_storefront::{db, middleware, routes};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stride_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    // Select the durable store backend (fixed for the process lifetime)
    let (store, pool): (Arc<dyn Store>, Option<sqlx::PgPool>) = match config.store_backend {
        StoreBackendKind::Postgres => {
            let database_url = config
                .database_url
                .as_ref()
                .expect("postgres backend requires a database URL");
            let pool = db::create_pool(database_url)
                .await
                .expect("Failed to create database pool");
            tracing::info!("Database pool created");

            // NOTE: Schema migrations are NOT run automatically on startup.
            // Run them explicitly via: cargo run -p stride-cli -- migrate

            (Arc::new(PgStore::new(pool.clone())), Some(pool))
        }
        StoreBackendKind::Memory => {
            tracing::warn!("using in-memory store; data will not survive a restart");
            (Arc::new(MemoryStore::new()), None)
        }
    };

    let payments = PaymentClient::new(&config.payment);
    let state = AppState::new(config.clone(), store, payments, pool.clone());

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes());

    // Session storage follows the store backend
    let app = match pool {
        Some(pool) => {
            let session_store = PostgresStore::new(pool);
            session_store
                .migrate()
                .await
                .expect("Failed to prepare session table");
            app.layer(middleware::create_session_layer(session_store, &config))
        }
        None => app.layer(middleware::create_session_layer(
            MemorySessionStore::default(),
            &config,
        )),
    };

    let app = app
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies the durable store is reachable before returning OK.
/// Returns 503 Service Unavailable if it is not.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
