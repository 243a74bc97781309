//! Documentation of a handwritten notes sharing platform.
//!
//!
//!
//! # General Infrastructure
//! - Frontend uploads PDFs through the public upload endpoint, every upload starts pending
//! - Admin logs in, reviews pending notes on the admin list and approves them
//! - Public list only ever shows approved notes, with search and sort
//! - Opening or downloading a note bumps its view/download counter
//! - Uploaded binaries live on local disk and are served back under `/uploads`
//!
//!
//!
//! # Routes
//!
//! | Method | Path | Guard |
//! |---|---|---|
//! | GET | `/api/pdfs?q=&sort=` | none |
//! | GET | `/api/pdfs/admin` | admin |
//! | POST | `/api/pdfs/upload` | none |
//! | GET | `/api/pdfs/:id` | admin sees pending notes |
//! | PATCH/PUT | `/api/pdfs/:id` | admin unless `PROTECT_EDITS=false` |
//! | DELETE | `/api/pdfs/:id` | admin unless `PROTECT_EDITS=false` |
//! | PATCH | `/api/pdfs/:id/approve` | admin |
//! | POST | `/api/pdfs/:id/view` | none |
//! | POST | `/api/pdfs/:id/download` | none |
//! | POST | `/api/login` | none |
//! | GET | `/uploads/*` | none |
//!
//!
//!
//! # Notes
//!
//! ## Counters
//! Every view/download call adds exactly one, no deduplication per client. The increment is a single atomic
//! store operation so concurrent calls never lose an update.
//!
//! If the counter call fails the frontend keeps showing its optimistic local count, the server does not
//! retry anything.
//!
//! ## Upload size
//! 10 MB by default. Enforced here, not only in the frontend: the upload route caps the request body and the
//! multipart reader stops as soon as the file part goes over. Both answer with the JSON `413`.
//!
//!
//!
//! # Setup
//!
//! Run against a local Redis.
//! ```sh
//! JWT_SECRET=dev ADMIN_PASSWORD=dev cargo run --bin notebook
//! ```
//!
//! Run without Redis.
//! ```sh
//! STORE_BACKEND=memory JWT_SECRET=dev ADMIN_PASSWORD=dev cargo run --bin notebook
//! ```
//!
//! Smoke test a running server.
//! ```sh
//! cargo run --bin tester -- --password dev
//! ```
use std::{convert::Infallible, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, patch, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod memory;
pub mod models;
pub mod redis_store;
pub mod routes;
pub mod service;
pub mod state;
pub mod storage;
pub mod utils;

use config::{Config, StoreBackend};
use database::NoteStore;
use memory::MemoryStore;
use redis_store::RedisStore;
use routes::{
    admin_list_handler, approve_handler, delete_handler, download_handler, edit_handler, get_handler,
    list_handler, login_handler, upload_handler, view_handler,
};
use state::AppState;
use storage::PUBLIC_PREFIX;

/// Room for the title/author parts and multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load().context("Environment misconfigured!")?;

    info!("Initializing state...");
    match config.store {
        StoreBackend::Redis => {
            let store = RedisStore::connect(&config.redis_url)
                .await
                .context("Failed to connect to Redis")?;

            serve(AppState::new(config, store).await?).await
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store, notes are lost on restart");

            serve(AppState::new(config, MemoryStore::default()).await?).await
        }
    }
}

async fn serve<N: NoteStore>(state: Arc<AppState<N>>) -> anyhow::Result<()> {
    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

pub fn app<N: NoteStore>(state: Arc<AppState<N>>) -> Router {
    let body_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    let api = Router::new()
        .route("/pdfs", get(list_handler::<N>))
        .route("/pdfs/admin", get(admin_list_handler::<N>))
        .route(
            "/pdfs/upload",
            post(upload_handler::<N>).layer::<_, Infallible>(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/pdfs/:id",
            get(get_handler::<N>)
                .patch(edit_handler::<N>)
                .put(edit_handler::<N>)
                .delete(delete_handler::<N>),
        )
        .route("/pdfs/:id/approve", patch(approve_handler::<N>))
        .route("/pdfs/:id/view", post(view_handler::<N>))
        .route("/pdfs/:id/download", post(download_handler::<N>))
        .route("/login", post(login_handler::<N>));

    Router::new()
        .nest("/api", api)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.notes.files().root()))
        .layer(TraceLayer::new_for_http())
        .layer(cors(&state.config.cors_origins))
        .with_state(state)
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| warn!("Skipping invalid CORS origin {origin}"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
