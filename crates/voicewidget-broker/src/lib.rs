//! Token broker for the voice widget.
//!
//! Exchanges the server-held voice provider API key for a short-lived web
//! call token so the key never reaches the browser. Also serves the widget's
//! static files.

pub mod api;
pub mod config;
pub mod upstream;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use config::Config;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use upstream::RetellClient;
use voicewidget_types::START_SESSION_PATH;

/// Application state shared across all request handlers. Read-only after
/// startup.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Broker configuration.
    pub config: Arc<Config>,
    /// Voice provider client.
    pub upstream: RetellClient,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let upstream = RetellClient::new(reqwest::Client::new(), &config.retell.api_base);
        Self {
            config: Arc::new(config),
            upstream,
        }
    }
}

/// Maximum request body size (64 KiB). The only body the broker reads is a
/// tiny JSON object.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route(START_SESSION_PATH, post(api::start_session_handler));

    let assets = &state.config.assets;

    // Voice SDK bundle under /sdk/*
    let router = match assets.sdk_dir.as_deref() {
        Some(sdk_dir) if Path::new(sdk_dir).is_dir() => {
            tracing::info!(path = %sdk_dir, "serving voice SDK bundle at /sdk");
            router.nest_service("/sdk", ServeDir::new(sdk_dir))
        }
        Some(sdk_dir) => {
            tracing::warn!(path = %sdk_dir, "voice SDK directory not found, /sdk disabled");
            router
        }
        None => router,
    };

    // Widget files; any unknown path gets index.html.
    let public_dir = &assets.public_dir;
    let index = Path::new(public_dir).join("index.html");
    let router = if index.exists() {
        tracing::info!(path = %public_dir, "serving widget static files");
        router.fallback_service(ServeDir::new(public_dir).fallback(ServeFile::new(index)))
    } else {
        tracing::info!(path = %public_dir, "public directory not found, skipping static file serving");
        router
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
