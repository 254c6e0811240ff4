//! `voicewidget-broker` binary: loads configuration, installs logging and
//! serves the token broker until SIGINT or SIGTERM.

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use voicewidget_broker::config::{self, LoggingConfig};
use voicewidget_broker::{app, AppState};

/// Config file path and where it came from: first CLI argument, then
/// `VOICEWIDGET_CONFIG_PATH`.
fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("VOICEWIDGET_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

/// Installs the global subscriber. An unparsable level falls back to `info`.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() {
    // .env must be loaded before configuration reads the environment.
    let dotenv_path = dotenvy::dotenv().ok();

    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("invalid broker configuration file");

    init_logging(&config.logging);

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        dotenv = dotenv_path.as_ref().map(|p| p.display().to_string()).as_deref().unwrap_or("<none>"),
        "resolved startup configuration"
    );

    if config.retell.use_mock_token {
        tracing::warn!("mock token mode enabled; the voice provider will not be called");
    } else if config.retell.api_key().is_none() || config.retell.agent_id().is_none() {
        tracing::warn!(
            api_key_present = config.retell.api_key().is_some(),
            agent_id_present = config.retell.agent_id().is_some(),
            "voice provider credentials incomplete; start requests will fail"
        );
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let app = app(AppState::new(config));

    tracing::info!(%addr, "starting token broker");

    let listener = TcpListener::bind(addr)
        .await
        .expect("cannot listen on the configured host and port");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("token broker stopped unexpectedly");

    tracing::info!("token broker shut down");
}

/// Resolves on the first SIGINT or SIGTERM so in-flight token requests can
/// finish before exit.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("cannot listen for SIGINT");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("cannot listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!(signal = "SIGINT", "draining token broker"); }
        () = terminate => { tracing::info!(signal = "SIGTERM", "draining token broker"); }
    }
}
