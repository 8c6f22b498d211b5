//! Serve command - HTTP front door for the lookup pipeline.
//!
//! Routes:
//! - `GET /` health text
//! - `GET /address?lat=..&lng=..` cached or freshly resolved address
//! - `GET /all-cache` every persisted record

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Args;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use revgeo::app::{AppConfig, GeocodeApp};
use revgeo::cache::CacheStore;
use revgeo::logging::{default_log_dir, default_log_file, init_logging};
use revgeo::lookup::{LookupCoordinator, LookupError, LookupOutcome};

use super::common::{apply_provider_args, load_config, runtime, ProviderType};
use crate::error::CliError;

/// Arguments for `revgeo serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address (default from config, PORT env overrides the port)
    #[arg(long)]
    pub bind: Option<String>,

    /// Keep the cache in memory only; nothing is written to the backend
    #[arg(long)]
    pub no_persist: bool,

    /// Provider override
    #[arg(long, value_enum)]
    pub provider: Option<ProviderType>,

    /// API key override (google provider)
    #[arg(long)]
    pub api_key: Option<String>,
}

/// Shared handler state.
#[derive(Clone)]
pub struct ServerState {
    pub coordinator: Arc<LookupCoordinator>,
    pub cache: Arc<CacheStore>,
}

/// Query string of `/address`. Raw strings so malformed values get our
/// own 400 message.
#[derive(Debug, Default, Deserialize)]
pub struct AddressQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
}

/// Run the serve command.
pub fn run(
    args: ServeArgs,
    config_path: Option<&Path>,
    log_dir: Option<PathBuf>,
) -> Result<(), CliError> {
    let mut config = load_config(config_path)?;
    apply_provider_args(&mut config, args.provider, args.api_key);

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .map_err(|_| CliError::Config(format!("invalid bind address '{}'", bind)))?;

    let mut app_config = AppConfig::from_config_file(&config)?;
    if args.no_persist {
        app_config = app_config.without_persistence();
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    let _logging_guard =
        init_logging(&log_dir, default_log_file()).map_err(CliError::LoggingInit)?;

    print_banner(&app_config, addr, &log_dir);

    let rt = runtime()?;
    rt.block_on(serve(app_config, addr))
}

async fn serve(app_config: AppConfig, addr: SocketAddr) -> Result<(), CliError> {
    let app = GeocodeApp::start(app_config).await?;
    let state = ServerState {
        coordinator: app.coordinator(),
        cache: app.cache(),
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => return Err(abort_startup(app, e).await),
    };
    info!(address = %addr, "Server listening");

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let stats = app.cache().stats();
    let flushed = app.shutdown().await;

    println!();
    println!("Session summary:");
    println!("  {}", stats);
    match &flushed {
        Ok(outcome) => println!("  Final flush: {}", outcome),
        Err(e) => println!("  Final flush failed: {}", e),
    }

    served.map_err(CliError::Serve)?;
    flushed?;
    Ok(())
}

/// Shuts the app down after a failed bind. The bind error is the one
/// reported; a failed final flush is only logged.
async fn abort_startup(app: GeocodeApp, error: std::io::Error) -> CliError {
    if let Err(flush_error) = app.shutdown().await {
        warn!(error = %flush_error, "Final flush after failed bind did not complete");
    }
    CliError::Serve(error)
}

/// Builds the router; handlers only depend on [`ServerState`].
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/address", get(address))
        .route("/all-cache", get(all_cache))
        .with_state(state)
}

pub async fn health() -> String {
    format!(
        "revgeo {} is running. Try /address?lat=10.9197&lng=106.7353",
        revgeo::VERSION
    )
}

pub async fn address(
    State(state): State<ServerState>,
    Query(query): Query<AddressQuery>,
) -> Response {
    let outcome = state
        .coordinator
        .resolve_query(query.lat.as_deref(), query.lng.as_deref())
        .await;

    match outcome {
        Ok(outcome) => (StatusCode::OK, Json(outcome_body(&outcome))).into_response(),
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                warn!(error = %e, lat = ?query.lat, lng = ?query.lng, "Address lookup failed");
            }
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

pub async fn all_cache(State(state): State<ServerState>) -> Json<Value> {
    Json(json!(state.cache.snapshot()))
}

/// `{"source": ..., <result fields>}`
fn outcome_body(outcome: &LookupOutcome) -> Value {
    let mut body = match serde_json::to_value(outcome.result.as_ref()) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    body.insert("source".to_string(), json!(outcome.source.as_str()));
    Value::Object(body)
}

fn error_status(error: &LookupError) -> StatusCode {
    match error {
        LookupError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        LookupError::ProviderUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LookupError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    println!();
    println!("Received shutdown signal, flushing cache...");
    info!("Shutdown signal received");
}

fn print_banner(config: &AppConfig, addr: SocketAddr, log_dir: &Path) {
    println!("revgeo {}", revgeo::VERSION);
    println!("========================================");
    println!();
    println!("Provider:      {}", config.provider.name());
    println!(
        "Rate limit:    {} ms between calls",
        config.limiter.min_spacing.as_millis()
    );
    println!("Cache backend: {}", config.backend.name());
    println!("Flush every:   {}s", config.flush_interval.as_secs());
    println!("Lookup limit:  {}s", config.lookup.timeout.as_secs());
    println!("Logs:          {}", log_dir.display());
    println!();
    println!("Listening on http://{}", addr);
    println!("Press Ctrl+C to stop.");
    println!();
}
