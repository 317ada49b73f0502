use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use dispatch::Dispatcher;
use engine::{HttpEngine, QueryEngine};

mod api;
mod config;
mod dispatch;
mod engine;
mod health;

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(name = "prism-hub", version, about = "PRISM query hub")]
struct Args {
    /// Path to config file
    #[arg(long, default_value = "prism-hub.toml")]
    config: PathBuf,

    /// Server bind address
    #[arg(long, default_value = "127.0.0.1:3100")]
    bind: String,
}

// =============================================================================
// Application State
// =============================================================================

struct AppState {
    config: Config,
    engine: Arc<dyn QueryEngine>,
    dispatcher: Dispatcher,
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/query", post(api::query_data))
        .route("/api/health", get(api::check_health))
        .route("/api/resources/schema-lookup", get(api::schema_lookup))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "prism_hub=info,prism_core=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config {:?}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let engine: Arc<dyn QueryEngine> = match HttpEngine::new(config.engine.clone()) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            tracing::error!("Failed to build engine client: {}", e);
            std::process::exit(1);
        }
    };
    if config.engine.access_token().is_none() {
        tracing::warn!(
            "no access token configured, set engine.access_token or {}",
            config::TOKEN_ENV
        );
    }

    let dispatcher = Dispatcher::new(Arc::clone(&engine), config.dispatch.concurrency);
    let concurrency = dispatcher.concurrency();
    let query_endpoint = format!("{:?}", config.engine.query_endpoint());

    let state = Arc::new(AppState {
        config,
        engine,
        dispatcher,
    });
    let app = router(state);

    let addr: SocketAddr = match args.bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid bind address {}: {}", args.bind, e);
            std::process::exit(1);
        }
    };
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("  PRISM hub v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("  API:         http://{}/api/query", addr);
    tracing::info!("  Engine:      {}", query_endpoint);
    tracing::info!("  Concurrency: {}", concurrency);
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
