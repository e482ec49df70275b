mod config;
mod cookies;
mod error;
mod ingest;
mod oauth;
mod pages;
mod routes;
mod session;
mod spotify;
mod storage;

use config::Config;
use ingest::Ingestor;
use oauth::AuthClient;
use routes::AppState;
use session::MemorySessionStore;
use spotify::SpotifyClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotdate=info,tower_http=info".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if !config.cookie.secure {
        warn!("COOKIE_SECURE=false - session cookies will be sent over plain HTTP");
    }

    // One pooled client for every upstream call, each bounded by the timeout
    let http = match config::http_client(config.http_timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let sessions = Arc::new(MemorySessionStore::new(config.cookie.session_ttl()));
    session::spawn_sweeper(sessions.clone(), Duration::from_secs(300)); // Every 5 minutes

    let blob_store = storage::from_config(&config.storage, http.clone());
    match &config.storage {
        config::StorageConfig::Gcs { bucket, endpoint, .. } => info!(
            "Persisting listening data to bucket {} ({})",
            bucket,
            endpoint.as_deref().unwrap_or("production")
        ),
        config::StorageConfig::Local { root } => {
            info!("Persisting listening data under {}/", root)
        }
    }

    let spotify = SpotifyClient::new(config.oauth.api_url.clone(), http.clone());
    let state = AppState {
        auth: Arc::new(AuthClient::new(config.oauth.clone(), http)),
        spotify: spotify.clone(),
        sessions,
        ingestor: Ingestor::new(spotify, blob_store),
        cookie: config.cookie.clone(),
    };

    let app = routes::router(state);

    // Start server
    let addr = format!("{}:{}", config.bind_addr, config.port);
    info!("Starting server on {}", addr);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
