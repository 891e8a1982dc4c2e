mod config;
mod logging;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use chatty_api::rate_limit::RateLimits;
use chatty_api::{AppState, AppStateInner, build_router};
use chatty_gateway::PresenceRegistry;
use chatty_media::{CloudinaryStore, ContentStore, ImagePipeline, LocalStore};
use chatty_moderation::{Classifier, GeminiClassifier, ModerationGate};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logging first so configuration warnings are recorded
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".into());
    let _log_guard = logging::init(Path::new(&log_dir))?;

    let config = Config::from_env()?;

    info!(
        production = config.production,
        moderation = config.gemini_api_key.is_some(),
        cloudinary = config.cloudinary.is_some(),
        "Starting chatty"
    );

    // Init database
    let db = chatty_db::Database::open(&config.database_path)?;

    // Moderation: remote classifier when a key is present, term list otherwise
    let classifier: Option<Arc<dyn Classifier>> = match &config.gemini_api_key {
        Some(key) => Some(Arc::new(GeminiClassifier::new(
            key.clone(),
            config.gemini_model.clone(),
            config.moderation_timeout,
        )?)),
        None => {
            warn!("GEMINI_API_KEY not set, moderation runs on the local term list only");
            None
        }
    };
    let moderation = ModerationGate::new(classifier, config.moderation_timeout);

    let store: Option<Arc<dyn ContentStore>> = match &config.cloudinary {
        Some(cloudinary) => Some(Arc::new(CloudinaryStore::new(
            cloudinary.clone(),
            config.upload_timeout,
        )?)),
        None => {
            warn!("Cloudinary credentials not set");
            None
        }
    };
    // Local disk stands in for the remote store outside production only.
    let fallback: Option<Arc<dyn ContentStore>> = if config.production {
        None
    } else {
        Some(Arc::new(LocalStore::new(config.upload_dir.clone(), "/uploads")))
    };
    let images = ImagePipeline::new(moderation.clone(), store, fallback);

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        production: config.production,
        trust_proxy: config.trust_proxy,
        presence: PresenceRegistry::new(),
        moderation,
        images,
        limits: RateLimits::standard(),
    });

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid origin '{}'", o);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let app = build_router(state)
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Chatty server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
