pub mod classification;
pub mod config;
pub mod conversation;
pub mod error;
pub mod logging;
pub mod persona;
pub mod provider;
pub mod routes;
mod validation;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, ModelSettings};
use crate::conversation::ConversationStore;
use crate::error::AppError;
use crate::persona::PersonaRegistry;
use crate::provider::{CohereClient, ModelProvider};

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub personas: Arc<PersonaRegistry>,
    pub conversations: ConversationStore,
    pub provider: Arc<dyn ModelProvider>,
    /// Fixed model ids for evaluation, classification and refinement.
    pub models: Arc<ModelSettings>,
}

impl AppState {
    pub fn new(
        personas: PersonaRegistry,
        provider: Arc<dyn ModelProvider>,
        models: ModelSettings,
    ) -> Self {
        Self {
            personas: Arc::new(personas),
            conversations: ConversationStore::new(),
            provider,
            models: Arc::new(models),
        }
    }
}

/// Process entry: environment, logging, runtime, server.
pub fn run() -> Result<(), AppError> {
    // Before logging so RUST_LOG from .env applies.
    let dotenv = config::load_dotenv();
    logging::init();
    match dotenv {
        Ok(Some(path)) => tracing::debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }

    tracing::info!("Starting persona-practice v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: AppConfig) -> Result<(), AppError> {
    let personas = config.load_personas()?;
    let provider = CohereClient::new(
        &config.provider.base_url,
        &config.provider.api_key,
        config.provider.timeout,
    )?;
    tracing::info!(
        personas = personas.len(),
        base_url = %config.provider.base_url,
        "Provider client ready"
    );

    let state = AppState::new(personas, Arc::new(provider), config.models.clone());
    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, shutting down");
}
