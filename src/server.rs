//! # Server Configuration
//!
//! Router assembly, shared state and the serve loop.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::handlers;
use crate::outbound::{HttpOutboundClient, OutboundClient};
use crate::relay::{HandlerRegistry, Relay, RelayContext, TemplateMap};
use crate::repositories::DocumentRepository;
use crate::webhook_verification::webhook_verification_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub outbound: Arc<dyn OutboundClient>,
    pub relay: Arc<Relay>,
}

impl AppState {
    /// Wires the standard handler registry over the given collaborators.
    pub fn new(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        outbound: Arc<dyn OutboundClient>,
    ) -> Self {
        let context = RelayContext {
            outbound: outbound.clone(),
            documents: Arc::new(DocumentRepository::new(Arc::new(db.clone()))),
            templates: TemplateMap::from(&config.docuseal.templates),
        };
        let relay = Relay::new(HandlerRegistry::standard(), context);

        Self {
            config,
            db,
            outbound,
            relay: Arc::new(relay),
        }
    }

    pub fn documents(&self) -> DocumentRepository {
        DocumentRepository::new(Arc::new(self.db.clone()))
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let webhooks = Router::new()
        .route(
            "/api/webhooks/docuseal",
            post(handlers::webhooks::docuseal_webhook),
        )
        .route("/api/webhooks/n8n", post(handlers::webhooks::n8n_webhook))
        .route_layer(middleware::from_fn_with_state(
            state.config.clone(),
            webhook_verification_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(
            "/api/documents",
            post(handlers::documents::create_document),
        )
        .route(
            "/api/documents/{id}",
            get(handlers::documents::get_document),
        )
        .merge(webhooks)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

/// Serves the API until `shutdown` is cancelled. In-flight requests finish
/// before this returns.
pub async fn run_server(
    config: Arc<AppConfig>,
    db: DatabaseConnection,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let outbound: Arc<dyn OutboundClient> =
        Arc::new(HttpOutboundClient::new(&config).context("Failed to build outbound client")?);
    let state = AppState::new(config.clone(), db, outbound);
    let app = create_app(state);

    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid server address: {}", config.api_bind_addr))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::documents::create_document,
        crate::handlers::documents::get_document,
        crate::handlers::webhooks::docuseal_webhook,
        crate::handlers::webhooks::n8n_webhook,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::FormType,
            crate::models::DocumentStatus,
            crate::error::ApiError,
            crate::error::ProviderError,
            crate::events::WebhookEnvelope,
            crate::handlers::HealthResponse,
            crate::handlers::documents::CreateDocumentRequest,
            crate::handlers::documents::DocumentResponse,
            crate::handlers::webhooks::WebhookResponse,
        )
    ),
    tags(
        (name = "root", description = "Service metadata"),
        (name = "documents", description = "Portal form submissions"),
        (name = "webhooks", description = "Inbound platform events"),
    ),
    info(
        title = "Healthcare Forms Relay API",
        description = "Form intake and DocuSeal / n8n webhook relay",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
