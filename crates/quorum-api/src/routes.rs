//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use quorum_core::{QuorumConfig, QuorumError};

use crate::handlers;
use crate::state::AppState;

/// Body limit for everything except document uploads.
const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let upload_limit = state.config.server.max_upload_bytes;

    let rag_routes = Router::new()
        .route("/ask", post(handlers::ask))
        .route("/upload/text", post(handlers::upload_text))
        .route(
            "/upload/document",
            post(handlers::upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/clear-memory", post(handlers::clear_memory))
        .route("/collection/info", get(handlers::collection_info))
        .route("/sources/{conversation_id}", get(handlers::list_sources))
        .route(
            "/sources/{conversation_id}/{*source}",
            delete(handlers::delete_source),
        );

    let call_routes = Router::new()
        .route("/teams/join", post(handlers::teams_join))
        .route("/teams/leave", post(handlers::teams_leave))
        .route("/teams/callback", post(handlers::teams_callback))
        .route("/teams/status", get(handlers::teams_status))
        .route("/teams/calls/{id}", get(handlers::call_info))
        .route("/teams/calls/{id}/events", get(handlers::call_events));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(rag_routes)
        .merge(call_routes)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured host and port.
pub async fn start_server(config: &QuorumConfig, state: AppState) -> Result<(), QuorumError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| QuorumError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| QuorumError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
