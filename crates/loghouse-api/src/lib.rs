//! Loghouse REST API
//!
//! HTTP/JSON edge for the log pipeline: event ingestion, filtered queries,
//! grouped aggregation, and single-record reads, all scoped per project.
//!
//! Ingestion authenticates with the project API key (`X-API-KEY` header);
//! read endpoints authenticate with a session bearer token and a per-project
//! access grant, both resolved through the account subsystem's
//! [`loghouse_store::AccessControl`] boundary.

use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};
use loghouse_client::Publisher;
use loghouse_query::{Aggregator, QueryFederator};
use loghouse_store::AccessControl;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;

/// Upper bound on request handling; bounds every store call a handler makes.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

pub mod error;
pub mod handlers;
pub mod models;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub access: Arc<dyn AccessControl>,
    pub publisher: Arc<Publisher>,
    pub federator: Arc<QueryFederator>,
    pub aggregator: Arc<Aggregator>,
}

/// Create the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/projects/:project_id/logs",
            get(handlers::logs::query_logs).post(handlers::logs::ingest_log),
        )
        .route(
            "/projects/:project_id/logs/aggregate",
            get(handlers::logs::aggregate_logs),
        )
        .route(
            "/projects/:project_id/logs/:log_id",
            get(handlers::logs::get_log),
        )
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health::health_check))
        .with_state(state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
}

/// Start the API server.
pub async fn serve(router: Router, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("REST API server listening on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}

/// OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::logs::ingest_log,
        handlers::logs::query_logs,
        handlers::logs::aggregate_logs,
        handlers::logs::get_log,
        handlers::health::health_check,
    ),
    components(schemas(
        models::IngestResponse,
        models::ErrorResponse,
        models::HealthResponse,
    )),
    tags(
        (name = "logs", description = "Log ingestion and querying"),
        (name = "health", description = "Health checks"),
    ),
    info(
        title = "Loghouse API",
        version = "0.1.0",
        description = "REST API for Loghouse - multi-tenant event log pipeline"
    )
)]
pub struct ApiDoc;
