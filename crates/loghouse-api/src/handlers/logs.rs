//! Log ingestion and read endpoints.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use loghouse_query::{parse_search_keys, LogRecord};
use loghouse_store::{EventAggregate, LogFilter, Page};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{AggregateQueryParams, IngestResponse, LogQueryParams};
use crate::AppState;

/// Resolve the session bearer token to a user id, or 401.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing session token".into()))?;

    state
        .access
        .resolve_session(token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".into()))
}

/// Require a project grant for the user, or 403.
async fn authorize(state: &AppState, user_id: &str, project_id: &str) -> Result<(), ApiError> {
    if state.access.check_access(user_id, project_id).await? {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You do not have access to this project".into(),
        ))
    }
}

fn build_filter(
    event_name: Option<String>,
    start_time: Option<i64>,
    end_time: Option<i64>,
    search_keys: Option<&str>,
) -> Result<LogFilter, ApiError> {
    let search_keys = match search_keys.filter(|s| !s.is_empty()) {
        Some(raw) => parse_search_keys(raw).map_err(ApiError::from)?,
        None => Vec::new(),
    };
    Ok(LogFilter {
        event_name: event_name.filter(|s| !s.is_empty()),
        start_time,
        end_time,
        search_keys,
    })
}

/// Ingest one log event for a project.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/logs",
    params(("project_id" = String, Path, description = "Project id")),
    responses(
        (status = 202, description = "Event accepted", body = IngestResponse),
        (status = 400, description = "Empty or invalid body"),
        (status = 401, description = "Invalid API key"),
        (status = 500, description = "Publish failure")
    ),
    tag = "logs"
)]
pub async fn ingest_log(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    state.publisher.publish(&project_id, api_key, &body).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            status: "log accepted".to_string(),
        }),
    ))
}

/// Query a project's logs with filters and pagination.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/logs",
    params(
        ("project_id" = String, Path, description = "Project id"),
        LogQueryParams
    ),
    responses(
        (status = 200, description = "Ordered matching records; payload may be absent per record"),
        (status = 400, description = "Malformed search_keys"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "No access to this project")
    ),
    tag = "logs"
)]
pub async fn query_logs(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<Vec<LogRecord>>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    authorize(&state, &user_id, &project_id).await?;

    let filter = build_filter(
        params.event_name,
        params.start_time,
        params.end_time,
        params.search_keys.as_deref(),
    )?;
    let page = Page::new(
        params.limit.unwrap_or(Page::DEFAULT_LIMIT),
        params.offset.unwrap_or(0),
    );

    let records = state.federator.query_logs(&project_id, &filter, page).await?;
    Ok(Json(records))
}

/// Grouped per-event-name counts for a project.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/logs/aggregate",
    params(
        ("project_id" = String, Path, description = "Project id"),
        AggregateQueryParams
    ),
    responses(
        (status = 200, description = "Per-event-name totals with last-seen timestamps"),
        (status = 400, description = "Malformed search_keys"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "No access to this project")
    ),
    tag = "logs"
)]
pub async fn aggregate_logs(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<AggregateQueryParams>,
) -> Result<Json<Vec<EventAggregate>>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    authorize(&state, &user_id, &project_id).await?;

    let filter = build_filter(
        params.event_name,
        params.start_time,
        params.end_time,
        params.search_keys.as_deref(),
    )?;

    let aggregates = state.aggregator.aggregate_logs(&project_id, &filter).await?;
    Ok(Json(aggregates))
}

/// Fetch one record, payload included, by record id.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/logs/{log_id}",
    params(
        ("project_id" = String, Path, description = "Project id"),
        ("log_id" = String, Path, description = "Record id")
    ),
    responses(
        (status = 200, description = "Full record including payload"),
        (status = 400, description = "Malformed record id"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "No access to this project"),
        (status = 404, description = "No payload row for this id")
    ),
    tag = "logs"
)]
pub async fn get_log(
    State(state): State<AppState>,
    Path((project_id, log_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<LogRecord>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    authorize(&state, &user_id, &project_id).await?;

    let record_id = Uuid::parse_str(&log_id)
        .map_err(|_| ApiError::BadRequest(format!("invalid record id: {log_id}")))?;

    let record = state.federator.get_log(&project_id, record_id).await?;
    Ok(Json(record))
}
