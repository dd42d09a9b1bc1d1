use std::sync::Arc;
use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{header::HeaderName, request::Parts, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use super::{ApiError, AuthorDto};
use crate::{Comparator, Strategy, TimingReport};

/// Shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub comparator: Comparator,
}

/// The `{count}` path segment. Anything that is not a non-negative integer is
/// rejected with `400 Bad Request` before storage is touched.
pub struct CountParam(pub u32);

#[async_trait]
impl<S> FromRequestParts<S> for CountParam
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<u32>::from_request_parts(parts, state).await {
            Ok(Path(count)) => Ok(CountParam(count)),
            Err(rejection) => Err(ApiError::invalid_path(rejection.body_text())),
        }
    }
}

fn author_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/with-n-plus-one", get(with_n_plus_one))
        .route("/without-n-plus-one", get(without_n_plus_one))
        .route("/with-entity-graph", get(with_entity_graph))
        .route("/with-jpql", get(with_jpql))
        .route("/test-in-query/:count", get(test_in_query))
        .route("/test-in-query-with-fetch/:count", get(test_in_query_with_fetch))
        .route(
            "/test-in-query-with-batch-size/:count",
            get(test_in_query_with_batch_size),
        )
        .route(
            "/test-in-query-batch-processing/:count",
            get(test_in_query_batch_processing),
        )
}

/// Creates the HTTP router over the given comparator.
pub fn create_router(comparator: Comparator) -> Router {
    let state = Arc::new(AppState { comparator });
    Router::new()
        .nest("/api/authors", author_routes())
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn with_n_plus_one(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    compare(&state, Strategy::Naive, 0).await
}

async fn without_n_plus_one(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    compare(&state, Strategy::JoinFetch, 0).await
}

async fn with_entity_graph(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    compare(&state, Strategy::PrefetchGraph, 0).await
}

async fn with_jpql(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    compare(&state, Strategy::LeftJoin, 0).await
}

async fn test_in_query(
    State(state): State<Arc<AppState>>,
    CountParam(count): CountParam,
) -> Result<Response, ApiError> {
    compare(&state, Strategy::IdListNaive, count).await
}

async fn test_in_query_with_fetch(
    State(state): State<Arc<AppState>>,
    CountParam(count): CountParam,
) -> Result<Response, ApiError> {
    compare(&state, Strategy::IdListJoined, count).await
}

async fn test_in_query_with_batch_size(
    State(state): State<Arc<AppState>>,
    CountParam(count): CountParam,
) -> Result<Response, ApiError> {
    compare(&state, Strategy::IdListBatchSize, count).await
}

async fn test_in_query_batch_processing(
    State(state): State<Arc<AppState>>,
    CountParam(count): CountParam,
) -> Result<Response, ApiError> {
    compare(&state, Strategy::IdListJoinedBatched, count).await
}

async fn compare(state: &AppState, strategy: Strategy, count: u32) -> Result<Response, ApiError> {
    let comparison = state.comparator.run(strategy, count).await?;
    let authors: Vec<AuthorDto> = comparison.authors.iter().map(AuthorDto::from).collect();
    Ok((report_headers(&comparison.report), Json(authors)).into_response())
}

pub const QUERY_TIME_HEADER: &str = "x-query-time-ms";
pub const MATERIALIZATION_TIME_HEADER: &str = "x-materialization-time-ms";
pub const TOTAL_TIME_HEADER: &str = "x-total-time-ms";
pub const AUTHOR_COUNT_HEADER: &str = "x-author-count";
pub const BOOK_COUNT_HEADER: &str = "x-book-count";
pub const QUERY_COUNT_HEADER: &str = "x-query-count";

fn report_headers(report: &TimingReport) -> HeaderMap {
    let millis = |duration: Duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

    let mut headers = HeaderMap::new();
    let values = [
        (QUERY_TIME_HEADER, millis(report.query_time)),
        (MATERIALIZATION_TIME_HEADER, millis(report.materialization_time)),
        (TOTAL_TIME_HEADER, millis(report.total_time)),
        (AUTHOR_COUNT_HEADER, report.author_count as u64),
        (BOOK_COUNT_HEADER, report.book_count as u64),
        (QUERY_COUNT_HEADER, report.queries_issued as u64),
    ];
    for (name, value) in values {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }
    headers
}
