mod facilities;
mod retrievals;
mod vehicles;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use fleetsync_sync::{PassStatus, SyncError, TrackingService};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId, REQUEST_ID_HEADER};

/// Largest page the listing and search routes will return.
pub(super) const MAX_PAGE_SIZE: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TrackingService>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// `?page=&size=` query. Pages are zero-based.
#[derive(Debug, Default, Deserialize)]
pub(super) struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl PageParams {
    pub(super) fn page(&self) -> usize {
        normalize_page(self.page)
    }

    pub(super) fn size(&self) -> usize {
        normalize_page_size(self.size)
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct SearchParams {
    pub term: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl SearchParams {
    pub(super) fn paging(&self) -> PageParams {
        PageParams {
            page: self.page,
            size: self.size,
        }
    }
}

/// One page of substring-search matches.
#[derive(Debug, Serialize)]
pub(super) struct SearchResults<T: Serialize> {
    pub results: Vec<T>,
    pub count: usize,
    pub total_count: usize,
    pub page: usize,
    pub size: usize,
    pub search_term: String,
    pub has_matches: bool,
}

impl<T: Serialize> SearchResults<T> {
    pub(super) fn from_matches(matches: Vec<T>, search_term: String, paging: &PageParams) -> Self {
        let total_count = matches.len();
        let page = paging.page();
        let size = paging.size();
        let results = paginate(matches, page, size);
        Self {
            count: results.len(),
            has_matches: !results.is_empty(),
            results,
            total_count,
            page,
            size,
            search_term,
        }
    }
}

/// Body of a forced refresh: how the pass ended plus the dataset now served.
#[derive(Debug, Serialize)]
pub(super) struct RefreshData<T: Serialize> {
    #[serde(flatten)]
    pub status: PassStatus,
    pub count: usize,
    pub records: Vec<T>,
}

pub(super) fn normalize_page(page: Option<i64>) -> usize {
    usize::try_from(page.unwrap_or(0)).unwrap_or(0)
}

pub(super) fn normalize_page_size(size: Option<i64>) -> usize {
    let max = i64::try_from(MAX_PAGE_SIZE).unwrap_or(i64::MAX);
    usize::try_from(size.unwrap_or(max).clamp(1, max)).unwrap_or(MAX_PAGE_SIZE)
}

pub(super) fn paginate<T>(items: Vec<T>, page: usize, size: usize) -> Vec<T> {
    items
        .into_iter()
        .skip(page.saturating_mul(size))
        .take(size)
        .collect()
}

/// Returns the trimmed search term, or a validation error when it is missing
/// or blank.
pub(super) fn required_term(request_id: &str, term: Option<&str>) -> Result<String, ApiError> {
    match term.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(ApiError::new(
            request_id,
            "validation_error",
            "query parameter 'term' is required",
        )),
    }
}

/// Case-insensitive substring match; `needle` must already be lower-case.
pub(super) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

pub(super) fn map_sync_error(request_id: String, error: &SyncError) -> ApiError {
    tracing::error!(error = %error, "tracking service request failed");
    ApiError::new(request_id, "internal_error", "failed to read stored data")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

fn tracking_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/facilities", get(facilities::list_facilities))
        .route(
            "/api/v1/facilities/search",
            get(facilities::search_facilities),
        )
        .route(
            "/api/v1/facilities/refresh",
            post(facilities::refresh_facilities),
        )
        .route("/api/v1/facilities/{code}", get(facilities::get_facility))
        .route("/api/v1/vehicles", get(vehicles::list_vehicles))
        .route("/api/v1/vehicles/search", get(vehicles::search_vehicles))
        .route("/api/v1/vehicles/refresh", post(vehicles::refresh_vehicles))
        .route("/api/v1/vehicles/{door_number}", get(vehicles::get_vehicle))
        .route(
            "/api/v1/retrievals/{kind}/latest",
            get(retrievals::latest_retrieval),
        )
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .merge(tracking_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match state.service.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
