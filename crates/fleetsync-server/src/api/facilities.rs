use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use fleetsync_core::Facility;

use crate::middleware::RequestId;

use super::{
    contains_ci, map_sync_error, paginate, required_term, ApiError, ApiResponse, AppState,
    PageParams, RefreshData, ResponseMeta, SearchParams, SearchResults,
};

pub(super) async fn list_facilities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<Facility>>>, ApiError> {
    let facilities = state
        .service
        .current_facilities()
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: paginate(facilities, params.page(), params.size()),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn search_facilities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchResults<Facility>>>, ApiError> {
    let term = required_term(&req_id.0, params.term.as_deref())?;
    let facilities = state
        .service
        .current_facilities()
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    let needle = term.to_lowercase();
    let matches = facilities
        .into_iter()
        .filter(|f| matches_facility(f, &needle))
        .collect();

    Ok(Json(ApiResponse {
        data: SearchResults::from_matches(matches, term, &params.paging()),
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn matches_facility(facility: &Facility, needle: &str) -> bool {
    facility.id.to_string().contains(needle)
        || contains_ci(&facility.name, needle)
        || contains_ci(&facility.code, needle)
}

pub(super) async fn get_facility(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<Facility>>, ApiError> {
    let facility = state
        .service
        .find_facility_by_code(&code)
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("facility '{code}' not found"),
            )
        })?;

    Ok(Json(ApiResponse {
        data: facility,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn refresh_facilities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<RefreshData<Facility>>>, ApiError> {
    let outcome = state
        .service
        .refresh_facilities()
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: RefreshData {
            status: outcome.status,
            count: outcome.records.len(),
            records: outcome.records,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
