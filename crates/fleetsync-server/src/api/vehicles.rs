use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use fleetsync_core::Vehicle;

use crate::middleware::RequestId;

use super::{
    contains_ci, map_sync_error, paginate, required_term, ApiError, ApiResponse, AppState,
    PageParams, RefreshData, ResponseMeta, SearchParams, SearchResults,
};

pub(super) async fn list_vehicles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<Vec<Vehicle>>>, ApiError> {
    let vehicles = state
        .service
        .current_vehicles()
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: paginate(vehicles, params.page(), params.size()),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn search_vehicles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchResults<Vehicle>>>, ApiError> {
    let term = required_term(&req_id.0, params.term.as_deref())?;
    let vehicles = state
        .service
        .current_vehicles()
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?;

    let needle = term.to_lowercase();
    let matches = vehicles
        .into_iter()
        .filter(|v| matches_vehicle(v, &needle))
        .collect();

    Ok(Json(ApiResponse {
        data: SearchResults::from_matches(matches, term, &params.paging()),
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn matches_vehicle(vehicle: &Vehicle, needle: &str) -> bool {
    [
        &vehicle.door_number,
        &vehicle.operator,
        &vehicle.facility_code,
        &vehicle.license_plate,
    ]
    .into_iter()
    .flatten()
    .any(|field| contains_ci(field, needle))
}

pub(super) async fn get_vehicle(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(door_number): Path<String>,
) -> Result<Json<ApiResponse<Vehicle>>, ApiError> {
    let vehicle = state
        .service
        .find_vehicle_by_door_number(&door_number)
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("vehicle with door number '{door_number}' not found"),
            )
        })?;

    Ok(Json(ApiResponse {
        data: vehicle,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn refresh_vehicles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<RefreshData<Vehicle>>>, ApiError> {
    let outcome = state
        .service
        .refresh_vehicles()
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
