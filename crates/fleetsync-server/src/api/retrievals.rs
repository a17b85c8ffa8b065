use axum::{
    extract::{Path, State},
    Extension, Json,
};
use fleetsync_core::{DataKind, RetrievalRecord};

use crate::middleware::RequestId;

use super::{map_sync_error, ApiError, ApiResponse, AppState, ResponseMeta};

pub(super) async fn latest_retrieval(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(kind): Path<String>,
) -> Result<Json<ApiResponse<RetrievalRecord>>, ApiError> {
    let kind: DataKind = kind
        .parse()
        .map_err(|e: fleetsync_core::ParseDataKindError| {
            ApiError::new(req_id.0.clone(), "validation_error", e.to_string())
        })?;

    let record = state
        .service
        .latest_retrieval(kind)
        .await
        .map_err(|e| map_sync_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("no retrieval recorded for {kind}"),
            )
        })?;

    Ok(Json(ApiResponse {
        data: record,
        meta: ResponseMeta::new(req_id.0),
    }))
}
