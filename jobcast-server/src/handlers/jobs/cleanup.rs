use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::Json;
use serde_json::{json, Value};

use crate::{error::ApiError, state::AppState};

/// POST /jobs/cleanup
/// Delete finished jobs older than `daysOld` days (default: configured retention).
pub async fn cleanup_jobs(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let days_old = match params.get("daysOld") {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ApiError::bad_request("daysOld must be a non-negative integer"))?,
        None => state.jobs.retention_days,
    };

    let deleted = state.registry.cleanup_old_jobs(days_old).await?;

    Ok(Json(json!({ "deleted": deleted, "daysOld": days_old })))
}
