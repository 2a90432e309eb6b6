use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::Json;
use jobcast_jobs::JobFilter;
use serde_json::{json, Value};

use crate::handlers::utils::{non_empty, parse_positive_usize, parse_status};
use crate::{error::ApiError, state::AppState};

/// GET /jobs
/// List jobs, newest first, filtered by status, type and source.
pub async fn list_jobs(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let page = parse_positive_usize(params.get("page"), 1, "page")?;
    let per_page = parse_positive_usize(
        params.get("perPage"),
        state.jobs.default_page_size,
        "perPage",
    )?;
    if per_page > state.jobs.max_page_size {
        return Err(ApiError::bad_request(format!(
            "perPage must be at most {}",
            state.jobs.max_page_size
        )));
    }

    let mut filter = JobFilter::new()
        .limit(per_page)
        .offset((page - 1).saturating_mul(per_page));
    if let Some(status) = parse_status(&params)? {
        filter = filter.status(status);
    }
    if let Some(job_type) = non_empty(&params, "type") {
        filter = filter.job_type(job_type);
    }
    if let Some(source) = non_empty(&params, "source") {
        filter = filter.source(source);
    }

    let total = state.registry.count_jobs(&filter).await?;
    let items = state.registry.get_jobs(&filter).await?;

    Ok(Json(json!({
        "items": items,
        "pagination": {
            "page": page,
            "perPage": per_page,
            "total": total,
        }
    })))
}
