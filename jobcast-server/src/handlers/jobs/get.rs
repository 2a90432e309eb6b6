use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use jobcast_jobs::JobSnapshot;

use crate::{error::ApiError, state::AppState};

/// GET /jobs/{job_id}
pub async fn get_job(
    Extension(state): Extension<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    state
        .registry
        .get_job(&job_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("job {job_id}")))
}
