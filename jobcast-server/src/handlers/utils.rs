use std::collections::HashMap;

use axum::http::HeaderMap;
use jobcast_jobs::{JobStatus, ObserverIdentity};

use crate::error::ApiError;

/// Header carrying the authenticated user id, set by the upstream gateway.
pub const AUTH_USER_HEADER: &str = "x-auth-user";
/// Comma separated capability list granted to that user.
pub const AUTH_CAPABILITIES_HEADER: &str = "x-auth-capabilities";

pub fn parse_positive_usize(
    raw: Option<&String>,
    fallback: usize,
    field: &str,
) -> Result<usize, ApiError> {
    match raw {
        Some(value) => {
            let parsed = value.trim().parse::<usize>().map_err(|_| {
                ApiError::bad_request(format!("{field} must be a positive integer"))
            })?;
            if parsed == 0 {
                return Err(ApiError::bad_request(format!("{field} must be at least 1")));
            }
            Ok(parsed)
        }
        None => Ok(fallback),
    }
}

pub fn parse_status(params: &HashMap<String, String>) -> Result<Option<JobStatus>, ApiError> {
    params
        .get("status")
        .map(|raw| {
            raw.parse::<JobStatus>()
                .map_err(|_| ApiError::bad_request(format!("unknown status: {raw}")))
        })
        .transpose()
}

/// Non-empty query parameter value.
pub fn non_empty<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Observer identity established upstream. No user header means anonymous.
pub fn observer_identity(headers: &HeaderMap) -> ObserverIdentity {
    let user = headers
        .get(AUTH_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let Some(user) = user else {
        return ObserverIdentity::anonymous();
    };

    let capabilities = headers
        .get(AUTH_CAPABILITIES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    ObserverIdentity::user(user, capabilities)
}
