//! Mapping between [`JobSnapshot`] and generic store records.
//!
//! One job is one record in [`JOB_CATEGORY`] whose slug is the public job id
//! and whose title is the job name. Every job field is mirrored as a string
//! attribute; structured fields are stored as JSON text.

use std::collections::BTreeMap;

use jobcast_store::{format_timestamp, parse_timestamp, NewRecord, RecordQuery, StoredRecord};
use serde_json::{Map, Value};

use crate::error::JobError;
use crate::types::{JobFilter, JobSnapshot, JobStatus};

/// Category marker of job records.
pub const JOB_CATEGORY: &str = "background_job";

pub mod keys {
    pub const JOB_ID: &str = "job_id";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const TYPE: &str = "type";
    pub const SOURCE: &str = "source";
    pub const STATUS: &str = "status";
    pub const PROGRESS: &str = "progress";
    pub const METADATA: &str = "metadata";
    pub const RESULT: &str = "result";
    pub const ERROR_MESSAGE: &str = "error_message";
    pub const ICON_SVG: &str = "icon_svg";
    pub const STARTED_AT: &str = "started_at";
    pub const COMPLETED_AT: &str = "completed_at";
}

/// Attribute map for a snapshot. Unset optional fields produce no entry.
pub fn to_attributes(job: &JobSnapshot) -> Result<BTreeMap<String, String>, JobError> {
    let mut attrs = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        attrs.insert(key.to_owned(), value);
    };

    put(keys::JOB_ID, job.job_id.clone());
    put(keys::NAME, job.name.clone());
    put(keys::TYPE, job.job_type.clone());
    put(keys::SOURCE, job.source.clone());
    put(keys::STATUS, job.status.as_str().to_owned());
    put(keys::PROGRESS, job.progress.to_string());
    put(keys::METADATA, serde_json::to_string(&job.metadata)?);

    if let Some(description) = &job.description {
        put(keys::DESCRIPTION, description.clone());
    }
    if let Some(svg) = &job.icon_svg {
        put(keys::ICON_SVG, svg.clone());
    }
    if let Some(result) = &job.result {
        put(keys::RESULT, serde_json::to_string(result)?);
    }
    if let Some(message) = &job.error_message {
        put(keys::ERROR_MESSAGE, message.clone());
    }
    if let Some(ts) = &job.started_at {
        put(keys::STARTED_AT, format_timestamp(ts));
    }
    if let Some(ts) = &job.completed_at {
        put(keys::COMPLETED_AT, format_timestamp(ts));
    }

    Ok(attrs)
}

/// Record to create for a brand new job.
pub fn to_new_record(job: &JobSnapshot) -> Result<NewRecord, JobError> {
    let mut record = NewRecord::new(JOB_CATEGORY, &job.job_id, &job.name)
        .with_owner(job.created_by.clone())
        .with_created_at(job.created_at);
    record.attributes = to_attributes(job)?;
    Ok(record)
}

/// Attributes whose value differs between two snapshots of the same job.
pub fn changed_attributes(
    before: &JobSnapshot,
    after: &JobSnapshot,
) -> Result<Vec<(String, String)>, JobError> {
    let old = to_attributes(before)?;
    Ok(to_attributes(after)?
        .into_iter()
        .filter(|(key, value)| old.get(key) != Some(value))
        .collect())
}

/// Rebuild a snapshot from a stored record.
pub fn from_record(record: &StoredRecord) -> Result<JobSnapshot, JobError> {
    let corrupt = |reason: String| JobError::CorruptRecord {
        record_id: record.id,
        reason,
    };
    let required = |key: &str| {
        record
            .attribute(key)
            .map(str::to_owned)
            .ok_or_else(|| corrupt(format!("missing attribute `{key}`")))
    };
    let timestamp = |key: &str| {
        record
            .attribute(key)
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| corrupt(format!("{key}: {e}")))
    };

    let status: JobStatus = required(keys::STATUS)?
        .parse()
        .map_err(|e: JobError| corrupt(e.to_string()))?;
    let progress = required(keys::PROGRESS)?
        .parse::<u8>()
        .map_err(|e| corrupt(format!("progress: {e}")))?;
    let metadata = match record.attribute(keys::METADATA) {
        Some(raw) => serde_json::from_str::<Map<String, Value>>(raw)
            .map_err(|e| corrupt(format!("metadata: {e}")))?,
        None => Map::new(),
    };
    let result = record
        .attribute(keys::RESULT)
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|e| corrupt(format!("result: {e}")))?;

    Ok(JobSnapshot {
        job_id: record
            .attribute(keys::JOB_ID)
            .unwrap_or(record.slug.as_str())
            .to_owned(),
        internal_id: record.id,
        name: record
            .attribute(keys::NAME)
            .unwrap_or(record.title.as_str())
            .to_owned(),
        description: record.attribute(keys::DESCRIPTION).map(str::to_owned),
        job_type: required(keys::TYPE)?,
        source: required(keys::SOURCE)?,
        status,
        progress,
        metadata,
        icon_svg: record.attribute(keys::ICON_SVG).map(str::to_owned),
        created_at: record.created_at,
        started_at: timestamp(keys::STARTED_AT)?,
        completed_at: timestamp(keys::COMPLETED_AT)?,
        result,
        error_message: record.attribute(keys::ERROR_MESSAGE).map(str::to_owned),
        created_by: record.owner_id.clone(),
    })
}

/// Store query matching a job filter.
pub fn to_query(filter: &JobFilter) -> RecordQuery {
    let mut query = RecordQuery::in_category(JOB_CATEGORY)
        .limit(filter.limit)
        .offset(filter.offset);
    if let Some(status) = filter.status {
        query = query.where_eq(keys::STATUS, status.as_str());
    }
    if let Some(job_type) = &filter.job_type {
        query = query.where_eq(keys::TYPE, job_type);
    }
    if let Some(source) = &filter.source {
        query = query.where_eq(keys::SOURCE, source);
    }
    query
}

/// Store query locating one job by its public id.
pub fn by_job_id(job_id: &str) -> RecordQuery {
    RecordQuery::in_category(JOB_CATEGORY)
        .where_eq(keys::JOB_ID, job_id)
        .limit(Some(1))
}
