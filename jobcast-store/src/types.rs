//! Record and query types shared by every store backend.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Storage identifier of a record.
pub type RecordId = i64;

/// A record to be created, together with its initial attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub category: String,
    pub slug: String,
    pub title: String,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attributes: BTreeMap<String, String>,
}

impl NewRecord {
    #[inline]
    pub fn new(
        category: impl Into<String>,
        slug: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            slug: slug.into(),
            title: title.into(),
            owner_id: None,
            created_at: Utc::now(),
            attributes: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_owner(mut self, owner_id: Option<String>) -> Self {
        self.owner_id = owner_id;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A persisted record joined with its attribute set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub category: String,
    pub slug: String,
    pub title: String,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attributes: BTreeMap<String, String>,
}

impl StoredRecord {
    /// Look up a single attribute value.
    #[inline]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Matches records whose attribute `key` holds one of `values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub key: String,
    pub values: Vec<String>,
}

impl AttributeFilter {
    /// Returns true if the attribute map satisfies this filter.
    pub fn matches(&self, attributes: &BTreeMap<String, String>) -> bool {
        attributes
            .get(&self.key)
            .is_some_and(|v| self.values.iter().any(|candidate| candidate == v))
    }
}

/// Attribute-based filter and pagination over one record category.
///
/// All conditions are conjunctive. Results are ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub category: String,
    pub attributes: Vec<AttributeFilter>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl RecordQuery {
    pub fn in_category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            attributes: Vec::new(),
            created_before: None,
            limit: None,
            offset: 0,
        }
    }

    #[must_use]
    pub fn where_eq(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.where_in(key, vec![value.into()])
    }

    #[must_use]
    pub fn where_in(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.attributes.push(AttributeFilter {
            key: key.into(),
            values,
        });
        self
    }

    #[must_use]
    pub fn created_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.created_before = Some(cutoff);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Evaluate every condition except pagination against a record.
    pub fn matches(&self, record: &StoredRecord) -> bool {
        record.category == self.category
            && self
                .created_before
                .map_or(true, |cutoff| record.created_at < cutoff)
            && self.attributes.iter().all(|f| f.matches(&record.attributes))
    }
}

/// Fixed-width UTC timestamp so stored values sort lexicographically.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Malformed(format!("invalid timestamp `{raw}`: {e}")))
}
