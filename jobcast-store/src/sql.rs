//! SQLite-backed content store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use jobcast_db_connection::{create_pool, DbConnectionConfig, DbPool};
use sqlx::{QueryBuilder, Sqlite};

use crate::error::StoreError;
use crate::types::{format_timestamp, parse_timestamp, NewRecord, RecordId, RecordQuery, StoredRecord};
use crate::ContentStore;

/// Ids bound per statement, well under SQLite's host parameter limit.
const ID_CHUNK: usize = 500;

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: i64,
    category: String,
    slug: String,
    title: String,
    owner_id: Option<String>,
    created_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct AttributeRow {
    record_id: i64,
    key: String,
    value: String,
}

impl RecordRow {
    fn into_record(self, attributes: BTreeMap<String, String>) -> Result<StoredRecord, StoreError> {
        Ok(StoredRecord {
            id: self.id,
            category: self.category,
            slug: self.slug,
            title: self.title,
            owner_id: self.owner_id,
            created_at: parse_timestamp(&self.created_at)?,
            attributes,
        })
    }
}

/// [`ContentStore`] over the `records` / `record_attributes` tables.
#[derive(Debug, Clone)]
pub struct SqlContentStore {
    pool: DbPool,
}

impl SqlContentStore {
    /// Wrap an existing pool. The schema must already be migrated.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open a pool for `config` and bring the schema up to date.
    pub async fn connect(config: &DbConnectionConfig) -> Result<Self, StoreError> {
        let pool = create_pool(config).await?;
        jobcast_migrations::sqlite_migrator().run(&pool).await?;
        tracing::debug!("content store schema is up to date");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn load_attributes(
        &self,
        ids: &[RecordId],
    ) -> Result<HashMap<RecordId, BTreeMap<String, String>>, StoreError> {
        let mut grouped: HashMap<RecordId, BTreeMap<String, String>> = HashMap::new();

        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT record_id, key, value FROM record_attributes WHERE record_id IN (",
            );
            push_ids(&mut qb, chunk);

            let rows: Vec<AttributeRow> = qb.build_query_as().fetch_all(&self.pool).await?;
            for row in rows {
                grouped
                    .entry(row.record_id)
                    .or_default()
                    .insert(row.key, row.value);
            }
        }
        Ok(grouped)
    }
}

fn push_ids(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[RecordId]) {
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(")");
}

fn push_order_and_page<'args>(qb: &mut QueryBuilder<'args, Sqlite>, query: &'args RecordQuery) {
    qb.push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ");
    // SQLite treats a negative LIMIT as unbounded.
    qb.push_bind(query.limit.map_or(-1, |l| l as i64));
    qb.push(" OFFSET ");
    qb.push_bind(query.offset as i64);
}

/// Appends the WHERE clause shared by the select and count queries.
fn append_filters<'args>(qb: &mut QueryBuilder<'args, Sqlite>, query: &'args RecordQuery) {
    qb.push(" WHERE r.category = ");
    qb.push_bind(query.category.as_str());

    for filter in &query.attributes {
        if filter.values.is_empty() {
            qb.push(" AND 0");
            continue;
        }
        qb.push(" AND EXISTS (SELECT 1 FROM record_attributes a WHERE a.record_id = r.id AND a.key = ");
        qb.push_bind(filter.key.as_str());
        qb.push(" AND a.value IN (");
        let mut sep = qb.separated(", ");
        for value in &filter.values {
            sep.push_bind(value.as_str());
        }
        sep.push_unseparated("))");
    }

    if let Some(cutoff) = &query.created_before {
        qb.push(" AND r.created_at < ");
        qb.push_bind(format_timestamp(cutoff));
    }
}

#[async_trait]
impl ContentStore for SqlContentStore {
    async fn create_record(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO records (category, slug, title, owner_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.category)
        .bind(&record.slug)
        .bind(&record.title)
        .bind(&record.owner_id)
        .bind(format_timestamp(&record.created_at))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (key, value) in &record.attributes {
            sqlx::query("INSERT INTO record_attributes (record_id, key, value) VALUES (?, ?, ?)")
                .bind(id)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn read_record(&self, id: RecordId) -> Result<Option<StoredRecord>, StoreError> {
        let row: Option<RecordRow> = sqlx::query_as(
            "SELECT id, category, slug, title, owner_id, created_at FROM records WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let attributes = self
            .load_attributes(&[id])
            .await?
            .remove(&id)
            .unwrap_or_default();
        row.into_record(attributes).map(Some)
    }

    async fn update_attributes(
        &self,
        id: RecordId,
        attributes: &[(String, String)],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM records WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound(id));
        }

        for (key, value) in attributes {
            sqlx::query(
                "INSERT INTO record_attributes (record_id, key, value) VALUES (?, ?, ?) \
                 ON CONFLICT(record_id, key) DO UPDATE SET value = excluded.value",
            )
            .bind(id)
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_record(&self, id: RecordId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM record_attributes WHERE record_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn find_records(&self, query: &RecordQuery) -> Result<Vec<StoredRecord>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT r.id, r.category, r.slug, r.title, r.owner_id, r.created_at FROM records r",
        );
        append_filters(&mut qb, query);
        push_order_and_page(&mut qb, query);

        let rows: Vec<RecordRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let ids: Vec<RecordId> = rows.iter().map(|r| r.id).collect();
        let mut attributes = self.load_attributes(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let attrs = attributes.remove(&row.id).unwrap_or_default();
                row.into_record(attrs)
            })
            .collect()
    }

    async fn find_record_ids(&self, query: &RecordQuery) -> Result<Vec<RecordId>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT r.id FROM records r");
        append_filters(&mut qb, query);
        push_order_and_page(&mut qb, query);
        Ok(qb.build_query_scalar().fetch_all(&self.pool).await?)
    }

    async fn delete_records(&self, ids: &[RecordId]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for chunk in ids.chunks(ID_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM record_attributes WHERE record_id IN (");
            push_ids(&mut qb, chunk);
            qb.build().execute(&mut *tx).await?;

            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM records WHERE id IN (");
            push_ids(&mut qb, chunk);
            removed += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn count_records(&self, query: &RecordQuery) -> Result<u64, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM records r");
        append_filters(&mut qb, query);
        let total: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }
}
