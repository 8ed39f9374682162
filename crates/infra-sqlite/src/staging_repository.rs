// SQLite StagingRepository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serpwatch_core::domain::{SerpContent, StagingRecord, StagingStatus, StoredStagingRecord};
use serpwatch_core::error::{AppError, Result};
use serpwatch_core::port::StagingRepository;
use sqlx::SqlitePool;
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    // UNIQUE / PRIMARY KEY constraint failed
                    "2067" | "1555" => AppError::Conflict(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    // CHECK constraint failed
                    "275" => AppError::Validation(format!(
                        "Check constraint violation: {}",
                        db_err.message()
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteStagingRepository {
    pool: SqlitePool,
}

impl SqliteStagingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record the downstream outcome for a row (normally done by the
    /// datastore's own post-processing)
    pub async fn mark_status(
        &self,
        external_job_id: &str,
        status: StagingStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE staging_serp_results SET status = ?, error_message = ? WHERE external_job_id = ?",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(external_job_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StagingRepository for SqliteStagingRepository {
    async fn find_by_external_id(
        &self,
        external_job_id: &str,
    ) -> Result<Option<StoredStagingRecord>> {
        let row = sqlx::query_as::<_, StagingRow>(
            "SELECT * FROM staging_serp_results WHERE external_job_id = ?",
        )
        .bind(external_job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(StagingRow::into_stored).transpose()
    }

    async fn insert(&self, record: &StagingRecord) -> Result<i64> {
        let content = serde_json::to_string(&record.content)?;

        let result = sqlx::query(
            r#"
            INSERT INTO staging_serp_results (
                external_job_id, query, location, timestamp, content, status, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.external_job_id)
        .bind(&record.query)
        .bind(&record.location)
        .bind(record.timestamp.to_rfc3339())
        .bind(content)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let id = result.last_insert_rowid();
        debug!(job_id = %record.external_job_id, staging_id = %id, "Staging row inserted");
        Ok(id)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct StagingRow {
    id: i64,
    external_job_id: String,
    query: String,
    location: String,
    timestamp: String,
    content: String,
    status: String,
    error_message: Option<String>,
}

impl StagingRow {
    fn into_stored(self) -> Result<StoredStagingRecord> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| {
                AppError::Database(format!(
                    "bad timestamp '{}' for {}: {}",
                    self.timestamp, self.external_job_id, e
                ))
            })?
            .with_timezone(&Utc);
        let status = StagingStatus::parse(&self.status).ok_or_else(|| {
            AppError::Database(format!(
                "unknown staging status '{}' for {}",
                self.status, self.external_job_id
            ))
        })?;
        let content: SerpContent = serde_json::from_str(&self.content)?;

        Ok(StoredStagingRecord {
            id: self.id,
            record: StagingRecord {
                external_job_id: self.external_job_id,
                query: self.query,
                location: self.location,
                timestamp,
                content,
                status,
                error_message: self.error_message,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use chrono::TimeZone;
    use serpwatch_core::application::{InsertOutcome, StagingDeduplicator};
    use serpwatch_core::domain::PaidListing;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    async fn setup_repo() -> SqliteStagingRepository {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteStagingRepository::new(pool)
    }

    fn record(id: &str) -> StagingRecord {
        StagingRecord {
            external_job_id: id.to_string(),
            query: "plumbers near me".to_string(),
            location: "Boston, MA".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            content: SerpContent {
                url: "https://www.google.com/search?q=plumbers".to_string(),
                page: 1,
                total_results: 10,
                paid: vec![PaidListing {
                    pos: 1,
                    url: "https://a.example".to_string(),
                    ..PaidListing::default()
                }],
                organic: vec![],
            },
            status: StagingStatus::Pending,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = setup_repo().await;

        let id = assert_ok!(repo.insert(&record("j1")).await);
        let found = assert_ok!(repo.find_by_external_id("j1").await).unwrap();

        assert_eq!(found.id, id);
        assert_eq!(found.record, record("j1"));
        assert!(repo.find_by_external_id("j2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_violation_is_conflict() {
        let repo = setup_repo().await;
        repo.insert(&record("j1")).await.unwrap();

        let err = assert_err!(repo.insert(&record("j1")).await);
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_mark_status() {
        let repo = setup_repo().await;
        repo.insert(&record("j1")).await.unwrap();

        assert!(repo
            .mark_status("j1", StagingStatus::Error, Some("trigger failed"))
            .await
            .unwrap());
        assert!(!repo
            .mark_status("missing", StagingStatus::Processed, None)
            .await
            .unwrap());

        let found = repo.find_by_external_id("j1").await.unwrap().unwrap();
        assert_eq!(found.record.status, StagingStatus::Error);
        assert_eq!(found.record.error_message.as_deref(), Some("trigger failed"));
    }

    #[tokio::test]
    async fn test_deduplicator_over_sqlite() {
        let repo = Arc::new(setup_repo().await);
        let dedup = StagingDeduplicator::new(repo.clone());

        let first = dedup.insert(&record("j1")).await.unwrap();
        let second = dedup.insert(&record("j1")).await.unwrap();

        assert!(matches!(first, InsertOutcome::Inserted { .. }));
        match second {
            InsertOutcome::Duplicate { existing } => assert_eq!(existing.record, record("j1")),
            other => panic!("expected duplicate, got {:?}", other),
        }

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM staging_serp_results")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
