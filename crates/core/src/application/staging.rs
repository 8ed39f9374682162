// Staging deduplication: idempotent ingestion keyed by the provider job id
use crate::domain::{
    RequestParams, SerpContent, StagingRecord, StagingStatus, StoredStagingRecord,
};
use crate::error::{AppError, Result};
use crate::port::StagingRepository;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ExistingCheck {
    pub exists: bool,
    pub record: Option<StoredStagingRecord>,
}

/// Outcome of a staging insert. `Duplicate` is success-shaped.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted { id: i64 },
    Duplicate { existing: StoredStagingRecord },
    Rejected { reason: String },
}

impl InsertOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, InsertOutcome::Rejected { .. })
    }

    pub fn staging_id(&self) -> Option<i64> {
        match self {
            InsertOutcome::Inserted { id } => Some(*id),
            InsertOutcome::Duplicate { existing } => Some(existing.id),
            InsertOutcome::Rejected { .. } => None,
        }
    }
}

/// Required identifying fields must be non-blank. Timestamp and content are
/// typed fields on the record and always present once it is built.
pub fn validate(record: &StagingRecord) -> Result<()> {
    for (field, value) in [
        ("job_id", &record.external_job_id),
        ("query", &record.query),
        ("location", &record.location),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "staging record is missing required field '{}'",
                field
            )));
        }
    }
    Ok(())
}

/// Project a raw provider payload onto a staging record.
///
/// Pure: no I/O. Missing identifiers or a missing `content` object are a
/// validation error.
pub fn map_to_normalized_form(raw: &Value, params: &RequestParams) -> Result<StagingRecord> {
    let first = raw
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .ok_or_else(|| {
            AppError::Validation(format!(
                "payload for {} has no results entry",
                params.job_id
            ))
        })?;

    let content = first
        .get("content")
        .filter(|c| c.is_object())
        .ok_or_else(|| {
            AppError::Validation(format!(
                "payload for {} has no content object",
                params.job_id
            ))
        })?;

    let timestamp = first
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(parse_created_at)
        .unwrap_or(params.timestamp);

    let record = StagingRecord {
        external_job_id: params.job_id.clone(),
        query: params.query.clone(),
        location: params.location.clone(),
        timestamp,
        content: SerpContent::project(content),
        status: StagingStatus::Pending,
        error_message: None,
    };
    validate(&record)?;
    Ok(record)
}

/// Provider timestamps come as RFC 3339 or as a naive `YYYY-MM-DD HH:MM:SS`
fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub struct StagingDeduplicator {
    repo: Arc<dyn StagingRepository>,
}

impl StagingDeduplicator {
    pub fn new(repo: Arc<dyn StagingRepository>) -> Self {
        Self { repo }
    }

    pub async fn check_existing(&self, external_job_id: &str) -> Result<ExistingCheck> {
        let record = self.repo.find_by_external_id(external_job_id).await?;
        Ok(ExistingCheck {
            exists: record.is_some(),
            record,
        })
    }

    /// Insert unless a record for the same external id already exists.
    ///
    /// The store's unique constraint backs up the pre-check: a conflict on
    /// insert re-reads the stored row and reports `Duplicate`.
    pub async fn insert(&self, record: &StagingRecord) -> Result<InsertOutcome> {
        if let Err(e) = validate(record) {
            return rejected(&record.external_job_id, e);
        }

        if let Some(existing) = self.check_existing(&record.external_job_id).await?.record {
            info!(
                job_id = %record.external_job_id,
                staging_id = %existing.id,
                "Staging record already exists, skipping insert"
            );
            return Ok(InsertOutcome::Duplicate { existing });
        }

        match self.repo.insert(record).await {
            Ok(id) => {
                info!(job_id = %record.external_job_id, staging_id = %id, "Staging record inserted");
                Ok(InsertOutcome::Inserted { id })
            }
            Err(AppError::Conflict(message)) => {
                warn!(
                    job_id = %record.external_job_id,
                    error = %message,
                    "Unique constraint hit on insert, treating as duplicate"
                );
                match self.repo.find_by_external_id(&record.external_job_id).await? {
                    Some(existing) => Ok(InsertOutcome::Duplicate { existing }),
                    None => Err(AppError::Database(format!(
                        "conflict on {} but no stored row found",
                        record.external_job_id
                    ))),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Normalize and insert in one call; validation failures become `Rejected`
    pub async fn ingest(&self, raw: &Value, params: &RequestParams) -> Result<InsertOutcome> {
        match map_to_normalized_form(raw, params) {
            Ok(record) => self.insert(&record).await,
            Err(e) => rejected(&params.job_id, e),
        }
    }

    pub async fn downstream_status(&self, external_job_id: &str) -> Result<Option<StagingStatus>> {
        Ok(self
            .repo
            .find_by_external_id(external_job_id)
            .await?
            .map(|stored| stored.record.status))
    }
}

/// Validation failures become `Rejected`; anything else propagates
fn rejected(job_id: &str, error: AppError) -> Result<InsertOutcome> {
    match error {
        AppError::Validation(reason) => {
            debug!(job_id = %job_id, reason = %reason, "Staging record rejected");
            Ok(InsertOutcome::Rejected {
                reason: format!("validation: {}", reason),
            })
        }
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::staging_repository::mocks::InMemoryStagingRepository;
    use serde_json::json;

    fn params() -> RequestParams {
        RequestParams {
            job_id: "j1".into(),
            query: "plumbers near me".into(),
            location: "Boston, MA".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn payload() -> Value {
        json!({
            "results": [{
                "content": {
                    "url": "https://www.google.com/search?q=plumbers+near+me",
                    "page": 1,
                    "total_results_count": 1200,
                    "results": {
                        "paid": [
                            {"pos": 1, "url": "https://a.example", "title": "A", "desc": "a", "url_shown": "a.example"},
                            {"pos": 2, "url": "https://b.example", "title": "B"}
                        ]
                    }
                },
                "created_at": "2024-05-01 12:00:05"
            }]
        })
    }

    #[test]
    fn test_normalizes_payload() {
        let record = map_to_normalized_form(&payload(), &params()).unwrap();

        assert_eq!(record.external_job_id, "j1");
        assert_eq!(record.status, StagingStatus::Pending);
        assert_eq!(record.content.paid.len(), 2);
        assert_eq!(record.content.paid[1].desc, "");
        assert!(record.content.organic.is_empty());
        assert_eq!(record.content.total_results, 1200);
        assert_eq!(
            record.timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap()
        );
    }

    #[test]
    fn test_missing_content_is_rejected() {
        let raw = json!({"results": [{"created_at": "2024-05-01 12:00:05"}]});
        assert!(matches!(
            map_to_normalized_form(&raw, &params()),
            Err(AppError::Validation(_))
        ));
        assert!(map_to_normalized_form(&json!({}), &params()).is_err());
    }

    #[test]
    fn test_missing_identifiers_are_rejected() {
        let mut p = params();
        p.location = String::new();
        assert!(map_to_normalized_form(&payload(), &p).is_err());
    }

    #[test]
    fn test_unparseable_created_at_keeps_request_timestamp() {
        let mut raw = payload();
        raw["results"][0]["created_at"] = json!("yesterday");
        let record = map_to_normalized_form(&raw, &params()).unwrap();
        assert_eq!(record.timestamp, params().timestamp);
    }

    #[tokio::test]
    async fn test_second_ingest_is_duplicate() {
        let repo = Arc::new(InMemoryStagingRepository::new());
        let dedup = StagingDeduplicator::new(repo.clone());

        let first = dedup.ingest(&payload(), &params()).await.unwrap();
        let second = dedup.ingest(&payload(), &params()).await.unwrap();

        assert_eq!(first, InsertOutcome::Inserted { id: 1 });
        match second {
            InsertOutcome::Duplicate { existing } => {
                assert_eq!(existing.id, 1);
                assert_eq!(existing.record.content.paid.len(), 2);
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert_eq!(repo.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_unique_violation_becomes_duplicate() {
        let repo = Arc::new(InMemoryStagingRepository::new());
        let dedup = StagingDeduplicator::new(repo.clone());
        dedup.ingest(&payload(), &params()).await.unwrap();

        repo.set_stale_reads(1);
        let outcome = dedup.ingest(&payload(), &params()).await.unwrap();

        assert!(matches!(outcome, InsertOutcome::Duplicate { .. }));
        assert!(outcome.is_success());
        assert_eq!(repo.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected_without_io() {
        let repo = Arc::new(InMemoryStagingRepository::new());
        repo.set_fail_inserts(true);
        let dedup = StagingDeduplicator::new(repo);

        let outcome = dedup.ingest(&json!({"results": []}), &params()).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Rejected { .. }));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected_before_any_lookup() {
        let repo = Arc::new(InMemoryStagingRepository::new());
        let dedup = StagingDeduplicator::new(repo.clone());
        let mut record = map_to_normalized_form(&payload(), &params()).unwrap();
        record.query = "  ".into();

        let outcome = dedup.insert(&record).await.unwrap();

        match outcome {
            InsertOutcome::Rejected { reason } => {
                assert!(reason.starts_with("validation:"));
                assert!(reason.contains("query"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(repo.calls(), 0);
        assert!(repo.rows().is_empty());
    }

    #[tokio::test]
    async fn test_downstream_status() {
        let repo = Arc::new(InMemoryStagingRepository::new());
        let dedup = StagingDeduplicator::new(repo.clone());
        assert_eq!(dedup.downstream_status("j1").await.unwrap(), None);

        dedup.ingest(&payload(), &params()).await.unwrap();
        repo.set_status("j1", StagingStatus::Processed);
        assert_eq!(
            dedup.downstream_status("j1").await.unwrap(),
            Some(StagingStatus::Processed)
        );
    }
}
