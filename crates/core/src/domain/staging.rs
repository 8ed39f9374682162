//! Staging records: normalized, deduplicated scrape results awaiting
//! downstream processing.
//!
//! Raw provider payloads are loosely shaped. Every listing is projected onto a
//! fixed field set here, so a missing or mistyped field becomes an empty string
//! or zero instead of a missing key downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Downstream processing state of a staging row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingStatus {
    Pending,
    Processed,
    Error,
}

impl StagingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagingStatus::Pending => "pending",
            StagingStatus::Processed => "processed",
            StagingStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(StagingStatus::Pending),
            "processed" => Some(StagingStatus::Processed),
            "error" => Some(StagingStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for StagingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paid (ad) listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaidListing {
    pub pos: i64,
    pub url: String,
    pub title: String,
    pub desc: String,
    pub url_shown: String,
}

impl PaidListing {
    pub fn project(entry: &Value) -> Self {
        Self {
            pos: int_field(entry, "pos"),
            url: str_field(entry, "url"),
            title: str_field(entry, "title"),
            desc: str_field(entry, "desc"),
            url_shown: str_field(entry, "url_shown"),
        }
    }
}

/// Organic listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganicListing {
    pub pos: i64,
    pub pos_overall: i64,
    pub url: String,
    pub title: String,
    pub desc: String,
    pub url_shown: String,
}

impl OrganicListing {
    pub fn project(entry: &Value) -> Self {
        Self {
            pos: int_field(entry, "pos"),
            pos_overall: int_field(entry, "pos_overall"),
            url: str_field(entry, "url"),
            title: str_field(entry, "title"),
            desc: str_field(entry, "desc"),
            url_shown: str_field(entry, "url_shown"),
        }
    }
}

/// Normalized SERP content stored with a staging record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerpContent {
    pub url: String,
    pub page: i64,
    pub total_results: i64,
    pub paid: Vec<PaidListing>,
    pub organic: Vec<OrganicListing>,
}

impl SerpContent {
    /// Project a provider `content` object. Missing listing arrays become empty.
    pub fn project(content: &Value) -> Self {
        let results = content.get("results");
        let listings = |key: &str| -> Vec<Value> {
            results
                .and_then(|r| r.get(key))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default()
        };

        Self {
            url: str_field(content, "url"),
            page: int_field(content, "page"),
            total_results: int_field(content, "total_results_count"),
            paid: listings("paid").iter().map(PaidListing::project).collect(),
            organic: listings("organic")
                .iter()
                .map(OrganicListing::project)
                .collect(),
        }
    }
}

/// Request parameters the job was submitted with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    pub job_id: String,
    pub query: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

/// Staging record (unique per external job id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingRecord {
    pub external_job_id: String,
    pub query: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub content: SerpContent,
    pub status: StagingStatus,
    pub error_message: Option<String>,
}

/// Staging record as stored, with its datastore row id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStagingRecord {
    pub id: i64,
    pub record: StagingRecord,
}

fn str_field(entry: &Value, key: &str) -> String {
    match entry.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn int_field(entry: &Value, key: &str) -> i64 {
    match entry.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paid_listing_defaults_missing_fields() {
        let listing = PaidListing::project(&json!({"pos": 1, "url": "https://a.example"}));
        assert_eq!(listing.pos, 1);
        assert_eq!(listing.url, "https://a.example");
        assert_eq!(listing.title, "");
        assert_eq!(listing.url_shown, "");
    }

    #[test]
    fn test_mistyped_fields_are_coerced() {
        let listing = OrganicListing::project(&json!({"pos": "3", "title": 42, "desc": null}));
        assert_eq!(listing.pos, 3);
        assert_eq!(listing.title, "42");
        assert_eq!(listing.desc, "");
    }

    #[test]
    fn test_content_without_listings() {
        let content = SerpContent::project(&json!({"url": "https://www.google.com/search?q=x"}));
        assert!(content.paid.is_empty());
        assert!(content.organic.is_empty());
        assert_eq!(content.page, 0);

        // Every key is present once serialized
        let value = serde_json::to_value(&content).unwrap();
        assert!(value["paid"].is_array());
        assert!(value["organic"].is_array());
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            StagingStatus::Pending,
            StagingStatus::Processed,
            StagingStatus::Error,
        ] {
            assert_eq!(StagingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(StagingStatus::parse("unknown"), None);
    }
}
