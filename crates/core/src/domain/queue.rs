// Queue Domain Model

use crate::domain::job::{JobRecord, JobStatus};
use serde::{Deserialize, Serialize};

/// Queue identifier: every status owns one queue document
pub type QueueName = JobStatus;

/// Ordered collection of job records, persisted as `{ "queries": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    #[serde(default)]
    pub queries: Vec<JobRecord>,
}

impl Queue {
    pub fn new(queries: Vec<JobRecord>) -> Self {
        Self { queries }
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn position(&self, job_id: &str) -> Option<usize> {
        self.queries.iter().position(|job| job.id == job_id)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.position(job_id).is_some()
    }

    pub fn get(&self, job_id: &str) -> Option<&JobRecord> {
        self.queries.iter().find(|job| job.id == job_id)
    }

    pub fn push(&mut self, record: JobRecord) {
        self.queries.push(record);
    }

    /// Remove every record with the given id, returning how many were dropped
    pub fn remove(&mut self, job_id: &str) -> usize {
        let before = self.queries.len();
        self.queries.retain(|job| job.id != job_id);
        before - self.queries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_queue_document_shape() {
        let queue = Queue::new(vec![JobRecord::new("a", "q", "l", Utc::now())]);
        let value = serde_json::to_value(&queue).unwrap();
        assert_eq!(value["queries"].as_array().unwrap().len(), 1);

        let empty: Queue = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_remove_drops_all_copies() {
        let now = Utc::now();
        let mut queue = Queue::new(vec![
            JobRecord::new("a", "q", "l", now),
            JobRecord::new("b", "q", "l", now),
            JobRecord::new("a", "q", "l", now),
        ]);
        assert_eq!(queue.remove("a"), 2);
        assert_eq!(queue.len(), 1);
        assert!(!queue.contains("a"));
        assert!(queue.contains("b"));
    }
}
