//! Shared domain types
//!
//! [`PersonRecord`] is the payload published to the broker, one per accepted
//! input row. [`ProcessingOutcome`] is the per-file result handed back to
//! whoever asked for the file to be processed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One person parsed from an input row, plus pipeline metadata
///
/// Serialized with camelCase field names and no type information, which is the
/// wire format consumers of the topic expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    pub name: String,
    pub age: i32,
    pub city: String,
    /// Random v4 UUID, unique per record
    pub message_id: String,
    pub processed_at: DateTime<Utc>,
    /// Object key the row was read from
    pub source_file: String,
}

impl PersonRecord {
    /// Create a record, stamping a fresh message id and the current time
    pub fn new(
        name: impl Into<String>,
        age: i32,
        city: impl Into<String>,
        source_file: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            age,
            city: city.into(),
            message_id: Uuid::new_v4().to_string(),
            processed_at: Utc::now(),
            source_file: source_file.into(),
        }
    }

    /// Partition key; records sharing a name keep their relative order
    pub fn key(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for PersonRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Person[name={}, age={}, city={}]",
            self.name, self.age, self.city
        )
    }
}

/// Counters gathered while a file moves through the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    /// Records produced by the parser
    pub record_count: usize,
    /// Rows the parser skipped
    pub rejected_rows: usize,
    /// Messages acknowledged by the broker
    pub published: usize,
    /// Messages that failed, timed out or were cancelled
    pub failed_sends: usize,
}

/// Result of processing one file
///
/// Only constructible through [`ProcessingOutcome::succeeded`] and
/// [`ProcessingOutcome::failed`], so `error` is present exactly when
/// `success` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOutcome {
    file_id: String,
    counts: OutcomeCounts,
    success: bool,
    elapsed: Duration,
    error: Option<String>,
}

impl ProcessingOutcome {
    pub fn succeeded(file_id: impl Into<String>, counts: OutcomeCounts, elapsed: Duration) -> Self {
        Self {
            file_id: file_id.into(),
            counts,
            success: true,
            elapsed,
            error: None,
        }
    }

    pub fn failed(
        file_id: impl Into<String>,
        counts: OutcomeCounts,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            counts,
            success: false,
            elapsed,
            error: Some(error.into()),
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn record_count(&self) -> usize {
        self.counts.record_count
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.counts
    }

    /// Elapsed time in whole milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_record_wire_format() {
        let record = PersonRecord::new("Ana", 30, "SP", "cad/pessoas.csv");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["name"], "Ana");
        assert_eq!(json["age"], 30);
        assert_eq!(json["city"], "SP");
        assert_eq!(json["sourceFile"], "cad/pessoas.csv");
        assert_eq!(json["messageId"], record.message_id.as_str());
        assert!(json["processedAt"].is_string());

        let fields: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(fields.len(), 6);
    }

    #[test]
    fn test_record_key_is_name() {
        let record = PersonRecord::new("Bruno", 41, "RJ", "a.csv");
        assert_eq!(record.key(), "Bruno");
        assert_eq!(record.to_string(), "Person[name=Bruno, age=41, city=RJ]");
    }

    #[test]
    fn test_message_ids_are_unique() {
        let ids: HashSet<String> = (0..10_000)
            .map(|i| PersonRecord::new(format!("p{}", i), 1, "X", "f.csv").message_id)
            .collect();
        assert_eq!(ids.len(), 10_000);
        assert!(ids.iter().all(|id| !id.is_empty()));
    }

    #[test]
    fn test_succeeded_outcome_has_no_error() {
        let counts = OutcomeCounts {
            record_count: 2,
            published: 2,
            ..Default::default()
        };
        let outcome = ProcessingOutcome::succeeded("f.csv", counts, Duration::from_millis(12));

        assert!(outcome.is_success());
        assert!(outcome.error().is_none());
        assert_eq!(outcome.record_count(), 2);
        assert_eq!(outcome.elapsed_ms(), 12);
    }

    #[test]
    fn test_failed_outcome_has_error() {
        let outcome = ProcessingOutcome::failed(
            "missing.csv",
            OutcomeCounts::default(),
            Duration::from_millis(3),
            "Object not found: missing.csv",
        );

        assert!(!outcome.is_success());
        assert_eq!(outcome.error(), Some("Object not found: missing.csv"));
        assert_eq!(outcome.record_count(), 0);
    }
}
