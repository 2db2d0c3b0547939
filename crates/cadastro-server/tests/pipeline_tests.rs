//! End-to-end pipeline tests
//!
//! Drive the orchestrator against the in-memory store and broker:
//! - single-file processing and the published wire format
//! - discovery passes and suffix filtering
//! - failure modes (missing object, unavailable store, broker failures)

mod helpers;

use cadastro_server::ingest::{IngestConfig, PublishFailurePolicy};
use helpers::{TestPipeline, PESSOAS_CSV};
use std::collections::HashSet;

// ============================================================================
// Single File
// ============================================================================

#[tokio::test]
async fn test_reference_file_publishes_valid_rows() {
    let pipeline = TestPipeline::new();
    pipeline.seed("cad/pessoas.csv", PESSOAS_CSV).await;

    let outcome = pipeline.orchestrator.process_file("cad/pessoas.csv").await;

    assert!(outcome.is_success());
    assert_eq!(outcome.record_count(), 2);
    assert!(outcome.error().is_none());
    assert_eq!(outcome.counts().rejected_rows, 1);

    assert_eq!(pipeline.published_keys().await, vec!["Ana", "Carla"]);
}

#[tokio::test]
async fn test_published_payload_shape() {
    let pipeline = TestPipeline::new();
    pipeline.seed("cad/pessoas.csv", PESSOAS_CSV).await;

    pipeline.orchestrator.process_file("cad/pessoas.csv").await;

    let messages = pipeline.published().await;
    let ana = messages[0].payload_json().unwrap();

    assert_eq!(ana["name"], "Ana");
    assert_eq!(ana["age"], 30);
    assert_eq!(ana["city"], "SP");
    assert_eq!(ana["sourceFile"], "cad/pessoas.csv");
    assert!(ana["processedAt"].as_str().unwrap().ends_with('Z'));

    let ids: HashSet<String> = messages
        .iter()
        .map(|m| m.payload_json().unwrap()["messageId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn test_file_without_valid_rows_succeeds_empty() {
    let pipeline = TestPipeline::new();
    pipeline
        .seed("empty_pessoas.csv", "nome,idade,cidade\nBruno,abc,RJ\n")
        .await;

    let outcome = pipeline.orchestrator.process_file("empty_pessoas.csv").await;

    assert!(outcome.is_success());
    assert_eq!(outcome.record_count(), 0);
    assert!(pipeline.published().await.is_empty());
}

#[tokio::test]
async fn test_header_missing_column_rejects_rows_not_file() {
    let pipeline = TestPipeline::new();
    pipeline.seed("f_pessoas.csv", "nome,cidade\nAna,SP\n").await;

    let outcome = pipeline.orchestrator.process_file("f_pessoas.csv").await;

    assert!(outcome.is_success());
    assert_eq!(outcome.record_count(), 0);
    assert_eq!(outcome.counts().rejected_rows, 1);
    assert!(pipeline.published().await.is_empty());
}

#[tokio::test]
async fn test_missing_object_fails_without_records() {
    let pipeline = TestPipeline::new();

    let outcome = pipeline.orchestrator.process_file("missing/pessoas.csv").await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.record_count(), 0);
    assert!(outcome.error().unwrap().starts_with("Object not found"));
}

#[tokio::test]
async fn test_unavailable_store_fails_file() {
    let pipeline = TestPipeline::new();
    pipeline.seed("cad/pessoas.csv", PESSOAS_CSV).await;
    pipeline.store.set_unavailable(true);

    let outcome = pipeline.orchestrator.process_file("cad/pessoas.csv").await;

    assert!(!outcome.is_success());
    assert!(outcome.error().unwrap().starts_with("Object store unavailable"));
    assert!(pipeline.published().await.is_empty());
}

// ============================================================================
// Broker Failures
// ============================================================================

#[tokio::test]
async fn test_broker_failure_tolerated_by_default() {
    let pipeline = TestPipeline::new();
    pipeline.seed("cad/pessoas.csv", PESSOAS_CSV).await;
    pipeline.broker.fail_key("Ana").await;
    pipeline.broker.fail_key("Carla").await;

    let outcome = pipeline.orchestrator.process_file("cad/pessoas.csv").await;

    assert!(outcome.is_success());
    assert!(outcome.error().is_none());
    assert_eq!(outcome.record_count(), 2);
    assert_eq!(outcome.counts().published, 0);
    assert_eq!(outcome.counts().failed_sends, 2);
}

#[tokio::test]
async fn test_broker_failure_fails_file_when_configured() {
    let pipeline = TestPipeline::with_config(IngestConfig {
        publish_failure_policy: PublishFailurePolicy::Fail,
        ..Default::default()
    });
    pipeline.seed("cad/pessoas.csv", PESSOAS_CSV).await;
    pipeline.broker.fail_key("Carla").await;

    let outcome = pipeline.orchestrator.process_file("cad/pessoas.csv").await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.record_count(), 2);
    assert_eq!(outcome.counts().published, 1);
    assert_eq!(outcome.counts().failed_sends, 1);
    assert_eq!(outcome.error(), Some("1 of 2 messages failed to publish"));
    assert_eq!(pipeline.published_keys().await, vec!["Ana"]);
}

// ============================================================================
// Discovery Passes
// ============================================================================

#[tokio::test]
async fn test_pass_processes_only_matching_keys() {
    let pipeline = TestPipeline::new();
    pipeline
        .seed("a_pessoas.csv", "name,age,city\nAna,30,SP\n")
        .await
        .seed("b_pessoas.csv", "name,age,city\nBruno,41,RJ\n")
        .await
        .seed("readme.txt", "name,age,city\nIgnored,1,XX\n")
        .await;

    let summary = pipeline.orchestrator.run_pass().await;

    let mut files: Vec<_> = summary.outcomes.iter().map(|o| o.file_id().to_string()).collect();
    files.sort();
    assert_eq!(files, vec!["a_pessoas.csv", "b_pessoas.csv"]);
    assert!(summary.is_clean());

    let mut keys = pipeline.published_keys().await;
    keys.sort();
    assert_eq!(keys, vec!["Ana", "Bruno"]);
}

#[tokio::test]
async fn test_pass_continues_after_failed_file() {
    let pipeline = TestPipeline::with_config(IngestConfig {
        publish_failure_policy: PublishFailurePolicy::Fail,
        ..Default::default()
    });
    pipeline.broker.fail_key("Ana").await;
    pipeline
        .seed("a_pessoas.csv", "name,age,city\nAna,30,SP\n")
        .await
        .seed("b_pessoas.csv", "name,age,city\nBruno,41,RJ\n")
        .await;

    let summary = pipeline.orchestrator.run_pass().await;

    assert_eq!(summary.processed(), 2);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.is_clean());
    assert_eq!(pipeline.published_keys().await, vec!["Bruno"]);
}

#[tokio::test]
async fn test_pass_with_custom_suffix() {
    let pipeline = TestPipeline::with_config(IngestConfig {
        file_suffix: ".csv".to_string(),
        ..Default::default()
    });
    pipeline
        .seed("x.csv", "name,age,city\nAna,30,SP\n")
        .await
        .seed("y_pessoas.csv", "name,age,city\nBruno,41,RJ\n")
        .await
        .seed("z.json", "{}")
        .await;

    let summary = pipeline.orchestrator.run_pass().await;
    assert_eq!(summary.processed(), 2);
}

#[tokio::test]
async fn test_pass_on_unavailable_store() {
    let pipeline = TestPipeline::new();
    pipeline.store.set_unavailable(true);

    let summary = pipeline.orchestrator.run_pass().await;

    assert_eq!(summary.processed(), 0);
    assert!(summary.listing_error.is_some());
}

#[tokio::test]
async fn test_pass_after_shutdown_processes_nothing() {
    let pipeline = TestPipeline::new();
    pipeline.seed("a_pessoas.csv", PESSOAS_CSV).await;
    pipeline.shutdown.cancel();

    let summary = pipeline.orchestrator.run_pass().await;

    assert_eq!(summary.processed(), 0);
    assert!(pipeline.published().await.is_empty());
}
