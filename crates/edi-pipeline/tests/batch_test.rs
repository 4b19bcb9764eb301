//! Batch parsing across acceptance policies

use std::path::PathBuf;
use std::sync::Arc;

use edi_pipeline::{AcceptancePolicy, FileStatus, Pipeline, PipelineConfig, StrictnessLevel};
use edi_schema::{SchemaLoader, SchemaRegistry};
use tempfile::TempDir;

const SCHEMA: &str = r#"
name: EANCOM
version: D96A
messages: [ORDERS]
segments:
  - tag: BGM
    elements:
      - id: C002
      - id: "1004"
        min_occurs: 1
"#;

const VALID: &str = "UNA:+.? 'UNB+UNOC:3+SENDER+RECIPIENT+240315:1030+REF1'\
UNH+M1+ORDERS:D:96A:UN'BGM+220+ORDER1'UNT+3+M1'UNZ+1+REF1'";

/// Missing the mandatory document number
const INCOMPLETE: &str = "UNB+UNOC:3+SENDER+RECIPIENT+240315:1030+REF2'\
UNH+M1+ORDERS:D:96A:UN'BGM+220'UNT+3+M1'UNZ+1+REF2'";

/// Ends without a segment terminator
const TRUNCATED: &str = "UNB+UNOC:3+SENDER+RECIPIENT+240315:1030+REF3'UNH+M1";

fn registry() -> anyhow::Result<Arc<SchemaRegistry>> {
    let mut registry = SchemaRegistry::new();
    registry.register(SchemaLoader::default().load_from_yaml(SCHEMA)?);
    Ok(Arc::new(registry))
}

fn write_files(dir: &TempDir, contents: &[&str]) -> anyhow::Result<Vec<PathBuf>> {
    contents
        .iter()
        .enumerate()
        .map(|(i, content)| {
            let path = dir.path().join(format!("interchange_{i}.edi"));
            std::fs::write(&path, content)?;
            Ok(path)
        })
        .collect()
}

fn statuses(result: &edi_pipeline::PipelineBatchResult) -> Vec<FileStatus> {
    result.file_results.iter().map(|r| r.status).collect()
}

#[tokio::test]
async fn test_accept_all_reports_every_file_in_order() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let paths = write_files(&dir, &[VALID, TRUNCATED, VALID, INCOMPLETE])?;
    let mut pipeline = Pipeline::new(PipelineConfig::default(), registry()?);

    let result = pipeline.process_batch(&paths).await?;

    assert_eq!(
        statuses(&result),
        [
            FileStatus::Accepted,
            FileStatus::Failed,
            FileStatus::Accepted,
            FileStatus::Accepted,
        ]
    );
    assert!(result.batch_success);
    assert_eq!(result.successful_files, 3);
    assert_eq!(result.failed_files, 1);
    assert_eq!(result.file_results[0].message_count, 1);
    assert_eq!(result.file_results[3].summary.errors, 1);
    assert_eq!(pipeline.stats().files_processed, 4);
    assert_eq!(pipeline.stats().messages_processed, 3);
    Ok(())
}

#[tokio::test]
async fn test_standard_strictness_rejects_errors() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let paths = write_files(&dir, &[VALID, INCOMPLETE])?;
    let config = PipelineConfig {
        strictness: StrictnessLevel::Standard,
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::new(config, registry()?);

    let result = pipeline.process_batch(&paths).await?;
    assert_eq!(
        statuses(&result),
        [FileStatus::Accepted, FileStatus::Rejected]
    );
    assert_eq!(result.file_results[1].diagnostics.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_fail_all_cancels_remaining_files() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let paths = write_files(&dir, &[TRUNCATED, VALID, VALID])?;
    let config = PipelineConfig {
        max_concurrency: 1,
        acceptance_policy: AcceptancePolicy::FailAll,
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::new(config, registry()?);

    let result = pipeline.process_batch(&paths).await?;
    assert_eq!(
        statuses(&result),
        [
            FileStatus::Failed,
            FileStatus::Cancelled,
            FileStatus::Cancelled,
        ]
    );
    assert!(!result.batch_success);
    assert_eq!(result.cancelled_files, 2);
    assert!(pipeline.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn test_quarantine_sets_failures_aside() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let paths = write_files(&dir, &[TRUNCATED, VALID])?;
    let config = PipelineConfig {
        acceptance_policy: AcceptancePolicy::Quarantine,
        ..PipelineConfig::default()
    };
    let mut pipeline = Pipeline::new(config, registry()?);

    let result = pipeline.process_batch(&paths).await?;
    assert!(result.batch_success);
    assert_eq!(result.quarantined_files, 1);
    assert!(result.file_results[0].quarantined);
    assert!(!result.file_results[1].quarantined);
    Ok(())
}

#[tokio::test]
async fn test_missing_file_fails_without_stopping_the_batch() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut paths = write_files(&dir, &[VALID])?;
    paths.insert(0, dir.path().join("missing.edi"));
    let mut pipeline = Pipeline::new(PipelineConfig::default(), registry()?);

    let result = pipeline.process_batch(&paths).await?;
    assert_eq!(
        statuses(&result),
        [FileStatus::Failed, FileStatus::Accepted]
    );
    assert!(result.file_results[0].error.is_some());
    Ok(())
}

#[test]
fn test_config_from_json() -> anyhow::Result<()> {
    let config: PipelineConfig = serde_json::from_str(
        r#"{"max_concurrency": 8, "acceptance_policy": "quarantine", "parser": {"strict": true}}"#,
    )?;
    assert_eq!(config.max_concurrency, 8);
    assert_eq!(config.acceptance_policy, AcceptancePolicy::Quarantine);
    assert!(config.parser.strict);
    assert_eq!(config.strictness, StrictnessLevel::Permissive);
    Ok(())
}
