//! Pipeline orchestration
//!
//! Parses batches of interchange files in parallel. Each file gets its own
//! parser on the blocking thread pool; a semaphore bounds how many run at
//! once, and cancellation is checked before each file starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use edi_adapter_edifact::{EdifactParser, NoopSink, ParserConfig};
use edi_schema::SchemaLookup;
use edi_validation::{DiagnosticSummary, ParseError};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{AcceptancePolicy, Error, Result, StrictnessLevel};

/// Configuration for the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Settings for each file's parser
    pub parser: ParserConfig,
    /// Maximum number of files parsed at once
    pub max_concurrency: usize,
    /// What happens to the batch when a file fails
    pub acceptance_policy: AcceptancePolicy,
    /// Which diagnostics fail a file
    pub strictness: StrictnessLevel,
    /// Maximum file size in bytes
    pub max_file_size: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            max_concurrency: 4,
            acceptance_policy: AcceptancePolicy::default(),
            strictness: StrictnessLevel::default(),
            max_file_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Outcome class of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Parsed with no diagnostic at or above the strictness threshold
    Accepted,
    /// Parsed, but diagnostics fail it under the strictness level
    Rejected,
    /// The parse was aborted or the file could not be read
    Failed,
    /// Not parsed, or discarded, because the batch was cancelled
    Cancelled,
}

/// Result of processing a single file
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: String,
    pub status: FileStatus,
    /// Fatal error or I/O failure, if any
    pub error: Option<String>,
    /// Number of closed messages
    pub message_count: usize,
    pub summary: DiagnosticSummary,
    /// Non-fatal diagnostics, or the partial ones before a fatal error
    pub diagnostics: Vec<ParseError>,
    pub duration: Duration,
    /// Whether the file was set aside by the quarantine policy
    pub quarantined: bool,
}

impl FileResult {
    fn new(path: &Path, status: FileStatus) -> Self {
        Self {
            path: path.display().to_string(),
            status,
            error: None,
            message_count: 0,
            summary: DiagnosticSummary::default(),
            diagnostics: Vec::new(),
            duration: Duration::ZERO,
            quarantined: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Accepted
    }
}

/// Result of processing a batch of files
#[derive(Debug, Serialize)]
pub struct PipelineBatchResult {
    /// Results in input order
    pub file_results: Vec<FileResult>,
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub quarantined_files: usize,
    pub cancelled_files: usize,
    pub total_duration: Duration,
    /// Whether the batch succeeded under the acceptance policy
    pub batch_success: bool,
}

/// Statistics accumulated across batches
#[derive(Debug, Default, Clone, Serialize)]
pub struct PipelineStats {
    pub files_processed: usize,
    pub files_successful: usize,
    pub files_failed: usize,
    pub messages_processed: usize,
    pub diagnostics: usize,
    pub total_processing_time: Duration,
}

/// Everything a worker needs to parse one file
#[derive(Clone)]
struct Worker {
    parser: ParserConfig,
    strictness: StrictnessLevel,
    policy: AcceptancePolicy,
    max_file_size: u64,
    schema: Arc<dyn SchemaLookup>,
    cancelled: Arc<AtomicBool>,
}

impl Worker {
    fn process(&self, path: &Path) -> FileResult {
        if self.cancelled.load(Ordering::Acquire) {
            return FileResult::new(path, FileStatus::Cancelled);
        }

        let start = Instant::now();
        let mut result = self.parse(path);
        result.duration = start.elapsed();

        // cancelled mid-parse: the partial outcome is discarded
        if self.cancelled.load(Ordering::Acquire) {
            return FileResult::new(path, FileStatus::Cancelled);
        }

        if result.status != FileStatus::Accepted {
            match self.policy {
                AcceptancePolicy::FailAll => {
                    warn!(path = %result.path, "File failed, cancelling the batch");
                    self.cancelled.store(true, Ordering::Release);
                }
                AcceptancePolicy::Quarantine => result.quarantined = true,
                AcceptancePolicy::AcceptAll => {}
            }
        }
        result
    }

    fn parse(&self, path: &Path) -> FileResult {
        let mut result = FileResult::new(path, FileStatus::Failed);

        match std::fs::metadata(path) {
            Ok(metadata) if metadata.len() > self.max_file_size => {
                result.error = Some(format!(
                    "File too large: {} bytes (max: {} bytes)",
                    metadata.len(),
                    self.max_file_size
                ));
                return result;
            }
            Ok(_) => {}
            Err(e) => {
                result.error = Some(Error::io(path, e).to_string());
                return result;
            }
        }

        let mut config = self.parser.clone();
        config.strict |= self.strictness == StrictnessLevel::Strict;
        let mut parser = EdifactParser::with_config(config);

        match parser.parse_file(path, &*self.schema, &mut NoopSink) {
            Ok(outcome) => {
                result.message_count = outcome.document.metadata.message_refs.len();
                result.summary = outcome.summary();
                let rejected = outcome
                    .errors
                    .iter()
                    .any(|e| self.strictness.rejects(e.severity()));
                result.status = if rejected {
                    FileStatus::Rejected
                } else {
                    FileStatus::Accepted
                };
                result.diagnostics = outcome.errors;
                debug!(
                    path = %result.path,
                    status = ?result.status,
                    messages = result.message_count,
                    "Processed file"
                );
            }
            Err(edi_adapter_edifact::Error::Fatal { error, partial }) => {
                result.error = Some(error.to_string());
                let mut diagnostics = partial;
                diagnostics.push(*error);
                result.summary = DiagnosticSummary::from_errors(&diagnostics);
                result.diagnostics = diagnostics;
            }
            Err(e) => {
                result.error = Some(e.to_string());
            }
        }
        result
    }
}

/// Parallel batch parser
pub struct Pipeline {
    config: PipelineConfig,
    schema: Arc<dyn SchemaLookup>,
    cancelled: Arc<AtomicBool>,
    stats: PipelineStats,
}

impl Pipeline {
    /// Create a pipeline resolving segments through `schema`
    pub fn new(config: PipelineConfig, schema: Arc<dyn SchemaLookup>) -> Self {
        Self {
            config,
            schema,
            cancelled: Arc::new(AtomicBool::new(false)),
            stats: PipelineStats::default(),
        }
    }

    /// Handle that cancels the running batch when set
    ///
    /// Files already being parsed finish, but their results are discarded.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Cancel the running batch
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn worker(&self) -> Worker {
        Worker {
            parser: self.config.parser.clone(),
            strictness: self.config.strictness,
            policy: self.config.acceptance_policy,
            max_file_size: self.config.max_file_size,
            schema: Arc::clone(&self.schema),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    /// Parse a single file on the current thread
    pub fn process_file(&mut self, path: &Path) -> FileResult {
        let result = self.worker().process(path);
        self.record(&result);
        result
    }

    /// Parse `paths` in parallel
    ///
    /// Results come back in input order. Files not started because of
    /// cancellation are reported as [`FileStatus::Cancelled`].
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] when the batch was cancelled before it started,
    /// and [`Error::Pipeline`] when a worker task panics.
    pub async fn process_batch<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
    ) -> Result<PipelineBatchResult> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut set = JoinSet::new();
        let mut results: Vec<Option<FileResult>> = Vec::with_capacity(paths.len());
        results.resize_with(paths.len(), || None);

        info!(
            files = paths.len(),
            concurrency = self.config.max_concurrency,
            "Starting batch"
        );

        for (index, path) in paths.iter().enumerate() {
            let path: PathBuf = path.as_ref().to_path_buf();
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::pipeline("schedule", path.display().to_string(), e))?;
            if self.is_cancelled() {
                break;
            }
            let worker = self.worker();
            set.spawn_blocking(move || {
                let _permit = permit;
                (index, worker.process(&path))
            });
        }

        while let Some(joined) = set.join_next().await {
            let (index, result) =
                joined.map_err(|e| Error::pipeline("join", "<worker>", e))?;
            results[index] = Some(result);
        }

        let file_results: Vec<FileResult> = results
            .into_iter()
            .zip(paths)
            .map(|(result, path)| {
                result.unwrap_or_else(|| FileResult::new(path.as_ref(), FileStatus::Cancelled))
            })
            .collect();
        for result in &file_results {
            self.record(result);
        }

        let count = |status: FileStatus| file_results.iter().filter(|r| r.status == status).count();
        let successful_files = count(FileStatus::Accepted);
        let failed_files = count(FileStatus::Rejected) + count(FileStatus::Failed);
        let cancelled_files = count(FileStatus::Cancelled);
        let quarantined_files = file_results.iter().filter(|r| r.quarantined).count();

        let batch_success = match self.config.acceptance_policy {
            AcceptancePolicy::AcceptAll | AcceptancePolicy::Quarantine => true,
            AcceptancePolicy::FailAll => failed_files == 0,
        };
        let total_duration = start.elapsed();
        info!(
            successful = successful_files,
            failed = failed_files,
            cancelled = cancelled_files,
            elapsed_ms = total_duration.as_millis(),
            "Finished batch"
        );

        Ok(PipelineBatchResult {
            total_files: paths.len(),
            file_results,
            successful_files,
            failed_files,
            quarantined_files,
            cancelled_files,
            total_duration,
            batch_success,
        })
    }

    fn record(&mut self, result: &FileResult) {
        if result.status == FileStatus::Cancelled {
            return;
        }
        self.stats.files_processed += 1;
        if result.is_success() {
            self.stats.files_successful += 1;
        } else {
            self.stats.files_failed += 1;
        }
        self.stats.messages_processed += result.message_count;
        self.stats.diagnostics += result.diagnostics.len();
        self.stats.total_processing_time += result.duration;
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = PipelineStats::default();
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_schema::SchemaRegistry;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID: &str = "UNB+UNOA:3+SENDER+RECIPIENT+240315:1030+1'UNZ+0+1'";

    fn create_test_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn pipeline(config: PipelineConfig) -> Pipeline {
        Pipeline::new(config, Arc::new(SchemaRegistry::new()))
    }

    #[test]
    fn test_process_single_file() {
        let mut pipeline = pipeline(PipelineConfig::default());
        let file = create_test_file(VALID);

        let result = pipeline.process_file(file.path());
        assert_eq!(result.status, FileStatus::Accepted);
        assert!(result.error.is_none());
        assert_eq!(pipeline.stats().files_successful, 1);
    }

    #[test]
    fn test_fatal_file_fails_with_partial_diagnostics() {
        let mut pipeline = pipeline(PipelineConfig::default());
        let file = create_test_file("UNB+UNOA:3+S+R+240315:1030+1'UNZ+0+2");

        let result = pipeline.process_file(file.path());
        assert_eq!(result.status, FileStatus::Failed);
        assert_eq!(result.summary.fatal, 1);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_strictness_decides_rejection() {
        let text = "UNB+UNOA:3+S+R+240315:1030+1'UNZ+5+1'";
        let file = create_test_file(text);

        let permissive = pipeline(PipelineConfig::default()).process_file(file.path());
        assert_eq!(permissive.status, FileStatus::Accepted);
        assert_eq!(permissive.summary.errors, 1);

        let standard = pipeline(PipelineConfig {
            strictness: StrictnessLevel::Standard,
            ..PipelineConfig::default()
        })
        .process_file(file.path());
        assert_eq!(standard.status, FileStatus::Rejected);
    }

    #[test]
    fn test_oversized_file_fails() {
        let file = create_test_file(VALID);
        let result = pipeline(PipelineConfig {
            max_file_size: 4,
            ..PipelineConfig::default()
        })
        .process_file(file.path());
        assert_eq!(result.status, FileStatus::Failed);
        assert!(result.error.unwrap().contains("too large"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut pipeline = pipeline(PipelineConfig::default());
        pipeline.cancel();
        let file = create_test_file(VALID);
        assert!(matches!(
            pipeline.process_batch(&[file.path()]).await,
            Err(Error::Cancelled)
        ));
    }
}
