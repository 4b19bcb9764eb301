//! # edi-cli
//!
//! Command-line front end for the EDIFACT parser.
//!
//! `edi parse` parses one interchange and prints its diagnostics (or the whole
//! outcome as JSON); `edi batch` parses many files through the pipeline.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use edi_adapter_edifact::{EdifactParser, NoopSink};
use edi_pipeline::{FileStatus, Pipeline, PipelineConfig, StrictnessLevel};
use edi_schema::{SchemaLoader, SchemaRegistry};
use edi_validation::ParseError;
use tracing_subscriber::EnvFilter;

/// Input parsed, no diagnostic fails it
const EXIT_OK: u8 = 0;
/// Input parsed with failing diagnostics
const EXIT_INVALID: u8 = 1;
/// The parse was aborted by a fatal error
const EXIT_FATAL: u8 = 2;
/// Bad configuration, schema, or arguments
const EXIT_USAGE: u8 = 3;

#[derive(Parser)]
#[command(name = "edi")]
#[command(about = "EDIFACT interchange parser and validator")]
#[command(version)]
struct Cli {
    /// Pipeline configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Schema files (YAML or JSON) to validate segments against
    #[arg(short, long, global = true)]
    schema: Vec<PathBuf>,

    /// Check characters against the syntax level and fail on warnings
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate one interchange
    Parse {
        /// Input file path
        input: PathBuf,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Parse many interchanges in parallel
    Batch {
        /// Input file paths
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Print per-file results as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = if path.extension().is_some_and(|e| e == "json") {
        serde_json::from_str(&text)?
    } else {
        serde_yaml::from_str(&text)?
    };
    Ok(config)
}

fn load_schemas(paths: &[PathBuf]) -> anyhow::Result<SchemaRegistry> {
    let registry = SchemaLoader::default()
        .load_registry(paths)
        .context("loading schemas")?;
    tracing::info!(schemas = registry.len(), "Loaded schemas");
    Ok(registry)
}

fn print_diagnostics(errors: &[ParseError]) {
    for error in errors {
        eprintln!("{error}");
    }
}

fn parse(
    config: &PipelineConfig,
    registry: &SchemaRegistry,
    input: &Path,
    json: bool,
    pretty: bool,
) -> anyhow::Result<u8> {
    let mut parser_config = config.parser.clone();
    parser_config.strict |= config.strictness == StrictnessLevel::Strict;
    let mut parser = EdifactParser::with_config(parser_config);

    let outcome = match parser.parse_file(input, registry, &mut NoopSink) {
        Ok(outcome) => outcome,
        Err(edi_adapter_edifact::Error::Fatal { error, partial }) => {
            print_diagnostics(&partial);
            eprintln!("{error}");
            return Ok(EXIT_FATAL);
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        let rendered = if pretty {
            serde_json::to_string_pretty(&outcome)?
        } else {
            serde_json::to_string(&outcome)?
        };
        println!("{rendered}");
    } else {
        print_diagnostics(&outcome.errors);
    }

    let summary = outcome.summary();
    eprintln!(
        "Parse summary: messages={}, errors={}, warnings={}",
        outcome.document.metadata.message_refs.len(),
        summary.errors,
        summary.warnings
    );

    let failed = outcome
        .errors
        .iter()
        .any(|e| config.strictness.rejects(e.severity()));
    Ok(if failed { EXIT_INVALID } else { EXIT_OK })
}

async fn batch(
    config: PipelineConfig,
    registry: SchemaRegistry,
    inputs: &[PathBuf],
    json: bool,
) -> anyhow::Result<u8> {
    let mut pipeline = Pipeline::new(config, Arc::new(registry));
    let cancel = pipeline.cancellation_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling the batch");
            cancel.store(true, std::sync::atomic::Ordering::Release);
        }
    });

    let result = pipeline.process_batch(inputs).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.file_results)?);
    } else {
        for file in &result.file_results {
            let detail = file.error.as_deref().unwrap_or("");
            println!(
                "{:<9} {} messages={} errors={} {detail}",
                format!("{:?}", file.status).to_lowercase(),
                file.path,
                file.message_count,
                file.summary.errors
            );
        }
    }
    eprintln!(
        "Batch summary: files={}, successful={}, failed={}, cancelled={}",
        result.total_files, result.successful_files, result.failed_files, result.cancelled_files
    );

    let fatal = result
        .file_results
        .iter()
        .any(|f| f.status == FileStatus::Failed);
    Ok(if result.batch_success && result.failed_files == 0 {
        EXIT_OK
    } else if fatal {
        EXIT_FATAL
    } else {
        EXIT_INVALID
    })
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let mut config = load_config(cli.config.as_deref())?;
    if cli.strict {
        config.strictness = StrictnessLevel::Strict;
    }
    let registry = load_schemas(&cli.schema)?;

    match cli.command {
        Commands::Parse {
            input,
            json,
            pretty,
        } => {
            tracing::info!("Parsing {}", input.display());
            parse(&config, &registry, &input, json, pretty)
        }
        Commands::Batch { inputs, json } => {
            tracing::info!("Parsing {} files", inputs.len());
            batch(config, registry, &inputs, json).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}
