use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use ata_transcriber::pipeline::ResultSink;
use ata_transcriber::protocol::{media_type_for_extension, RetryAttempt};
use ata_transcriber::{
    Backend, FailureQueue, FsAudioStore, HttpDiarizedTranscriber, HttpPlainTranscriber,
    PipelineError, RawRecording, RetryObserver, TranscriptionPipeline, TranscriptionResult,
    DEFAULT_QUEUE_PATH, DEFAULT_STORE_PATH,
};

#[derive(Parser)]
#[command(name = "ata-transcriber")]
#[command(about = "Meeting-audio transcription pipeline with durable failure recovery")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Audio store root directory
    #[arg(long, default_value = DEFAULT_STORE_PATH, global = true)]
    store_dir: PathBuf,

    /// Failure queue directory
    #[arg(long, default_value = DEFAULT_QUEUE_PATH, global = true)]
    queue_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe an audio file end to end
    Transcribe {
        /// Recording to transcribe
        file: PathBuf,

        #[command(flatten)]
        backend: BackendArgs,

        /// Directory where transcripts are written
        #[arg(long, default_value = "/tmp/ata-transcriber/transcripts")]
        output_dir: PathBuf,
    },

    /// List recordings waiting in the failure queue
    Failed,

    /// Re-run the pipeline for a failed recording, optionally under a
    /// different mode than originally attempted
    Retry {
        /// Failure record identifier
        id: Uuid,

        #[command(flatten)]
        backend: BackendArgs,

        /// Directory where transcripts are written
        #[arg(long, default_value = "/tmp/ata-transcriber/transcripts")]
        output_dir: PathBuf,
    },
}

#[derive(Args)]
struct BackendArgs {
    /// Use the speaker-diarizing backend instead of the plain one
    #[arg(long)]
    diarized: bool,

    /// Backend base URL (defaults to the public API for the plain backend;
    /// required for the diarized backend)
    #[arg(long)]
    base_url: Option<String>,

    /// Backend API key; falls back to the ATA_API_KEY environment variable
    #[arg(long)]
    api_key: Option<String>,

    /// Backend model name
    #[arg(long)]
    model: Option<String>,
}

impl BackendArgs {
    fn build(&self) -> Result<Backend> {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| std::env::var("ATA_API_KEY").ok())
            .context("No API key: pass --api-key or set ATA_API_KEY")?;

        if self.diarized {
            let base_url = self
                .base_url
                .clone()
                .context("--base-url is required for the diarized backend")?;
            Ok(Backend::Diarized(Arc::new(HttpDiarizedTranscriber::new(
                api_key,
                base_url,
                self.model.clone(),
            ))))
        } else {
            Ok(Backend::Plain(Arc::new(HttpPlainTranscriber::new(
                api_key,
                self.base_url.clone(),
                self.model.clone(),
            ))))
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Writes completed transcripts to disk, one text file and one JSON
/// metadata file per recording.
struct FileSink {
    dir: PathBuf,
}

#[async_trait]
impl ResultSink for FileSink {
    async fn persist(&self, recording_id: Uuid, result: &TranscriptionResult) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let text_path = self.dir.join(format!("{recording_id}.txt"));
        tokio::fs::write(&text_path, &result.text)
            .await
            .with_context(|| format!("Failed to write {}", text_path.display()))?;

        let json_path = self.dir.join(format!("{recording_id}.json"));
        let json = serde_json::to_vec_pretty(result).context("Failed to serialize transcript")?;
        tokio::fs::write(&json_path, json)
            .await
            .with_context(|| format!("Failed to write {}", json_path.display()))?;

        info!(path = %text_path.display(), "Transcript saved");
        Ok(())
    }
}

/// Prints retry progress so the operator sees what the pipeline is doing.
struct CliObserver;

impl RetryObserver for CliObserver {
    fn on_retry(&self, attempt: &RetryAttempt) {
        println!(
            "Falha temporária na tentativa {} ({}). Nova tentativa em {:.0?}…",
            attempt.attempt, attempt.error, attempt.waited
        );
    }
}

fn build_pipeline(
    cli: &Cli,
    backend_args: &BackendArgs,
    output_dir: &Path,
) -> Result<TranscriptionPipeline> {
    let queue =
        FailureQueue::new(&cli.queue_dir).context("Failed to open the failure queue")?;
    let pipeline = TranscriptionPipeline::new(
        Arc::new(FsAudioStore::new(&cli.store_dir)),
        backend_args.build()?,
        queue,
        Arc::new(FileSink {
            dir: output_dir.to_path_buf(),
        }),
    )
    .with_observer(Arc::new(CliObserver));
    Ok(pipeline)
}

/// Cancellation token wired to Ctrl+C so in-flight backend calls stop
/// cooperatively when the operator walks away.
fn cancellation_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling in-flight work");
            trigger.cancel();
        }
    });
    cancel
}

fn report_failure(err: &PipelineError) {
    eprintln!("{}", err.user_message());
}

async fn run_transcribe(cli: &Cli, file: &Path, backend: &BackendArgs, output_dir: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let media_type = media_type_for_extension(
        file.extension().and_then(|e| e.to_str()).unwrap_or(""),
    );
    let recording = RawRecording::new(bytes, media_type);

    info!(
        file = %file.display(),
        media_type,
        bytes = recording.len(),
        "Starting transcription"
    );

    let pipeline = build_pipeline(cli, backend, output_dir)?;
    let cancel = cancellation_on_ctrl_c();

    match pipeline.process(recording, &cancel).await {
        Ok(result) => {
            println!(
                "Transcrição concluída: {} caracteres, idioma {}",
                result.text.len(),
                result.language
            );
            Ok(())
        }
        Err(err) => {
            report_failure(&err);
            Err(err.into())
        }
    }
}

async fn run_retry(cli: &Cli, id: Uuid, backend: &BackendArgs, output_dir: &Path) -> Result<()> {
    let pipeline = build_pipeline(cli, backend, output_dir)?;
    let cancel = cancellation_on_ctrl_c();

    match pipeline.retry_failed(id, &cancel).await {
        Ok(result) => {
            println!(
                "Gravação reprocessada com sucesso: {} caracteres, idioma {}",
                result.text.len(),
                result.language
            );
            Ok(())
        }
        Err(err) => {
            report_failure(&err);
            Err(err.into())
        }
    }
}

async fn run_failed(cli: &Cli) -> Result<()> {
    let queue =
        FailureQueue::new(&cli.queue_dir).context("Failed to open the failure queue")?;
    let records = queue.list().await?;

    if records.is_empty() {
        println!("Nenhuma gravação pendente.");
        return Ok(());
    }

    println!("{} gravação(ões) pendente(s):", records.len());
    for record in records {
        println!(
            "  {}  mode={}  retries={}  created={}  error={}",
            record.id,
            record.mode,
            record.retry_count,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.error
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level: tracing::Level = cli.log_level.into();
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    info!("Starting Ata Transcriber v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Transcribe {
            file,
            backend,
            output_dir,
        } => run_transcribe(&cli, file, backend, output_dir).await,
        Commands::Failed => run_failed(&cli).await,
        Commands::Retry {
            id,
            backend,
            output_dir,
        } => run_retry(&cli, *id, backend, output_dir).await,
    }
}
