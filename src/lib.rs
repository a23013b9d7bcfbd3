//! Ata Transcriber - a meeting-audio capture-to-transcript pipeline
//!
//! This crate turns a raw microphone or uploaded recording into clean,
//! speaker-attributed text while respecting payload-size limits, transient
//! provider failures, and at-least-once preservation of the user's audio.
//! It features:
//!
//! - Best-effort re-encoding of large recordings to mono 16 kHz PCM
//! - Backend-size-constrained chunking with byte-exact reassembly
//! - Two transcription backends behind one dispatch point: plain
//!   (language-detecting) and diarized (speaker-attributed)
//! - Bounded retries with exponential backoff, per-attempt timeouts and
//!   cooperative cancellation
//! - A Sled-backed failure recovery queue so no recording is silently lost
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! use ata_transcriber::pipeline::ResultSink;
//! use ata_transcriber::{
//!     Backend, FailureQueue, HttpPlainTranscriber, MemoryAudioStore, RawRecording,
//!     TranscriptionPipeline, TranscriptionResult,
//! };
//!
//! struct PrintSink;
//!
//! #[async_trait::async_trait]
//! impl ResultSink for PrintSink {
//!     async fn persist(
//!         &self,
//!         _id: uuid::Uuid,
//!         result: &TranscriptionResult,
//!     ) -> anyhow::Result<()> {
//!         println!("{}", result.text);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = Backend::Plain(Arc::new(HttpPlainTranscriber::new(
//!         "api-key".to_string(),
//!         None,
//!         None,
//!     )));
//!
//!     let pipeline = TranscriptionPipeline::new(
//!         Arc::new(MemoryAudioStore::new()),
//!         backend,
//!         FailureQueue::new_temp()?,
//!         Arc::new(PrintSink),
//!     );
//!
//!     let recording = RawRecording::new(std::fs::read("meeting.webm")?, "audio/webm");
//!     let result = pipeline
//!         .process(recording, &CancellationToken::new())
//!         .await?;
//!     println!("idioma detectado: {}", result.language);
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod backend;
pub mod pipeline;
pub mod protocol;
pub mod queue;
pub mod retry;
pub mod split;
pub mod store;

// Re-export commonly used types for convenience
pub use backend::{Backend, HttpDiarizedTranscriber, HttpPlainTranscriber, TranscribeError};
pub use pipeline::{PipelineConfig, ResultSink, TranscriptionPipeline};
pub use protocol::{
    EncodedPayload, FailedRecording, RawRecording, RetryAttempt, SpeakerUtterance,
    TranscriptionMode, TranscriptionResult,
};
pub use queue::{FailureQueue, QueueStats};
pub use retry::{NoopObserver, RetryObserver, RetryPolicy};
pub use store::{AudioStore, FsAudioStore, MemoryAudioStore};

// Error types
use thiserror::Error;
use uuid::Uuid;

/// Errors that can surface from a pipeline invocation
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The transcription itself failed (classified backend error)
    #[error("transcription failed: {0}")]
    Transcribe(#[from] backend::TranscribeError),

    /// Failure queue operation failed
    #[error("failure queue error: {0}")]
    Queue(#[source] anyhow::Error),

    /// Audio store operation failed
    #[error("audio store error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// The transcript was produced but could not be saved downstream
    #[error("transcript persistence failed: {0}")]
    Persistence(String),

    /// No failure record exists for the given identifier
    #[error("no failure record found for {0}")]
    RecordNotFound(Uuid),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Operator-facing message in the product language.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Transcribe(err) => err.user_message(),
            PipelineError::Persistence(_) => {
                "A transcrição foi concluída, mas não pôde ser salva. \
                 Seu áudio foi preservado e poderá ser reprocessado."
                    .to_string()
            }
            PipelineError::RecordNotFound(_) => {
                "Nenhuma gravação pendente encontrada com esse identificador.".to_string()
            }
            _ => "Falha ao processar a gravação. Seu áudio foi preservado.".to_string(),
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Default on-disk locations used by the service binary
pub const DEFAULT_STORE_PATH: &str = "/tmp/ata-transcriber/audio";
pub const DEFAULT_QUEUE_PATH: &str = "/tmp/ata-transcriber/failed";
