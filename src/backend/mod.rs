//! Transcription backend adapters.
//!
//! Two capability variants behind one dispatch point: a plain transcriber
//! (fast, language-detecting, chunkable) and a diarizing transcriber
//! (speaker-attributed, whole-payload, single-shot). The variant is chosen
//! at pipeline construction via [`Backend`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{SpeakerUtterance, TranscriptionMode};

pub mod language;

mod diarized;
mod plain;

pub use diarized::HttpDiarizedTranscriber;
pub use plain::HttpPlainTranscriber;

/// Classified failure of one backend call.
///
/// The retry orchestrator maps every variant to "retry" or "fail now";
/// everything it does not recognize as fatal is retried up to the attempt
/// cap.
#[derive(Debug, Error)]
pub enum TranscribeError {
    /// HTTP 429: the provider throttled us. Retryable.
    #[error("backend rate limited the request (HTTP 429)")]
    RateLimited,

    /// HTTP 402: the provider account is out of credits. Retryable (the
    /// account may be topped up between attempts) but surfaced distinctly
    /// so the operator sees an "add credits" message.
    #[error("backend account requires payment (HTTP 402)")]
    PaymentRequired,

    /// The per-attempt timer expired before the backend answered.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Any other non-success HTTP status.
    #[error("backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure before an HTTP status was available.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered but the body was not readable as a result.
    #[error("backend returned an unreadable response: {0}")]
    InvalidResponse(String),

    /// Validation: the audio carried no speech. Fatal, never retried.
    #[error("no speech detected in the audio")]
    EmptySpeech,

    /// Configuration: a diarized payload exceeded the single-call limit.
    /// Fatal, never retried.
    #[error(
        "diarized transcription cannot be chunked ({payload_bytes} bytes \
         exceeds the {max_bytes}-byte single-call limit)"
    )]
    ChunkingUnsupported {
        payload_bytes: usize,
        max_bytes: usize,
    },

    /// The caller abandoned the invocation.
    #[error("operation cancelled by the caller")]
    Cancelled,

    /// Terminal: the attempt budget is spent. Carries the last classified
    /// error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<TranscribeError>,
    },
}

impl TranscribeError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => TranscribeError::RateLimited,
            402 => TranscribeError::PaymentRequired,
            _ => TranscribeError::Http { status, message },
        }
    }

    /// Errors that must bypass the retry loop entirely.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TranscribeError::EmptySpeech
                | TranscribeError::ChunkingUnsupported { .. }
                | TranscribeError::Cancelled
        )
    }

    /// Operator-facing message in the product language, one per error
    /// category. Terminal messages also tell the user the audio was kept.
    pub fn user_message(&self) -> String {
        match self {
            TranscribeError::RateLimited => {
                "Limite de requisições do serviço atingido. Tente novamente em instantes."
                    .to_string()
            }
            TranscribeError::PaymentRequired => {
                "Créditos de transcrição esgotados. Adicione créditos à conta e tente novamente."
                    .to_string()
            }
            TranscribeError::Timeout(_) => {
                "O serviço de transcrição demorou demais para responder.".to_string()
            }
            TranscribeError::EmptySpeech => {
                "Nenhuma fala foi detectada na gravação.".to_string()
            }
            TranscribeError::ChunkingUnsupported { .. } => {
                "Gravação grande demais para transcrição com identificação de falantes."
                    .to_string()
            }
            TranscribeError::Cancelled => "Transcrição cancelada.".to_string(),
            TranscribeError::Exhausted { last, .. } => format!(
                "{} Seu áudio foi preservado e poderá ser reprocessado.",
                last.user_message()
            ),
            _ => "Falha na transcrição. Seu áudio foi preservado e poderá ser reprocessado."
                .to_string(),
        }
    }
}

impl From<reqwest::Error> for TranscribeError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return TranscribeError::from_status(status.as_u16(), err.to_string());
        }
        TranscribeError::Network(err.to_string())
    }
}

/// Output of one plain-transcription call.
#[derive(Debug, Clone)]
pub struct PlainOutput {
    /// Transcribed text of the submitted chunk.
    pub text: String,
    /// Raw detector output, canonicalized later. Only the first chunk's
    /// hint is kept for a multi-chunk recording.
    pub language_hint: Option<String>,
}

/// Output of one diarized-transcription call.
#[derive(Debug, Clone)]
pub struct DiarizedOutput {
    /// Speaker utterances in temporal order.
    pub utterances: Vec<SpeakerUtterance>,
    /// Raw detector output, canonicalized later.
    pub language_hint: Option<String>,
}

/// Plain transcription capability: one chunk (or whole payload) per call.
#[async_trait]
pub trait PlainTranscribe: Send + Sync {
    async fn transcribe_chunk(
        &self,
        audio: &[u8],
        media_type: &str,
    ) -> Result<PlainOutput, TranscribeError>;
}

/// Diarizing transcription capability: exactly one whole payload per call.
#[async_trait]
pub trait DiarizedTranscribe: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        media_type: &str,
    ) -> Result<DiarizedOutput, TranscribeError>;
}

/// Backend variant selected at pipeline construction.
#[derive(Clone)]
pub enum Backend {
    Plain(Arc<dyn PlainTranscribe>),
    Diarized(Arc<dyn DiarizedTranscribe>),
}

impl Backend {
    pub fn mode(&self) -> TranscriptionMode {
        match self {
            Backend::Plain(_) => TranscriptionMode::Plain,
            Backend::Diarized(_) => TranscriptionMode::Diarized,
        }
    }

    /// Only the plain variant accepts a multi-chunk submission.
    pub fn supports_chunking(&self) -> bool {
        matches!(self, Backend::Plain(_))
    }
}

/// Reject empty or whitespace-only transcripts.
///
/// This is a validation failure of the audio itself, not a backend fault,
/// so it classifies as fatal and bypasses the retry loop.
pub fn validate_speech(text: &str) -> Result<(), TranscribeError> {
    if text.trim().is_empty() {
        return Err(TranscribeError::EmptySpeech);
    }
    Ok(())
}

/// Render diarized utterances as a human-readable transcript.
///
/// Each utterance is prefixed with a 1-based speaker label derived from
/// the backend's 0-based speaker index, separated by blank lines, in
/// temporal order — never regrouped by speaker.
pub fn render_diarized(utterances: &[SpeakerUtterance]) -> String {
    utterances
        .iter()
        .map(|u| format!("Speaker {}: {}", u.speaker + 1, u.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
