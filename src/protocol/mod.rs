use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Which transcription capability a recording should be processed with.
///
/// Selected once, at pipeline construction; never branched on through
/// ad hoc booleans at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionMode {
    /// Fast, language-detecting transcription without speaker labels.
    /// Payloads may be chunked.
    Plain,
    /// Speaker-attributed transcription. Single-shot; chunking unsupported.
    Diarized,
}

impl fmt::Display for TranscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptionMode::Plain => write!(f, "plain"),
            TranscriptionMode::Diarized => write!(f, "diarized"),
        }
    }
}

/// A captured or uploaded recording, exactly as received.
///
/// Owned by a single pipeline invocation until it is consumed into an
/// [`EncodedPayload`] or preserved through the failure queue.
#[derive(Debug, Clone)]
pub struct RawRecording {
    /// Opaque audio bytes in whatever container the capture produced.
    pub bytes: Vec<u8>,
    /// Declared media type, e.g. "audio/webm" or "audio/wav".
    pub media_type: String,
}

impl RawRecording {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }

    /// Byte length of the recording.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A recording normalized for transmission: either re-encoded to mono
/// 16 kHz 16-bit PCM, or the original bytes passed through unchanged.
#[derive(Debug, Clone)]
pub struct EncodedPayload {
    /// Payload bytes ready for the backend.
    pub bytes: Vec<u8>,
    /// Media type of `bytes` ("audio/wav" after re-encoding, otherwise the
    /// declared type of the original recording).
    pub media_type: String,
    /// Byte length of the recording before encoding.
    pub original_len: usize,
    /// Whether the payload was actually re-encoded.
    pub was_reencoded: bool,
}

impl EncodedPayload {
    /// Wrap a recording without touching its bytes.
    pub fn passthrough(raw: RawRecording) -> Self {
        let original_len = raw.bytes.len();
        Self {
            bytes: raw.bytes,
            media_type: raw.media_type,
            original_len,
            was_reencoded: false,
        }
    }

    /// Wrap re-encoded WAV bytes produced from a recording of
    /// `original_len` bytes.
    pub fn reencoded(bytes: Vec<u8>, original_len: usize) -> Self {
        Self {
            bytes,
            media_type: "audio/wav".to_string(),
            original_len,
            was_reencoded: true,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One backend-size-compliant slice of an [`EncodedPayload`].
///
/// Concatenating all chunks of a payload in index order reproduces the
/// payload byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Borrowed slice of the payload bytes.
    pub bytes: &'a [u8],
    /// Zero-based position within the payload.
    pub index: usize,
    /// Total number of chunks the payload was split into.
    pub total: usize,
}

impl Chunk<'_> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether this is the first chunk (its language hint wins).
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.total
    }
}

/// One speaker-attributed segment of a diarized transcription, in
/// temporal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerUtterance {
    /// Backend-assigned speaker index, 0-based.
    pub speaker: u32,
    /// Transcribed text of the segment.
    pub text: String,
    /// Segment start offset in seconds.
    pub start: f64,
    /// Segment end offset in seconds.
    pub end: f64,
}

/// Final output of a pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Full transcript text. For diarized runs each utterance is prefixed
    /// with its 1-based speaker label.
    pub text: String,
    /// Normalized two-letter language code.
    pub language: String,
    /// Speaker utterances in temporal order; present only for diarized runs.
    pub utterances: Option<Vec<SpeakerUtterance>>,
}

impl TranscriptionResult {
    /// Serialize to MessagePack format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    /// Deserialize from MessagePack format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// One observed retry of an orchestrated backend call. Ephemeral; handed
/// to the retry observer for user-facing progress only.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// The attempt that just failed, 1-based.
    pub attempt: u32,
    /// How long the orchestrator waits before the next attempt.
    pub waited: Duration,
    /// Message of the error that triggered the retry.
    pub error: String,
}

/// Durable record of a recording whose pipeline run did not reach a
/// terminal success.
///
/// Carries enough state to re-enter the full pipeline from the stored raw
/// audio. The record is only deleted once a retry transcribes successfully
/// AND the transcript is persisted downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRecording {
    /// Unique record identifier; also the queue key.
    pub id: Uuid,
    /// Storage path of the raw audio, readable through the audio store.
    pub audio_path: String,
    /// Declared media type of the raw audio.
    pub media_type: String,
    /// Mode the failed run was attempted with.
    pub mode: TranscriptionMode,
    /// Message of the most recent failure.
    pub error: String,
    /// Number of manual retries that have failed since creation.
    pub retry_count: u32,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl FailedRecording {
    pub fn new(
        id: Uuid,
        audio_path: impl Into<String>,
        media_type: impl Into<String>,
        mode: TranscriptionMode,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id,
            audio_path: audio_path.into(),
            media_type: media_type.into(),
            mode,
            error: error.into(),
            retry_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Register another failed retry: bump the count and replace the
    /// error message. The record stays pending.
    pub fn renewed_failure(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.error = error.into();
    }

    /// Serialize to MessagePack format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    /// Deserialize from MessagePack format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// File extension conventionally associated with a media type, used for
/// decoder hints and upload file names.
pub fn media_type_extension(media_type: &str) -> Option<&'static str> {
    match media_type.split(';').next().unwrap_or("").trim() {
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/webm" | "video/webm" => Some("webm"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/aac" => Some("aac"),
        _ => None,
    }
}

/// Media type conventionally associated with a file extension.
pub fn media_type_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_serialization() {
        let json = serde_json::to_string(&TranscriptionMode::Diarized).unwrap();
        assert_eq!(json, "\"diarized\"");
        let mode: TranscriptionMode = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(mode, TranscriptionMode::Plain);
    }

    #[test]
    fn test_failed_recording_roundtrip() {
        let record = FailedRecording::new(
            Uuid::new_v4(),
            "recordings/abc",
            "audio/webm",
            TranscriptionMode::Plain,
            "backend rate limited the request",
        );

        let bytes = record.to_bytes().unwrap();
        let decoded = FailedRecording::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.id, record.id);
        assert_eq!(decoded.audio_path, record.audio_path);
        assert_eq!(decoded.mode, TranscriptionMode::Plain);
        assert_eq!(decoded.retry_count, 0);
    }

    #[test]
    fn test_renewed_failure_updates_record() {
        let mut record = FailedRecording::new(
            Uuid::new_v4(),
            "recordings/abc",
            "audio/wav",
            TranscriptionMode::Diarized,
            "first error",
        );

        record.renewed_failure("second error");
        record.renewed_failure("third error");

        assert_eq!(record.retry_count, 2);
        assert_eq!(record.error, "third error");
    }

    #[test]
    fn test_passthrough_keeps_bytes() {
        let raw = RawRecording::new(vec![1, 2, 3, 4], "audio/webm");
        let payload = EncodedPayload::passthrough(raw.clone());

        assert_eq!(payload.bytes, raw.bytes);
        assert_eq!(payload.media_type, "audio/webm");
        assert_eq!(payload.original_len, 4);
        assert!(!payload.was_reencoded);
    }

    #[test]
    fn test_media_type_mappings() {
        assert_eq!(media_type_extension("audio/webm"), Some("webm"));
        assert_eq!(media_type_extension("audio/wav; codecs=1"), Some("wav"));
        assert_eq!(media_type_extension("text/plain"), None);
        assert_eq!(media_type_for_extension("WAV"), "audio/wav");
        assert_eq!(media_type_for_extension("xyz"), "application/octet-stream");
    }

    #[test]
    fn test_transcription_result_roundtrip() {
        let result = TranscriptionResult {
            text: "Speaker 1: ola".to_string(),
            language: "pt".to_string(),
            utterances: Some(vec![SpeakerUtterance {
                speaker: 0,
                text: "ola".to_string(),
                start: 0.0,
                end: 1.5,
            }]),
        };

        let decoded = TranscriptionResult::from_bytes(&result.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.text, result.text);
        assert_eq!(decoded.language, "pt");
        assert_eq!(decoded.utterances.unwrap().len(), 1);
    }
}
