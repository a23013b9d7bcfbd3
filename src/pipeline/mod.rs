//! Pipeline orchestration.
//!
//! Drives one recording through encode → split → transcribe, wrapping every
//! backend call with the retry orchestrator. This layer is the only place
//! allowed to write the failure recovery queue: the raw audio is stored
//! before any processing starts, and a record is created whenever a run
//! fails terminally, so no recording is ever silently lost.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio;
use crate::backend::{self, language, Backend, TranscribeError};
use crate::protocol::{FailedRecording, RawRecording, TranscriptionMode, TranscriptionResult};
use crate::queue::FailureQueue;
use crate::retry::{run_with_retry, NoopObserver, RetryObserver, RetryPolicy};
use crate::split;
use crate::store::AudioStore;
use crate::PipelineError;

/// Tunables of one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Recordings below this many bytes skip re-encoding.
    pub reencode_threshold: usize,
    /// Maximum bytes per backend call.
    pub max_chunk_bytes: usize,
    /// Retry/backoff bounds for each backend call.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reencode_threshold: audio::REENCODE_THRESHOLD_BYTES,
            max_chunk_bytes: split::MAX_CHUNK_BYTES,
            retry: RetryPolicy::default(),
        }
    }
}

/// Downstream persistence of a completed transcript (the "save meeting
/// note" operation). The pipeline awaits it before a failure record is
/// considered resolved: a transcript that is not persisted is not success.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, recording_id: Uuid, result: &TranscriptionResult)
        -> anyhow::Result<()>;
}

/// End-to-end capture-to-transcript pipeline.
///
/// The backend variant (plain or diarized) is fixed at construction; a
/// failed recording can be retried under the other mode by running it
/// through a pipeline built with the other variant.
pub struct TranscriptionPipeline {
    store: Arc<dyn AudioStore>,
    backend: Backend,
    queue: FailureQueue,
    sink: Arc<dyn ResultSink>,
    observer: Arc<dyn RetryObserver>,
    config: PipelineConfig,
}

impl TranscriptionPipeline {
    pub fn new(
        store: Arc<dyn AudioStore>,
        backend: Backend,
        queue: FailureQueue,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            store,
            backend,
            queue,
            sink,
            observer: Arc::new(NoopObserver),
            config: PipelineConfig::default(),
        }
    }

    /// Replace the retry progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the pipeline tunables.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// The failure queue this pipeline records into.
    pub fn queue(&self) -> &FailureQueue {
        &self.queue
    }

    /// Process a fresh recording end to end.
    ///
    /// The raw bytes are written to the audio store before any processing,
    /// so even a crash mid-run leaves the recording recoverable. Terminal
    /// failures (exhausted retries, fatal validation, failed persistence)
    /// create a failure record; cancellation does not, since the stored
    /// audio remains readable and the caller chose to walk away.
    pub async fn process(
        &self,
        recording: RawRecording,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionResult, PipelineError> {
        let id = Uuid::new_v4();
        let audio_path = format!("recordings/{id}");
        let media_type = recording.media_type.clone();

        self.store
            .write(&audio_path, &recording.bytes)
            .await
            .map_err(|source| PipelineError::Storage {
                path: audio_path.clone(),
                source,
            })?;

        info!(
            %id,
            bytes = recording.len(),
            media_type = %media_type,
            mode = %self.backend.mode(),
            "Pipeline invocation started"
        );

        let result = match self.run(recording, cancel).await {
            Ok(result) => result,
            Err(TranscribeError::Cancelled) => {
                info!(%id, "Pipeline invocation cancelled");
                return Err(TranscribeError::Cancelled.into());
            }
            Err(err) => {
                self.record_new_failure(id, &audio_path, &media_type, &err.to_string())
                    .await?;
                return Err(err.into());
            }
        };

        if let Err(persist_err) = self.sink.persist(id, &result).await {
            self.record_new_failure(
                id,
                &audio_path,
                &media_type,
                &format!("transcript persistence failed: {persist_err}"),
            )
            .await?;
            return Err(PipelineError::Persistence(persist_err.to_string()));
        }

        info!(
            %id,
            chars = result.text.len(),
            language = %result.language,
            "Pipeline invocation completed"
        );
        Ok(result)
    }

    /// Re-run the full pipeline from the raw audio of a failure record,
    /// under this pipeline's backend mode (which may differ from the mode
    /// originally attempted).
    ///
    /// On renewed failure the record's retry count is bumped and its error
    /// replaced; it is deleted only when transcription AND downstream
    /// persistence both succeed.
    pub async fn retry_failed(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionResult, PipelineError> {
        let mut record = self
            .queue
            .get(&id)
            .await
            .map_err(PipelineError::Queue)?
            .ok_or(PipelineError::RecordNotFound(id))?;

        let mode = self.backend.mode();
        if mode != record.mode {
            info!(
                %id,
                original = %record.mode,
                retrying = %mode,
                "Retrying under a different transcription mode"
            );
        }
        info!(%id, retry_count = record.retry_count, "Manual retry started");

        let bytes = self
            .store
            .read(&record.audio_path)
            .await
            .map_err(|source| PipelineError::Storage {
                path: record.audio_path.clone(),
                source,
            })?;
        let recording = RawRecording::new(bytes, record.media_type.clone());

        let result = match self.run(recording, cancel).await {
            Ok(result) => result,
            Err(TranscribeError::Cancelled) => {
                info!(%id, "Manual retry cancelled, record kept");
                return Err(TranscribeError::Cancelled.into());
            }
            Err(err) => {
                self.record_renewed_failure(&mut record, mode, &err.to_string())
                    .await?;
                return Err(err.into());
            }
        };

        if let Err(persist_err) = self.sink.persist(id, &result).await {
            // Transcription worked but the transcript was not saved.
            // Partial success is not success: the record stays pending.
            self.record_renewed_failure(
                &mut record,
                mode,
                &format!("transcript persistence failed: {persist_err}"),
            )
            .await?;
            return Err(PipelineError::Persistence(persist_err.to_string()));
        }

        self.queue
            .remove(&id)
            .await
            .map_err(PipelineError::Queue)?;
        info!(%id, "Failure record resolved");
        Ok(result)
    }

    /// Encode, split and transcribe one recording. No queue side effects.
    async fn run(
        &self,
        recording: RawRecording,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionResult, TranscribeError> {
        let encoded = audio::encode_recording(recording, self.config.reencode_threshold);
        let media_type = encoded.media_type.clone();
        let chunks = split::split_for_mode(&encoded, self.config.max_chunk_bytes, self.backend.mode())?;

        match &self.backend {
            Backend::Plain(transcriber) => {
                let mut text = String::new();
                let mut language_hint: Option<String> = None;

                // Chunks go out strictly in index order: the first chunk's
                // language hint wins, and texts concatenate in that order.
                for chunk in &chunks {
                    debug!(
                        index = chunk.index,
                        total = chunk.total,
                        bytes = chunk.len(),
                        "Submitting chunk for plain transcription"
                    );

                    let bytes = chunk.bytes;
                    let output = run_with_retry(
                        &self.config.retry,
                        cancel,
                        self.observer.as_ref(),
                        || {
                            let transcriber = Arc::clone(transcriber);
                            let media_type = media_type.clone();
                            async move {
                                let output =
                                    transcriber.transcribe_chunk(bytes, &media_type).await?;
                                backend::validate_speech(&output.text)?;
                                Ok(output)
                            }
                        },
                    )
                    .await?;

                    if chunk.is_first() {
                        language_hint = output.language_hint;
                    }
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(output.text.trim());
                }

                Ok(TranscriptionResult {
                    text,
                    language: language::normalize(language_hint.as_deref().unwrap_or(""))
                        .to_string(),
                    utterances: None,
                })
            }
            Backend::Diarized(transcriber) => {
                let bytes = encoded.bytes.as_slice();
                let (rendered, output) = run_with_retry(
                    &self.config.retry,
                    cancel,
                    self.observer.as_ref(),
                    || {
                        let transcriber = Arc::clone(transcriber);
                        let media_type = media_type.clone();
                        async move {
                            let output = transcriber.transcribe(bytes, &media_type).await?;
                            let rendered = backend::render_diarized(&output.utterances);
                            backend::validate_speech(&rendered)?;
                            Ok((rendered, output))
                        }
                    },
                )
                .await?;

                Ok(TranscriptionResult {
                    text: rendered,
                    language: language::normalize(output.language_hint.as_deref().unwrap_or(""))
                        .to_string(),
                    utterances: Some(output.utterances),
                })
            }
        }
    }

    async fn record_new_failure(
        &self,
        id: Uuid,
        audio_path: &str,
        media_type: &str,
        error_message: &str,
    ) -> Result<(), PipelineError> {
        let record = FailedRecording::new(
            id,
            audio_path,
            media_type,
            self.backend.mode(),
            error_message,
        );
        self.push_record(&record).await
    }

    async fn record_renewed_failure(
        &self,
        record: &mut FailedRecording,
        mode: TranscriptionMode,
        error_message: &str,
    ) -> Result<(), PipelineError> {
        record.renewed_failure(error_message);
        record.mode = mode;
        self.push_record(record).await
    }

    async fn push_record(&self, record: &FailedRecording) -> Result<(), PipelineError> {
        if let Err(queue_err) = self.queue.record_failure(record).await {
            error!(
                id = %record.id,
                error = %queue_err,
                original_error = %record.error,
                "Failed to preserve recording in the failure queue"
            );
            return Err(PipelineError::Queue(queue_err));
        }
        warn!(
            id = %record.id,
            retry_count = record.retry_count,
            "Recording preserved in the failure queue: {}",
            record.error
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        DiarizedOutput, DiarizedTranscribe, PlainOutput, PlainTranscribe,
    };
    use crate::protocol::SpeakerUtterance;
    use crate::store::MemoryAudioStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    fn test_config(max_chunk_bytes: usize) -> PipelineConfig {
        PipelineConfig {
            reencode_threshold: audio::REENCODE_THRESHOLD_BYTES,
            max_chunk_bytes,
            retry: fast_retry(),
        }
    }

    /// Plain backend that answers each call from a fixed script.
    struct ScriptedPlain {
        script: Vec<(&'static str, Option<&'static str>)>,
        calls: AtomicU32,
    }

    impl ScriptedPlain {
        fn new(script: Vec<(&'static str, Option<&'static str>)>) -> Self {
            Self {
                script,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PlainTranscribe for ScriptedPlain {
        async fn transcribe_chunk(
            &self,
            _audio: &[u8],
            _media_type: &str,
        ) -> Result<PlainOutput, TranscribeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let (text, hint) = self.script[call.min(self.script.len() - 1)];
            Ok(PlainOutput {
                text: text.to_string(),
                language_hint: hint.map(str::to_string),
            })
        }
    }

    struct AlwaysRateLimited {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PlainTranscribe for AlwaysRateLimited {
        async fn transcribe_chunk(
            &self,
            _audio: &[u8],
            _media_type: &str,
        ) -> Result<PlainOutput, TranscribeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TranscribeError::RateLimited)
        }
    }

    struct ScriptedDiarized {
        utterances: Vec<SpeakerUtterance>,
        language: Option<&'static str>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DiarizedTranscribe for ScriptedDiarized {
        async fn transcribe(
            &self,
            _audio: &[u8],
            _media_type: &str,
        ) -> Result<DiarizedOutput, TranscribeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DiarizedOutput {
                utterances: self.utterances.clone(),
                language_hint: self.language.map(str::to_string),
            })
        }
    }

    struct OkSink {
        persisted: AtomicU32,
    }

    impl OkSink {
        fn new() -> Self {
            Self {
                persisted: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ResultSink for OkSink {
        async fn persist(
            &self,
            _recording_id: Uuid,
            _result: &TranscriptionResult,
        ) -> anyhow::Result<()> {
            self.persisted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailSink;

    #[async_trait]
    impl ResultSink for FailSink {
        async fn persist(
            &self,
            _recording_id: Uuid,
            _result: &TranscriptionResult,
        ) -> anyhow::Result<()> {
            anyhow::bail!("database unavailable")
        }
    }

    fn utterance(speaker: u32, text: &str, start: f64) -> SpeakerUtterance {
        SpeakerUtterance {
            speaker,
            text: text.to_string(),
            start,
            end: start + 1.0,
        }
    }

    fn recording(len: usize) -> RawRecording {
        RawRecording::new(vec![0xA5; len], "audio/webm")
    }

    #[tokio::test]
    async fn test_plain_chunks_join_in_order_language_from_first_chunk() {
        let backend = Arc::new(ScriptedPlain::new(vec![
            ("primeiro", Some("en")),
            ("segundo", Some("es")),
            ("terceiro", Some("de")),
        ]));
        let pipeline = TranscriptionPipeline::new(
            Arc::new(MemoryAudioStore::new()),
            Backend::Plain(backend.clone()),
            FailureQueue::new_temp().unwrap(),
            Arc::new(OkSink::new()),
        )
        .with_config(test_config(4));

        let result = pipeline
            .process(recording(10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.text, "primeiro segundo terceiro");
        // Later chunks reported other languages; only the first one counts.
        assert_eq!(result.language, "en");
        assert!(result.utterances.is_none());
        assert!(pipeline.queue().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_diarized_result_renders_speaker_labels() {
        let backend = Arc::new(ScriptedDiarized {
            utterances: vec![
                utterance(2, "bom dia", 0.0),
                utterance(0, "bom dia a todos", 1.2),
                utterance(2, "vamos começar", 2.4),
            ],
            language: Some("pt-BR"),
            calls: AtomicU32::new(0),
        });
        let pipeline = TranscriptionPipeline::new(
            Arc::new(MemoryAudioStore::new()),
            Backend::Diarized(backend.clone()),
            FailureQueue::new_temp().unwrap(),
            Arc::new(OkSink::new()),
        )
        .with_config(test_config(1024));

        let result = pipeline
            .process(recording(10), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            result.text,
            "Speaker 3: bom dia\n\nSpeaker 1: bom dia a todos\n\nSpeaker 3: vamos começar"
        );
        assert_eq!(result.language, "pt");
        assert_eq!(result.utterances.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_run_preserves_recording_in_queue() {
        let store = Arc::new(MemoryAudioStore::new());
        let backend = Arc::new(AlwaysRateLimited {
            calls: AtomicU32::new(0),
        });
        let pipeline = TranscriptionPipeline::new(
            store.clone(),
            Backend::Plain(backend.clone()),
            FailureQueue::new_temp().unwrap(),
            Arc::new(OkSink::new()),
        )
        .with_config(test_config(1024));

        let err = pipeline
            .process(recording(10), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Transcribe(TranscribeError::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);

        let records = pipeline.queue().list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].retry_count, 0);
        assert_eq!(records[0].mode, TranscriptionMode::Plain);
        // The raw audio reference is intact and readable.
        let stored = store.read(&records[0].audio_path).await.unwrap();
        assert_eq!(stored, vec![0xA5; 10]);
    }

    #[tokio::test]
    async fn test_empty_speech_is_fatal_and_queued_after_one_attempt() {
        let backend = Arc::new(ScriptedPlain::new(vec![("   ", None)]));
        let pipeline = TranscriptionPipeline::new(
            Arc::new(MemoryAudioStore::new()),
            Backend::Plain(backend.clone()),
            FailureQueue::new_temp().unwrap(),
            Arc::new(OkSink::new()),
        )
        .with_config(test_config(1024));

        let err = pipeline
            .process(recording(10), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Transcribe(TranscribeError::EmptySpeech)
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.queue().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_not_queued() {
        let backend = Arc::new(AlwaysRateLimited {
            calls: AtomicU32::new(0),
        });
        let pipeline = TranscriptionPipeline::new(
            Arc::new(MemoryAudioStore::new()),
            Backend::Plain(backend),
            FailureQueue::new_temp().unwrap(),
            Arc::new(OkSink::new()),
        )
        .with_config(test_config(1024));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pipeline.process(recording(10), &cancel).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Transcribe(TranscribeError::Cancelled)
        ));
        assert!(pipeline.queue().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_diarized_payload_is_config_error() {
        let backend = Arc::new(ScriptedDiarized {
            utterances: vec![utterance(0, "oi", 0.0)],
            language: None,
            calls: AtomicU32::new(0),
        });
        let pipeline = TranscriptionPipeline::new(
            Arc::new(MemoryAudioStore::new()),
            Backend::Diarized(backend.clone()),
            FailureQueue::new_temp().unwrap(),
            Arc::new(OkSink::new()),
        )
        .with_config(test_config(4));

        let err = pipeline
            .process(recording(10), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Transcribe(TranscribeError::ChunkingUnsupported { .. })
        ));
        // The backend was never called and the audio is preserved.
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.queue().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_manual_retry_success_resolves_record() {
        let store = Arc::new(MemoryAudioStore::new());
        let queue = FailureQueue::new_temp().unwrap();

        let failing = TranscriptionPipeline::new(
            store.clone(),
            Backend::Plain(Arc::new(AlwaysRateLimited {
                calls: AtomicU32::new(0),
            })),
            queue.clone(),
            Arc::new(OkSink::new()),
        )
        .with_config(test_config(1024));
        failing
            .process(recording(10), &CancellationToken::new())
            .await
            .unwrap_err();

        let id = queue.list().await.unwrap()[0].id;

        let sink = Arc::new(OkSink::new());
        let retrying = TranscriptionPipeline::new(
            store,
            Backend::Plain(Arc::new(ScriptedPlain::new(vec![("ata da reunião", Some("pt"))]))),
            queue.clone(),
            sink.clone(),
        )
        .with_config(test_config(1024));

        let result = retrying
            .retry_failed(id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.text, "ata da reunião");
        assert_eq!(sink.persisted.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_retry_with_failed_persistence_keeps_record() {
        let store = Arc::new(MemoryAudioStore::new());
        let queue = FailureQueue::new_temp().unwrap();

        let failing = TranscriptionPipeline::new(
            store.clone(),
            Backend::Plain(Arc::new(AlwaysRateLimited {
                calls: AtomicU32::new(0),
            })),
            queue.clone(),
            Arc::new(OkSink::new()),
        )
        .with_config(test_config(1024));
        failing
            .process(recording(10), &CancellationToken::new())
            .await
            .unwrap_err();

        let id = queue.list().await.unwrap()[0].id;

        let retrying = TranscriptionPipeline::new(
            store,
            Backend::Plain(Arc::new(ScriptedPlain::new(vec![("texto", Some("pt"))]))),
            queue.clone(),
            Arc::new(FailSink),
        )
        .with_config(test_config(1024));

        let err = retrying
            .retry_failed(id, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Persistence(_)));
        let record = queue.get(&id).await.unwrap().unwrap();
        assert_eq!(record.retry_count, 1);
        assert!(record.error.contains("persistence"));
    }

    #[tokio::test]
    async fn test_first_run_persistence_failure_is_queued() {
        let pipeline = TranscriptionPipeline::new(
            Arc::new(MemoryAudioStore::new()),
            Backend::Plain(Arc::new(ScriptedPlain::new(vec![("texto", Some("pt"))]))),
            FailureQueue::new_temp().unwrap(),
            Arc::new(FailSink),
        )
        .with_config(test_config(1024));

        let err = pipeline
            .process(recording(10), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Persistence(_)));
        let records = pipeline.queue().list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].error.contains("persistence"));
    }

    #[tokio::test]
    async fn test_retry_under_a_different_mode() {
        let store = Arc::new(MemoryAudioStore::new());
        let queue = FailureQueue::new_temp().unwrap();

        // Original diarized attempt fails terminally.
        struct BrokenDiarized;
        #[async_trait]
        impl DiarizedTranscribe for BrokenDiarized {
            async fn transcribe(
                &self,
                _audio: &[u8],
                _media_type: &str,
            ) -> Result<DiarizedOutput, TranscribeError> {
                Err(TranscribeError::Http {
                    status: 500,
                    message: "internal".to_string(),
                })
            }
        }

        let failing = TranscriptionPipeline::new(
            store.clone(),
            Backend::Diarized(Arc::new(BrokenDiarized)),
            queue.clone(),
            Arc::new(OkSink::new()),
        )
        .with_config(test_config(1024));
        failing
            .process(recording(10), &CancellationToken::new())
            .await
            .unwrap_err();

        let record = queue.list().await.unwrap().remove(0);
        assert_eq!(record.mode, TranscriptionMode::Diarized);

        // Retry the same audio as a plain transcription instead.
        let retrying = TranscriptionPipeline::new(
            store,
            Backend::Plain(Arc::new(ScriptedPlain::new(vec![("sem falantes", Some("pt"))]))),
            queue.clone(),
            Arc::new(OkSink::new()),
        )
        .with_config(test_config(1024));

        let result = retrying
            .retry_failed(record.id, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.text, "sem falantes");
        assert!(result.utterances.is_none());
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_retry_of_unknown_record_is_an_error() {
        let pipeline = TranscriptionPipeline::new(
            Arc::new(MemoryAudioStore::new()),
            Backend::Plain(Arc::new(ScriptedPlain::new(vec![("x", None)]))),
            FailureQueue::new_temp().unwrap(),
            Arc::new(OkSink::new()),
        );

        let err = pipeline
            .retry_failed(Uuid::new_v4(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::RecordNotFound(_)));
    }
}
