//! Speaker-diarizing HTTP transcription backend.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

use crate::protocol::{media_type_extension, SpeakerUtterance};

use super::{DiarizedOutput, DiarizedTranscribe, TranscribeError};

const DEFAULT_MODEL: &str = "large-v3";

/// Client for a WhisperX-style diarization service: one whole payload per
/// call, speaker-attributed utterances back. Chunked submission is not
/// part of this backend's contract.
pub struct HttpDiarizedTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpDiarizedTranscriber {
    pub fn new(api_key: String, base_url: String, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiarizedResponse {
    language: Option<String>,
    #[serde(default)]
    utterances: Vec<UtteranceDto>,
}

#[derive(Debug, Deserialize)]
struct UtteranceDto {
    speaker: u32,
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

#[async_trait]
impl DiarizedTranscribe for HttpDiarizedTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        media_type: &str,
    ) -> Result<DiarizedOutput, TranscribeError> {
        let url = format!("{}/audio/diarized-transcriptions", self.base_url);
        let file_name = format!(
            "audio.{}",
            media_type_extension(media_type).unwrap_or("bin")
        );

        let file_part = multipart::Part::bytes(audio.to_vec())
            .file_name(file_name)
            .mime_str(media_type)
            .map_err(|e| TranscribeError::Network(format!("invalid media type: {e}")))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", file_part);

        debug!(
            model = %self.model,
            bytes = audio.len(),
            "Submitting audio for diarized transcription"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscribeError::from_status(status, body));
        }

        let parsed: DiarizedResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::InvalidResponse(e.to_string()))?;

        debug!(
            utterances = parsed.utterances.len(),
            language = parsed.language.as_deref().unwrap_or("unknown"),
            "Diarized transcription completed"
        );

        Ok(DiarizedOutput {
            utterances: parsed
                .utterances
                .into_iter()
                .map(|u| SpeakerUtterance {
                    speaker: u.speaker,
                    text: u.text,
                    start: u.start,
                    end: u.end,
                })
                .collect(),
            language_hint: parsed.language,
        })
    }
}
