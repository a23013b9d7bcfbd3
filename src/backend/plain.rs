//! Plain (non-diarized) HTTP transcription backend.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

use crate::protocol::media_type_extension;

use super::{PlainOutput, PlainTranscribe, TranscribeError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "whisper-1";

/// Whisper-style `/audio/transcriptions` client. Accepts one chunk per
/// call; the pipeline loops chunks in index order.
pub struct HttpPlainTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpPlainTranscriber {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    language: Option<String>,
}

#[async_trait]
impl PlainTranscribe for HttpPlainTranscriber {
    async fn transcribe_chunk(
        &self,
        audio: &[u8],
        media_type: &str,
    ) -> Result<PlainOutput, TranscribeError> {
        let url = format!("{}/audio/transcriptions", self.base_url);
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
            .text("response_format", "verbose_json")
            .part("file", file_part);

        debug!(model = %self.model, bytes = audio.len(), "Submitting audio for plain transcription");

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

        let parsed: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| TranscribeError::InvalidResponse(e.to_string()))?;

        debug!(
            chars = parsed.text.len(),
            language = parsed.language.as_deref().unwrap_or("unknown"),
            "Plain transcription chunk completed"
        );

        Ok(PlainOutput {
            text: parsed.text.trim().to_string(),
            language_hint: parsed.language,
        })
    }
}
