//! Speech synthesis client.
//!
//! One request per text chunk; the provider returns base64-encoded audio
//! in the requested encoding.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use inkpress_models::VoiceConfig;

use crate::error::{WorkerError, WorkerResult};

/// Speech synthesis collaborator.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one chunk of plain text into audio bytes.
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> WorkerResult<Vec<u8>>;
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfigBody<'a>,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct VoiceSelection<'a> {
    #[serde(rename = "languageCode")]
    language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct AudioConfigBody<'a> {
    #[serde(rename = "audioEncoding")]
    audio_encoding: &'a str,
    #[serde(rename = "speakingRate", skip_serializing_if = "Option::is_none")]
    speaking_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pitch: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(rename = "audioContent")]
    audio_content: String,
}

/// REST text-to-speech client.
pub struct SpeechClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl SpeechClient {
    /// Create a new speech client.
    pub fn new() -> WorkerResult<Self> {
        let api_key = std::env::var("TTS_API_KEY")
            .map_err(|_| WorkerError::job_failed("TTS_API_KEY not set"))?;

        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://texttospeech.googleapis.com/v1".to_string());

        let timeout = std::env::var("TTS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| WorkerError::job_failed(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechClient {
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> WorkerResult<Vec<u8>> {
        let url = format!("{}/text:synthesize?key={}", self.base_url, self.api_key);

        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &voice.language_code,
                name: voice.voice_name.as_deref(),
            },
            audio_config: AudioConfigBody {
                audio_encoding: voice.encoding.provider_name(),
                speaking_rate: voice.speaking_rate,
                pitch: voice.pitch,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::speech_failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::speech_failed(format!(
                "provider returned {}: {}",
                status, error_text
            )));
        }

        let body: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::speech_failed(format!("failed to parse response: {}", e)))?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(body.audio_content.as_bytes())
            .map_err(|e| WorkerError::speech_failed(format!("invalid audio payload: {}", e)))?;

        debug!("Synthesized {} bytes of audio", audio.len());
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> SpeechClient {
        SpeechClient {
            api_key: "test-key".to_string(),
            base_url: server.uri(),
            client: Client::new(),
        }
    }

    #[tokio::test]
    async fn decodes_audio_content() {
        let server = MockServer::start().await;
        let audio = vec![0x49u8, 0x44, 0x33, 0x04];
        let encoded = base64::engine::general_purpose::STANDARD.encode(&audio);

        Mock::given(method("POST"))
            .and(path("/text:synthesize"))
            .and(body_partial_json(serde_json::json!({
                "input": { "text": "Hello." },
                "audioConfig": { "audioEncoding": "MP3" },
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "audioContent": encoded })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let voice = VoiceConfig::default();
        let bytes = client.synthesize("Hello.", &voice).await.unwrap();
        assert_eq!(bytes, audio);
    }

    #[tokio::test]
    async fn provider_errors_are_speech_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text:synthesize"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .synthesize("Hello.", &VoiceConfig::default())
            .await
            .expect_err("should fail");
        assert!(matches!(err, WorkerError::Speech(_)));
        assert!(err.is_retryable());
    }
}
