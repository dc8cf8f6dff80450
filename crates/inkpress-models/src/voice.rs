//! Voice configuration and audio encodings for narration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audio encoding requested from the speech provider.
///
/// Per-chunk buffers are joined by direct byte concatenation, which is
/// valid for frame-based encodings (MP3, raw PCM) but not for container
/// formats that embed stream-level metadata. Narration refuses encodings
/// where `supports_byte_concat` is false instead of producing a broken
/// container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    /// MPEG-1 Layer III frames
    #[default]
    Mp3,
    /// Raw 16-bit linear PCM
    LinearPcm,
    /// Opus in an Ogg container
    OggOpus,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::LinearPcm => "linear_pcm",
            AudioEncoding::OggOpus => "ogg_opus",
        }
    }

    /// Wire name used by the speech provider API.
    pub fn provider_name(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "MP3",
            AudioEncoding::LinearPcm => "LINEAR16",
            AudioEncoding::OggOpus => "OGG_OPUS",
        }
    }

    /// Content type for storage upload.
    pub fn content_type(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "audio/mpeg",
            AudioEncoding::LinearPcm => "audio/wav",
            AudioEncoding::OggOpus => "audio/ogg",
        }
    }

    /// File extension for the uploaded narration object.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::LinearPcm => "wav",
            AudioEncoding::OggOpus => "ogg",
        }
    }

    /// Whether per-chunk buffers can be joined by plain byte concatenation.
    pub fn supports_byte_concat(&self) -> bool {
        match self {
            AudioEncoding::Mp3 | AudioEncoding::LinearPcm => true,
            // Ogg pages carry granule positions and serial numbers; a byte
            // join would need a real muxer.
            AudioEncoding::OggOpus => false,
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Voice configuration carried on a narration job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VoiceConfig {
    /// BCP-47 language code
    #[serde(default = "default_language_code")]
    pub language_code: String,

    /// Provider voice identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<String>,

    /// Speaking rate multiplier (provider default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaking_rate: Option<f64>,

    /// Pitch adjustment in semitones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,

    /// Requested audio encoding
    #[serde(default)]
    pub encoding: AudioEncoding,
}

fn default_language_code() -> String {
    "en-US".to_string()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language_code: default_language_code(),
            voice_name: None,
            speaking_rate: None,
            pitch: None,
            encoding: AudioEncoding::default(),
        }
    }
}

impl VoiceConfig {
    /// Create a config for the given language with provider defaults.
    pub fn for_language(language_code: impl Into<String>) -> Self {
        Self {
            language_code: language_code.into(),
            ..Self::default()
        }
    }

    /// Set the provider voice name.
    pub fn with_voice(mut self, voice_name: impl Into<String>) -> Self {
        self.voice_name = Some(voice_name.into());
        self
    }

    /// Set the speaking rate.
    pub fn with_speaking_rate(mut self, rate: f64) -> Self {
        self.speaking_rate = Some(rate);
        self
    }

    /// Set the requested encoding.
    pub fn with_encoding(mut self, encoding: AudioEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_concat_support() {
        assert!(AudioEncoding::Mp3.supports_byte_concat());
        assert!(AudioEncoding::LinearPcm.supports_byte_concat());
        assert!(!AudioEncoding::OggOpus.supports_byte_concat());
    }

    #[test]
    fn test_voice_config_defaults() {
        let voice = VoiceConfig::default();
        assert_eq!(voice.language_code, "en-US");
        assert_eq!(voice.encoding, AudioEncoding::Mp3);
        assert!(voice.voice_name.is_none());
    }

    #[test]
    fn test_voice_config_serde_defaults() {
        // Older jobs may omit every field.
        let voice: VoiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(voice.language_code, "en-US");
        assert_eq!(voice.encoding, AudioEncoding::Mp3);
    }
}
