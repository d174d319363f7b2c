//! Configuration types for the voice-chat pipeline.
//!
//! Loaded once at startup from a TOML file (`voxpersona.toml` by default);
//! every section falls back to its defaults when absent. Secrets for the
//! remote cloning path can come from the environment instead of the file.

use crate::error::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the voice-chat pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Language model settings.
    pub llm: LlmConfig,
    /// Text-to-speech settings.
    pub tts: TtsConfig,
    /// Voice shaper controls applied by the offline cloning fallback.
    pub shaper: ShaperConfig,
    /// Remote voice-cloning settings.
    pub clone: CloneConfig,
    /// Filesystem layout for generated and uploaded audio.
    pub storage: StorageConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port (0 = auto-assign).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 5000,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// HuggingFace model ID or local directory holding the merged model.
    pub model_id: String,
    /// GGUF file name within the model repo/directory.
    pub gguf_file: String,
    /// Optional tokenizer model ID (empty = use `model_id`).
    pub tokenizer_id: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling threshold.
    pub top_p: f64,
    /// Maximum new tokens per reply.
    pub max_tokens: usize,
    /// Persona system prompt prepended to every request.
    pub system_prompt: String,
    /// Canned reply used when generation produces nothing usable.
    pub fallback_reply: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model_id: "TinyLlama/TinyLlama-1.1B-Chat-v1.0-GGUF".to_owned(),
            gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf".to_owned(),
            tokenizer_id: String::new(),
            temperature: 0.8,
            top_p: 0.9,
            max_tokens: 250,
            system_prompt: "You are a wise, encouraging mentor. Answer briefly and warmly."
                .to_owned(),
            fallback_reply: "My dear students, always dream big and work hard to achieve \
                             greatness."
                .to_owned(),
        }
    }
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Synthesizer binary to resolve on PATH (`espeak-ng`, with `espeak`
    /// as a common alias on older systems).
    pub command: String,
    /// Engine voice identifier (espeak voice syntax, e.g. `en+m3`).
    pub voice: String,
    /// Speaking rate in words per minute.
    pub speed_wpm: u32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            command: "espeak-ng".to_owned(),
            voice: "en+m3".to_owned(),
            speed_wpm: 165,
        }
    }
}

/// Voice shaper controls.
///
/// These are the demo's "older male voice" defaults: pitch lowered to 0.8×,
/// unity gain, no time stretch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaperConfig {
    /// Multiplicative frequency ratio (1.0 = unchanged, <1.0 lowers pitch).
    pub pitch: f32,
    /// Linear gain applied before final normalization.
    pub energy: f32,
    /// Target time-stretch ratio (>1.0 = slower/longer).
    pub duration: f32,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            pitch: 0.8,
            energy: 1.0,
            duration: 1.0,
        }
    }
}

/// Remote voice-cloning configuration.
///
/// The remote path is only attempted when [`CloneConfig::is_configured`]
/// holds; otherwise the orchestrator records it as skipped and falls back
/// to the local shaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneConfig {
    /// Prediction API endpoint.
    pub api_url: String,
    /// File-transfer host used to stage audio for the remote model.
    pub upload_url: String,
    /// Remote model name (e.g. `pseudoram/rvc-v2`).
    pub model: Option<String>,
    /// Remote model version hash.
    pub model_version: Option<String>,
    /// API token. Falls back to `CLONE_API_TOKEN` in the environment.
    pub api_token: Option<String>,
    /// Default reference voice used when a request names none.
    pub reference_audio: PathBuf,
    /// Seconds between status polls.
    pub poll_interval_secs: u64,
    /// Maximum seconds to wait for the remote job before giving up.
    pub max_wait_secs: u64,
    /// Whether `/chat` returns the cloned audio instead of the base TTS
    /// audio when cloning succeeds.
    pub prefer_cloned: bool,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.replicate.com/v1/predictions".to_owned(),
            upload_url: "https://transfer.sh".to_owned(),
            model: None,
            model_version: None,
            api_token: None,
            reference_audio: PathBuf::from("samples/reference.wav"),
            poll_interval_secs: 5,
            max_wait_secs: 120,
            prefer_cloned: false,
        }
    }
}

impl CloneConfig {
    /// Resolve the API token from config or the `CLONE_API_TOKEN` env var.
    pub fn resolved_token(&self) -> Option<String> {
        self.api_token
            .clone()
            .or_else(|| std::env::var("CLONE_API_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }

    /// Whether the remote cloning path has everything it needs.
    pub fn is_configured(&self) -> bool {
        self.model.is_some() && self.model_version.is_some() && self.resolved_token().is_some()
    }
}

/// Filesystem layout for generated and uploaded audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for synthesized and cloned replies.
    pub results_dir: PathBuf,
    /// Directory for uploaded reference voices.
    pub samples_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            samples_dir: PathBuf::from("samples"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; a present-but-invalid file is an
    /// explicit error rather than a silent fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| VoiceError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| VoiceError::Config(format!("failed to parse {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_match_demo_voice() {
        let config = AppConfig::default();
        assert_eq!(config.shaper.pitch, 0.8);
        assert_eq!(config.shaper.energy, 1.0);
        assert_eq!(config.shaper.duration, 1.0);
        assert_eq!(config.clone.poll_interval_secs, 5);
        assert!(!config.clone.prefer_cloned);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/voxpersona.toml")).unwrap();
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn parses_partial_toml() {
        let dir = std::env::temp_dir().join("voxpersona-test-config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("partial.toml");
        std::fs::write(&path, "[shaper]\npitch = 0.6\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.shaper.pitch, 0.6);
        // Untouched sections keep their defaults.
        assert_eq!(config.tts.command, "espeak-ng");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn invalid_toml_is_an_explicit_error() {
        let dir = std::env::temp_dir().join("voxpersona-test-config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.toml");
        std::fs::write(&path, "[shaper\npitch = ").unwrap();

        let result = AppConfig::load(&path);
        assert!(matches!(result, Err(VoiceError::Config(_))));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn remote_clone_unconfigured_by_default() {
        let config = CloneConfig {
            api_token: None,
            ..CloneConfig::default()
        };
        // Guard against ambient CLONE_API_TOKEN making this test flaky.
        if std::env::var("CLONE_API_TOKEN").is_err() {
            assert!(!config.is_configured());
        }
    }

    #[test]
    fn remote_clone_configured_with_all_fields() {
        let config = CloneConfig {
            model: Some("pseudoram/rvc-v2".to_owned()),
            model_version: Some("abc123".to_owned()),
            api_token: Some("tok".to_owned()),
            ..CloneConfig::default()
        };
        assert!(config.is_configured());
    }
}
