//! Offline TTS via an external espeak process.
//!
//! Mirrors the demo's save-to-tempfile flow: the engine renders to a
//! temporary WAV which is read back into memory and deleted. The binary is
//! resolved on PATH at construction so a missing engine fails at startup,
//! not mid-request.

use super::{SynthesizedAudio, Synthesizer};
use crate::audio;
use crate::config::TtsConfig;
use crate::error::{Result, VoiceError};
use std::path::PathBuf;
use std::process::Command;
use tracing::info;

/// Speech synthesizer backed by the `espeak-ng` (or `espeak`) binary.
pub struct EspeakSynthesizer {
    binary: PathBuf,
    voice: String,
    speed_wpm: u32,
}

impl EspeakSynthesizer {
    /// Resolve the configured binary on PATH.
    ///
    /// Falls back from the configured command to plain `espeak`, the common
    /// alias on older systems.
    ///
    /// # Errors
    ///
    /// Returns a TTS error if no espeak binary can be found.
    pub fn new(config: &TtsConfig) -> Result<Self> {
        let binary = which::which(&config.command)
            .or_else(|_| which::which("espeak"))
            .map_err(|_| {
                VoiceError::Tts(format!(
                    "TTS binary not found on PATH: {} (nor espeak)",
                    config.command
                ))
            })?;

        info!(binary = %binary.display(), voice = config.voice, "TTS engine ready");

        Ok(Self {
            binary,
            voice: config.voice.clone(),
            speed_wpm: config.speed_wpm,
        })
    }
}

impl Synthesizer for EspeakSynthesizer {
    fn name(&self) -> &str {
        "espeak"
    }

    fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let tmp = std::env::temp_dir().join(format!("voxpersona-tts-{}.wav", uuid::Uuid::new_v4()));

        let status = Command::new(&self.binary)
            .arg("-v")
            .arg(&self.voice)
            .arg("-s")
            .arg(self.speed_wpm.to_string())
            .arg("-w")
            .arg(&tmp)
            .arg(text)
            .status()
            .map_err(|e| VoiceError::Tts(format!("failed to run espeak: {e}")))?;

        if !status.success() {
            std::fs::remove_file(&tmp).ok();
            return Err(VoiceError::Tts(format!(
                "espeak exited with status {status}"
            )));
        }

        let wave = audio::read_wav(&tmp)?.into_mono();
        std::fs::remove_file(&tmp).ok();

        Ok(SynthesizedAudio {
            samples: wave.samples,
            sample_rate: wave.sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_fails_at_construction() {
        let config = TtsConfig {
            command: "definitely-not-a-tts-binary".to_owned(),
            ..TtsConfig::default()
        };
        // This host may still have plain `espeak`; only assert when neither
        // resolves.
        if which::which("espeak").is_err() {
            let result = EspeakSynthesizer::new(&config);
            assert!(matches!(result, Err(VoiceError::Tts(_))));
        }
    }

    #[test]
    fn synthesizes_when_engine_is_installed() {
        let config = TtsConfig::default();
        let Ok(engine) = EspeakSynthesizer::new(&config) else {
            // Engine not installed on this host; nothing to exercise.
            return;
        };
        let audio = engine.synthesize("hello world").expect("synthesis");
        assert!(!audio.samples.is_empty());
        assert!(audio.sample_rate > 0);
    }
}
