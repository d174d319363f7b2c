//! Text-to-speech synthesis and the file-producing orchestration around it.
//!
//! The engine itself is a collaborator behind [`Synthesizer`]; the core
//! only requires a mono float buffer plus its native sample rate.
//! [`synthesize_to_file`] owns the fixed 24 kHz working rate: whatever the
//! engine produces is resampled, normalized, and persisted as float32 WAV.

mod espeak;

pub use espeak::EspeakSynthesizer;

use crate::audio;
use crate::dsp::resample::resample_linear;
use crate::error::{Result, VoiceError};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Working sample rate for all persisted audio.
pub const WORKING_SAMPLE_RATE: u32 = 24_000;

/// Peak level of the base (unshaped) audio after normalization.
const BASE_PEAK: f32 = 0.95;

/// One synthesized utterance: mono samples at the engine's native rate.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// A speech synthesis engine.
///
/// Implementations turn text into a mono float buffer at whatever rate is
/// native to them; rate conversion is the orchestration's job.
pub trait Synthesizer: Send + Sync {
    /// Short engine name for logs and attempt records.
    fn name(&self) -> &str;

    /// Synthesize `text` to audio.
    ///
    /// # Errors
    ///
    /// Returns a TTS error if the engine is unavailable or synthesis fails.
    fn synthesize(&self, text: &str) -> Result<SynthesizedAudio>;
}

/// Synthesize `text` and persist it at `output` as mono float32 WAV at the
/// working rate.
///
/// On any failure the reason is logged and no file is produced; callers
/// abort the request's remaining stages rather than continuing with missing
/// audio.
///
/// # Errors
///
/// Returns a TTS error for empty text, engine failure, or an empty engine
/// result; an audio error if the file cannot be written.
pub fn synthesize_to_file(engine: &dyn Synthesizer, text: &str, output: &Path) -> Result<PathBuf> {
    if text.trim().is_empty() {
        return Err(VoiceError::Tts("no text to synthesize".to_owned()));
    }

    let synthesized = engine.synthesize(text).inspect_err(|e| {
        error!(engine = engine.name(), error = %e, "speech synthesis failed");
    })?;

    if synthesized.samples.is_empty() {
        error!(engine = engine.name(), "synthesizer produced no audio");
        return Err(VoiceError::Tts("synthesizer produced no audio".to_owned()));
    }
    if synthesized.sample_rate == 0 {
        return Err(VoiceError::Tts(
            "synthesizer reported a zero sample rate".to_owned(),
        ));
    }

    let mut samples = if synthesized.sample_rate == WORKING_SAMPLE_RATE {
        synthesized.samples
    } else {
        resample_linear(
            &synthesized.samples,
            f64::from(synthesized.sample_rate),
            f64::from(WORKING_SAMPLE_RATE),
        )
    };

    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if peak > 0.0 {
        let scale = BASE_PEAK / peak;
        for s in samples.iter_mut() {
            *s *= scale;
        }
    }

    audio::write_wav_mono(output, &samples, WORKING_SAMPLE_RATE)?;
    info!(
        engine = engine.name(),
        path = %output.display(),
        seconds = samples.len() as f32 / WORKING_SAMPLE_RATE as f32,
        "base TTS audio written"
    );
    Ok(output.to_path_buf())
}
