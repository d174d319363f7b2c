//! The voice shaper: reshape synthesized speech into a target vocal
//! character.
//!
//! Fixed pipeline over a mono buffer — pitch shift, time stretch,
//! band-limiting EQ, energy scaling, peak normalization. Order matters and
//! no step is skipped, with one exception: an EQ design/apply failure
//! degrades gracefully (the signal continues unfiltered) instead of failing
//! the whole operation.

use crate::dsp::filters;
use crate::dsp::stretch::{pitch_shift, time_stretch};
use crate::dsp::Waveform;
use crate::error::{Result, VoiceError};
use tracing::warn;

/// Peak level after normalization (2% headroom against clipping).
pub const PEAK_CEILING: f32 = 0.98;

/// High-pass corner of the band-limiting EQ in Hz.
const EQ_HIGHPASS_HZ: f64 = 80.0;

/// Low-pass corner of the band-limiting EQ in Hz.
const EQ_LOWPASS_HZ: f64 = 4_000.0;

/// EQ filter order (per side).
const EQ_ORDER: usize = 4;

/// The three scalar controls of the shaper.
///
/// All must be positive and finite. `pitch` is a multiplicative frequency
/// ratio (1.0 = unchanged, <1.0 lowers), `duration` a time-stretch ratio
/// (>1.0 = slower/longer), `energy` a linear gain applied before the final
/// normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceControls {
    pub pitch: f32,
    pub energy: f32,
    pub duration: f32,
}

impl Default for VoiceControls {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            energy: 1.0,
            duration: 1.0,
        }
    }
}

impl VoiceControls {
    /// Validate that every control is a positive finite number.
    ///
    /// # Errors
    ///
    /// Returns a shape error naming the offending control.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("pitch", self.pitch),
            ("energy", self.energy),
            ("duration", self.duration),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(VoiceError::Shape(format!(
                    "{name} control must be a positive finite number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl From<&crate::config::ShaperConfig> for VoiceControls {
    fn from(config: &crate::config::ShaperConfig) -> Self {
        Self {
            pitch: config.pitch,
            energy: config.energy,
            duration: config.duration,
        }
    }
}

/// Pitch-control ratio → shift in semitones.
///
/// The 1e-3 floor keeps the logarithm defined for degenerate inputs.
pub fn semitone_shift(pitch_control: f32) -> f32 {
    12.0 * pitch_control.max(1e-3).log2()
}

/// Duration-control ratio → playback-rate multiplier, clamped to
/// `[0.25, 2.0]` to guard against pathological stretches.
pub fn stretch_rate(duration_control: f32) -> f32 {
    (1.0 / duration_control.max(1e-6)).clamp(0.25, 2.0)
}

/// Run the full shaping pipeline.
///
/// The output is mono at the input's sample rate, with peak amplitude at
/// most [`PEAK_CEILING`] (or silent). The input buffer is not retained.
///
/// # Errors
///
/// Returns an error for invalid controls, a zero sample rate, or an
/// unexpected failure in the pitch/stretch/gain stages. EQ failure alone is
/// not an error.
pub fn shape(input: &Waveform, controls: &VoiceControls) -> Result<Waveform> {
    controls.validate()?;
    if input.sample_rate == 0 {
        return Err(VoiceError::Shape(
            "waveform sample rate must be positive".to_owned(),
        ));
    }

    // 1. Mono reduction.
    let mono = input.clone().into_mono();
    let sample_rate = mono.sample_rate;
    let mut samples = mono.samples;
    if samples.is_empty() {
        return Ok(Waveform::mono(samples, sample_rate));
    }

    // 2. Pitch shift (duration-preserving).
    let semitones = semitone_shift(controls.pitch);
    samples = pitch_shift(&samples, sample_rate, semitones);

    // 3. Time stretch (pitch-preserving).
    let rate = stretch_rate(controls.duration);
    samples = time_stretch(&samples, rate);

    // 4. Band-limiting EQ — non-fatal on failure.
    match band_limit(&samples, sample_rate) {
        Ok(filtered) => samples = filtered,
        Err(e) => warn!(error = %e, "EQ failed, continuing with unfiltered signal"),
    }

    // 5. Energy scaling.
    for s in samples.iter_mut() {
        *s *= controls.energy;
    }

    // 6. Normalize to the headroom ceiling, then clamp.
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if !peak.is_finite() {
        return Err(VoiceError::Shape(
            "shaping produced non-finite samples".to_owned(),
        ));
    }
    if peak > 0.0 {
        let scale = PEAK_CEILING / peak;
        for s in samples.iter_mut() {
            *s *= scale;
        }
    }
    for s in samples.iter_mut() {
        *s = s.clamp(-1.0, 1.0);
    }

    Ok(Waveform::mono(samples, sample_rate))
}

/// High-pass then low-pass the signal at the speech band edges.
fn band_limit(samples: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
    let hp = filters::highpass(sample_rate, EQ_HIGHPASS_HZ, EQ_ORDER)?;
    let lp = filters::lowpass(sample_rate, EQ_LOWPASS_HZ, EQ_ORDER)?;
    let filtered = filters::sosfilt(&lp, &filters::sosfilt(&hp, samples));
    if filtered.iter().any(|s| !s.is_finite()) {
        return Err(VoiceError::Shape(
            "EQ produced non-finite samples".to_owned(),
        ));
    }
    Ok(filtered)
}
