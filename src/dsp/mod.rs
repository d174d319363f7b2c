//! Audio post-processing: the one algorithmic core of the demo.
//!
//! The [`shaper`] pipeline reshapes synthesized speech into a target vocal
//! character (pitch shift, time stretch, band-limiting EQ, gain and peak
//! normalization). [`filters`] supplies the Butterworth band-limiting
//! sections, [`stretch`] the phase-vocoder pitch/time operations, and
//! [`resample`] the linear sample-rate conversion used at the seams.

pub mod filters;
pub mod resample;
pub mod shaper;
pub mod stretch;

/// A buffer of float samples tagged with its rate and channel layout.
///
/// Samples are interleaved when `channels > 1` and are expected to lie in
/// `[-1, 1]`. Every shaper operation reduces to mono first and owns its
/// buffer for the duration of the call.
#[derive(Debug, Clone)]
pub struct Waveform {
    /// Interleaved samples.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count (1 = mono).
    pub channels: u16,
}

impl Waveform {
    /// Construct a mono waveform.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    /// Duration in seconds (0 for an empty buffer or zero rate).
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        let frames = self.samples.len() / self.channels as usize;
        frames as f32 / self.sample_rate as f32
    }

    /// Peak absolute sample value (0 for an empty buffer).
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }

    /// Reduce to mono by averaging channels; mono input passes through.
    pub fn into_mono(self) -> Waveform {
        if self.channels <= 1 {
            return Waveform {
                channels: 1,
                ..self
            };
        }
        let mono = downmix(&self.samples, self.channels);
        Waveform::mono(mono, self.sample_rate)
    }
}

/// Average interleaved frames into a single channel.
pub(crate) fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels.max(1) as usize;
    if ch == 1 {
        return samples.to_vec();
    }
    let mut out = Vec::with_capacity(samples.len() / ch + 1);
    for frame in samples.chunks_exact(ch) {
        let sum: f32 = frame.iter().sum();
        out.push(sum / ch as f32);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_stereo_frames() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let mono = downmix(&stereo, 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn mono_passes_through_unchanged() {
        let wave = Waveform::mono(vec![0.1, -0.2, 0.3], 16_000);
        let mono = wave.clone().into_mono();
        assert_eq!(mono.samples, wave.samples);
        assert_eq!(mono.channels, 1);
    }

    #[test]
    fn duration_counts_frames_not_samples() {
        let wave = Waveform {
            samples: vec![0.0; 48_000],
            sample_rate: 24_000,
            channels: 2,
        };
        assert!((wave.duration_secs() - 1.0).abs() < 1e-6);
    }
}
