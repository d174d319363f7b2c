//! Phase-vocoder time stretching and pitch shifting.
//!
//! `time_stretch` changes duration without altering pitch; `pitch_shift`
//! composes a stretch with a resample so pitch moves while duration is
//! preserved. Both operate on mono f32 buffers.

use crate::dsp::resample::resample_linear;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::TAU;

/// Analysis/synthesis frame length.
const N_FFT: usize = 2048;

/// Hop between frames (75% overlap).
const HOP: usize = N_FFT / 4;

/// Stretch `input` by `rate`: `rate > 1` shortens (faster), `rate < 1`
/// lengthens (slower). Pitch is preserved.
///
/// Inputs shorter than two analysis frames fall back to plain resampling,
/// where pitch preservation is meaningless anyway.
pub fn time_stretch(input: &[f32], rate: f32) -> Vec<f32> {
    if input.is_empty() || (rate - 1.0).abs() < 1e-6 {
        return input.to_vec();
    }
    let rate = rate.max(1e-3);

    let long_enough = input.len() >= N_FFT + HOP;
    if !long_enough {
        // Playback-rate resampling: duration changes, pitch follows.
        return resample_linear(input, f64::from(rate), 1.0);
    }
    let num_frames = (input.len() - N_FFT) / HOP + 1;
    if num_frames < 2 {
        return resample_linear(input, f64::from(rate), 1.0);
    }

    let window = hann();
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(N_FFT);
    let ifft = planner.plan_fft_inverse(N_FFT);

    // Analysis: windowed STFT frames.
    let mut spectra: Vec<Vec<Complex<f32>>> = Vec::with_capacity(num_frames);
    for f in 0..num_frames {
        let start = f * HOP;
        let mut buf: Vec<Complex<f32>> = (0..N_FFT)
            .map(|i| Complex::new(input[start + i] * window[i], 0.0))
            .collect();
        fft.process(&mut buf);
        spectra.push(buf);
    }

    // Expected per-hop phase advance for each bin.
    let omega: Vec<f32> = (0..N_FFT)
        .map(|k| TAU * k as f32 * HOP as f32 / N_FFT as f32)
        .collect();

    // Synthesis: walk the analysis frames at `rate`, interpolating
    // magnitudes and accumulating instantaneous phase.
    let mut phase_acc: Vec<f32> = spectra[0].iter().map(|c| c.arg()).collect();
    let mut frames: Vec<Vec<f32>> = vec![istft_frame(ifft.as_ref(), &spectra[0])];

    let mut j = 1usize;
    loop {
        let t = j as f32 * rate;
        if t > (num_frames - 1) as f32 {
            break;
        }
        let f0 = (t.floor() as usize).min(num_frames - 2);
        let frac = t - f0 as f32;
        let prev = &spectra[f0];
        let next = &spectra[f0 + 1];

        let mut synth: Vec<Complex<f32>> = Vec::with_capacity(N_FFT);
        for k in 0..N_FFT {
            let mag = prev[k].norm() * (1.0 - frac) + next[k].norm() * frac;
            let mut dphi = next[k].arg() - prev[k].arg() - omega[k];
            dphi -= TAU * (dphi / TAU).round();
            phase_acc[k] += omega[k] + dphi;
            synth.push(Complex::from_polar(mag, phase_acc[k]));
        }
        frames.push(istft_frame(ifft.as_ref(), &synth));
        j += 1;
    }

    overlap_add(&frames, &window)
}

/// Shift pitch by `semitones` (negative = lower) without changing duration.
///
/// Classic decomposition: pitch-preserving stretch by the inverse
/// frequency ratio, then a playback-rate resample back to the original
/// length.
pub fn pitch_shift(input: &[f32], sample_rate: u32, semitones: f32) -> Vec<f32> {
    if input.is_empty() || semitones.abs() < 1e-3 {
        return input.to_vec();
    }
    let ratio = 2.0f32.powf(semitones / 12.0);
    let stretched = time_stretch(input, 1.0 / ratio);
    resample_linear(
        &stretched,
        f64::from(sample_rate) * f64::from(ratio),
        f64::from(sample_rate),
    )
}

fn hann() -> Vec<f32> {
    (0..N_FFT)
        .map(|i| 0.5 * (1.0 - (TAU * i as f32 / N_FFT as f32).cos()))
        .collect()
}

/// Inverse FFT of one synthesis spectrum, scaled back to time-domain range.
fn istft_frame(ifft: &dyn Fft<f32>, spectrum: &[Complex<f32>]) -> Vec<f32> {
    let mut buf = spectrum.to_vec();
    ifft.process(&mut buf);
    buf.iter().map(|c| c.re / N_FFT as f32).collect()
}

/// Windowed overlap-add with squared-window normalization.
fn overlap_add(frames: &[Vec<f32>], window: &[f32]) -> Vec<f32> {
    let out_len = (frames.len() - 1) * HOP + N_FFT;
    let mut out = vec![0.0f32; out_len];
    let mut wsum = vec![0.0f32; out_len];
    for (j, frame) in frames.iter().enumerate() {
        let off = j * HOP;
        for i in 0..N_FFT {
            out[off + i] += frame[i] * window[i];
            wsum[off + i] += window[i] * window[i];
        }
    }
    for (o, w) in out.iter_mut().zip(&wsum) {
        if *w > 1e-8 {
            *o /= *w;
        }
    }
    out
}
