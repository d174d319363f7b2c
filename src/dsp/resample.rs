//! Linear-interpolation resampling for mono buffers.
//!
//! Quality is fine for speech at the rates this pipeline moves between
//! (engine-native → 24 kHz working rate, plus the pitch shifter's
//! fractional-rate leg). Rates are `f64` because the pitch shifter
//! resamples by non-integer ratios.

/// Resample `input` from `from_hz` to `to_hz`.
///
/// Both rates must be positive. Edge samples are held (clamped) rather than
/// extrapolated. Equal rates and empty input pass through unchanged.
pub fn resample_linear(input: &[f32], from_hz: f64, to_hz: f64) -> Vec<f32> {
    if input.is_empty() || (from_hz - to_hz).abs() < f64::EPSILON {
        return input.to_vec();
    }

    let step = from_hz / to_hz;
    let out_len = ((input.len() as f64) * to_hz / from_hz).round().max(1.0) as usize;
    let last = input.len() - 1;

    let mut out = Vec::with_capacity(out_len);
    let mut pos = 0.0f64;
    for _ in 0..out_len {
        let i0 = (pos.floor() as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let frac = (pos - pos.floor()) as f32;
        out.push(input[i0] * (1.0 - frac) + input[i1] * frac);
        pos += step;
    }
    out
}
