//! Audio file I/O: WAV read/write plus decode-anything for uploads.
//!
//! Generated audio is written as mono float32 WAV at whatever rate the
//! pipeline hands over (the orchestration layer owns the 24 kHz working
//! rate). Uploaded reference voices may arrive as wav or mp3 and are
//! decoded through symphonia.

use crate::dsp::{downmix, Waveform};
use crate::error::{Result, VoiceError};
use std::path::Path;

/// Read a WAV file into an interleaved [`Waveform`].
///
/// Integer formats are scaled to `[-1, 1]`; float formats pass through.
///
/// # Errors
///
/// Returns an audio error if the file cannot be opened or decoded.
pub fn read_wav(path: &Path) -> Result<Waveform> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| VoiceError::Audio(format!("failed to open {}: {e}", path.display())))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| VoiceError::Audio(format!("failed to read {}: {e}", path.display())))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| VoiceError::Audio(format!("failed to read {}: {e}", path.display())))?
        }
    };

    Ok(Waveform {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Write mono float32 samples as a WAV file, creating parent directories.
///
/// Samples are clamped to `[-1, 1]` on the way out.
///
/// # Errors
///
/// Returns an audio error if the file cannot be created or written.
pub fn write_wav_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| VoiceError::Audio(format!("failed to create {}: {e}", path.display())))?;
    for &s in samples {
        writer
            .write_sample(s.clamp(-1.0, 1.0))
            .map_err(|e| VoiceError::Audio(format!("failed to write sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| VoiceError::Audio(format!("failed to finalize {}: {e}", path.display())))?;
    Ok(())
}

/// Decode any supported audio file (wav/mp3) to mono f32 at its native rate.
///
/// # Errors
///
/// Returns an audio error if probing, decoding, or track selection fails.
pub fn decode_to_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| VoiceError::Audio(format!("unrecognized audio format: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| VoiceError::Audio("no default audio track".to_owned()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| VoiceError::Audio("unknown sample rate".to_owned()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| VoiceError::Audio(format!("failed to create decoder: {e}")))?;

    let mut mono: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(VoiceError::Audio(format!("audio read error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Recoverable corruption: drop the packet and continue.
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(VoiceError::Audio(format!("audio decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1) as u16;
        let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        mono.extend(downmix(buf.samples(), channels));
    }

    if mono.is_empty() {
        return Err(VoiceError::Audio("decoded audio is empty".to_owned()));
    }
    Ok((mono, sample_rate))
}

/// Reduce an arbitrary client filename to a safe lowercase stem.
///
/// Keeps ASCII alphanumerics, collapses separators to single underscores,
/// and drops everything else (including any path components).
pub fn sanitize_file_stem(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = base.rsplit_once('.').map_or(base, |(s, _)| s);
    let mut out = String::new();
    for c in stem.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if matches!(c, ' ' | '-' | '_' | '.') && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_owned()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("voxpersona-test-audio");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn float_wav_round_trips() {
        let path = temp_path("round_trip.wav");
        let samples: Vec<f32> = (0..2_400).map(|i| (i as f32 / 2_400.0) - 0.5).collect();
        write_wav_mono(&path, &samples, 24_000).unwrap();

        let wave = read_wav(&path).unwrap();
        assert_eq!(wave.sample_rate, 24_000);
        assert_eq!(wave.channels, 1);
        assert_eq!(wave.samples.len(), samples.len());
        for (a, b) in wave.samples.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-6);
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn int_wav_is_scaled_to_unit_range() {
        let path = temp_path("int16.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for v in [i16::MAX, 0, i16::MIN] {
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let wave = read_wav(&path).unwrap();
        assert!(wave.samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!((wave.samples[0] - 1.0).abs() < 1e-3);
        assert!((wave.samples[2] + 1.0) < 1e-3);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn decode_handles_pcm_wav() {
        let path = temp_path("decode_me.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..4_410i32 {
            let v = ((i % 100) * 300 - 15_000) as i16;
            writer.write_sample(v).unwrap();
            writer.write_sample(-v).unwrap();
        }
        writer.finalize().unwrap();

        let (mono, sr) = decode_to_mono(&path).unwrap();
        assert_eq!(sr, 22_050);
        assert_eq!(mono.len(), 4_410);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_an_audio_error() {
        let result = read_wav(Path::new("/nonexistent/never.wav"));
        assert!(matches!(result, Err(VoiceError::Audio(_))));
    }

    #[test]
    fn sanitize_strips_paths_and_specials() {
        assert_eq!(sanitize_file_stem("My Voice (final).wav"), "my_voice_final");
        assert_eq!(sanitize_file_stem("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_stem("ref.wav"), "ref");
        assert_eq!(sanitize_file_stem("///"), "");
    }
}
