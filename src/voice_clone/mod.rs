//! Voice cloning: reshape the base TTS audio toward a reference speaker.
//!
//! Two strategies run in a fixed order — the remote cloning API, then the
//! offline voice shaper — and the orchestrator stops at the first success.
//! Every attempt is recorded in an [`AttemptLog`] so a failed clone is
//! auditable instead of silently swallowed.

pub mod remote;

use crate::audio;
use crate::config::{CloneConfig, ShaperConfig};
use crate::dsp::shaper::{shape, VoiceControls};
use crate::error::{Result, VoiceError};
use remote::RemoteCloneClient;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Outcome of one cloning strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
    Skipped(String),
}

/// One recorded attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub strategy: &'static str,
    pub outcome: AttemptOutcome,
}

/// Ordered record of every strategy tried for one cloning operation.
#[derive(Debug, Clone, Default)]
pub struct AttemptLog {
    attempts: Vec<Attempt>,
}

impl AttemptLog {
    fn record(&mut self, strategy: &'static str, outcome: AttemptOutcome) {
        match &outcome {
            AttemptOutcome::Succeeded => info!(strategy, "cloning strategy succeeded"),
            AttemptOutcome::Failed(reason) => {
                warn!(strategy, reason = reason.as_str(), "cloning strategy failed");
            }
            AttemptOutcome::Skipped(reason) => {
                info!(strategy, reason = reason.as_str(), "cloning strategy skipped");
            }
        }
        self.attempts.push(Attempt { strategy, outcome });
    }

    /// The strategy that produced the audio, if any succeeded.
    pub fn winner(&self) -> Option<&'static str> {
        self.attempts
            .iter()
            .find(|a| a.outcome == AttemptOutcome::Succeeded)
            .map(|a| a.strategy)
    }

    /// All recorded attempts, in order.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }
}

/// Result of a cloning operation: the produced file (if any strategy
/// succeeded) plus the full attempt record.
#[derive(Debug)]
pub struct CloneOutcome {
    pub audio: Option<PathBuf>,
    pub log: AttemptLog,
}

/// Try each cloning strategy in order against the base audio.
///
/// `base_audio` is the unshaped TTS output; `reference` is the target
/// speaker sample (used only by the remote strategy). The result lands at
/// `output`. Never returns an error: a fully failed clone is reported
/// through the outcome so the caller can fall back to the base audio.
pub async fn clone_voice(
    clone_config: &CloneConfig,
    shaper_config: &ShaperConfig,
    base_audio: &Path,
    reference: &Path,
    output: &Path,
    cancel: &CancellationToken,
) -> CloneOutcome {
    let mut log = AttemptLog::default();

    // Strategy 1: the remote cloning API.
    let remote_outcome = if !clone_config.is_configured() {
        AttemptOutcome::Skipped("remote cloning is not configured".to_owned())
    } else if !reference.exists() {
        AttemptOutcome::Skipped(format!(
            "reference voice not found: {}",
            reference.display()
        ))
    } else {
        match RemoteCloneClient::new(clone_config) {
            Err(e) => AttemptOutcome::Failed(e.to_string()),
            Ok(client) => match client.clone_voice(base_audio, reference, output, cancel).await {
                Ok(_) => AttemptOutcome::Succeeded,
                Err(e) => AttemptOutcome::Failed(e.to_string()),
            },
        }
    };
    log.record("remote", remote_outcome);
    if log.winner().is_some() {
        return CloneOutcome {
            audio: Some(output.to_path_buf()),
            log,
        };
    }

    // Strategy 2: the offline voice shaper.
    let shaper_outcome = {
        let controls = VoiceControls::from(shaper_config);
        let base = base_audio.to_path_buf();
        let out = output.to_path_buf();
        let result = tokio::task::spawn_blocking(move || shape_file(&base, &out, &controls)).await;
        match result {
            Ok(Ok(())) => AttemptOutcome::Succeeded,
            Ok(Err(e)) => AttemptOutcome::Failed(e.to_string()),
            Err(e) => AttemptOutcome::Failed(format!("shaper task panicked: {e}")),
        }
    };
    log.record("shaper", shaper_outcome);

    CloneOutcome {
        audio: log.winner().map(|_| output.to_path_buf()),
        log,
    }
}

/// Read a WAV, run the shaper, write the result. Sample rate is preserved.
fn shape_file(input: &Path, output: &Path, controls: &VoiceControls) -> Result<()> {
    let wave = audio::read_wav(input)?;
    if wave.samples.is_empty() {
        return Err(VoiceError::Shape("base audio is empty".to_owned()));
    }
    let shaped = shape(&wave, controls)?;
    audio::write_wav_mono(output, &shaped.samples, shaped.sample_rate)
}
