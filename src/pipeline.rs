//! Request pipeline and service lifecycle.
//!
//! [`Services`] owns the long-lived collaborators (language model, TTS
//! engine) built once at startup; request handlers borrow it. Each chat
//! request runs the full chain to completion: reply generation → base TTS →
//! cloning attempt → final-audio choice. All audio state lives on disk
//! under fixed names — last writer wins.

use crate::audio;
use crate::config::AppConfig;
use crate::dsp::resample::resample_linear;
use crate::error::{Result, VoiceError};
use crate::llm::{LocalResponder, Responder};
use crate::tts::{self, EspeakSynthesizer, Synthesizer, WORKING_SAMPLE_RATE};
use crate::voice_clone;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// File name of the unshaped base TTS audio.
const BASE_AUDIO_FILE: &str = "reply_tts.wav";

/// File name of the cloned/shaped audio.
const CLONED_AUDIO_FILE: &str = "reply_cloned.wav";

/// Stable alias updated with every reply.
const LATEST_AUDIO_FILE: &str = "latest_reply.wav";

/// Long-lived collaborators shared by all requests.
pub struct Services {
    pub config: AppConfig,
    responder: Box<dyn Responder>,
    synthesizer: Box<dyn Synthesizer>,
    shutdown: CancellationToken,
}

impl Services {
    /// Build every collaborator from configuration.
    ///
    /// This is the slow startup step: it loads the language model and
    /// resolves the TTS engine. Storage directories are created here so
    /// request handlers never race on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator cannot be constructed or the
    /// storage directories cannot be created.
    pub async fn initialize(config: AppConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.storage.results_dir)?;
        std::fs::create_dir_all(&config.storage.samples_dir)?;

        let synthesizer = EspeakSynthesizer::new(&config.tts)?;
        let responder = LocalResponder::new(&config.llm).await?;

        Ok(Self {
            config,
            responder: Box::new(responder),
            synthesizer: Box::new(synthesizer),
            shutdown: CancellationToken::new(),
        })
    }

    /// Assemble services from explicit collaborators (used by tests).
    pub fn with_collaborators(
        config: AppConfig,
        responder: Box<dyn Responder>,
        synthesizer: Box<dyn Synthesizer>,
    ) -> Self {
        Self {
            config,
            responder,
            synthesizer,
            shutdown: CancellationToken::new(),
        }
    }

    /// Signal in-flight remote work to stop. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// The result of one chat request.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: String,
    pub audio_file: PathBuf,
}

/// Run the full chat pipeline for one request.
///
/// `reference` overrides the configured default reference voice. The
/// returned audio path is the base TTS audio unless cloning succeeded and
/// `clone.prefer_cloned` is set.
///
/// # Errors
///
/// Returns an error if reply generation or base synthesis fails; cloning
/// failure degrades to the base audio instead of failing the request.
pub async fn handle_chat(
    services: &Arc<Services>,
    text: &str,
    reference: Option<&Path>,
) -> Result<ChatReply> {
    let response = services.responder.reply(text).await?;
    info!(reply = response.as_str(), "generated persona reply");

    let results_dir = &services.config.storage.results_dir;
    let base_path = results_dir.join(BASE_AUDIO_FILE);
    let base_path = {
        let svc = Arc::clone(services);
        let reply_text = response.clone();
        let out = base_path.clone();
        tokio::task::spawn_blocking(move || {
            tts::synthesize_to_file(svc.synthesizer.as_ref(), &reply_text, &out)
        })
        .await
        .map_err(|e| VoiceError::Tts(format!("synthesis task panicked: {e}")))??
    };

    let reference = reference
        .map(Path::to_path_buf)
        .unwrap_or_else(|| services.config.clone.reference_audio.clone());
    let cloned_path = results_dir.join(CLONED_AUDIO_FILE);

    let outcome = voice_clone::clone_voice(
        &services.config.clone,
        &services.config.shaper,
        &base_path,
        &reference,
        &cloned_path,
        &services.shutdown,
    )
    .await;

    let audio_file = match (&outcome.audio, services.config.clone.prefer_cloned) {
        (Some(cloned), true) => {
            info!(
                strategy = outcome.log.winner().unwrap_or("unknown"),
                "returning cloned audio"
            );
            cloned.clone()
        }
        (Some(_), false) => {
            info!("cloned audio produced but base audio preferred by configuration");
            base_path.clone()
        }
        (None, _) => {
            warn!("all cloning strategies failed, returning base audio");
            base_path.clone()
        }
    };

    // Keep a stable alias pointing at the most recent reply.
    let latest = results_dir.join(LATEST_AUDIO_FILE);
    if let Err(e) = std::fs::copy(&audio_file, &latest) {
        warn!(error = %e, "failed to update latest-reply alias");
    }

    Ok(ChatReply {
        response,
        audio_file,
    })
}

/// Store an uploaded reference voice: decode (wav/mp3), downmix, resample
/// to the working rate, and write `<samples_dir>/<stem>.wav`.
///
/// # Errors
///
/// Returns an audio error for undecodable uploads, an I/O error if the
/// file cannot be written.
pub async fn store_reference(
    services: &Arc<Services>,
    file_name: &str,
    data: Vec<u8>,
) -> Result<PathBuf> {
    let stem = audio::sanitize_file_stem(file_name);
    if stem.is_empty() {
        return Err(VoiceError::Audio("empty or unusable filename".to_owned()));
    }
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "wav".to_owned());
    let samples_dir = services.config.storage.samples_dir.clone();

    tokio::task::spawn_blocking(move || {
        let tmp = std::env::temp_dir().join(format!(
            "voxpersona-upload-{}.{extension}",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&tmp, &data)?;
        let decoded = audio::decode_to_mono(&tmp);
        std::fs::remove_file(&tmp).ok();
        let (mono, sample_rate) = decoded?;

        let samples = if sample_rate == WORKING_SAMPLE_RATE {
            mono
        } else {
            resample_linear(
                &mono,
                f64::from(sample_rate),
                f64::from(WORKING_SAMPLE_RATE),
            )
        };

        let path = samples_dir.join(format!("{stem}.wav"));
        audio::write_wav_mono(&path, &samples, WORKING_SAMPLE_RATE)?;
        info!(path = %path.display(), "reference voice stored");
        Ok(path)
    })
    .await
    .map_err(|e| VoiceError::Audio(format!("upload task panicked: {e}")))?
}
