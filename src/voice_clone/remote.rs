//! Client for the remote voice-cloning API.
//!
//! The request/poll/download cycle: stage both WAVs on a transfer host,
//! create a prediction, poll its status endpoint on a fixed interval until
//! a terminal state, then download the produced audio. The poll is bounded
//! by a deadline and a cancellation token — a stalled remote job yields
//! [`VoiceError::Timeout`] rather than blocking forever.

use crate::config::CloneConfig;
use crate::error::{Result, VoiceError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Prediction status document returned by the remote API.
#[derive(Debug, Deserialize)]
struct Prediction {
    status: String,
    #[serde(default)]
    urls: PredictionUrls,
    #[serde(default)]
    output: Option<Vec<String>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }
}

/// HTTP client for the remote cloning service.
#[derive(Debug)]
pub struct RemoteCloneClient {
    http: reqwest::Client,
    api_url: String,
    upload_url: String,
    model: String,
    model_version: String,
    token: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl RemoteCloneClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns a config error naming the first missing required setting —
    /// the remote path never proceeds half-configured.
    pub fn new(config: &CloneConfig) -> Result<Self> {
        let token = config
            .resolved_token()
            .ok_or_else(|| VoiceError::Config("clone API token is not set".to_owned()))?;
        let model = config
            .model
            .clone()
            .ok_or_else(|| VoiceError::Config("clone model is not set".to_owned()))?;
        let model_version = config
            .model_version
            .clone()
            .ok_or_else(|| VoiceError::Config("clone model version is not set".to_owned()))?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            upload_url: config.upload_url.trim_end_matches('/').to_owned(),
            model,
            model_version,
            token,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
        })
    }

    /// Run the full clone cycle; the produced audio lands at `output`.
    ///
    /// # Errors
    ///
    /// - [`VoiceError::Clone`] for upload/request/download failures,
    ///   unauthorized credentials, or a remote-reported failure state.
    /// - [`VoiceError::Timeout`] when the job does not reach a terminal
    ///   state within the configured maximum wait.
    pub async fn clone_voice(
        &self,
        input_audio: &Path,
        reference_audio: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let reference_url = self.upload(reference_audio).await?;
        let input_url = self.upload(input_audio).await?;

        let prediction = self.create_prediction(&input_url, &reference_url).await?;
        let prediction = self.poll_until_terminal(prediction, cancel).await?;

        if prediction.status != "succeeded" {
            return Err(VoiceError::Clone(format!(
                "remote job ended in state '{}': {}",
                prediction.status,
                prediction.error.unwrap_or_else(|| "no detail".to_owned())
            )));
        }

        let audio_url = prediction
            .output
            .as_ref()
            .and_then(|o| o.first())
            .ok_or_else(|| VoiceError::Clone("remote job produced no output".to_owned()))?;

        self.download(audio_url, output).await?;
        info!(path = %output.display(), "cloned audio downloaded");
        Ok(output.to_path_buf())
    }

    /// Stage a local file on the transfer host; returns its hosted URL.
    async fn upload(&self, path: &Path) -> Result<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VoiceError::Clone(format!("invalid file path: {}", path.display())))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| VoiceError::Clone(format!("cannot read {}: {e}", path.display())))?;

        let url = format!("{}/{}", self.upload_url, file_name);
        let response = self
            .http
            .put(&url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| VoiceError::Clone(format!("upload failed: {e}")))?;

        if !response.status().is_success() {
            return Err(VoiceError::Clone(format!(
                "upload of {file_name} failed with status {}",
                response.status()
            )));
        }

        let hosted = response
            .text()
            .await
            .map_err(|e| VoiceError::Clone(format!("upload response unreadable: {e}")))?
            .trim()
            .to_owned();
        if hosted.is_empty() {
            return Err(VoiceError::Clone(
                "upload host returned an empty URL".to_owned(),
            ));
        }
        info!(file = file_name, url = hosted.as_str(), "staged audio for cloning");
        Ok(hosted)
    }

    async fn create_prediction(&self, input_url: &str, reference_url: &str) -> Result<Prediction> {
        let payload = serde_json::json!({
            "version": self.model_version,
            "input": {
                "model": self.model,
                "input_audio": input_url,
                "reference_audio": reference_url,
            }
        });

        let response = self
            .http
            .post(&self.api_url)
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| VoiceError::Clone(format!("prediction request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(VoiceError::Clone(
                "unauthorized: invalid clone API token".to_owned(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Clone(format!(
                "prediction request rejected with status {status}: {body}"
            )));
        }

        response
            .json::<Prediction>()
            .await
            .map_err(|e| VoiceError::Clone(format!("malformed prediction response: {e}")))
    }

    /// Poll the prediction's status endpoint until terminal, bounded by the
    /// configured deadline.
    async fn poll_until_terminal(
        &self,
        mut prediction: Prediction,
        cancel: &CancellationToken,
    ) -> Result<Prediction> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            if prediction.is_terminal() {
                return Ok(prediction);
            }
            if Instant::now() >= deadline {
                return Err(VoiceError::Timeout(format!(
                    "remote job still '{}' after {}s",
                    prediction.status,
                    self.max_wait.as_secs()
                )));
            }
            let status_url = prediction
                .urls
                .get
                .clone()
                .ok_or_else(|| VoiceError::Clone("prediction has no status URL".to_owned()))?;

            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(VoiceError::Clone("cloning was cancelled".to_owned()));
                }
                () = tokio::time::sleep(self.poll_interval) => {}
            }

            let response = self
                .http
                .get(&status_url)
                .header(reqwest::header::AUTHORIZATION, format!("Token {}", self.token))
                .send()
                .await
                .map_err(|e| VoiceError::Clone(format!("status poll failed: {e}")))?;
            if !response.status().is_success() {
                return Err(VoiceError::Clone(format!(
                    "status poll rejected with status {}",
                    response.status()
                )));
            }
            let mut next: Prediction = response
                .json()
                .await
                .map_err(|e| VoiceError::Clone(format!("malformed status response: {e}")))?;
            // The status document may omit `urls` once terminal; keep ours.
            if next.urls.get.is_none() {
                next.urls.get = Some(status_url);
            }
            prediction = next;
        }
    }

    async fn download(&self, url: &str, output: &Path) -> Result<()> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| VoiceError::Clone(format!("download failed: {e}")))?;
        if !response.status().is_success() {
            return Err(VoiceError::Clone(format!(
                "download rejected with status {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceError::Clone(format!("download body unreadable: {e}")))?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(output, &bytes).await?;
        Ok(())
    }
}
