//! Endpoint behavior tests against a live server on an ephemeral port,
//! with scripted collaborators standing in for the language model and TTS
//! engine.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;
use voxpersona::config::AppConfig;
use voxpersona::llm::Responder;
use voxpersona::server::{ChatResponse, ErrorResponse, UploadResponse};
use voxpersona::tts::{SynthesizedAudio, Synthesizer};
use voxpersona::{ChatServer, Services};

struct ScriptedResponder;

#[async_trait::async_trait]
impl Responder for ScriptedResponder {
    async fn reply(&self, text: &str) -> voxpersona::Result<String> {
        Ok(format!("You asked about {text}. Dream big and work hard."))
    }
}

struct ToneSynth;

impl Synthesizer for ToneSynth {
    fn name(&self) -> &str {
        "tone"
    }

    fn synthesize(&self, _text: &str) -> voxpersona::Result<SynthesizedAudio> {
        let sample_rate = 22_050u32;
        let samples = (0..sample_rate / 2)
            .map(|i| 0.4 * (TAU * 220.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        Ok(SynthesizedAudio {
            samples,
            sample_rate,
        })
    }
}

struct BrokenSynth;

impl Synthesizer for BrokenSynth {
    fn name(&self) -> &str {
        "broken"
    }

    fn synthesize(&self, _text: &str) -> voxpersona::Result<SynthesizedAudio> {
        Err(voxpersona::VoiceError::Tts("engine unavailable".to_owned()))
    }
}

struct TestServer {
    server: ChatServer,
    results_dir: PathBuf,
    samples_dir: PathBuf,
    // Held for its Drop: removes the on-disk fixture tree.
    _root: tempfile::TempDir,
}

impl TestServer {
    fn url(&self, route: &str) -> String {
        format!("http://127.0.0.1:{}{route}", self.server.port())
    }
}

async fn start_server(synthesizer: Box<dyn Synthesizer>, prefer_cloned: bool) -> TestServer {
    let root = tempfile::tempdir().unwrap();
    let results_dir = root.path().join("results");
    let samples_dir = root.path().join("samples");
    std::fs::create_dir_all(&results_dir).unwrap();
    std::fs::create_dir_all(&samples_dir).unwrap();

    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".to_owned();
    config.server.port = 0;
    config.storage.results_dir = results_dir.clone();
    config.storage.samples_dir = samples_dir.clone();
    config.clone.prefer_cloned = prefer_cloned;
    // Remote cloning stays unconfigured: the shaper strategy covers cloning.
    config.clone.model = None;
    config.clone.model_version = None;
    config.clone.api_token = None;

    let services = Arc::new(Services::with_collaborators(
        config,
        Box::new(ScriptedResponder),
        synthesizer,
    ));
    let server = ChatServer::start(Arc::clone(&services)).await.unwrap();

    TestServer {
        server,
        results_dir,
        samples_dir,
        _root: root,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_returns_reply_and_audio() {
    let ts = start_server(Box::new(ToneSynth), false).await;
    let client = reqwest::Client::new();

    let response = client
        .post(ts.url("/chat"))
        .json(&serde_json::json!({ "text": "courage" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: ChatResponse = response.json().await.unwrap();
    assert!(body.response.contains("Dream big"));

    // Base audio is preferred by default even though the shaper produced a
    // cloned variant.
    assert_eq!(PathBuf::from(&body.audio_file), ts.results_dir.join("reply_tts.wav"));

    let wave = voxpersona::audio::read_wav(&PathBuf::from(&body.audio_file)).unwrap();
    assert_eq!(wave.sample_rate, 24_000);
    assert_eq!(wave.channels, 1);
    assert!((wave.peak() - 0.95).abs() < 0.01);

    assert!(ts.results_dir.join("reply_cloned.wav").exists());
    assert!(ts.results_dir.join("latest_reply.wav").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_prefers_cloned_audio_when_configured() {
    let ts = start_server(Box::new(ToneSynth), true).await;
    let client = reqwest::Client::new();

    let response = client
        .post(ts.url("/chat"))
        .json(&serde_json::json!({ "text": "wisdom" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: ChatResponse = response.json().await.unwrap();
    assert_eq!(
        PathBuf::from(&body.audio_file),
        ts.results_dir.join("reply_cloned.wav")
    );

    let wave = voxpersona::audio::read_wav(&PathBuf::from(&body.audio_file)).unwrap();
    assert!(wave.peak() <= 0.98 + 1e-3);
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_text_is_a_400() {
    let ts = start_server(Box::new(ToneSynth), false).await;
    let client = reqwest::Client::new();

    let response = client
        .post(ts.url("/chat"))
        .json(&serde_json::json!({ "text": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.error, "text is required");
}

#[tokio::test(flavor = "multi_thread")]
async fn synthesizer_failure_is_a_500() {
    let ts = start_server(Box::new(BrokenSynth), false).await;
    let client = reqwest::Client::new();

    let response = client
        .post(ts.url("/chat"))
        .json(&serde_json::json!({ "text": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    let body: ErrorResponse = response.json().await.unwrap();
    assert!(body.error.contains("TTS"), "got: {}", body.error);
    assert!(!ts.results_dir.join("reply_tts.wav").exists());
}

fn wav_fixture_bytes(dir: &std::path::Path) -> Vec<u8> {
    let path = dir.join("fixture.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..44_100i32 {
        let v = (f64::from(i) * 0.05).sin();
        let s = (v * 10_000.0) as i16;
        writer.write_sample(s).unwrap();
        writer.write_sample(s / 2).unwrap();
    }
    writer.finalize().unwrap();
    std::fs::read(&path).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_stores_a_normalized_reference() {
    let ts = start_server(Box::new(ToneSynth), false).await;
    let client = reqwest::Client::new();
    let bytes = wav_fixture_bytes(ts.samples_dir.as_path());

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(bytes).file_name("My Reference Voice.wav"),
    );
    let response = client
        .post(ts.url("/upload_voice"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: UploadResponse = response.json().await.unwrap();
    let stored = PathBuf::from(&body.path);
    assert_eq!(stored, ts.samples_dir.join("my_reference_voice.wav"));

    let wave = voxpersona::audio::read_wav(&stored).unwrap();
    assert_eq!(wave.sample_rate, 24_000);
    assert_eq!(wave.channels, 1);
    // One second of 44.1 kHz stereo becomes one second at the working rate.
    assert!((wave.duration_secs() - 1.0).abs() < 0.01);
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_without_file_field_is_a_400() {
    let ts = start_server(Box::new(ToneSynth), false).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().text("note", "not a file");
    let response = client
        .post(ts.url("/upload_voice"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.error, "No file provided");
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_with_empty_filename_is_a_400() {
    let ts = start_server(Box::new(ToneSynth), false).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new()
        .part("file", reqwest::multipart::Part::bytes(vec![1, 2, 3]));
    let response = client
        .post(ts.url("/upload_voice"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: ErrorResponse = response.json().await.unwrap();
    assert_eq!(body.error, "Empty filename");
}

#[tokio::test(flavor = "multi_thread")]
async fn undecodable_upload_is_a_400() {
    let ts = start_server(Box::new(ToneSynth), false).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(vec![0u8; 64]).file_name("noise.wav"),
    );
    let response = client
        .post(ts.url("/upload_voice"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
