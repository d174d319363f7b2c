//! HTTP surface for the voice chatbot.
//!
//! ## Endpoints
//!
//! - `POST /chat` — JSON `{text, reference_audio?}` → persona reply + audio
//!   file path.
//! - `POST /upload_voice` — multipart `file` → stored reference voice.
//!
//! Requests are processed one at a time behind an async mutex; the demo
//! offers no concurrent-request isolation and its output files are fixed
//! names written by value.

use crate::error::{Result, VoiceError};
use crate::pipeline::{self, Services};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// `POST /chat` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub text: String,
    /// Optional reference voice path overriding the configured default.
    #[serde(default)]
    pub reference_audio: Option<String>,
}

/// `POST /chat` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The persona-styled reply text.
    pub response: String,
    /// Path of the audio file to play.
    pub audio_file: String,
}

/// `POST /upload_voice` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub path: String,
}

/// Error body shared by all endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Shared state for axum handlers.
#[derive(Clone)]
struct AppState {
    services: Arc<Services>,
    /// Serializes request processing: one chat/upload at a time.
    gate: Arc<tokio::sync::Mutex<()>>,
}

/// The HTTP server, started once and shut down explicitly.
pub struct ChatServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ChatServer {
    /// Bind and start serving in a background task.
    ///
    /// Binds to `{server.host}:{server.port}` from the services' config
    /// (port `0` auto-assigns, which the tests rely on).
    ///
    /// # Errors
    ///
    /// Returns a config error if the listener cannot bind.
    pub async fn start(services: Arc<Services>) -> Result<Self> {
        let bind_addr = format!(
            "{}:{}",
            services.config.server.host, services.config.server.port
        );

        let state = AppState {
            services,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        };

        let app = Router::new()
            .route("/chat", post(handle_chat))
            .route("/upload_voice", post(handle_upload_voice))
            .with_state(state);

        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| VoiceError::Config(format!("server bind failed on {bind_addr}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| VoiceError::Config(format!("failed to get local addr: {e}")))?;

        info!("chat server listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("chat server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// The bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The bound port.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ChatServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn bad_request(message: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
        .into_response()
}

/// `POST /chat` — generate a reply and its audio.
async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> axum::response::Response {
    let text = request.text.trim().to_owned();
    if text.is_empty() {
        return bad_request("text is required");
    }

    let _guard = state.gate.lock().await;
    info!(text = text.as_str(), "chat request");

    let reference = request.reference_audio.map(PathBuf::from);
    match pipeline::handle_chat(&state.services, &text, reference.as_deref()).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(ChatResponse {
                response: reply.response,
                audio_file: reply.audio_file.to_string_lossy().into_owned(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "chat request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// `POST /upload_voice` — store a reference voice file.
async fn handle_upload_voice(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> axum::response::Response {
    let _guard = state.gate.lock().await;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return bad_request("No file provided"),
            Err(e) => return bad_request(&format!("malformed multipart body: {e}")),
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned).unwrap_or_default();
        if file_name.is_empty() {
            return bad_request("Empty filename");
        }

        let data = match field.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => return bad_request(&format!("failed to read upload: {e}")),
        };
        if data.is_empty() {
            return bad_request("Empty file");
        }

        return match pipeline::store_reference(&state.services, &file_name, data).await {
            Ok(path) => (
                StatusCode::OK,
                Json(UploadResponse {
                    message: "Voice uploaded successfully!".to_owned(),
                    path: path.to_string_lossy().into_owned(),
                }),
            )
                .into_response(),
            Err(VoiceError::Audio(reason)) => bad_request(&reason),
            Err(e) => {
                error!(error = %e, "voice upload failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: e.to_string(),
                    }),
                )
                    .into_response()
            }
        };
    }
}
