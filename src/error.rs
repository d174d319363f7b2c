//! Error types for the voxpersona pipeline.

/// Top-level error type for the voice-chat system.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Language model inference error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Voice shaping (pitch/stretch/EQ/gain) error.
    #[error("shape error: {0}")]
    Shape(String),

    /// Voice cloning error (upload, remote job, download).
    #[error("clone error: {0}")]
    Clone(String),

    /// A bounded wait expired before the remote job reached a terminal state.
    ///
    /// Distinct from [`VoiceError::Clone`]: the remote side never reported
    /// failure, we just stopped waiting.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Audio file read/write/decode error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VoiceError>;
