//! Voxpersona: a small persona voice-chat demo.
//!
//! One HTTP endpoint takes user text, runs it through a causal language
//! model for a persona-styled reply, synthesizes speech offline, and
//! optionally re-synthesizes the audio through a voice-cloning path to
//! match a reference speaker. A second endpoint accepts reference audio
//! uploads.
//!
//! # Data flow
//!
//! text → [`llm::Responder`] → reply → [`tts::Synthesizer`] → waveform at
//! its native rate → resample to 24 kHz → [`dsp::shaper`] / remote cloning
//! → WAV on disk.
//!
//! The only algorithmic core is the [`dsp`] post-processing pipeline;
//! language generation, speech synthesis, and remote cloning are
//! collaborators behind traits and HTTP clients.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod server;
pub mod tts;
pub mod voice_clone;

pub use config::AppConfig;
pub use error::{Result, VoiceError};
pub use pipeline::{ChatReply, Services};
pub use server::ChatServer;
