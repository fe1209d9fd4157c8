//! Parlance - Voice-driven conversation sessions for local LLMs
//!
//! This library provides the core functionality for a parlance session:
//! - Session state machine (idle, listening, awaiting reply, speaking)
//! - Speech capture with live interim hypotheses
//! - Chat completion against an Ollama-style endpoint
//! - Spoken playback with barge-in cancellation
//! - Persona management over a single shared transcript
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Host                            │
//! │   Console  │  Line feed  │  System TTS  │  ...      │
//! └────────────────────┬────────────────────────────────┘
//!                      │ commands / snapshots
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Session                           │
//! │   Capture  │  Transcript  │  Playback  │  Personas  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ chat completions
//! ┌────────────────────▼────────────────────────────────┐
//! │              Ollama-style endpoint                   │
//! │   /api/chat  │  llama3                              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod host;
pub mod inference;
pub mod persona;
pub mod playback;
pub mod session;
pub mod transcript;

pub use capture::{CaptureController, InterimResult, InterimRx, SpeechRecognizer};
pub use config::Config;
pub use error::{Error, Result};
pub use host::{CommandSynthesizer, LineFeed, LineRecognizer, NullSynthesizer};
pub use inference::ChatClient;
pub use persona::{Persona, PersonaCatalog};
pub use playback::{PlaybackController, PlaybackEvent, SpeechSynthesizer};
pub use session::{Session, SessionCommand, SessionSnapshot, SessionState};
pub use transcript::{Role, Transcript, Turn};
