//! Reference host adapters for the capture and playback capabilities
//!
//! The session core only sees the `SpeechRecognizer` and
//! `SpeechSynthesizer` traits; these adapters make the binary usable on
//! a plain terminal without audio hardware.

mod recognizer;
mod synthesizer;

pub use recognizer::{LineFeed, LineRecognizer};
pub use synthesizer::{CommandSynthesizer, NullSynthesizer};
