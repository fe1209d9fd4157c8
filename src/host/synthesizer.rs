//! Subprocess playback through a system text-to-speech command

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::playback::SpeechSynthesizer;
use crate::{Error, Result};

/// Candidate system TTS commands, probed in order.
const TTS_CANDIDATES: &[&str] = &["espeak-ng", "espeak", "say"];

/// Upper bound on a single utterance handed to the TTS process.
const MAX_UTTERANCE_BYTES: usize = 16 * 1024;

/// Synthesizer that shells out to whichever system TTS command is on
/// `PATH`.
///
/// The spawned process is kept on the struct so a later `cancel` can
/// kill it mid-utterance.
pub struct CommandSynthesizer {
    binary: PathBuf,
    child: Option<tokio::process::Child>,
}

impl CommandSynthesizer {
    /// Probe `PATH` for a usable TTS command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Playback`] when none of the known commands is
    /// installed.
    pub fn discover() -> Result<Self> {
        let binary = TTS_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                Error::Playback(format!(
                    "no system TTS command found (tried {})",
                    TTS_CANDIDATES.join(", ")
                ))
            })?;
        tracing::debug!(binary = %binary.display(), "system TTS command selected");
        Ok(Self {
            binary,
            child: None,
        })
    }

    fn accepts_voice_flag(&self) -> bool {
        // `say` picks voices by name, not locale tag; only the espeak
        // family understands `-v en-us`.
        self.binary
            .file_stem()
            .is_some_and(|stem| stem != "say")
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn speak(&mut self, text: &str, locale: &str) -> Result<()> {
        if text.len() > MAX_UTTERANCE_BYTES {
            return Err(Error::Playback(format!(
                "utterance exceeds {MAX_UTTERANCE_BYTES} bytes"
            )));
        }
        if text.trim().is_empty() {
            return Ok(());
        }

        let mut command = Command::new(&self.binary);
        if self.accepts_voice_flag() {
            command.arg("-v").arg(locale.to_lowercase());
        }
        command
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|error| {
            Error::Playback(format!(
                "failed to spawn {}: {error}",
                self.binary.display()
            ))
        })?;
        self.child = Some(child);

        let status = match self.child.as_mut() {
            Some(child) => child.wait().await,
            None => return Ok(()),
        };
        self.child = None;

        let status = status
            .map_err(|error| Error::Playback(format!("TTS process failed: {error}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Playback(format!(
                "{} exited with {status}",
                self.binary.display()
            )))
        }
    }

    fn cancel(&mut self) {
        let Some(mut child) = self.child.take() else { return };
        if let Err(error) = child.start_kill() {
            tracing::warn!(error = %error, "failed to kill TTS process");
        }
    }
}

/// Fallback synthesizer for hosts without any TTS command.
///
/// Utterances complete immediately, so the session still walks its
/// speaking state and replies stay readable in the transcript.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSynthesizer;

#[async_trait]
impl SpeechSynthesizer for NullSynthesizer {
    async fn speak(&mut self, text: &str, _locale: &str) -> Result<()> {
        tracing::info!(chars = text.len(), "no TTS command available, skipping playback");
        Ok(())
    }

    fn cancel(&mut self) {}
}
