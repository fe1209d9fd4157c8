//! Speech playback: synthesis behind a trait, plus the controller owning
//! the speaking state, cancellation, and completion notices

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Text-to-speech capability.
///
/// `speak` resolves on natural completion of the utterance; `cancel`
/// stops the device immediately and is idempotent.
#[async_trait]
pub trait SpeechSynthesizer: Send {
    /// Synthesize and play one utterance
    ///
    /// # Errors
    ///
    /// Returns `Error::Playback` if synthesis or playback fails.
    async fn speak(&mut self, text: &str, locale: &str) -> Result<()>;

    /// Stop any sound immediately
    fn cancel(&mut self);
}

/// Completion notice for one utterance. `seq` identifies the utterance;
/// notices for superseded or cancelled utterances are stale and must be
/// dropped via [`PlaybackController::acknowledge`].
#[derive(Debug)]
pub struct PlaybackEvent {
    pub seq: u64,
    pub outcome: Result<()>,
}

/// Owns the "am I speaking" state. Each utterance runs as a spawned task
/// holding the synthesizer lock; cancellation goes through a token so the
/// controller never blocks on the device.
pub struct PlaybackController<S> {
    synthesizer: Arc<Mutex<S>>,
    events: mpsc::Sender<PlaybackEvent>,
    cancel: Option<CancellationToken>,
    seq: u64,
    speaking: bool,
}

impl<S: SpeechSynthesizer + 'static> PlaybackController<S> {
    #[must_use]
    pub fn new(synthesizer: S, events: mpsc::Sender<PlaybackEvent>) -> Self {
        Self {
            synthesizer: Arc::new(Mutex::new(synthesizer)),
            events,
            cancel: None,
            seq: 0,
            speaking: false,
        }
    }

    /// Start speaking `text`, cancelling any in-progress utterance first
    /// so at most one is audible. Completion arrives later as a
    /// [`PlaybackEvent`] on the controller's event channel.
    pub fn speak(&mut self, text: String, locale: &str) {
        self.cancel();

        self.seq += 1;
        let seq = self.seq;
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());
        self.speaking = true;

        let synthesizer = Arc::clone(&self.synthesizer);
        let events = self.events.clone();
        let locale = locale.to_string();

        tokio::spawn(async move {
            let mut synth = synthesizer.lock().await;
            let finished = tokio::select! {
                result = synth.speak(&text, &locale) => Some(result),
                () = token.cancelled() => None,
            };
            match finished {
                Some(outcome) => {
                    let _ = events.send(PlaybackEvent { seq, outcome }).await;
                }
                None => synth.cancel(),
            }
        });

        tracing::debug!(seq, "playback started");
    }

    /// Stop any in-progress playback immediately; idempotent when nothing
    /// is playing
    pub fn cancel(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
            self.speaking = false;
            tracing::debug!("playback cancelled");
        }
    }

    /// Accept a completion notice. Returns false for stale notices, whose
    /// utterance was cancelled or superseded before the notice arrived.
    pub fn acknowledge(&mut self, event: &PlaybackEvent) -> bool {
        if event.seq != self.seq || !self.speaking {
            tracing::debug!(seq = event.seq, "stale playback notice dropped");
            return false;
        }
        self.speaking = false;
        self.cancel = None;
        true
    }

    /// Check if an utterance is in progress
    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.speaking
    }
}
