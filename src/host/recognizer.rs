//! Text recognizer fed by the hosting UI
//!
//! Stands in for a microphone-backed engine: each line the host pushes
//! while a capture session is open becomes one more hypothesis segment,
//! and the full accumulated list is re-emitted so later events carry the
//! whole utterance so far.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::capture::{INTERIM_CHANNEL_CAPACITY, InterimResult, InterimRx, SpeechRecognizer};
use crate::Result;

/// Handle the hosting UI pushes typed lines into.
pub type LineFeed = mpsc::Sender<String>;

/// Recognizer that treats fed text lines as speech hypotheses.
///
/// The feed outlives individual capture sessions; segments reset each
/// time `start` is called. Lines pushed while no session is open stay
/// queued and surface in the next one.
pub struct LineRecognizer {
    feed: Arc<Mutex<mpsc::Receiver<String>>>,
    stop: Option<CancellationToken>,
}

impl LineRecognizer {
    /// Create the recognizer together with the feed the host writes to.
    #[must_use]
    pub fn new() -> (Self, LineFeed) {
        let (tx, rx) = mpsc::channel(INTERIM_CHANNEL_CAPACITY);
        let recognizer = Self {
            feed: Arc::new(Mutex::new(rx)),
            stop: None,
        };
        (recognizer, tx)
    }
}

#[async_trait]
impl SpeechRecognizer for LineRecognizer {
    fn set_locale(&mut self, locale: &str) {
        tracing::debug!(locale = %locale, "locale noted, text feed is locale agnostic");
    }

    async fn start(&mut self) -> Result<InterimRx> {
        let (tx, rx) = mpsc::channel(INTERIM_CHANNEL_CAPACITY);
        let token = CancellationToken::new();
        self.stop = Some(token.clone());
        let feed = Arc::clone(&self.feed);

        tokio::spawn(async move {
            let mut feed = feed.lock().await;
            let mut segments: Vec<String> = Vec::new();
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    line = feed.recv() => {
                        let Some(line) = line else { break };
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        segments.push(line.to_string());
                        if tx.send(InterimResult::new(segments.clone())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            // tx drops here, closing the interim stream for the session
        });

        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(token) = self.stop.take() {
            token.cancel();
        }
    }
}
