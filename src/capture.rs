//! Speech capture: continuous recognition behind a trait, plus the
//! controller owning the listening state and live transcription buffer

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;

/// Buffered interim events per capture session
pub const INTERIM_CHANNEL_CAPACITY: usize = 32;

/// How long `end` waits for the recognizer to flush and close its event
/// stream after `stop`
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// One interim recognition event: the full re-estimated hypothesis
/// segments for the current utterance, never an incremental delta
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterimResult {
    pub segments: Vec<String>,
}

impl InterimResult {
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// The hypothesis text: all segments joined with a single space
    #[must_use]
    pub fn text(&self) -> String {
        self.segments.join(" ")
    }
}

/// Receiver for the interim events of one capture session
pub type InterimRx = mpsc::Receiver<InterimResult>;

/// Continuous speech-to-text capability.
///
/// `start` hands back the event receiver for one capture session. After
/// `stop` the implementation must drop its sender so the stream closes;
/// stream closure is how the controller knows the last event has
/// settled.
#[async_trait]
pub trait SpeechRecognizer: Send {
    /// Set the recognition locale; takes effect on the next `start`
    fn set_locale(&mut self, locale: &str);

    /// Begin continuous recognition
    ///
    /// # Errors
    ///
    /// Returns `Error::CaptureUnavailable` if the capability is missing
    /// or cannot start.
    async fn start(&mut self) -> Result<InterimRx>;

    /// Stop recognition and close the event stream
    fn stop(&mut self);
}

/// Owns the "am I listening" state and accumulates the live buffer from
/// interim events. One event subscription per capture session, dropped
/// on `end`.
pub struct CaptureController<R> {
    recognizer: R,
    events: Option<InterimRx>,
    live_buffer: String,
}

impl<R: SpeechRecognizer> CaptureController<R> {
    #[must_use]
    pub fn new(recognizer: R) -> Self {
        Self { recognizer, events: None, live_buffer: String::new() }
    }

    /// Set the recognition locale for subsequent capture sessions
    pub fn set_locale(&mut self, locale: &str) {
        self.recognizer.set_locale(locale);
    }

    /// Begin a capture session. No-op when already listening.
    ///
    /// # Errors
    ///
    /// Returns `Error::CaptureUnavailable` if the recognizer cannot
    /// start.
    pub async fn begin(&mut self) -> Result<()> {
        if self.events.is_some() {
            return Ok(());
        }

        let events = self.recognizer.start().await?;
        self.events = Some(events);
        tracing::debug!("capture started");
        Ok(())
    }

    /// Fold any pending interim events into the live buffer without
    /// blocking. Later events fully replace the buffer.
    ///
    /// Returns true if the buffer changed.
    pub fn poll(&mut self) -> bool {
        let Some(events) = self.events.as_mut() else {
            return false;
        };

        let mut changed = false;
        while let Ok(result) = events.try_recv() {
            self.live_buffer = result.text();
            changed = true;
        }
        changed
    }

    /// Stop the capture session and return the final buffer, cleared.
    ///
    /// Trailing events are folded in until the recognizer closes the
    /// stream, so a hypothesis finalized just after the stop request is
    /// never lost. No-op returning an empty buffer when not listening.
    pub async fn end(&mut self) -> String {
        let Some(mut events) = self.events.take() else {
            return String::new();
        };

        self.recognizer.stop();

        loop {
            match tokio::time::timeout(DRAIN_TIMEOUT, events.recv()).await {
                Ok(Some(result)) => self.live_buffer = result.text(),
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!("capture event stream did not close after stop");
                    break;
                }
            }
        }

        tracing::debug!(chars = self.live_buffer.len(), "capture ended");
        std::mem::take(&mut self.live_buffer)
    }

    /// Stop the capture session and discard the buffer (teardown path)
    pub fn abort(&mut self) {
        if self.events.take().is_some() {
            self.recognizer.stop();
            self.live_buffer.clear();
            tracing::debug!("capture aborted");
        }
    }

    /// Check if a capture session is active
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.events.is_some()
    }

    /// Current live buffer contents
    #[must_use]
    pub fn live_buffer(&self) -> &str {
        &self.live_buffer
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Recognizer whose event stream is fed by the test through a shared
    /// sender slot; `stop` drops the recognizer's half so the stream
    /// closes once the test drops its own clone.
    struct ScriptedRecognizer {
        slot: Arc<Mutex<Option<mpsc::Sender<InterimResult>>>>,
        locale: String,
    }

    impl ScriptedRecognizer {
        fn new() -> (Self, Arc<Mutex<Option<mpsc::Sender<InterimResult>>>>) {
            let slot = Arc::new(Mutex::new(None));
            (Self { slot: Arc::clone(&slot), locale: String::new() }, slot)
        }
    }

    #[async_trait]
    impl SpeechRecognizer for ScriptedRecognizer {
        fn set_locale(&mut self, locale: &str) {
            self.locale = locale.to_string();
        }

        async fn start(&mut self) -> Result<InterimRx> {
            let (tx, rx) = mpsc::channel(INTERIM_CHANNEL_CAPACITY);
            *self.slot.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        fn stop(&mut self) {
            self.slot.lock().unwrap().take();
        }
    }

    fn sender(
        slot: &Arc<Mutex<Option<mpsc::Sender<InterimResult>>>>,
    ) -> mpsc::Sender<InterimResult> {
        slot.lock().unwrap().clone().unwrap()
    }

    #[tokio::test]
    async fn test_later_events_replace_buffer() {
        let (recognizer, slot) = ScriptedRecognizer::new();
        let mut capture = CaptureController::new(recognizer);

        capture.begin().await.unwrap();
        let tx = sender(&slot);
        tx.send(InterimResult::new(vec!["he".into()])).await.unwrap();
        tx.send(InterimResult::new(vec!["hello".into()])).await.unwrap();
        drop(tx);

        assert!(capture.poll());
        assert_eq!(capture.live_buffer(), "hello");
        assert_eq!(capture.end().await, "hello");
    }

    #[tokio::test]
    async fn test_segments_join_with_single_space() {
        let (recognizer, slot) = ScriptedRecognizer::new();
        let mut capture = CaptureController::new(recognizer);

        capture.begin().await.unwrap();
        let tx = sender(&slot);
        tx.send(InterimResult::new(vec!["good".into(), "morning".into()]))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(capture.end().await, "good morning");
    }

    #[tokio::test]
    async fn test_end_without_begin_is_noop() {
        let (recognizer, _slot) = ScriptedRecognizer::new();
        let mut capture = CaptureController::new(recognizer);

        assert_eq!(capture.end().await, "");
        assert!(!capture.is_listening());
    }

    #[tokio::test]
    async fn test_end_folds_unpolled_events() {
        let (recognizer, slot) = ScriptedRecognizer::new();
        let mut capture = CaptureController::new(recognizer);

        capture.begin().await.unwrap();
        let tx = sender(&slot);
        tx.send(InterimResult::new(vec!["one".into()])).await.unwrap();
        tx.send(InterimResult::new(vec!["one two".into()])).await.unwrap();
        drop(tx);

        // no poll in between: end drains the stream itself
        assert_eq!(capture.end().await, "one two");
    }

    #[tokio::test]
    async fn test_begin_while_listening_is_noop() {
        let (recognizer, slot) = ScriptedRecognizer::new();
        let mut capture = CaptureController::new(recognizer);

        capture.begin().await.unwrap();
        let tx = sender(&slot);
        capture.begin().await.unwrap();

        tx.send(InterimResult::new(vec!["still here".into()])).await.unwrap();
        drop(tx);
        assert_eq!(capture.end().await, "still here");
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_gives_up_on_unclosed_stream() {
        let (recognizer, slot) = ScriptedRecognizer::new();
        let mut capture = CaptureController::new(recognizer);

        capture.begin().await.unwrap();
        let tx = sender(&slot);
        tx.send(InterimResult::new(vec!["kept".into()])).await.unwrap();

        // tx stays alive, so the stream never closes; the drain times out
        assert_eq!(capture.end().await, "kept");
        drop(tx);
    }
}
