//! Session orchestrator: the state machine coordinating capture,
//! inference, and playback over a single consistent transcript
//!
//! All transcript and state mutation happens on the session's own task;
//! capture and playback report in through channels, never by touching
//! shared state.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::capture::{CaptureController, SpeechRecognizer};
use crate::config::Config;
use crate::inference::ChatClient;
use crate::persona::PersonaCatalog;
use crate::playback::{PlaybackController, PlaybackEvent, SpeechSynthesizer};
use crate::transcript::{Transcript, Turn};
use crate::Result;

/// Buffered user commands on the session's command channel
pub const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Buffered playback completion notices
const PLAYBACK_EVENT_CAPACITY: usize = 8;

/// How often the run loop folds pending interim results while listening
const INTERIM_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Phase of the conversation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    Listening,
    AwaitingReply,
    Speaking,
}

impl SessionState {
    /// Persona and system-text edits are locked mid-exchange
    #[must_use]
    pub const fn edits_locked(self) -> bool {
        matches!(self, Self::Listening | Self::AwaitingReply)
    }
}

/// User commands accepted by the session run loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Select a persona from the catalog by identifier
    SelectPersona(String),
    /// Replace the system turn with free text, clearing the persona
    /// selection
    SetSystemText(String),
    /// Restore the default persona and drop all exchange history
    Reset,
    /// Begin listening, interrupting any playback
    StartCapture,
    /// Stop listening and run the exchange for the captured utterance
    StopCapture,
    /// Tear the session down
    Shutdown,
}

impl SessionCommand {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SelectPersona(_) => "select-persona",
            Self::SetSystemText(_) => "set-system-text",
            Self::Reset => "reset",
            Self::StartCapture => "start-capture",
            Self::StopCapture => "stop-capture",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Observable session fields for a rendering layer, published on a watch
/// channel after every externally visible change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub turns: Vec<Turn>,
    pub system_message: String,
    pub selected_persona: Option<String>,
    pub live_buffer: String,
    pub is_recording: bool,
    pub is_loading: bool,
    pub is_disabled_edit: bool,
    pub last_error: Option<String>,
}

/// A single voice conversation session.
///
/// Owns the transcript, the capture and playback controllers, and the
/// inference client; every mutation goes through its methods, and the
/// [`Session::run`] loop is the only place commands are applied.
pub struct Session<R, S> {
    state: SessionState,
    transcript: Transcript,
    catalog: PersonaCatalog,
    active_persona: Option<String>,
    capture: CaptureController<R>,
    playback: PlaybackController<S>,
    playback_events: mpsc::Receiver<PlaybackEvent>,
    client: ChatClient,
    locale: String,
    stop_settle: Duration,
    last_error: Option<String>,
    shutdown_requested: bool,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<R, S> Session<R, S>
where
    R: SpeechRecognizer,
    S: SpeechSynthesizer + 'static,
{
    /// Create a session seeded with the catalog's default persona
    #[must_use]
    pub fn new(
        config: &Config,
        catalog: PersonaCatalog,
        recognizer: R,
        synthesizer: S,
        client: ChatClient,
    ) -> Self {
        let default = catalog.default_persona().clone();
        let transcript = Transcript::with_system(&default.content);

        let mut capture = CaptureController::new(recognizer);
        capture.set_locale(&config.locale);

        let (event_tx, playback_events) = mpsc::channel(PLAYBACK_EVENT_CAPACITY);
        let playback = PlaybackController::new(synthesizer, event_tx);

        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());

        let mut session = Self {
            state: SessionState::Idle,
            transcript,
            catalog,
            active_persona: Some(default.value),
            capture,
            playback,
            playback_events,
            client,
            locale: config.locale.clone(),
            stop_settle: config.stop_settle,
            last_error: None,
            shutdown_requested: false,
            snapshot_tx,
        };
        session.publish();
        session
    }

    /// Watch the observable session fields
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Current observable fields
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            turns: self.transcript.snapshot(),
            system_message: self.transcript.system_content().to_string(),
            selected_persona: self.active_persona.clone(),
            live_buffer: self.capture.live_buffer().to_string(),
            is_recording: self.state == SessionState::Listening,
            is_loading: self.state == SessionState::AwaitingReply,
            is_disabled_edit: self.state.edits_locked(),
            last_error: self.last_error.clone(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn active_persona(&self) -> Option<&str> {
        self.active_persona.as_deref()
    }

    /// Select a persona by identifier. No-op while edits are locked; an
    /// unknown identifier clears the selection and installs an empty
    /// system turn.
    pub fn select_persona(&mut self, value: &str) {
        if self.state.edits_locked() {
            tracing::warn!(persona = %value, "persona change ignored mid-exchange");
            return;
        }

        match self.catalog.find(value) {
            Some(persona) => {
                self.transcript.set_system_turn(&persona.content);
                self.active_persona = Some(persona.value.clone());
                tracing::info!(persona = %value, "persona selected");
            }
            None => {
                self.transcript.set_system_turn("");
                self.active_persona = None;
                tracing::warn!(persona = %value, "unknown persona, selection cleared");
            }
        }
        self.publish();
    }

    /// Replace the system turn with free text. Clears the persona
    /// selection; custom text means no catalog entry is active. No-op
    /// while edits are locked.
    pub fn set_system_text(&mut self, text: &str) {
        if self.state.edits_locked() {
            tracing::warn!("system text edit ignored mid-exchange");
            return;
        }

        self.transcript.set_system_turn(text);
        self.active_persona = None;
        self.publish();
    }

    /// Restore the default persona and drop all exchange history. No-op
    /// while edits are locked.
    pub fn reset(&mut self) {
        if self.state.edits_locked() {
            tracing::warn!("reset ignored mid-exchange");
            return;
        }

        let default = self.catalog.default_persona().clone();
        self.transcript.set_system_turn(&default.content);
        self.active_persona = Some(default.value);
        tracing::info!("session reset to default persona");
        self.publish();
    }

    /// Begin listening. Interrupts any playback (barge-in); a capture
    /// already in progress is left alone, and the attempt is dropped
    /// while a reply is outstanding.
    ///
    /// # Errors
    ///
    /// Returns `Error::CaptureUnavailable` if the recognizer cannot
    /// start; the failure is also surfaced on the snapshot.
    pub async fn start_capture(&mut self) -> Result<()> {
        match self.state {
            SessionState::Listening => return Ok(()),
            SessionState::AwaitingReply => {
                tracing::warn!("capture rejected while a reply is outstanding");
                return Ok(());
            }
            SessionState::Idle | SessionState::Speaking => {}
        }

        let was_speaking = self.state == SessionState::Speaking;
        self.last_error = None;
        self.playback.cancel();

        if let Err(e) = self.capture.begin().await {
            // playback is already gone, so a failed barge-in settles to idle
            if was_speaking {
                self.state = SessionState::Idle;
            }
            self.last_error = Some(e.to_string());
            self.publish();
            return Err(e);
        }

        self.state = SessionState::Listening;
        self.publish();
        tracing::info!("listening");
        Ok(())
    }

    /// Fold pending interim results into the live buffer
    fn poll_interim(&mut self) {
        if self.capture.poll() {
            self.publish();
        }
    }

    fn on_playback_event(&mut self, event: &PlaybackEvent) {
        if !self.playback.acknowledge(event) {
            return;
        }

        if let Err(e) = &event.outcome {
            tracing::warn!(error = %e, "playback failed");
            self.last_error = Some(e.to_string());
        }

        if self.state == SessionState::Speaking {
            self.state = SessionState::Idle;
        }
        self.publish();
    }

    /// Run the session until `Shutdown` arrives or every command sender
    /// is dropped. The loop is the single mutation path: user commands,
    /// playback notices, and interim-poll ticks are applied here one at
    /// a time.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        let mut interim_tick = tokio::time::interval(INTERIM_POLL_INTERVAL);
        interim_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while !self.shutdown_requested {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    tracing::debug!(command = command.name(), "command received");
                    match command {
                        SessionCommand::SelectPersona(value) => self.select_persona(&value),
                        SessionCommand::SetSystemText(text) => self.set_system_text(&text),
                        SessionCommand::Reset => self.reset(),
                        SessionCommand::StartCapture => {
                            if let Err(e) = self.start_capture().await {
                                tracing::warn!(error = %e, "could not start capture");
                            }
                        }
                        SessionCommand::StopCapture => self.run_exchange(&mut commands).await,
                        SessionCommand::Shutdown => break,
                    }
                }
                Some(event) = self.playback_events.recv() => self.on_playback_event(&event),
                _ = interim_tick.tick() => self.poll_interim(),
            }
        }

        self.teardown();
    }

    /// Stop capture and run one full exchange: read the settled buffer,
    /// append the user turn, await the reply, then start playback.
    ///
    /// Commands arriving anywhere in here would race the in-flight
    /// exchange, so they are rejected rather than queued; `Shutdown` is
    /// remembered and honored once the exchange resolves.
    async fn run_exchange(&mut self, commands: &mut mpsc::Receiver<SessionCommand>) {
        if self.state != SessionState::Listening {
            tracing::warn!("stop-capture ignored, not listening");
            return;
        }

        self.last_error = None;

        // settle window: trailing interim results may still arrive
        self.reject_commands_for(self.stop_settle, commands).await;

        let utterance = self.capture.end().await;
        self.transcript.append_user(&utterance);
        self.state = SessionState::AwaitingReply;
        self.publish();
        tracing::info!(chars = utterance.len(), "awaiting reply");

        let turns = self.transcript.snapshot();
        let client = self.client.clone();
        let request = async move { client.complete(&turns).await };
        tokio::pin!(request);

        let reply = loop {
            tokio::select! {
                biased;
                Some(command) = commands.recv() => self.reject(command),
                result = &mut request => break result,
            }
        };

        match reply {
            Ok(turn) => {
                self.transcript.append_assistant(&turn.content);
                self.state = SessionState::Speaking;
                self.playback.speak(turn.content, &self.locale);
                tracing::info!("speaking reply");
            }
            Err(e) => {
                tracing::warn!(error = %e, "inference failed, no reply produced");
                self.last_error = Some(e.to_string());
                self.state = SessionState::Idle;
            }
        }
        self.publish();
    }

    /// Reject commands for a fixed window
    async fn reject_commands_for(
        &mut self,
        window: Duration,
        commands: &mut mpsc::Receiver<SessionCommand>,
    ) {
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                Some(command) = commands.recv() => self.reject(command),
                () = &mut deadline => break,
            }
        }
    }

    fn reject(&mut self, command: SessionCommand) {
        if command == SessionCommand::Shutdown {
            self.shutdown_requested = true;
            return;
        }
        tracing::warn!(command = command.name(), "command rejected during exchange");
    }

    /// Stop recognition and playback so no audio outlives the session
    fn teardown(&mut self) {
        self.capture.abort();
        self.playback.cancel();
        self.state = SessionState::Idle;
        self.publish();
        tracing::info!("session closed");
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send(self.snapshot());
    }
}
