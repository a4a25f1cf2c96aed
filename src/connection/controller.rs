//! Connection controller actor
//!
//! Every mutation of the connection state, the live session and its audio
//! stream happens on the task running [`Controller::run`]. Dials, timers
//! and transport callbacks only ever send messages into it. Hardware
//! updates are queued on the [`StatusMapper`], never performed here.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioBackend, AudioStream};
use crate::events::ControllerEvent;
use crate::indicator::{IndicatorSignal, StatusMapper};
use crate::presence::PresenceWatcher;
use crate::session::{
    DialError, DialTarget, Dialer, DisconnectReason, Session, SessionEvent, SessionEvents,
};
use crate::transmit::TransmitGate;

use super::{ConnectionState, ControllerError, OneShotTimer, ReconnectState, RetryPolicy};

/// Static inputs for a controller
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub target: DialTarget,
    /// Channel to join after connecting
    pub channel: Option<String>,
    pub retry: RetryPolicy,
    pub presence_debounce: Duration,
    /// Pause between destroying and reopening the audio stream on reset
    pub audio_reset_pause: Duration,
}

impl ControllerSettings {
    pub fn new(target: DialTarget) -> Self {
        Self {
            target,
            channel: None,
            retry: RetryPolicy::default(),
            presence_debounce: crate::config::PRESENCE_DEBOUNCE,
            audio_reset_pause: crate::config::AUDIO_RESET_PAUSE,
        }
    }
}

/// Snapshot published after every processed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ControllerStatus {
    pub state: ConnectionState,
    /// Consecutive failures since the last successful connect
    pub retries: u32,
    pub transmitting: bool,
    /// Other users in our channel, once sampled
    pub participants: Option<usize>,
}

enum Command {
    Start,
    StartTransmit,
    StopTransmit,
    ResetAudio,
    Shutdown(oneshot::Sender<()>),
}

enum Internal<S> {
    DialFinished {
        generation: u64,
        result: Result<S, DialError>,
    },
    RetryDue {
        ticket: u64,
    },
    PresenceDue {
        ticket: u64,
    },
}

enum Input<S> {
    Command(Option<Command>),
    Internal(Internal<S>),
    Session(u64, SessionEvent),
}

enum Flow {
    Continue,
    Stop,
}

/// Cloneable front end to a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ControllerStatus>,
    events: broadcast::Sender<ControllerEvent>,
}

impl ControllerHandle {
    /// Begin connecting
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// Push-to-talk pressed
    pub fn start_transmit(&self) {
        self.send(Command::StartTransmit);
    }

    /// Push-to-talk released
    pub fn stop_transmit(&self) {
        self.send(Command::StopTransmit);
    }

    /// Destroy and reopen the audio stream
    pub fn reset_audio(&self) {
        self.send(Command::ResetAudio);
    }

    /// Tear the controller down and wait until it has released everything
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    pub fn status(&self) -> ControllerStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("controller stopped, command dropped");
        }
    }
}

/// Owner of the connection state machine and everything gated by it
pub struct Controller<D: Dialer, A: AudioBackend<D::Session>> {
    dialer: Arc<D>,
    audio: A,
    settings: ControllerSettings,
    indicators: StatusMapper,

    state: ConnectionState,
    reconnect: ReconnectState,
    session: Option<D::Session>,
    stream: Option<A::Stream>,
    transmit: TransmitGate,
    presence: PresenceWatcher,
    retry_timer: OneShotTimer,
    dial_task: Option<JoinHandle<()>>,
    /// Events the current dial reported before its result was processed
    early_events: Vec<SessionEvent>,
    /// Bumped on every dial and on teardown; tags session callbacks
    generation: u64,

    commands: mpsc::UnboundedReceiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal<D::Session>>,
    internal_rx: mpsc::UnboundedReceiver<Internal<D::Session>>,
    session_tx: mpsc::UnboundedSender<(u64, SessionEvent)>,
    session_rx: mpsc::UnboundedReceiver<(u64, SessionEvent)>,
    status_tx: watch::Sender<ControllerStatus>,
    event_tx: broadcast::Sender<ControllerEvent>,
}

impl<D: Dialer, A: AudioBackend<D::Session>> Controller<D, A> {
    pub fn new(
        dialer: D,
        audio: A,
        settings: ControllerSettings,
        indicators: StatusMapper,
    ) -> (Self, ControllerHandle) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ControllerStatus::default());
        let (event_tx, _) = broadcast::channel(64);

        let handle = ControllerHandle {
            commands: command_tx,
            status: status_rx,
            events: event_tx.clone(),
        };

        let reconnect = ReconnectState::new(settings.retry);
        let presence = PresenceWatcher::new(settings.presence_debounce);

        let controller = Self {
            dialer: Arc::new(dialer),
            audio,
            settings,
            indicators,
            state: ConnectionState::Disconnected,
            reconnect,
            session: None,
            stream: None,
            transmit: TransmitGate::default(),
            presence,
            retry_timer: OneShotTimer::default(),
            dial_task: None,
            early_events: Vec::new(),
            generation: 0,
            commands,
            internal_tx,
            internal_rx,
            session_tx,
            session_rx,
            status_tx,
            event_tx,
        };

        (controller, handle)
    }

    /// Process commands, dial results, timers and session events until
    /// shutdown or a fatal error
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!(address = %self.settings.target.address, "connection controller started");

        loop {
            let input = tokio::select! {
                biased;
                command = self.commands.recv() => Input::Command(command),
                Some(message) = self.internal_rx.recv() => Input::Internal(message),
                Some((generation, event)) = self.session_rx.recv() => {
                    Input::Session(generation, event)
                }
            };

            let step = match input {
                Input::Command(Some(command)) => self.handle_command(command).await,
                Input::Command(None) => {
                    debug!("all controller handles dropped");
                    self.teardown().await;
                    Ok(Flow::Stop)
                }
                Input::Internal(message) => self.handle_internal(message).map(|()| Flow::Continue),
                Input::Session(generation, event) => self
                    .handle_session_event(generation, event)
                    .map(|()| Flow::Continue),
            };

            match step {
                Ok(Flow::Continue) => self.publish_status(),
                Ok(Flow::Stop) => return Ok(()),
                Err(e) => {
                    self.teardown().await;
                    return Err(e);
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Result<Flow, ControllerError> {
        match command {
            Command::Start => {
                if self.state == ConnectionState::Disconnected {
                    self.begin_dial();
                } else {
                    debug!(state = %self.state, "already started");
                }
            }
            Command::StartTransmit => {
                if self
                    .transmit
                    .start(self.state, self.stream.as_mut(), &self.indicators)
                {
                    info!("transmit started");
                    self.emit(ControllerEvent::TransmitStarted);
                }
            }
            Command::StopTransmit => self.stop_transmit(),
            Command::ResetAudio => self.reset_audio().await?,
            Command::Shutdown(ack) => {
                self.teardown().await;
                let _ = ack.send(());
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn handle_internal(&mut self, message: Internal<D::Session>) -> Result<(), ControllerError> {
        match message {
            Internal::DialFinished { generation, result } => {
                return self.on_dial_finished(generation, result);
            }
            Internal::RetryDue { ticket } => {
                let due = self.retry_timer.accept(ticket);
                if due && self.state == ConnectionState::ReconnectPending {
                    self.begin_dial();
                } else {
                    debug!(ticket, "stale retry timer");
                }
            }
            Internal::PresenceDue { ticket } => {
                if self.presence.accept(ticket) {
                    self.sample_presence();
                }
            }
        }
        Ok(())
    }

    fn handle_session_event(
        &mut self,
        generation: u64,
        event: SessionEvent,
    ) -> Result<(), ControllerError> {
        if generation != self.generation {
            debug!(generation, ?event, "ignoring event from inactive session");
            return Ok(());
        }
        match self.state {
            ConnectionState::Connected => {}
            ConnectionState::Connecting => {
                debug!(?event, "session event before dial result, holding");
                self.early_events.push(event);
                return Ok(());
            }
            _ => {
                debug!(state = %self.state, ?event, "ignoring event while not connected");
                return Ok(());
            }
        }

        match event {
            SessionEvent::Disconnected(reason) => return self.on_disconnected(reason),
            SessionEvent::MembershipChanged { user, change } => {
                info!(%user, %change, "membership change");
                self.schedule_presence();
            }
            SessionEvent::ChannelChanged => {
                debug!("channel change");
                self.schedule_presence();
            }
            SessionEvent::TextMessage { sender, message } => {
                info!(%sender, message = %message.trim(), "text message");
            }
            SessionEvent::PermissionDenied(kind) => {
                warn!(%kind, "permission denied");
            }
        }
        Ok(())
    }

    /// Connecting: spawn exactly one dial
    fn begin_dial(&mut self) {
        self.release_session();
        self.early_events.clear();
        self.generation = self.generation.wrapping_add(1);
        self.state = ConnectionState::Connecting;

        let attempt = self.reconnect.consecutive_failures() + 1;
        info!(address = %self.settings.target.address, attempt, "connecting");
        self.emit(ControllerEvent::Connecting { attempt });

        let dialer = Arc::clone(&self.dialer);
        let target = self.settings.target.clone();
        let events = SessionEvents::new(self.generation, self.session_tx.clone());
        let tx = self.internal_tx.clone();
        let generation = self.generation;

        self.dial_task = Some(tokio::spawn(async move {
            let result = dialer.dial(&target, events).await;
            let _ = tx.send(Internal::DialFinished { generation, result });
        }));
    }

    fn on_dial_finished(
        &mut self,
        generation: u64,
        result: Result<D::Session, DialError>,
    ) -> Result<(), ControllerError> {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            debug!(generation, "discarding stale dial result");
            if let Ok(mut session) = result {
                session.disconnect();
            }
            return Ok(());
        }
        self.dial_task = None;

        match result {
            Ok(session) => self.on_connected(session),
            Err(e) => {
                self.early_events.clear();
                let attempt = self.reconnect.consecutive_failures() + 1;
                self.emit(ControllerEvent::ConnectFailed {
                    attempt,
                    reason: e.to_string(),
                });
                let cause = format!(
                    "connection to {} failed ({})",
                    self.settings.target.address, e
                );
                self.retry_or_give_up(cause)
            }
        }
    }

    fn on_connected(&mut self, mut session: D::Session) -> Result<(), ControllerError> {
        self.retry_timer.cancel();
        self.reconnect.record_success();

        let stream = match self.audio.open_stream(&session) {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "audio stream open failed");
                session.disconnect();
                return Err(e.into());
            }
        };

        let address = session.remote_addr();
        info!(%address, "connected");
        if let Some(welcome) = session.welcome_message() {
            info!(welcome = %welcome.trim(), "welcome message");
        }
        if let Some(channel) = self.settings.channel.as_deref() {
            if !session.move_to_channel(channel) {
                warn!(%channel, "unable to find channel");
            }
        }

        self.state = ConnectionState::Connected;
        self.session = Some(session);
        self.stream = Some(stream);
        self.indicators.apply(IndicatorSignal::Online, true);
        self.schedule_presence();
        self.emit(ControllerEvent::Connected { address });

        // The transport may have reported a drop before we saw the dial result
        for event in std::mem::take(&mut self.early_events) {
            self.handle_session_event(self.generation, event)?;
        }
        Ok(())
    }

    fn on_disconnected(&mut self, reason: DisconnectReason) -> Result<(), ControllerError> {
        self.stop_transmit();
        self.presence.cancel();
        self.release_session();
        for signal in IndicatorSignal::ALL {
            self.indicators.apply(signal, false);
        }
        self.emit(ControllerEvent::Disconnected {
            reason: reason.to_string(),
        });

        let cause = format!(
            "connection to {} disconnected ({})",
            self.settings.target.address, reason
        );
        self.retry_or_give_up(cause)
    }

    /// Count a failure, then either arm the retry timer or give up for good
    fn retry_or_give_up(&mut self, cause: String) -> Result<(), ControllerError> {
        let attempts = self.reconnect.record_failure();

        if self.reconnect.is_exhausted() {
            self.state = ConnectionState::FailedTerminal;
            error!(attempts, "{}: unable to connect, giving up", cause);
            self.emit(ControllerEvent::GaveUp { attempts });
            return Err(ControllerError::RetriesExhausted { attempts });
        }

        let delay = self.reconnect.delay();
        self.state = ConnectionState::ReconnectPending;
        warn!(
            attempts,
            "{}, attempting again in {} seconds...",
            cause,
            delay.as_secs()
        );
        self.retry_timer
            .arm(delay, &self.internal_tx, |ticket| Internal::RetryDue { ticket });
        self.emit(ControllerEvent::RetryScheduled {
            attempt: attempts + 1,
            delay_secs: delay.as_secs(),
        });
        Ok(())
    }

    fn stop_transmit(&mut self) {
        if self.transmit.stop(self.stream.as_mut(), &self.indicators) {
            info!("transmit stopped");
            self.emit(ControllerEvent::TransmitStopped);
        }
    }

    async fn reset_audio(&mut self) -> Result<(), ControllerError> {
        if self.state != ConnectionState::Connected {
            debug!(state = %self.state, "not connected, ignoring audio reset");
            return Ok(());
        }

        self.stop_transmit();
        if let Some(stream) = self.stream.take() {
            stream.destroy();
        }

        tokio::time::sleep(self.settings.audio_reset_pause).await;

        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        let stream = self.audio.open_stream(session).map_err(|e| {
            error!(error = %e, "audio stream reopen failed");
            e
        })?;
        self.stream = Some(stream);
        info!("audio stream reset");
        Ok(())
    }

    fn schedule_presence(&mut self) {
        self.presence
            .schedule(&self.internal_tx, |ticket| Internal::PresenceDue { ticket });
    }

    fn sample_presence(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let previous = self.presence.last();
        let count = self.presence.evaluate(session, &self.indicators);
        if previous != Some(count) {
            self.emit(ControllerEvent::ParticipantsChanged { count });
        }
    }

    /// Destroy the audio stream, then close the session
    fn release_session(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.destroy();
        }
        if let Some(mut session) = self.session.take() {
            session.disconnect();
        }
    }

    /// Cancel timers and release everything; safe from any state
    async fn teardown(&mut self) {
        self.retry_timer.cancel();
        self.presence.cancel();
        if let Some(task) = self.dial_task.take() {
            task.abort();
        }

        self.stop_transmit();
        self.release_session();
        self.early_events.clear();
        self.generation = self.generation.wrapping_add(1);
        if self.state != ConnectionState::FailedTerminal {
            self.state = ConnectionState::Disconnected;
        }

        self.indicators.all_off();
        self.indicators.flush().await;

        self.emit(ControllerEvent::Shutdown);
        self.publish_status();
        info!(state = %self.state, "connection controller stopped");
    }

    fn publish_status(&self) {
        let connected = self.state == ConnectionState::Connected;
        self.status_tx.send_replace(ControllerStatus {
            state: self.state,
            retries: self.reconnect.consecutive_failures(),
            transmitting: self.transmit.is_active(),
            participants: if connected { self.presence.last() } else { None },
        });
    }

    fn emit(&self, event: ControllerEvent) {
        debug!(%event, "emitting controller event");
        let _ = self.event_tx.send(event);
    }
}
