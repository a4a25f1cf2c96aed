//! Test doubles for the session, audio and indicator capabilities

use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::audio::{AudioBackend, AudioStream, OpenError};
use crate::indicator::{IndicatorError, IndicatorSignal, IndicatorSink, LogicalColor, PinOutput};
use crate::session::{
    DialError, DialTarget, Dialer, DisconnectReason, Session, SessionEvent, SessionEvents,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialOutcome {
    Fail,
    Succeed,
    /// Report the link dropping, then hand out the session 5 ms later
    DropBeforeResult,
    /// Wait for [`SessionProbe::release_dial`] before succeeding
    Stall,
}

struct ProbeState {
    members: usize,
    channels: Vec<String>,
    moved_to: Option<String>,
    dial_attempts: usize,
    disconnects: usize,
    events: Option<SessionEvents>,
}

impl Default for ProbeState {
    fn default() -> Self {
        Self {
            members: 1,
            channels: vec!["mywalki".into()],
            moved_to: None,
            dial_attempts: 0,
            disconnects: 0,
            events: None,
        }
    }
}

/// Shared view into every session the mock dialer hands out
#[derive(Clone, Default)]
pub struct SessionProbe {
    inner: Arc<Mutex<ProbeState>>,
    release: Arc<Notify>,
}

impl SessionProbe {
    /// Let a stalled dial finish
    pub fn release_dial(&self) {
        self.release.notify_one();
    }

    pub fn set_members(&self, members: usize) {
        self.inner.lock().unwrap().members = members;
    }

    pub fn set_channels(&self, channels: &[&str]) {
        self.inner.lock().unwrap().channels = channels.iter().map(|c| c.to_string()).collect();
    }

    pub fn moved_to(&self) -> Option<String> {
        self.inner.lock().unwrap().moved_to.clone()
    }

    pub fn dial_attempts(&self) -> usize {
        self.inner.lock().unwrap().dial_attempts
    }

    pub fn disconnects(&self) -> usize {
        self.inner.lock().unwrap().disconnects
    }

    /// Callback handle of the most recently dialed session
    pub fn events(&self) -> Option<SessionEvents> {
        self.inner.lock().unwrap().events.clone()
    }

    /// Raise an event on the most recently dialed session
    pub fn emit(&self, event: SessionEvent) {
        let events = self.events().expect("no session dialed yet");
        events.emit(event);
    }
}

pub struct MockDialer {
    script: Mutex<VecDeque<DialOutcome>>,
    fallback: DialOutcome,
    probe: SessionProbe,
}

impl MockDialer {
    /// Dial outcomes are taken from `script`, then `fallback` forever
    pub fn new(script: Vec<DialOutcome>, fallback: DialOutcome, probe: SessionProbe) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            probe,
        }
    }
}

impl Dialer for MockDialer {
    type Session = MockSession;

    async fn dial(
        &self,
        _target: &DialTarget,
        events: SessionEvents,
    ) -> Result<MockSession, DialError> {
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        self.probe.inner.lock().unwrap().dial_attempts += 1;

        match outcome {
            DialOutcome::Fail => return Err(DialError::Refused("scripted failure".into())),
            DialOutcome::Succeed => {}
            DialOutcome::DropBeforeResult => {
                events.emit(SessionEvent::Disconnected(DisconnectReason::Server));
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            DialOutcome::Stall => self.probe.release.notified().await,
        }

        self.probe.inner.lock().unwrap().events = Some(events);
        Ok(MockSession::new(self.probe.clone()))
    }
}

pub struct MockSession {
    probe: SessionProbe,
}

impl MockSession {
    pub fn new(probe: SessionProbe) -> Self {
        Self { probe }
    }
}

impl Session for MockSession {
    fn remote_addr(&self) -> String {
        "127.0.0.1:64738".into()
    }

    fn welcome_message(&self) -> Option<String> {
        Some("Welcome to the mock server ".into())
    }

    fn move_to_channel(&mut self, name: &str) -> bool {
        let mut state = self.probe.inner.lock().unwrap();
        if state.channels.iter().any(|c| c == name) {
            state.moved_to = Some(name.to_string());
            true
        } else {
            false
        }
    }

    fn current_channel_name(&self) -> Option<String> {
        self.probe.moved_to()
    }

    fn current_channel_members(&self) -> usize {
        self.probe.inner.lock().unwrap().members
    }

    fn disconnect(&mut self) {
        self.probe.inner.lock().unwrap().disconnects += 1;
    }
}

#[derive(Default)]
struct AudioState {
    fail_open: bool,
    opened: usize,
    live: usize,
    max_live: usize,
    sourcing: bool,
}

/// Shared view into the mock audio backend
#[derive(Clone, Default)]
pub struct AudioProbe {
    inner: Arc<Mutex<AudioState>>,
}

impl AudioProbe {
    pub fn set_fail_open(&self, fail: bool) {
        self.inner.lock().unwrap().fail_open = fail;
    }

    pub fn opened(&self) -> usize {
        self.inner.lock().unwrap().opened
    }

    /// Streams opened and not yet destroyed
    pub fn live(&self) -> usize {
        self.inner.lock().unwrap().live
    }

    pub fn max_live(&self) -> usize {
        self.inner.lock().unwrap().max_live
    }

    pub fn sourcing(&self) -> bool {
        self.inner.lock().unwrap().sourcing
    }
}

pub struct MockAudio {
    probe: AudioProbe,
}

impl MockAudio {
    pub fn new(probe: AudioProbe) -> Self {
        Self { probe }
    }
}

impl<S: Session> AudioBackend<S> for MockAudio {
    type Stream = MockStream;

    fn open_stream(&mut self, _session: &S) -> Result<MockStream, OpenError> {
        let mut state = self.probe.inner.lock().unwrap();
        if state.fail_open {
            return Err(OpenError::Backend("scripted failure".into()));
        }
        state.opened += 1;
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        drop(state);
        Ok(MockStream::new(self.probe.clone()))
    }
}

pub struct MockStream {
    probe: AudioProbe,
}

impl MockStream {
    pub fn new(probe: AudioProbe) -> Self {
        Self { probe }
    }
}

impl AudioStream for MockStream {
    fn start_source(&mut self) {
        self.probe.inner.lock().unwrap().sourcing = true;
    }

    fn stop_source(&mut self) {
        self.probe.inner.lock().unwrap().sourcing = false;
    }

    fn destroy(self) {
        let mut state = self.probe.inner.lock().unwrap();
        state.sourcing = false;
        state.live = state.live.saturating_sub(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkCall {
    Set(IndicatorSignal, LogicalColor),
    AllOff,
}

/// Indicator sink that only records what it was asked to show
#[derive(Clone, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    /// What the hardware would be showing after every recorded call
    pub fn displayed(&self) -> HashMap<IndicatorSignal, LogicalColor> {
        let mut shown: HashMap<_, _> = IndicatorSignal::ALL
            .iter()
            .map(|&s| (s, LogicalColor::Off))
            .collect();
        for call in self.calls() {
            match call {
                SinkCall::Set(signal, color) => {
                    shown.insert(signal, color);
                }
                SinkCall::AllOff => {
                    for color in shown.values_mut() {
                        *color = LogicalColor::Off;
                    }
                }
            }
        }
        shown
    }

    pub fn color_of(&self, signal: IndicatorSignal) -> LogicalColor {
        self.displayed()[&signal]
    }
}

impl IndicatorSink for RecordingSink {
    fn set_state(
        &mut self,
        signal: IndicatorSignal,
        color: LogicalColor,
    ) -> Result<(), IndicatorError> {
        self.calls.lock().unwrap().push(SinkCall::Set(signal, color));
        Ok(())
    }

    fn all_off(&mut self) -> Result<(), IndicatorError> {
        self.calls.lock().unwrap().push(SinkCall::AllOff);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "recording"
    }
}

/// Records logical calls, then forwards them to a real backend
pub struct Tap<B: IndicatorSink> {
    inner: B,
    record: RecordingSink,
}

impl<B: IndicatorSink> Tap<B> {
    pub fn new(inner: B, record: RecordingSink) -> Self {
        Self { inner, record }
    }
}

impl<B: IndicatorSink> IndicatorSink for Tap<B> {
    fn set_state(
        &mut self,
        signal: IndicatorSignal,
        color: LogicalColor,
    ) -> Result<(), IndicatorError> {
        self.record.set_state(signal, color)?;
        self.inner.set_state(signal, color)
    }

    fn all_off(&mut self) -> Result<(), IndicatorError> {
        self.record.all_off()?;
        self.inner.all_off()
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }
}

/// GPIO pins in memory
#[derive(Clone, Default)]
pub struct MemoryPins {
    writes: Arc<Mutex<Vec<(u8, bool)>>>,
}

impl MemoryPins {
    pub fn writes(&self) -> Vec<(u8, bool)> {
        self.writes.lock().unwrap().clone()
    }

    /// Last level written to `pin`; low if never written
    pub fn level(&self, pin: u8) -> bool {
        self.writes()
            .iter()
            .rev()
            .find(|(p, _)| *p == pin)
            .map(|(_, high)| *high)
            .unwrap_or(false)
    }
}

impl PinOutput for MemoryPins {
    fn write(&mut self, pin: u8, high: bool) -> io::Result<()> {
        self.writes.lock().unwrap().push((pin, high));
        Ok(())
    }
}

/// Serial port in memory
#[derive(Clone, Default)]
pub struct SharedBuf {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuf {
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }

    /// Most recent complete strip frame
    pub fn last_frame(&self) -> Option<Vec<u8>> {
        let bytes = self.bytes();
        let start = bytes.iter().rposition(|&b| b == 0xAA)?;
        Some(bytes[start..].to_vec())
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
