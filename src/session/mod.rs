//! Voice session capability
//!
//! The transport, codec and wire protocol live behind [`Dialer`] and
//! [`Session`]. Asynchronous notifications from the transport come back
//! through [`SessionEvents`], tagged with the dial generation they belong
//! to so that the controller can drop anything from a session it has
//! already abandoned.

mod tcp;

pub use tcp::TcpDialer;

use std::future::Future;
use std::path::PathBuf;

use tokio::sync::mpsc;

/// Where and as whom to connect
#[derive(Debug, Clone)]
pub struct DialTarget {
    /// `host:port`
    pub address: String,
    pub username: String,
    pub password: String,
    pub tls: TlsOptions,
}

#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Skip server certificate verification
    pub insecure_skip_verify: bool,
    /// PEM file holding our client certificate and key
    pub certificate: Option<PathBuf>,
}

/// Errors from a dial attempt
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("connection refused: {0}")]
    Refused(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Opens sessions
pub trait Dialer: Send + Sync + 'static {
    type Session: Session;

    /// Connect to `target`; the resulting session reports through `events`
    fn dial(
        &self,
        target: &DialTarget,
        events: SessionEvents,
    ) -> impl Future<Output = Result<Self::Session, DialError>> + Send;
}

/// A live connection to the server
pub trait Session: Send + 'static {
    /// Peer address for log lines
    fn remote_addr(&self) -> String;

    fn welcome_message(&self) -> Option<String>;

    /// Move ourselves into the named channel; false if no such channel
    fn move_to_channel(&mut self, name: &str) -> bool;

    fn current_channel_name(&self) -> Option<String>;

    /// Users in our current channel, ourselves included
    fn current_channel_members(&self) -> usize;

    /// Close the connection; safe to call more than once
    fn disconnect(&mut self);
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Error,
    Kicked,
    Banned,
    User,
    Server,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::Error => write!(f, "connection error"),
            DisconnectReason::Kicked => write!(f, "kicked"),
            DisconnectReason::Banned => write!(f, "banned"),
            DisconnectReason::User => write!(f, "closed locally"),
            DisconnectReason::Server => write!(f, "closed by server"),
        }
    }
}

/// What happened to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Connected,
    Disconnected,
    Kicked,
    Banned,
    Registered,
    Unregistered,
    Name,
    Channel,
    Comment,
    Audio,
    PrioritySpeaker,
    Recording,
    Stats,
}

impl std::fmt::Display for MembershipChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MembershipChange::Connected => "connected",
            MembershipChange::Disconnected => "disconnected",
            MembershipChange::Kicked => "kicked",
            MembershipChange::Banned => "banned",
            MembershipChange::Registered => "registered",
            MembershipChange::Unregistered => "unregistered",
            MembershipChange::Name => "changed name",
            MembershipChange::Channel => "changed channel",
            MembershipChange::Comment => "changed comment",
            MembershipChange::Audio => "changed audio",
            MembershipChange::PrioritySpeaker => "is priority speaker",
            MembershipChange::Recording => "changed recording status",
            MembershipChange::Stats => "changed stats",
        };
        f.write_str(s)
    }
}

/// Server refused something we asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDeniedKind {
    Other(String),
    Permission,
    SuperUser,
    InvalidChannelName,
    TextTooLong,
    TemporaryChannel,
    MissingCertificate,
    InvalidUserName,
    ChannelFull,
    NestingLimit,
}

impl std::fmt::Display for PermissionDeniedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionDeniedKind::Other(text) => f.write_str(text),
            PermissionDeniedKind::Permission => f.write_str("insufficient permissions"),
            PermissionDeniedKind::SuperUser => f.write_str("cannot modify SuperUser"),
            PermissionDeniedKind::InvalidChannelName => f.write_str("invalid channel name"),
            PermissionDeniedKind::TextTooLong => f.write_str("text too long"),
            PermissionDeniedKind::TemporaryChannel => f.write_str("temporary channel"),
            PermissionDeniedKind::MissingCertificate => f.write_str("missing certificate"),
            PermissionDeniedKind::InvalidUserName => f.write_str("invalid user name"),
            PermissionDeniedKind::ChannelFull => f.write_str("channel full"),
            PermissionDeniedKind::NestingLimit => f.write_str("nesting limit"),
        }
    }
}

/// Notifications raised by a session after it has been dialed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Disconnected(DisconnectReason),
    MembershipChanged { user: String, change: MembershipChange },
    ChannelChanged,
    TextMessage { sender: String, message: String },
    PermissionDenied(PermissionDeniedKind),
}

/// Callback surface handed to the transport on dial
#[derive(Debug, Clone)]
pub struct SessionEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, SessionEvent)>,
}

impl SessionEvents {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, SessionEvent)>) -> Self {
        Self { generation, tx }
    }

    /// Deliver an event; false once the controller has gone away
    pub fn emit(&self, event: SessionEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_carry_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = SessionEvents::new(7, tx);

        assert!(events.emit(SessionEvent::ChannelChanged));
        assert_eq!(rx.try_recv().unwrap(), (7, SessionEvent::ChannelChanged));
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = SessionEvents::new(1, tx);
        drop(rx);

        assert!(!events.emit(SessionEvent::ChannelChanged));
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(DisconnectReason::Error.to_string(), "connection error");
        assert_eq!(
            PermissionDeniedKind::Other("nope".into()).to_string(),
            "nope"
        );
        assert_eq!(MembershipChange::Channel.to_string(), "changed channel");
    }
}
