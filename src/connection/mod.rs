//! Connection and session lifecycle
//!
//! One actor task owns the connection state machine:
//! - Disconnected: not started, or torn down
//! - Connecting: a single dial is in flight
//! - Connected: session and audio stream are live
//! - ReconnectPending: waiting out the retry delay
//! - FailedTerminal: retry ceiling reached, never dials again

mod controller;
mod retry;
mod timer;

pub use controller::{Controller, ControllerHandle, ControllerSettings, ControllerStatus};
pub use retry::{ReconnectState, RetryPolicy};
pub use timer::OneShotTimer;

use serde::{Deserialize, Serialize};

use crate::audio::OpenError;

/// Connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    ReconnectPending,
    FailedTerminal,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::ReconnectPending => write!(f, "ReconnectPending"),
            ConnectionState::FailedTerminal => write!(f, "FailedTerminal"),
        }
    }
}

/// Unrecoverable controller failures
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("unable to connect after {attempts} attempts, giving up")]
    RetriesExhausted { attempts: u32 },

    #[error("audio stream open failed: {0}")]
    AudioOpen(#[from] OpenError),
}
