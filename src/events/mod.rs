//! Lifecycle events broadcast by the connection controller
//!
//! Subscribers (the status socket, logs) get a structured view of
//! connects, failures, retries and transmit changes.

use serde::{Deserialize, Serialize};

/// Events emitted by the controller as it changes state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// A dial attempt began
    Connecting {
        /// 1-based attempt number since the last successful connect
        attempt: u32,
    },

    /// Session and audio stream are up
    Connected { address: String },

    /// A dial attempt failed
    ConnectFailed { attempt: u32, reason: String },

    /// A live session dropped
    Disconnected { reason: String },

    /// Next dial is queued behind the retry delay
    RetryScheduled { attempt: u32, delay_secs: u64 },

    /// Retry ceiling reached
    GaveUp { attempts: u32 },

    TransmitStarted,

    TransmitStopped,

    /// Occupancy of our channel changed
    ParticipantsChanged {
        /// Other users in the channel
        count: usize,
    },

    /// Controller torn down
    Shutdown,
}

impl std::fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerEvent::Connecting { attempt } => {
                write!(f, "CONNECTING (attempt {})", attempt)
            }
            ControllerEvent::Connected { address } => write!(f, "CONNECTED ({})", address),
            ControllerEvent::ConnectFailed { attempt, reason } => {
                write!(f, "CONNECT_FAILED (attempt {}: {})", attempt, reason)
            }
            ControllerEvent::Disconnected { reason } => write!(f, "DISCONNECTED ({})", reason),
            ControllerEvent::RetryScheduled { attempt, delay_secs } => {
                write!(f, "RETRY_SCHEDULED (attempt {} in {}s)", attempt, delay_secs)
            }
            ControllerEvent::GaveUp { attempts } => write!(f, "GAVE_UP ({} attempts)", attempts),
            ControllerEvent::TransmitStarted => write!(f, "TRANSMIT_STARTED"),
            ControllerEvent::TransmitStopped => write!(f, "TRANSMIT_STOPPED"),
            ControllerEvent::ParticipantsChanged { count } => {
                write!(f, "PARTICIPANTS_CHANGED ({})", count)
            }
            ControllerEvent::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}
