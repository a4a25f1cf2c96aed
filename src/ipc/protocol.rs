//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionState, ControllerStatus};

/// Requests from a local client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Start transmitting (push-to-talk pressed)
    TransmitStart,

    /// Stop transmitting (push-to-talk released)
    TransmitStop,

    /// Destroy and reopen the audio stream
    ResetAudio,
}

/// Responses from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Command accepted
    Ok,

    /// Error response
    Error { code: String, message: String },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Connection state
    pub state: ConnectionState,

    /// Consecutive failed connection attempts
    pub retries: u32,

    /// Whether we are sending audio
    pub transmitting: bool,

    /// Other users in our channel, if known
    pub participants: Option<usize>,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl DaemonStatus {
    pub fn from_controller(status: ControllerStatus, uptime_secs: u64) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: status.state,
            retries: status.retries,
            transmitting: status.transmitting,
            participants: status.participants,
            uptime_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::TransmitStart;
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"type":"transmit_start"}"#);
    }

    #[test]
    fn test_request_deserialization() {
        let req: Request = serde_json::from_str(r#"{"type":"reset_audio"}"#).unwrap();
        assert!(matches!(req, Request::ResetAudio));
    }

    #[test]
    fn test_response_serialization() {
        let status = DaemonStatus::from_controller(
            ControllerStatus {
                state: ConnectionState::ReconnectPending,
                retries: 3,
                transmitting: false,
                participants: None,
            },
            42,
        );
        let json = serde_json::to_string(&Response::Status(status)).unwrap();
        assert!(json.contains("\"type\":\"status\""));
        assert!(json.contains("\"state\":\"reconnect_pending\""));
        assert!(json.contains("\"retries\":3"));
    }
}
