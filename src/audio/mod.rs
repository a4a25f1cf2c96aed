//! Audio stream capability
//!
//! A stream is bound to exactly one live session. The controller opens it
//! right after connecting and destroys it before any reconnect.

use std::io;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::session::Session;

/// Errors opening an audio stream
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("audio device {0} not found")]
    DeviceMissing(PathBuf),

    #[error("audio backend failed: {0}")]
    Backend(String),
}

/// Opens audio streams for a session
pub trait AudioBackend<S: Session>: Send + 'static {
    type Stream: AudioStream;

    fn open_stream(&mut self, session: &S) -> Result<Self::Stream, OpenError>;
}

/// Outbound audio source attached to a session
pub trait AudioStream: Send + 'static {
    /// Begin sending captured audio
    fn start_source(&mut self);

    /// Stop sending; safe when not sourcing
    fn stop_source(&mut self);

    /// Release the stream
    fn destroy(self);
}

/// Audio on a local capture device
///
/// Opening verifies the device is present; the sourcing flag is what the
/// session's encoder consults when pulling frames.
pub struct DeviceAudio {
    device: PathBuf,
}

impl DeviceAudio {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl<S: Session> AudioBackend<S> for DeviceAudio {
    type Stream = DeviceStream;

    fn open_stream(&mut self, session: &S) -> Result<DeviceStream, OpenError> {
        match std::fs::metadata(&self.device) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(OpenError::DeviceMissing(self.device.clone()));
            }
            Err(e) => return Err(OpenError::Backend(e.to_string())),
        }
        info!(device = ?self.device, remote = %session.remote_addr(), "audio stream opened");
        Ok(DeviceStream { sourcing: false })
    }
}

pub struct DeviceStream {
    sourcing: bool,
}

impl AudioStream for DeviceStream {
    fn start_source(&mut self) {
        self.sourcing = true;
        debug!("audio source started");
    }

    fn stop_source(&mut self) {
        if self.sourcing {
            debug!("audio source stopped");
        }
        self.sourcing = false;
    }

    fn destroy(mut self) {
        self.stop_source();
        debug!("audio stream destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSession, SessionProbe};

    #[test]
    fn test_missing_device_fails_open() {
        let mut audio = DeviceAudio::new("/nonexistent/walkie/snd");
        let session = MockSession::new(SessionProbe::default());

        let result = audio.open_stream(&session);
        assert!(matches!(result, Err(OpenError::DeviceMissing(_))));
    }

    #[test]
    fn test_source_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let mut audio = DeviceAudio::new(dir.path());
        let session = MockSession::new(SessionProbe::default());

        let mut stream = audio.open_stream(&session).unwrap();
        assert!(!stream.sourcing);
        stream.start_source();
        assert!(stream.sourcing);
        stream.stop_source();
        stream.stop_source();
        assert!(!stream.sourcing);
        stream.destroy();
    }
}
