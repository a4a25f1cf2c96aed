//! Push-to-talk listener thread
//!
//! Reads the pin's sysfs value file every few milliseconds and forwards
//! level changes as [`PttEvent`]s.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::button::{ButtonState, PttEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Watches one GPIO input for push-to-talk presses
pub struct PttListener {
    value_path: PathBuf,
    event_tx: mpsc::Sender<PttEvent>,
    running: Arc<AtomicBool>,
}

impl PttListener {
    /// Listener for sysfs GPIO `pin`
    pub fn new(pin: u8, event_tx: mpsc::Sender<PttEvent>) -> Self {
        Self::with_value_path(
            PathBuf::from(format!("/sys/class/gpio/gpio{pin}/value")),
            event_tx,
        )
    }

    pub fn with_value_path(value_path: PathBuf, event_tx: mpsc::Sender<PttEvent>) -> Self {
        Self {
            value_path,
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the polling thread
    pub fn start(&self) -> Result<(), PttError> {
        if !self.value_path.exists() {
            return Err(PttError::PinUnavailable(self.value_path.clone()));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(PttError::AlreadyRunning);
        }

        let value_path = self.value_path.clone();
        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("ptt-listener".to_string())
            .spawn(move || {
                info!(path = ?value_path, "ptt listener thread started");

                if let Err(e) = poll_loop(&value_path, &event_tx, &running) {
                    error!(?e, "ptt listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("ptt listener thread stopped");
            })
            .map_err(|e| PttError::ThreadSpawn(e.to_string()))?;

        Ok(())
    }

    /// Ask the polling thread to exit
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the push-to-talk listener
#[derive(Debug, thiserror::Error)]
pub enum PttError {
    #[error("ptt listener is already running")]
    AlreadyRunning,

    #[error("ptt input {0} not available")]
    PinUnavailable(PathBuf),

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("failed to read ptt input: {0}")]
    Read(#[from] std::io::Error),
}

fn poll_loop(
    value_path: &Path,
    event_tx: &mpsc::Sender<PttEvent>,
    running: &AtomicBool,
) -> Result<(), PttError> {
    let mut last = ButtonState::default();

    while running.load(Ordering::SeqCst) {
        let raw = std::fs::read_to_string(value_path)?;
        match ButtonState::from_sysfs(&raw) {
            Some(state) => {
                if let Some(event) = last.edge(state) {
                    debug!(?event, "ptt edge");
                    if event_tx.blocking_send(event).is_err() {
                        warn!("failed to send ptt event - channel closed?");
                        break;
                    }
                }
                last = state;
            }
            None => debug!(raw = %raw.trim(), "unreadable ptt level"),
        }
        thread::sleep(POLL_INTERVAL);
    }

    Ok(())
}
