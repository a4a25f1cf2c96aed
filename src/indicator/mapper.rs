//! Signal-to-color mapping and the indicator task
//!
//! Hardware writes can stall on serial I/O, so callers only enqueue
//! commands here. A single task owns the sink and applies them in order.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{IndicatorSignal, IndicatorSink, LogicalColor};

enum IndicatorCommand {
    Set(IndicatorSignal, LogicalColor),
    AllOff,
    Flush(oneshot::Sender<()>),
}

/// Cheap, cloneable handle to the active indicator backend
#[derive(Clone)]
pub struct StatusMapper {
    tx: mpsc::UnboundedSender<IndicatorCommand>,
}

impl StatusMapper {
    /// Hand `sink` to a new indicator task and return the handle that feeds it
    ///
    /// The task exits once every handle has been dropped.
    pub fn spawn<S: IndicatorSink>(sink: S) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_sink(sink, rx));
        (Self { tx }, task)
    }

    /// Turn `signal` on or off
    pub fn apply(&self, signal: IndicatorSignal, active: bool) {
        let color = if active {
            signal.active_color()
        } else {
            LogicalColor::Off
        };
        self.send(IndicatorCommand::Set(signal, color));
    }

    /// Turn everything off
    pub fn all_off(&self) {
        self.send(IndicatorCommand::AllOff);
    }

    /// Wait until every command queued so far has reached the hardware
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(IndicatorCommand::Flush(ack_tx));
        let _ = ack_rx.await;
    }

    fn send(&self, command: IndicatorCommand) {
        if self.tx.send(command).is_err() {
            debug!("indicator task gone, dropping update");
        }
    }
}

async fn run_sink<S: IndicatorSink>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<IndicatorCommand>,
) {
    info!(backend = sink.backend(), "indicator task started");

    while let Some(command) = rx.recv().await {
        match command {
            IndicatorCommand::Set(signal, color) => {
                debug!(%signal, ?color, "indicator update");
                if let Err(e) = sink.set_state(signal, color) {
                    warn!(%signal, error = %e, "indicator update failed");
                }
            }
            IndicatorCommand::AllOff => {
                if let Err(e) = sink.all_off() {
                    warn!(error = %e, "failed to switch indicators off");
                }
            }
            IndicatorCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    debug!(backend = sink.backend(), "indicator task stopped");
}
