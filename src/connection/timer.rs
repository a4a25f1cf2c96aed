//! Fire-once, cancellable timers
//!
//! A fired timer delivers a message carrying its ticket into the
//! controller's inbox. Cancelling aborts the sleeping task and bumps the
//! ticket, so a message that was already queued is recognised as stale.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct OneShotTimer {
    handle: Option<JoinHandle<()>>,
    ticket: u64,
}

impl OneShotTimer {
    /// Start (or restart) the timer
    pub fn arm<M, F>(&mut self, delay: Duration, tx: &mpsc::UnboundedSender<M>, message: F)
    where
        M: Send + 'static,
        F: FnOnce(u64) -> M + Send + 'static,
    {
        self.cancel();
        let ticket = self.ticket;
        let tx = tx.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message(ticket));
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.ticket = self.ticket.wrapping_add(1);
    }

    /// Claim a fired ticket; false if it was cancelled or superseded
    pub fn accept(&mut self, ticket: u64) -> bool {
        if self.handle.is_some() && ticket == self.ticket {
            self.handle = None;
            true
        } else {
            false
        }
    }
}
