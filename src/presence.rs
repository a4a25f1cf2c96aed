//! Channel occupancy indicator
//!
//! Membership notifications arrive in bursts. Each one (re)starts a short
//! debounce; when it expires the occupancy is sampled once from the session
//! and the Participants signal is set from that sample. Nothing is counted
//! incrementally.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::connection::OneShotTimer;
use crate::indicator::{IndicatorSignal, StatusMapper};
use crate::session::Session;

pub struct PresenceWatcher {
    debounce: Duration,
    timer: OneShotTimer,
    last: Option<usize>,
}

impl PresenceWatcher {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            timer: OneShotTimer::default(),
            last: None,
        }
    }

    /// Restart the debounce window
    pub fn schedule<M, F>(&mut self, tx: &mpsc::UnboundedSender<M>, message: F)
    where
        M: Send + 'static,
        F: FnOnce(u64) -> M + Send + 'static,
    {
        self.timer.arm(self.debounce, tx, message);
    }

    /// Drop any pending evaluation and forget the last sample
    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.last = None;
    }

    /// Claim a debounce expiry; false for stale tickets
    pub fn accept(&mut self, ticket: u64) -> bool {
        self.timer.accept(ticket)
    }

    /// Sample occupancy and update the Participants signal
    ///
    /// Returns the number of other users in our channel.
    pub fn evaluate<S: Session>(&mut self, session: &S, indicators: &StatusMapper) -> usize {
        let others = session.current_channel_members().saturating_sub(1);
        let channel = session.current_channel_name().unwrap_or_default();

        if others > 0 {
            info!(%channel, participants = others + 1, "channel has participants");
        } else {
            info!(%channel, "channel has no other participants");
        }

        indicators.apply(IndicatorSignal::Participants, others > 0);
        self.last = Some(others);
        others
    }

    /// Result of the most recent evaluation
    pub fn last(&self) -> Option<usize> {
        self.last
    }
}
