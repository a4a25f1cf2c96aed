//! Push-to-talk gating
//!
//! Transmission only starts while connected. Any transition out of
//! `Connected` stops it through [`TransmitGate::stop`].

use tracing::debug;

use crate::audio::AudioStream;
use crate::connection::ConnectionState;
use crate::indicator::{IndicatorSignal, StatusMapper};

#[derive(Debug, Default)]
pub struct TransmitGate {
    active: bool,
}

impl TransmitGate {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Begin transmitting; returns false (and does nothing) unless connected
    pub fn start<A: AudioStream>(
        &mut self,
        state: ConnectionState,
        stream: Option<&mut A>,
        indicators: &StatusMapper,
    ) -> bool {
        let stream = match (state, stream) {
            (ConnectionState::Connected, Some(stream)) => stream,
            _ => {
                debug!(%state, "not connected, ignoring transmit start");
                return false;
            }
        };

        self.active = true;
        indicators.apply(IndicatorSignal::Transmit, true);
        stream.start_source();
        true
    }

    /// Stop transmitting; returns whether we were transmitting
    pub fn stop<A: AudioStream>(
        &mut self,
        stream: Option<&mut A>,
        indicators: &StatusMapper,
    ) -> bool {
        if let Some(stream) = stream {
            stream.stop_source();
        }
        indicators.apply(IndicatorSignal::Transmit, false);
        std::mem::replace(&mut self.active, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::LogicalColor;
    use crate::testing::{AudioProbe, MockStream, RecordingSink};

    #[tokio::test]
    async fn test_start_requires_connection() {
        let sink = RecordingSink::default();
        let (indicators, _task) = StatusMapper::spawn(sink.clone());
        let probe = AudioProbe::default();
        let mut stream = MockStream::new(probe.clone());
        let mut gate = TransmitGate::default();

        assert!(!gate.start(ConnectionState::ReconnectPending, Some(&mut stream), &indicators));
        assert!(!gate.start(ConnectionState::Connected, None::<&mut MockStream>, &indicators));
        indicators.flush().await;

        assert!(!gate.is_active());
        assert!(!probe.sourcing());
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn test_start_then_stop() {
        let sink = RecordingSink::default();
        let (indicators, _task) = StatusMapper::spawn(sink.clone());
        let probe = AudioProbe::default();
        let mut stream = MockStream::new(probe.clone());
        let mut gate = TransmitGate::default();

        assert!(gate.start(ConnectionState::Connected, Some(&mut stream), &indicators));
        indicators.flush().await;
        assert!(gate.is_active());
        assert!(probe.sourcing());
        assert_eq!(sink.color_of(IndicatorSignal::Transmit), LogicalColor::TransmitColor);

        assert!(gate.stop(Some(&mut stream), &indicators));
        indicators.flush().await;
        assert!(!gate.is_active());
        assert!(!probe.sourcing());
        assert_eq!(sink.color_of(IndicatorSignal::Transmit), LogicalColor::Off);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let sink = RecordingSink::default();
        let (indicators, _task) = StatusMapper::spawn(sink.clone());
        let mut gate = TransmitGate::default();

        assert!(!gate.stop(None::<&mut MockStream>, &indicators));
        assert!(!gate.stop(None::<&mut MockStream>, &indicators));
        indicators.flush().await;
        assert_eq!(sink.color_of(IndicatorSignal::Transmit), LogicalColor::Off);
    }
}
