//! Status indicators
//!
//! Logical signals (Online, Participants, Transmit) are mapped to logical
//! colors and forwarded to whichever physical backend was selected at
//! startup. Nothing outside this module knows which backend is active.

mod discrete;
mod mapper;
mod strip;

pub use discrete::{DiscreteLeds, PinMap, SysfsGpio};
#[cfg(test)]
pub use discrete::PinOutput;
pub use mapper::StatusMapper;
pub use strip::AddressableStrip;

/// A logical status signal, independent of physical wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorSignal {
    /// Connected to the server
    Online,
    /// Someone else is in our channel
    Participants,
    /// We are sending audio
    Transmit,
}

impl IndicatorSignal {
    /// Every signal, in display order
    pub const ALL: [IndicatorSignal; 3] = [
        IndicatorSignal::Online,
        IndicatorSignal::Participants,
        IndicatorSignal::Transmit,
    ];

    /// The color shown while this signal is active
    pub fn active_color(self) -> LogicalColor {
        match self {
            IndicatorSignal::Online => LogicalColor::OnlineColor,
            IndicatorSignal::Participants => LogicalColor::ParticipantsColor,
            IndicatorSignal::Transmit => LogicalColor::TransmitColor,
        }
    }
}

impl std::fmt::Display for IndicatorSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndicatorSignal::Online => write!(f, "online"),
            IndicatorSignal::Participants => write!(f, "participants"),
            IndicatorSignal::Transmit => write!(f, "transmit"),
        }
    }
}

/// Backend-neutral color; each backend decides how to render it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalColor {
    Off,
    OnlineColor,
    ParticipantsColor,
    TransmitColor,
}

impl LogicalColor {
    pub fn is_lit(self) -> bool {
        self != LogicalColor::Off
    }
}

/// Errors raised by indicator hardware
#[derive(Debug, thiserror::Error)]
pub enum IndicatorError {
    #[error("indicator I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Physical output for status signals
///
/// Calls may block briefly on hardware I/O, so they are only ever made from
/// the indicator task owned by [`StatusMapper`].
pub trait IndicatorSink: Send + 'static {
    /// Show `color` on the output assigned to `signal`
    fn set_state(&mut self, signal: IndicatorSignal, color: LogicalColor)
        -> Result<(), IndicatorError>;

    /// Turn every output off
    fn all_off(&mut self) -> Result<(), IndicatorError>;

    /// Short backend name for log lines
    fn backend(&self) -> &'static str;
}

impl IndicatorSink for Box<dyn IndicatorSink> {
    fn set_state(
        &mut self,
        signal: IndicatorSignal,
        color: LogicalColor,
    ) -> Result<(), IndicatorError> {
        (**self).set_state(signal, color)
    }

    fn all_off(&mut self) -> Result<(), IndicatorError> {
        (**self).all_off()
    }

    fn backend(&self) -> &'static str {
        (**self).backend()
    }
}
