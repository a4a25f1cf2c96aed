//! One LED per signal, each on its own GPIO pin

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use super::{IndicatorError, IndicatorSignal, IndicatorSink, LogicalColor};

/// Something that can drive a digital output pin
pub trait PinOutput: Send + 'static {
    fn write(&mut self, pin: u8, high: bool) -> io::Result<()>;
}

/// Pin assignment for each signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    pub online: u8,
    pub participants: u8,
    pub transmit: u8,
}

impl PinMap {
    pub fn pin_for(&self, signal: IndicatorSignal) -> u8 {
        match signal {
            IndicatorSignal::Online => self.online,
            IndicatorSignal::Participants => self.participants,
            IndicatorSignal::Transmit => self.transmit,
        }
    }

    pub fn pins(&self) -> [u8; 3] {
        [self.online, self.participants, self.transmit]
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            online: 17,
            participants: 27,
            transmit: 22,
        }
    }
}

/// Discrete single-color LEDs: every lit color drives the pin high
pub struct DiscreteLeds<P: PinOutput> {
    pins: PinMap,
    out: P,
}

impl<P: PinOutput> DiscreteLeds<P> {
    pub fn new(pins: PinMap, out: P) -> Self {
        Self { pins, out }
    }
}

impl<P: PinOutput> IndicatorSink for DiscreteLeds<P> {
    fn set_state(
        &mut self,
        signal: IndicatorSignal,
        color: LogicalColor,
    ) -> Result<(), IndicatorError> {
        let pin = self.pins.pin_for(signal);
        self.out.write(pin, color.is_lit())?;
        Ok(())
    }

    fn all_off(&mut self) -> Result<(), IndicatorError> {
        for pin in self.pins.pins() {
            self.out.write(pin, false)?;
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "gpio"
    }
}

/// Linux sysfs GPIO (`/sys/class/gpio`)
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    /// Export `pins` and configure them as outputs
    pub fn open(pins: &[u8]) -> io::Result<Self> {
        Self::open_at(PathBuf::from("/sys/class/gpio"), pins)
    }

    fn open_at(root: PathBuf, pins: &[u8]) -> io::Result<Self> {
        for &pin in pins {
            let dir = root.join(format!("gpio{pin}"));
            if !dir.exists() {
                fs::write(root.join("export"), pin.to_string())?;
            }
            fs::write(dir.join("direction"), "out")?;
            debug!(pin, "gpio output configured");
        }
        Ok(Self { root })
    }
}

impl PinOutput for SysfsGpio {
    fn write(&mut self, pin: u8, high: bool) -> io::Result<()> {
        let value = if high { "1" } else { "0" };
        fs::write(self.root.join(format!("gpio{pin}")).join("value"), value)
    }
}
