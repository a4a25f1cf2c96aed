//! Addressable RGB strip on a serial port
//!
//! Each signal owns one pixel. The controller on the other end of the port
//! expects the whole frame on every update: a `0xAA` start byte, the pixel
//! count, then `r g b` per pixel.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use super::{IndicatorError, IndicatorSignal, IndicatorSink, LogicalColor};

const FRAME_START: u8 = 0xAA;
const PIXELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl From<LogicalColor> for Rgb {
    fn from(color: LogicalColor) -> Self {
        match color {
            LogicalColor::Off => Rgb(0, 0, 0),
            LogicalColor::OnlineColor => Rgb(0, 0xFF, 0),
            LogicalColor::ParticipantsColor => Rgb(0, 0, 0xFF),
            LogicalColor::TransmitColor => Rgb(0xFF, 0, 0),
        }
    }
}

fn pixel_for(signal: IndicatorSignal) -> usize {
    match signal {
        IndicatorSignal::Online => 0,
        IndicatorSignal::Participants => 1,
        IndicatorSignal::Transmit => 2,
    }
}

/// Three-pixel strip fed over any byte sink
pub struct AddressableStrip<W: Write + Send + 'static> {
    port: W,
    frame: [Rgb; PIXELS],
}

impl AddressableStrip<std::fs::File> {
    /// Open the strip's serial device for writing
    pub fn open(device: &Path) -> std::io::Result<Self> {
        let port = OpenOptions::new().write(true).open(device)?;
        Ok(Self::new(port))
    }
}

impl<W: Write + Send + 'static> AddressableStrip<W> {
    pub fn new(port: W) -> Self {
        Self {
            port,
            frame: [Rgb::default(); PIXELS],
        }
    }

    fn write_frame(&mut self) -> Result<(), IndicatorError> {
        let mut buf = Vec::with_capacity(2 + PIXELS * 3);
        buf.push(FRAME_START);
        buf.push(PIXELS as u8);
        for Rgb(r, g, b) in self.frame {
            buf.extend_from_slice(&[r, g, b]);
        }
        self.port.write_all(&buf)?;
        self.port.flush()?;
        Ok(())
    }
}

impl<W: Write + Send + 'static> IndicatorSink for AddressableStrip<W> {
    fn set_state(
        &mut self,
        signal: IndicatorSignal,
        color: LogicalColor,
    ) -> Result<(), IndicatorError> {
        self.frame[pixel_for(signal)] = color.into();
        self.write_frame()
    }

    fn all_off(&mut self) -> Result<(), IndicatorError> {
        self.frame = [Rgb::default(); PIXELS];
        self.write_frame()
    }

    fn backend(&self) -> &'static str {
        "strip"
    }
}
