//! SPI bus binding
//!
//! [`SpiBinding`] pairs a raw [`SpiBus`] with an optional chip-select strobe.
//! When a strobe is present it is asserted immediately before and deasserted
//! immediately after every transfer; otherwise the controller's hardware
//! chip select frames the transfer.

use crate::error::{Error, Result};
use crate::line::OutputLine;
use crate::pin::Level;

/// Default SPI clock for the radio (500 kHz)
pub const DEFAULT_SPEED_HZ: u32 = 500_000;

/// A full-duplex SPI bus
pub trait SpiBus: Send + 'static {
    /// Clock out `tx` while clocking in `rx`; both have the same length
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()>;

    /// Change the clock speed in Hz
    fn set_speed(&mut self, speed_hz: u32) -> Result<()>;

    /// Current clock speed in Hz
    fn speed_hz(&self) -> u32;
}

/// Chip-select strobe driven around each transfer
pub trait ChipSelect: Send {
    /// Select the peripheral
    fn assert(&self) -> Result<()>;

    /// Release the peripheral
    fn deassert(&self) -> Result<()>;
}

/// Active-low chip select on a GPIO output
#[derive(Debug)]
pub struct ActiveLowCs<O> {
    line: O,
}

impl<O: OutputLine> ActiveLowCs<O> {
    /// Wrap an output line that is already driven high (deselected)
    pub fn new(line: O) -> Self {
        Self { line }
    }

    /// Borrow the underlying line
    pub fn line(&self) -> &O {
        &self.line
    }
}

impl<O: OutputLine> ChipSelect for ActiveLowCs<O> {
    fn assert(&self) -> Result<()> {
        self.line.write(Level::Low)
    }

    fn deassert(&self) -> Result<()> {
        self.line.write(Level::High)
    }
}

/// SPI bus together with its chip-select strobe
pub struct SpiBinding<S> {
    bus: S,
    cs: Option<Box<dyn ChipSelect>>,
}

impl<S: SpiBus> SpiBinding<S> {
    /// Bind a bus that relies on the controller's hardware chip select
    pub fn new(bus: S) -> Self {
        Self { bus, cs: None }
    }

    /// Bind a bus with a software chip-select strobe
    pub fn with_chip_select(bus: S, cs: impl ChipSelect + 'static) -> Self {
        Self {
            bus,
            cs: Some(Box::new(cs)),
        }
    }

    /// True if a software chip select frames transfers
    pub fn has_chip_select(&self) -> bool {
        self.cs.is_some()
    }

    /// Run one framed full-duplex transfer
    ///
    /// The strobe is released even when the bus transfer fails; the bus
    /// error takes precedence over a release error.
    pub fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        if tx.len() != rx.len() {
            return Err(Error::LengthMismatch {
                tx: tx.len(),
                rx: rx.len(),
            });
        }
        if tx.is_empty() {
            return Ok(());
        }

        let Some(cs) = &self.cs else {
            return self.bus.transfer(tx, rx);
        };

        cs.assert()?;
        let result = self.bus.transfer(tx, rx);
        let released = cs.deassert();
        result.and(released)
    }

    /// Change the clock speed in Hz
    pub fn set_speed(&mut self, speed_hz: u32) -> Result<()> {
        self.bus.set_speed(speed_hz)
    }

    /// Current clock speed in Hz
    pub fn speed_hz(&self) -> u32 {
        self.bus.speed_hz()
    }

    /// Borrow the raw bus
    pub fn bus(&self) -> &S {
        &self.bus
    }
}
