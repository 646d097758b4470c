//! sx126x-core - Hardware abstraction core for SX126x transceivers
//!
//! An SX126x protocol core (command set, register map, radio state machine)
//! delegates every physical operation to a small capability set: read the
//! BUSY line, drive the NRESET line, run a blocking SPI transfer and bracket
//! transmit/receive with the RF switch enable lines. This crate provides that
//! capability set ([`RadioHal`]) on top of a few narrow backend traits, so the
//! same wiring, locking and interrupt dispatch logic runs against Linux
//! character devices or an in-memory simulation.
//!
//! # Layout
//!
//! - [`pin`] - pin roles, logic levels and the [`PinConfig`] descriptor
//! - [`line`] - GPIO line traits, optional lines and edge sources
//! - [`spi`] - SPI bus trait and the chip-select strobe binding
//! - [`lock`] - the [`BusLock`] shared between instances on one SPI controller
//! - [`irq`] - the interrupt dispatch thread
//! - [`hal`] - the generic [`Hal`] that ties everything together
//!
//! # Example
//!
//! ```ignore
//! use sx126x_core::{Hal, Level, PinConfig, PinFunction, RadioHal};
//!
//! let pins = PinConfig::new(19, 13).with_nss(23).with_dio1(26);
//! let hal = Hal::new(&gpio_backend, spi_bus, &pins)?;
//!
//! hal.gpio_write(PinFunction::Reset, Level::Low);
//! hal.gpio_write(PinFunction::Reset, Level::High);
//! while hal.gpio_read(PinFunction::Busy).is_high() {}
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod hal;
pub mod irq;
pub mod line;
pub mod lock;
pub mod pin;
pub mod spi;

pub use error::{BoxError, Error, Result};
pub use hal::{Hal, RadioHal};
pub use irq::{IrqHandler, DEFAULT_IRQ_PRIORITY};
pub use line::{
    EdgeDetection, EdgeEvent, EdgeKind, EdgeSource, GpioBackend, InputLine, OptionalLine,
    OutputLine,
};
pub use lock::BusLock;
pub use pin::{Level, Offset, PinConfig, PinFunction};
pub use spi::{ActiveLowCs, ChipSelect, SpiBinding, SpiBus};
