//! sx126x-linux-spi - Linux spidev bus for the SX126x HAL
//!
//! The Linux SPI driver exposes SPI controllers through character devices
//! at `/dev/spidevX.Y` where X is the bus number and Y is the chip select.
//! [`LinuxSpi`] opens one of them, configures mode, word size and clock,
//! and implements [`sx126x_core::SpiBus`] with a single full-duplex
//! `SPI_IOC_MESSAGE` per transfer.
//!
//! # Example
//!
//! ```no_run
//! use sx126x_linux_spi::{LinuxSpi, LinuxSpiConfig, SpiMode};
//! use sx126x_core::SpiBus;
//!
//! let config = LinuxSpiConfig::new("/dev/spidev0.0")
//!     .with_speed(8_000_000)
//!     .with_mode(SpiMode::MODE_0);
//! let mut spi = LinuxSpi::open(&config)?;
//!
//! // GetStatus
//! let mut rx = [0u8; 2];
//! spi.transfer(&[0xC0, 0x00], &mut rx)?;
//! println!("status: {:02X}", rx[1]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y`
//! - On boards where NSS is driven from a GPIO, the controller's own chip
//!   select still toggles; leave that pin unconnected or pick a spare CS.

pub mod device;
pub mod error;

pub use device::{parse_options, LinuxSpi, LinuxSpiConfig, SpiMode};
pub use error::{LinuxSpiError, Result};
