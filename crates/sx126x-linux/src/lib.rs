//! sx126x-linux - SX126x HAL on Linux spidev and GPIO character devices
//!
//! Binds [`sx126x_core::Hal`] to a `/dev/spidevX.Y` bus and a
//! `/dev/gpiochipN` chip. The result, [`Sx126xLinux`], implements
//! [`RadioHal`](sx126x_core::RadioHal) for an SX126x protocol core.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sx126x_core::{BusLock, PinConfig, DEFAULT_IRQ_PRIORITY};
//!
//! let pins = PinConfig::from_raw([19, 13, 23, 26, -1, -1, 21, 20])?;
//! let radio = sx126x_linux::open("/dev/spidev0.0", 0, &pins)?;
//! radio.set_spi_speed(8_000_000)?;
//!
//! // Two radios on one controller share a lock
//! let bus = BusLock::new();
//! radio.set_bus_lock(Some(bus.clone()));
//!
//! radio.start_irq_handler(
//!     Arc::new(|| {
//!         println!("DIO edge");
//!         Ok(())
//!     }),
//!     Some(DEFAULT_IRQ_PRIORITY),
//! )?;
//! # radio.stop_irq_handler()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Option strings
//!
//! [`HalConfig::parse`] accepts the comma separated `key=value` form used
//! by the command line tool:
//!
//! ```text
//! dev=/dev/spidev0.0,gpiochip=0,busy=19,nrst=13,nss=23,dio1=26,tx_en=21,rx_en=20,spispeed=8000
//! ```

mod config;

pub use config::{parse_option_string, HalConfig};

use sx126x_core::{Hal, PinConfig, Result};
use sx126x_linux_gpio::LinuxGpio;
use sx126x_linux_spi::{LinuxSpi, LinuxSpiConfig};

use std::path::Path;

/// SX126x HAL on Linux character devices
pub type Sx126xLinux = Hal<LinuxGpio, LinuxSpi>;

/// Open the radio on `spi_dev_path` with lines from GPIO chip `gpio_chip`
///
/// The bus starts in mode 0 at 500 kHz; raise it with
/// [`Hal::set_spi_speed`] once the wiring is known to cope.
pub fn open(spi_dev_path: &str, gpio_chip: u32, pins: &PinConfig) -> Result<Sx126xLinux> {
    let spi = LinuxSpiConfig::new(spi_dev_path);
    let gpio = sx126x_linux_gpio::device::chip_path(gpio_chip);
    open_with(&spi, &gpio, pins)
}

/// Open the radio from explicit bus settings and a GPIO chip path
///
/// Nothing stays claimed if any step fails.
pub fn open_with(spi: &LinuxSpiConfig, gpio_chip: &Path, pins: &PinConfig) -> Result<Sx126xLinux> {
    pins.validate()?;
    let bus = LinuxSpi::open(spi)?;
    let gpio = LinuxGpio::open(gpio_chip)?;
    Hal::new(&gpio, bus, pins)
}

/// Open the radio described by `config`
pub fn open_config(config: &HalConfig) -> Result<Sx126xLinux> {
    open_with(&config.spi, &config.gpio_chip, &config.pins)
}
