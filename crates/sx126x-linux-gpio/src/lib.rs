//! sx126x-linux-gpio - Linux GPIO lines for the SX126x HAL
//!
//! This crate claims the radio's control lines through the GPIO character
//! device interface using the gpiocdev crate, a pure Rust implementation of
//! the modern replacement for the deprecated sysfs interface.
//!
//! [`LinuxGpio`] implements [`sx126x_core::GpioBackend`]:
//!
//! - BUSY is claimed as an input,
//! - NRESET, NSS, TXEN and RXEN are each claimed as an output with their
//!   idle level already applied by the kernel at request time,
//! - all DIO lines share one edge-detecting request, so the kernel delivers
//!   their events through a single queue in timestamp order.
//!
//! BUSY, NRESET, NSS, TXEN and RXEN are each requested on their own with the
//! consumer label the radio role implies (`SX126x BUSY`, `SX126x NRESET`,
//! ...), which is what `gpioinfo` shows while the HAL holds them. The kernel
//! keeps one label per request, so the shared DIO request is labelled with
//! the DIO names joined, e.g. `SX126x DIO1+DIO3`.
//!
//! # Example
//!
//! ```no_run
//! use sx126x_linux_gpio::LinuxGpio;
//! use sx126x_core::{GpioBackend, InputLine};
//!
//! let chip = LinuxGpio::from_number(0)?;
//! let busy = chip.request_input(19, "SX126x BUSY")?;
//! println!("BUSY is {:?}", busy.read()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux 5.10 or later for the v2 character device ABI (v1 is also built in)
//! - Read/write access to `/dev/gpiochipN`

pub mod device;
pub mod error;

pub use device::{parse_options, DioEvents, GpioLine, LinuxGpio};
pub use error::{LinuxGpioError, Result};
