//! Option-string configuration

use sx126x_core::{Error, PinConfig, Result, DEFAULT_IRQ_PRIORITY};
use sx126x_linux_spi::{LinuxSpiConfig, LinuxSpiError};

use std::path::PathBuf;

/// Everything needed to open an [`Sx126xLinux`](crate::Sx126xLinux)
#[derive(Debug, Clone)]
pub struct HalConfig {
    /// spidev device and bus settings
    pub spi: LinuxSpiConfig,
    /// GPIO chip device path
    pub gpio_chip: PathBuf,
    /// Line assignment
    pub pins: PinConfig,
    /// SCHED_RR priority for the dispatch thread, `None` for default scheduling
    pub irq_priority: Option<i32>,
}

impl HalConfig {
    /// Parse from a comma separated `key=value` string
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_options(&parse_option_string(s)?)
    }

    /// Parse from key-value pairs
    ///
    /// # Supported Options
    ///
    /// - `dev=/dev/spidevX.Y` - spidev device (required)
    /// - `spispeed=N` - SPI clock in kHz (default 500)
    /// - `mode=N` - SPI mode 0-3 (default 0)
    /// - `gpiochip=N` or `gpiodev=/dev/gpiochipN` - GPIO chip (required)
    /// - `busy=N`, `nrst=N` - mandatory lines
    /// - `nss=N`, `dio1=N`, `dio2=N`, `dio3=N`, `tx_en=N`, `rx_en=N` - optional
    ///   lines, `-1` for not present
    /// - `priority=N` - dispatch thread priority 1-99, or `none`
    pub fn parse_options(options: &[(&str, &str)]) -> Result<Self> {
        let mut spi = LinuxSpiConfig::default();
        let mut pins = PinConfig::default();
        let mut irq_priority = Some(DEFAULT_IRQ_PRIORITY);

        for (key, value) in options {
            if spi.apply_option(key, value)? || pins.apply_option(key, value)? {
                continue;
            }
            match *key {
                "gpiochip" | "gpiodev" => {}
                "priority" => irq_priority = parse_priority(value)?,
                _ => log::warn!("sx126x: Unknown option: {}={}", key, value),
            }
        }

        if spi.device.is_empty() {
            return Err(LinuxSpiError::NoDevice.into());
        }
        let gpio_chip = sx126x_linux_gpio::parse_options(options)?;
        pins.validate()?;

        Ok(Self {
            spi,
            gpio_chip,
            pins,
            irq_priority,
        })
    }
}

fn parse_priority(value: &str) -> Result<Option<i32>> {
    if matches!(value, "none" | "off") {
        return Ok(None);
    }
    match value.parse::<i32>() {
        Ok(p) if (1..=99).contains(&p) => Ok(Some(p)),
        _ => Err(Error::InvalidParameter(format!(
            "Invalid priority: {} (must be 1-99 or 'none')",
            value
        ))),
    }
}

/// Split `a=1,b=2` into key-value pairs
pub fn parse_option_string(s: &str) -> Result<Vec<(&str, &str)>> {
    s.split(',')
        .map(str::trim)
        .filter(|opt| !opt.is_empty())
        .map(|opt| {
            opt.split_once('=').ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "Invalid parameter format: '{}' (expected key=value)",
                    opt
                ))
            })
        })
        .collect()
}
