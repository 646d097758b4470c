//! Linux SPI device implementation
//!
//! This module provides the `LinuxSpi` struct that implements the `SpiBus`
//! trait using Linux's spidev interface.

use crate::error::{LinuxSpiError, Result};
use ioctl::SpiIocTransfer;

use bitflags::bitflags;
use sx126x_core::SpiBus;

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Default SPI clock speed in Hz (500 kHz, safe for any SX126x wiring)
const DEFAULT_SPEED_HZ: u32 = sx126x_core::spi::DEFAULT_SPEED_HZ;

/// The SX126x only speaks 8-bit words
const BITS_PER_WORD: u8 = 8;

bitflags! {
    /// spidev mode bits (`SPI_IOC_WR_MODE`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SpiMode: u8 {
        /// Clock phase
        const CPHA      = 0x01;
        /// Clock polarity
        const CPOL      = 0x02;
        /// Chip select active high
        const CS_HIGH   = 0x04;
        /// Least significant bit first
        const LSB_FIRST = 0x08;
        /// Shared SI/SO line
        const THREE_WIRE = 0x10;
        /// Loopback
        const LOOP      = 0x20;
        /// Controller does not drive chip select
        const NO_CS     = 0x40;
        /// Slave pulls low to pause
        const READY     = 0x80;

        /// SPI mode 0: CPOL=0, CPHA=0
        const MODE_0 = 0;
        /// SPI mode 1: CPOL=0, CPHA=1
        const MODE_1 = Self::CPHA.bits();
        /// SPI mode 2: CPOL=1, CPHA=0
        const MODE_2 = Self::CPOL.bits();
        /// SPI mode 3: CPOL=1, CPHA=1
        const MODE_3 = Self::CPOL.bits() | Self::CPHA.bits();
    }
}

impl SpiMode {
    /// Clock mode from its number (0-3)
    pub fn from_number(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::MODE_0),
            1 => Some(Self::MODE_1),
            2 => Some(Self::MODE_2),
            3 => Some(Self::MODE_3),
            _ => None,
        }
    }
}

impl Default for SpiMode {
    fn default() -> Self {
        SpiMode::MODE_0
    }
}

/// Linux spidev ioctl definitions
mod ioctl {
    use nix::{ioctl_write_buf, ioctl_write_ptr};

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MESSAGE: u8 = 0;
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    // SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(spi_ioc_transfer)])
    ioctl_write_buf!(
        spi_ioc_message,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MESSAGE,
        SpiIocTransfer
    );

    /// SPI transfer structure for ioctl
    /// This must match the kernel's struct spi_ioc_transfer layout
    #[repr(C)]
    #[derive(Debug, Default, Clone)]
    pub struct SpiIocTransfer {
        pub tx_buf: u64,          // __u64 tx_buf
        pub rx_buf: u64,          // __u64 rx_buf
        pub len: u32,             // __u32 len
        pub speed_hz: u32,        // __u32 speed_hz
        pub delay_usecs: u16,     // __u16 delay_usecs
        pub bits_per_word: u8,    // __u8 bits_per_word
        pub cs_change: u8,        // __u8 cs_change
        pub tx_nbits: u8,         // __u8 tx_nbits
        pub rx_nbits: u8,         // __u8 rx_nbits
        pub word_delay_usecs: u8, // __u8 word_delay_usecs
        pub _pad: u8,             // padding
    }
}

/// Configuration for opening a Linux SPI device
#[derive(Debug, Clone)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// SPI clock speed in Hz (default: 500 kHz)
    pub speed_hz: u32,
    /// SPI mode bits (default: mode 0)
    pub mode: SpiMode,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            speed_hz: DEFAULT_SPEED_HZ,
            mode: SpiMode::MODE_0,
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode bits
    pub fn with_mode(mut self, mode: SpiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Apply one `key=value` option; returns `Ok(false)` for keys this
    /// config does not know
    pub fn apply_option(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "dev" => {
                self.device = value.to_string();
            }
            "spispeed" => {
                // Parse speed in kHz
                let speed_khz: u32 = value.parse().map_err(|_| {
                    LinuxSpiError::InvalidParameter(format!("Invalid spispeed value: {}", value))
                })?;
                if speed_khz == 0 {
                    return Err(LinuxSpiError::InvalidParameter(
                        "spispeed must be non-zero".into(),
                    ));
                }
                self.speed_hz = speed_khz.checked_mul(1000).ok_or_else(|| {
                    LinuxSpiError::InvalidParameter(format!("spispeed too large: {}", value))
                })?;
            }
            "mode" => {
                let mode = value
                    .parse()
                    .ok()
                    .and_then(SpiMode::from_number)
                    .ok_or_else(|| {
                        LinuxSpiError::InvalidParameter(format!(
                            "Invalid SPI mode: {} (must be 0-3)",
                            value
                        ))
                    })?;
                self.mode = mode;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Linux SPI bus using the spidev interface
pub struct LinuxSpi {
    /// File handle for spidev device
    file: File,
    /// Device path, for log messages
    path: String,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
    /// Current speed in Hz
    speed_hz: u32,
}

impl LinuxSpi {
    /// Open a Linux SPI device with the given configuration
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        let fd = file.as_raw_fd();

        // Set SPI mode
        let mode = config.mode.bits();
        // SAFETY: fd is an open spidev descriptor and `mode` outlives the call.
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode).map_err(|e| LinuxSpiError::SetModeFailed {
                mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        // Set bits per word
        let bits = BITS_PER_WORD;
        // SAFETY: as above.
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxSpiError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        let mut spi = Self {
            file,
            path: config.device.clone(),
            max_kernel_buf_size,
            speed_hz: 0,
        };
        spi.set_speed_hz(config.speed_hz)?;

        log::info!(
            "linux_spi: Opened {} (mode={:#04x}, speed={} kHz)",
            config.device,
            mode,
            config.speed_hz / 1000
        );

        Ok(spi)
    }

    /// Open a device with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxSpiConfig::new(device))
    }

    /// Device path this bus was opened from
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Largest single transfer the kernel accepts
    pub fn max_transfer_len(&self) -> usize {
        self.max_kernel_buf_size
    }

    /// Perform one full-duplex transfer
    ///
    /// `tx` and `rx` must have the same length. The controller holds its
    /// own chip select for the whole message.
    pub fn full_duplex(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        if tx.len() != rx.len() {
            return Err(LinuxSpiError::InvalidParameter(format!(
                "tx/rx length mismatch: {} != {}",
                tx.len(),
                rx.len()
            )));
        }
        if tx.len() > self.max_kernel_buf_size {
            return Err(LinuxSpiError::TransferTooLarge {
                len: tx.len(),
                max: self.max_kernel_buf_size,
            });
        }

        let transfer = [SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            rx_buf: rx.as_mut_ptr() as u64,
            len: tx.len() as u32,
            speed_hz: self.speed_hz,
            bits_per_word: BITS_PER_WORD,
            ..Default::default()
        }];

        // SAFETY: the descriptor is open and both buffers stay borrowed for
        // the duration of the ioctl, with lengths matching `len`.
        unsafe { ioctl::spi_ioc_message(self.file.as_raw_fd(), &transfer) }
            .map_err(|e| {
                LinuxSpiError::TransferFailed(std::io::Error::from_raw_os_error(e as i32))
            })?;

        log::trace!("linux_spi: {} byte transfer on {}", tx.len(), self.path);
        Ok(())
    }

    /// Set a new SPI clock speed
    pub fn set_speed_hz(&mut self, speed_hz: u32) -> Result<()> {
        let fd = self.file.as_raw_fd();
        // SAFETY: fd is an open spidev descriptor and `speed_hz` outlives the call.
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed_hz).map_err(|e| {
                LinuxSpiError::SetSpeedFailed {
                    speed: speed_hz,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }
        self.speed_hz = speed_hz;
        log::debug!("linux_spi: Set speed to {} Hz", speed_hz);
        Ok(())
    }
}

impl SpiBus for LinuxSpi {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> sx126x_core::Result<()> {
        Ok(self.full_duplex(tx, rx)?)
    }

    fn set_speed(&mut self, speed_hz: u32) -> sx126x_core::Result<()> {
        Ok(self.set_speed_hz(speed_hz)?)
    }

    fn speed_hz(&self) -> u32 {
        self.speed_hz
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Some(size) = parse_buf_size(&content) {
            log::debug!("linux_spi: Using buffer size {} from sysfs", size);
            return size;
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    // SAFETY: sysconf has no preconditions.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("linux_spi: Using page size {} as buffer size", page_size);
    page_size
}

fn parse_buf_size(content: &str) -> Option<usize> {
    content.trim().parse::<usize>().ok().filter(|&size| size > 0)
}

/// Parse bus options from a list of key-value pairs
///
/// - `dev=/dev/spidevX.Y` - Required: device path
/// - `spispeed=8000` - Optional: speed in kHz (default: 500)
/// - `mode=0` - Optional: SPI mode 0-3 (default: 0)
///
/// Other keys are left for the pin and GPIO parsers.
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxSpiConfig> {
    let mut config = LinuxSpiConfig::default();

    for (key, value) in options {
        config.apply_option(key, value)?;
    }

    if config.device.is_empty() {
        return Err(LinuxSpiError::NoDevice);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_struct_matches_kernel_layout() {
        assert_eq!(std::mem::size_of::<SpiIocTransfer>(), 32);
    }

    #[test]
    fn test_mode_numbers() {
        assert_eq!(SpiMode::from_number(0), Some(SpiMode::MODE_0));
        assert_eq!(SpiMode::from_number(3).map(|m| m.bits()), Some(0x03));
        assert_eq!(SpiMode::from_number(4), None);
        assert_eq!((SpiMode::MODE_0 | SpiMode::NO_CS).bits(), 0x40);
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[
            ("dev", "/dev/spidev0.0"),
            ("spispeed", "8000"),
            ("mode", "3"),
            ("busy", "19"),
        ])
        .unwrap();
        assert_eq!(config.device, "/dev/spidev0.0");
        assert_eq!(config.speed_hz, 8_000_000);
        assert_eq!(config.mode, SpiMode::MODE_3);
    }

    #[test]
    fn test_parse_options_defaults() {
        let config = parse_options(&[("dev", "/dev/spidev1.0")]).unwrap();
        assert_eq!(config.speed_hz, 500_000);
        assert_eq!(config.mode, SpiMode::MODE_0);
    }

    #[test]
    fn test_parse_options_errors() {
        assert!(matches!(parse_options(&[]), Err(LinuxSpiError::NoDevice)));
        assert!(parse_options(&[("dev", "/dev/spidev0.0"), ("mode", "7")]).is_err());
        assert!(parse_options(&[("dev", "/dev/spidev0.0"), ("spispeed", "fast")]).is_err());
        assert!(parse_options(&[("dev", "/dev/spidev0.0"), ("spispeed", "0")]).is_err());
        assert!(matches!(
            parse_options(&[("dev", "/dev/spidev0.0"), ("spispeed", "4294968")]),
            Err(LinuxSpiError::InvalidParameter(_))
        ));
        assert_eq!(
            parse_options(&[("dev", "/dev/spidev0.0"), ("spispeed", "4294967")])
                .unwrap()
                .speed_hz,
            4_294_967_000
        );
    }

    #[test]
    fn test_parse_buf_size() {
        assert_eq!(parse_buf_size("4096\n"), Some(4096));
        assert_eq!(parse_buf_size("0"), None);
        assert_eq!(parse_buf_size("junk"), None);
    }

    #[test]
    fn test_open_missing_device() {
        let err = LinuxSpi::open_device("/nonexistent/spidev9.9").err().unwrap();
        assert!(matches!(err, LinuxSpiError::OpenFailed { .. }));
    }
}
