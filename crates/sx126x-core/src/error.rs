//! Error types for sx126x-core

use thiserror::Error;

/// Boxed backend error carried as the source of [`Error::Gpio`] and [`Error::Spi`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    // Pin configuration errors
    /// A mandatory pin role has no line assigned
    #[error("Missing required pin: {0}")]
    MissingPin(&'static str),

    /// A pin role was given an offset that is neither valid nor the unused sentinel
    #[error("Invalid line offset for {name}: {value}")]
    InvalidPin {
        /// Pin role name
        name: &'static str,
        /// Offending value as given
        value: String,
    },

    /// Two pin roles were assigned the same line
    #[error("Line {offset} assigned to both {first} and {second}")]
    DuplicatePin {
        /// Line offset used twice
        offset: u32,
        /// First role using the line
        first: &'static str,
        /// Second role using the line
        second: &'static str,
    },

    // Backend errors
    /// GPIO line request or line access failed
    #[error("GPIO error: {0}")]
    Gpio(#[source] BoxError),

    /// SPI device open, configuration or transfer failed
    #[error("SPI error: {0}")]
    Spi(#[source] BoxError),

    /// Transmit and receive buffers of a full-duplex transfer differ in size
    #[error("SPI buffer length mismatch: tx={tx}, rx={rx}")]
    LengthMismatch {
        /// Transmit buffer length
        tx: usize,
        /// Receive buffer length
        rx: usize,
    },

    // Interrupt dispatch errors
    /// The interrupt dispatch thread is already running
    #[error("Interrupt handler is already running")]
    IrqAlreadyRunning,

    /// No DIO line is configured, so there is nothing to listen on
    #[error("No interrupt lines configured")]
    NoIrqLines,

    /// The OS refused to create the dispatch thread
    #[error("Failed to spawn interrupt thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The dispatch thread terminated by panicking outside of handler code
    #[error("Interrupt thread panicked")]
    IrqThreadPanicked,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    /// Wrap a GPIO backend error
    pub fn gpio(err: impl Into<BoxError>) -> Self {
        Error::Gpio(err.into())
    }

    /// Wrap an SPI backend error
    pub fn spi(err: impl Into<BoxError>) -> Self {
        Error::Spi(err.into())
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
