//! Error types for Linux GPIO operations

use thiserror::Error;

/// Linux GPIO specific errors
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// Failed to open GPIO chip
    #[error("Failed to open GPIO chip '{path}': {source}")]
    ChipOpenFailed {
        path: String,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to request a GPIO line
    #[error("Failed to request line {offset} ({label}): {source}")]
    LineRequestFailed {
        offset: u32,
        label: String,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to set GPIO line value
    #[error("Failed to set line {offset}: {source}")]
    SetValueFailed {
        offset: u32,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to get GPIO line value
    #[error("Failed to read line {offset}: {source}")]
    GetValueFailed {
        offset: u32,
        #[source]
        source: gpiocdev::Error,
    },

    /// Waiting for or reading an edge event failed
    #[error("Failed to read edge event: {0}")]
    EdgeEventFailed(#[source] gpiocdev::Error),

    /// Line offset beyond the chip
    #[error("Line {offset} out of range for {chip} ({num_lines} lines)")]
    InvalidLineNumber {
        offset: u32,
        chip: String,
        num_lines: u32,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// GPIO chip or device not specified
    #[error("No GPIO chip specified. Use gpiodev=/dev/gpiochipN or gpiochip=N")]
    NoDevice,
}

/// Result type for Linux GPIO operations
pub type Result<T> = std::result::Result<T, LinuxGpioError>;

impl From<LinuxGpioError> for sx126x_core::Error {
    fn from(err: LinuxGpioError) -> Self {
        match err {
            LinuxGpioError::InvalidParameter(msg) => sx126x_core::Error::InvalidParameter(msg),
            other => sx126x_core::Error::gpio(other),
        }
    }
}
