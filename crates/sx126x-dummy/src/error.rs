//! Error types for the simulated devices

use sx126x_core::{Error, Offset};
use thiserror::Error;

/// Simulator error
#[derive(Debug, Error)]
pub enum SimError {
    /// Offset beyond the end of the simulated chip
    #[error("Line {offset} out of range (chip has {num_lines} lines)")]
    InvalidLine {
        /// Requested offset
        offset: Offset,
        /// Lines on the chip
        num_lines: u32,
    },

    /// Line already claimed by someone else
    #[error("Line {offset} is busy (held by '{holder}')")]
    LineBusy {
        /// Requested offset
        offset: Offset,
        /// Consumer label of the current holder
        holder: String,
    },

    /// Write to a line claimed as input
    #[error("Line {0} is not an output")]
    NotOutput(Offset),

    /// Edge request without any line
    #[error("No lines given")]
    NoLines,

    /// The edge queue was torn down
    #[error("Edge queue closed")]
    Closed,

    /// Transfer failure requested by the test
    #[error("Injected transfer failure")]
    InjectedFailure,
}

/// Result type for the simulator
pub type Result<T> = std::result::Result<T, SimError>;

impl From<SimError> for Error {
    fn from(e: SimError) -> Self {
        match e {
            SimError::InjectedFailure => Error::spi(e),
            _ => Error::gpio(e),
        }
    }
}
