//! CLI command implementations
//!
//! Each command opens the radio from a [`HalConfig`](sx126x_linux::HalConfig),
//! does its work through [`RadioHal`](sx126x_core::RadioHal) and drops the
//! HAL on return, which releases every line.

mod info;
mod reset;
mod watch;

pub use info::run_info;
pub use reset::run_reset;
pub use watch::run_watch;
