//! sx126xctl - SX126x radio bring-up tool
//!
//! Opens an SX126x wired to a Linux spidev bus and GPIO chip through the
//! same HAL a protocol stack would use, and exercises it:
//!
//! - `info` shows the pin map, bus clock and BUSY level
//! - `reset` pulses NRESET and times how long the chip stays busy
//! - `watch` runs the interrupt thread and counts DIO edges
//!
//! ```text
//! sx126xctl reset -p dev=/dev/spidev0.0,gpiochip=0,busy=19,nrst=13,nss=23
//! ```

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use sx126x_linux::HalConfig;

use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Info { options } => {
            let config = HalConfig::parse(&options)?;
            commands::run_info(&config)
        }
        Commands::Reset {
            options,
            pulse_ms,
            timeout_ms,
        } => {
            let config = HalConfig::parse(&options)?;
            commands::run_reset(
                &config,
                Duration::from_millis(pulse_ms),
                Duration::from_millis(timeout_ms),
            )
        }
        Commands::Watch {
            options,
            priority,
            no_rt,
            seconds,
        } => {
            let mut config = HalConfig::parse(&options)?;
            if no_rt {
                config.irq_priority = None;
            } else if priority.is_some() {
                config.irq_priority = priority;
            }
            commands::run_watch(&config, Duration::from_secs(seconds))
        }
    }
}
