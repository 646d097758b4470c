//! CLI argument parsing

use clap::{Parser, Subcommand};

const OPTIONS_HELP: &str = "Device options as key=value pairs, comma separated \
[dev, spispeed, mode, gpiochip|gpiodev, busy, nrst, nss, dio1, dio2, dio3, tx_en, rx_en, priority]";

#[derive(Parser)]
#[command(name = "sx126xctl")]
#[command(author, version, about = "SX126x radio bring-up tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the radio and show its wiring and state
    Info {
        /// Device options
        #[arg(short = 'p', long, help = OPTIONS_HELP)]
        options: String,
    },

    /// Pulse NRESET and wait for BUSY to drop
    Reset {
        /// Device options
        #[arg(short = 'p', long, help = OPTIONS_HELP)]
        options: String,

        /// How long to hold NRESET low, in milliseconds
        #[arg(long, default_value_t = 1)]
        pulse_ms: u64,

        /// How long to wait for BUSY to go low, in milliseconds
        #[arg(long, default_value_t = 100)]
        timeout_ms: u64,
    },

    /// Count DIO interrupts
    Watch {
        /// Device options
        #[arg(short = 'p', long, help = OPTIONS_HELP)]
        options: String,

        /// SCHED_RR priority of the interrupt thread (overrides priority=)
        #[arg(long)]
        priority: Option<i32>,

        /// Keep the default scheduling policy for the interrupt thread
        #[arg(long, conflicts_with = "priority")]
        no_rt: bool,

        /// How long to listen, in seconds
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}
