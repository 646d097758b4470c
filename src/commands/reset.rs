//! Reset command implementation

use sx126x_core::{Level, PinFunction, RadioHal};
use sx126x_linux::HalConfig;

use std::thread;
use std::time::{Duration, Instant};

const BUSY_POLL: Duration = Duration::from_micros(100);

/// Pulse NRESET low for `pulse`, then wait up to `timeout` for BUSY low
pub fn run_reset(
    config: &HalConfig,
    pulse: Duration,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let radio = sx126x_linux::open_config(config)?;

    log::info!("Pulsing NRESET for {:?}", pulse);
    radio.gpio_write(PinFunction::Reset, Level::Low);
    thread::sleep(pulse);
    radio.gpio_write(PinFunction::Reset, Level::High);

    let start = Instant::now();
    while radio.gpio_read(PinFunction::Busy).is_high() {
        if start.elapsed() >= timeout {
            return Err(format!("BUSY still high after {:?}", timeout).into());
        }
        thread::sleep(BUSY_POLL);
    }

    println!("Radio ready, BUSY low after {:?}", start.elapsed());
    Ok(())
}
