//! Watch command implementation

use sx126x_core::{IrqHandler, PinFunction, RadioHal};
use sx126x_linux::HalConfig;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Run the interrupt thread for `duration` and report the edge count
pub fn run_watch(config: &HalConfig, duration: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let radio = Arc::new(sx126x_linux::open_config(config)?);
    let count = Arc::new(AtomicUsize::new(0));

    let handler: Arc<dyn IrqHandler> = {
        let radio = Arc::downgrade(&radio);
        let count = Arc::clone(&count);
        Arc::new(move || -> sx126x_core::Result<()> {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            let busy = radio
                .upgrade()
                .map(|radio| radio.gpio_read(PinFunction::Busy));
            log::info!("DIO edge #{} (BUSY {:?})", n, busy);
            Ok(())
        })
    };

    radio.start_irq_handler(handler, config.irq_priority)?;
    log::info!(
        "Listening on {} for {:?}",
        config
            .pins
            .dio_lines()
            .iter()
            .map(|(offset, _)| offset.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        duration
    );

    thread::sleep(duration);
    radio.stop_irq_handler()?;

    println!("{} interrupt(s) in {:?}", count.load(Ordering::SeqCst), duration);
    Ok(())
}
