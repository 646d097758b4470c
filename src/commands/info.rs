//! Info command implementation

use sx126x_core::{PinFunction, RadioHal};
use sx126x_linux::HalConfig;

fn line(offset: Option<u32>) -> String {
    offset.map_or_else(|| "-".to_string(), |o| o.to_string())
}

/// Open the radio and print its wiring
pub fn run_info(config: &HalConfig) -> Result<(), Box<dyn std::error::Error>> {
    let radio = sx126x_linux::open_config(config)?;
    let pins = radio.pin_config();

    println!("SX126x on {}", config.spi.device);
    println!("  GPIO chip: {}", config.gpio_chip.display());
    println!(
        "  SPI:       mode {}, {} kHz",
        config.spi.mode.bits() & 0x03,
        radio.spi_speed() / 1000
    );
    println!();
    println!("{:<8} {:>6}", "Role", "Line");
    println!("{}", "-".repeat(15));
    for (role, offset) in [
        ("BUSY", pins.busy),
        ("NRESET", pins.nrst),
        ("NSS", pins.nss),
        ("DIO1", pins.dio1),
        ("DIO2", pins.dio2),
        ("DIO3", pins.dio3),
        ("TXEN", pins.tx_en),
        ("RXEN", pins.rx_en),
    ] {
        println!("{:<8} {:>6}", role, line(offset));
    }
    println!();
    println!("BUSY is {:?}", radio.gpio_read(PinFunction::Busy));

    Ok(())
}
