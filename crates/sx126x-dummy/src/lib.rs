//! sx126x-dummy - Simulated GPIO chip and SPI bus
//!
//! This crate provides in-memory stand-ins for the Linux devices so the
//! generic [`Hal`](sx126x_core::Hal) can be exercised without a radio:
//!
//! - [`SimChip`] implements [`GpioBackend`](sx126x_core::GpioBackend) with
//!   exclusive line claims and edge events driven by [`SimChip::set_input`]
//! - [`SimSpi`] implements [`SpiBus`](sx126x_core::SpiBus) as a loopback
//!   that can inject failures and detect overlapping transfers
//! - [`Trace`] records line writes and transfers from both in one order
//!
//! # Example
//!
//! ```
//! use sx126x_core::{Hal, Level, PinConfig, PinFunction, RadioHal};
//! use sx126x_dummy::{SimChip, SimSpi};
//!
//! let chip = SimChip::new(32);
//! let hal = Hal::new(&chip, SimSpi::new(chip.trace()), &PinConfig::new(19, 13))?;
//!
//! chip.set_input(19, Level::High)?;
//! assert_eq!(hal.gpio_read(PinFunction::Busy), Level::High);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod gpio;
pub mod spi;
pub mod trace;

pub use error::{Result, SimError};
pub use gpio::{SimChip, SimEdges, SimLine};
pub use spi::{OverlapDetector, SimSpi};
pub use trace::{Trace, TraceEvent};

#[cfg(test)]
mod tests {
    use super::*;

    use sx126x_core::irq::WeakHandler;
    use sx126x_core::{
        BusLock, Error, GpioBackend, Hal, IrqHandler, Level, Offset, PinConfig, PinFunction,
        RadioHal,
    };

    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    type SimHal = Hal<SimChip, SimSpi>;

    const BUSY: Offset = 19;
    const NRST: Offset = 13;
    const NSS: Offset = 23;
    const DIO1: Offset = 26;
    const TX_EN: Offset = 21;
    const RX_EN: Offset = 20;

    fn board_pins() -> PinConfig {
        PinConfig::new(BUSY, NRST)
            .with_nss(NSS)
            .with_dio1(DIO1)
            .with_tx_en(TX_EN)
            .with_rx_en(RX_EN)
    }

    fn open(pins: &PinConfig) -> (SimChip, SimHal) {
        let chip = SimChip::new(32);
        let hal = Hal::new(&chip, SimSpi::new(chip.trace()), pins).unwrap();
        chip.trace().take();
        (chip, hal)
    }

    fn counting_handler() -> (Arc<AtomicUsize>, Arc<dyn IrqHandler>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let handler: Arc<dyn IrqHandler> = Arc::new(move || -> sx126x_core::Result<()> {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, handler)
    }

    fn wait_for(count: &AtomicUsize, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while count.load(Ordering::SeqCst) < expected {
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {} dispatches, got {}",
                expected,
                count.load(Ordering::SeqCst)
            );
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_board_lines_claimed_and_idle() {
        let chip = SimChip::new(32);
        let hal = Hal::new(&chip, SimSpi::new(chip.trace()), &board_pins()).unwrap();

        assert_eq!(chip.claimed(), vec![NRST, BUSY, RX_EN, TX_EN, NSS, DIO1]);
        assert_eq!(chip.holder(BUSY).as_deref(), Some("SX126x BUSY"));
        assert_eq!(chip.holder(NRST).as_deref(), Some("SX126x NRESET"));
        assert_eq!(chip.holder(DIO1).as_deref(), Some("SX126x DIO1"));

        assert_eq!(chip.level(NRST).unwrap(), Level::High);
        assert_eq!(chip.level(NSS).unwrap(), Level::High);
        assert_eq!(chip.level(TX_EN).unwrap(), Level::Low);
        assert_eq!(chip.level(RX_EN).unwrap(), Level::Low);

        assert!(hal.has_tx_en());
        assert!(hal.has_rx_en());
        assert!(!hal.irq_running());
        assert_eq!(hal.pin_config(), &board_pins());
    }

    #[test]
    fn test_reset_and_busy() {
        let (chip, hal) = open(&board_pins());

        hal.gpio_write(PinFunction::Reset, Level::Low);
        assert_eq!(chip.level(NRST).unwrap(), Level::Low);
        hal.gpio_write(PinFunction::Reset, Level::High);
        assert_eq!(chip.level(NRST).unwrap(), Level::High);

        // Only NRESET is writable
        hal.gpio_write(PinFunction::Busy, Level::High);
        hal.gpio_write(PinFunction::Other(7), Level::High);
        assert_eq!(chip.trace().drives(NRST), vec![Level::Low, Level::High]);
        assert_eq!(chip.trace().events().len(), 2);

        chip.set_input(BUSY, Level::High).unwrap();
        assert_eq!(hal.gpio_read(PinFunction::Busy), Level::High);
        chip.set_input(BUSY, Level::Low).unwrap();
        assert_eq!(hal.gpio_read(PinFunction::Busy), Level::Low);

        assert_eq!(hal.gpio_read(PinFunction::Reset), Level::Low);
        assert_eq!(hal.gpio_read(PinFunction::Other(7)), Level::Low);
    }

    #[test]
    fn test_rf_switch_bracketing() {
        let (chip, hal) = open(&board_pins());

        hal.pre_tx();
        assert_eq!(chip.level(TX_EN).unwrap(), Level::High);
        hal.post_tx();
        hal.pre_rx();
        assert_eq!(chip.level(RX_EN).unwrap(), Level::High);
        hal.post_rx();

        assert_eq!(
            chip.trace().take(),
            vec![
                TraceEvent::Drive { offset: TX_EN, level: Level::High },
                TraceEvent::Drive { offset: TX_EN, level: Level::Low },
                TraceEvent::Drive { offset: RX_EN, level: Level::High },
                TraceEvent::Drive { offset: RX_EN, level: Level::Low },
            ]
        );
    }

    #[test]
    fn test_absent_lines_are_noops() {
        let (chip, hal) = open(&PinConfig::new(BUSY, NRST));

        assert!(!hal.has_tx_en());
        assert!(!hal.has_rx_en());
        hal.pre_tx();
        hal.post_tx();
        hal.pre_rx();
        hal.post_rx();
        assert!(chip.trace().events().is_empty());
        assert_eq!(chip.claimed(), vec![NRST, BUSY]);

        assert!(matches!(
            hal.start_irq_handler(counting_handler().1, None),
            Err(Error::NoIrqLines)
        ));
    }

    #[test]
    fn test_chip_select_brackets_transfer() {
        let (chip, hal) = open(&board_pins());

        // ReadRegister 0x0740 (sync word MSB)
        let tx = [0x1D, 0x07, 0x40, 0x00, 0x00];
        let mut rx = [0u8; 5];
        hal.spi_transfer(&tx, &mut rx).unwrap();
        assert_eq!(rx, tx);

        assert_eq!(
            chip.trace().take(),
            vec![
                TraceEvent::Drive { offset: NSS, level: Level::Low },
                TraceEvent::Transfer { tx: tx.to_vec() },
                TraceEvent::Drive { offset: NSS, level: Level::High },
            ]
        );
    }

    #[test]
    fn test_chip_select_released_on_failure() {
        let chip = SimChip::new(32);
        let spi = SimSpi::new(chip.trace());
        let fail = spi.failure_switch();
        let hal = Hal::new(&chip, spi, &board_pins()).unwrap();
        chip.trace().take();

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            hal.spi_transfer(&[0xC0, 0x00], &mut [0u8; 2]),
            Err(Error::Spi(_))
        ));
        assert_eq!(chip.trace().drives(NSS), vec![Level::Low, Level::High]);
        assert_eq!(chip.level(NSS).unwrap(), Level::High);
    }

    #[test]
    fn test_hardware_chip_select() {
        let (chip, hal) = open(&PinConfig::new(BUSY, NRST));

        hal.spi_transfer(&[0xC0, 0x00], &mut [0u8; 2]).unwrap();
        assert_eq!(
            chip.trace().take(),
            vec![TraceEvent::Transfer { tx: vec![0xC0, 0x00] }]
        );
    }

    #[test]
    fn test_transfer_length_mismatch() {
        let (chip, hal) = open(&board_pins());

        assert!(matches!(
            hal.spi_transfer(&[0xC0, 0x00], &mut [0u8; 3]),
            Err(Error::LengthMismatch { tx: 2, rx: 3 })
        ));
        assert!(chip.trace().events().is_empty());
    }

    #[test]
    fn test_spi_speed() {
        let (_chip, hal) = open(&board_pins());

        assert_eq!(hal.spi_speed(), 500_000);
        hal.set_spi_speed(8_000_000).unwrap();
        assert_eq!(hal.spi_speed(), 8_000_000);
        assert!(hal.set_spi_speed(0).is_err());
        assert_eq!(hal.spi_speed(), 8_000_000);
    }

    #[test]
    fn test_failed_construction_releases_lines() {
        let chip = SimChip::new(32);
        let other = chip.request_output(RX_EN, Level::Low, "other").unwrap();

        let result = Hal::new(&chip, SimSpi::new(chip.trace()), &board_pins());
        assert!(matches!(result, Err(Error::Gpio(_))));
        assert_eq!(chip.claimed(), vec![RX_EN]);

        drop(other);
        assert!(Hal::new(&chip, SimSpi::new(chip.trace()), &board_pins()).is_ok());
    }

    #[test]
    fn test_invalid_config_claims_nothing() {
        let chip = SimChip::new(32);

        let duplicate = PinConfig::new(BUSY, NRST).with_dio1(BUSY);
        assert!(matches!(
            Hal::new(&chip, SimSpi::new(chip.trace()), &duplicate),
            Err(Error::DuplicatePin { .. })
        ));

        let out_of_range = board_pins().with_dio3(40);
        assert!(Hal::new(&chip, SimSpi::new(chip.trace()), &out_of_range).is_err());
        assert!(chip.claimed().is_empty());
    }

    #[test]
    fn test_drop_releases_everything() {
        let (chip, hal) = open(&board_pins());
        let (_, handler) = counting_handler();
        hal.start_irq_handler(handler, None).unwrap();

        drop(hal);
        assert!(chip.claimed().is_empty());
    }

    #[test]
    fn test_irq_rising_edges_only() {
        let (chip, hal) = open(&board_pins());
        let (count, handler) = counting_handler();
        hal.start_irq_handler(handler, None).unwrap();
        assert!(hal.irq_running());

        chip.set_input(DIO1, Level::High).unwrap();
        wait_for(&count, 1);
        chip.set_input(DIO1, Level::Low).unwrap();
        chip.set_input(DIO1, Level::High).unwrap();
        wait_for(&count, 2);

        // The falling edge was queued between the two rising ones
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        hal.stop_irq_handler().unwrap();
        assert!(!hal.irq_running());
    }

    #[test]
    fn test_irq_start_twice() {
        let (_chip, hal) = open(&board_pins());
        hal.start_irq_handler(counting_handler().1, None).unwrap();
        assert!(matches!(
            hal.start_irq_handler(counting_handler().1, None),
            Err(Error::IrqAlreadyRunning)
        ));
        hal.stop_irq_handler().unwrap();
    }

    #[test]
    fn test_irq_stop_and_restart() {
        let (chip, hal) = open(&board_pins());

        // Stopping a handler that never started is fine
        hal.stop_irq_handler().unwrap();

        let (count, handler) = counting_handler();
        hal.start_irq_handler(Arc::clone(&handler), None).unwrap();
        chip.pulse(DIO1).unwrap();
        wait_for(&count, 1);

        hal.stop_irq_handler().unwrap();
        assert!(!hal.irq_running());
        chip.pulse(DIO1).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Edges that arrived while stopped stay queued on the line request
        hal.start_irq_handler(handler, None).unwrap();
        wait_for(&count, 2);
        chip.pulse(DIO1).unwrap();
        wait_for(&count, 3);
        hal.stop_irq_handler().unwrap();
    }

    #[test]
    fn test_irq_handler_failures_keep_dispatching() {
        let (chip, hal) = open(&board_pins());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handler: Arc<dyn IrqHandler> = Arc::new(move || -> sx126x_core::Result<()> {
            match seen.fetch_add(1, Ordering::SeqCst) {
                0 => Err(Error::InvalidParameter("bad IRQ status".into())),
                1 => panic!("handler panic"),
                _ => Ok(()),
            }
        });
        hal.start_irq_handler(handler, None).unwrap();

        for expected in 1..=3 {
            chip.pulse(DIO1).unwrap();
            wait_for(&calls, expected);
        }
        assert!(hal.irq_running());
        hal.stop_irq_handler().unwrap();
    }

    struct Radio {
        hal: Arc<SimHal>,
        serviced: AtomicUsize,
    }

    impl IrqHandler for Radio {
        fn process_irqs(&self) -> sx126x_core::Result<()> {
            // GetIrqStatus
            let mut rx = [0u8; 4];
            self.hal.spi_transfer(&[0x12, 0x00, 0x00, 0x00], &mut rx)?;
            self.serviced.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_irq_handler_uses_hal() {
        let (chip, hal) = open(&board_pins());
        let hal = Arc::new(hal);
        let radio = Arc::new(Radio {
            hal: Arc::clone(&hal),
            serviced: AtomicUsize::new(0),
        });
        hal.start_irq_handler(Arc::new(WeakHandler(Arc::downgrade(&radio))), None)
            .unwrap();

        chip.pulse(DIO1).unwrap();
        wait_for(&radio.serviced, 1);
        assert!(chip.trace().events().contains(&TraceEvent::Transfer {
            tx: vec![0x12, 0x00, 0x00, 0x00]
        }));

        // A dropped radio turns dispatch into a no-op
        drop(radio);
        chip.trace().take();
        chip.pulse(DIO1).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(hal.irq_running());
        assert!(chip.trace().events().is_empty());
        hal.stop_irq_handler().unwrap();
    }

    fn wait_until(what: &str, done: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_hal_dropped_from_its_own_handler() {
        let (chip, hal) = open(&board_pins());
        let owner: Arc<Mutex<Option<Arc<SimHal>>>> = Arc::new(Mutex::new(None));
        let (clean_tx, clean_rx) = mpsc::channel();

        let handler: Arc<dyn IrqHandler> = {
            let owner = Arc::clone(&owner);
            Arc::new(move || -> sx126x_core::Result<()> {
                let last = owner.lock().unwrap().take();
                let clean = panic::catch_unwind(AssertUnwindSafe(|| drop(last))).is_ok();
                clean_tx.send(clean).ok();
                Ok(())
            })
        };
        hal.start_irq_handler(handler, None).unwrap();
        *owner.lock().unwrap() = Some(Arc::new(hal));

        chip.pulse(DIO1).unwrap();
        assert!(clean_rx.recv_timeout(Duration::from_secs(2)).unwrap());
        wait_until("lines released", || chip.claimed().is_empty());
    }

    #[test]
    fn test_handler_queries_state_during_stop() {
        let (chip, hal) = open(&board_pins());
        let hal = Arc::new(hal);
        let (entered_tx, entered_rx) = mpsc::channel();
        let (state_tx, state_rx) = mpsc::channel();

        let handler: Arc<dyn IrqHandler> = {
            let hal = Arc::downgrade(&hal);
            Arc::new(move || -> sx126x_core::Result<()> {
                entered_tx.send(()).ok();
                thread::sleep(Duration::from_millis(50));
                let running = hal.upgrade().map(|hal| hal.irq_running());
                state_tx.send(running).ok();
                Ok(())
            })
        };
        hal.start_irq_handler(handler, None).unwrap();

        chip.pulse(DIO1).unwrap();
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        hal.stop_irq_handler().unwrap();

        assert_eq!(state_rx.try_recv().unwrap(), Some(true));
        assert!(!hal.irq_running());
    }

    #[test]
    fn test_handler_stops_itself() {
        let (chip, hal) = open(&board_pins());
        let hal = Arc::new(hal);
        let (stopped_tx, stopped_rx) = mpsc::channel();

        let handler: Arc<dyn IrqHandler> = {
            let hal = Arc::downgrade(&hal);
            Arc::new(move || -> sx126x_core::Result<()> {
                if let Some(hal) = hal.upgrade() {
                    stopped_tx.send(hal.stop_irq_handler().is_ok()).ok();
                }
                Ok(())
            })
        };
        hal.start_irq_handler(handler, None).unwrap();

        chip.pulse(DIO1).unwrap();
        assert!(stopped_rx.recv_timeout(Duration::from_secs(2)).unwrap());
        assert!(!hal.irq_running());

        // Restartable once the detached thread has handed the lines back
        let (count, handler) = counting_handler();
        wait_until("restart", || {
            !matches!(
                hal.start_irq_handler(Arc::clone(&handler), None),
                Err(Error::NoIrqLines)
            )
        });
        chip.pulse(DIO1).unwrap();
        wait_for(&count, 1);
        hal.stop_irq_handler().unwrap();
    }

    fn hammer(hals: &[Arc<SimHal>], threads_per_hal: usize, transfers: usize) {
        let workers: Vec<_> = hals
            .iter()
            .flat_map(|hal| (0..threads_per_hal).map(move |_| Arc::clone(hal)))
            .enumerate()
            .map(|(n, hal)| {
                thread::spawn(move || {
                    for i in 0..transfers {
                        let tx = [0x1D, n as u8, i as u8, 0x00];
                        let mut rx = [0u8; 4];
                        hal.spi_transfer(&tx, &mut rx).unwrap();
                        assert_eq!(rx, tx);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn test_bus_lock_serializes_instances() {
        let chip = SimChip::new(32);
        let detector = OverlapDetector::new();
        let bus = |hold| {
            SimSpi::new(chip.trace())
                .with_overlap(detector.clone())
                .with_hold(Duration::from_micros(hold))
        };
        let a = Arc::new(Hal::new(&chip, bus(200), &PinConfig::new(1, 2).with_nss(3)).unwrap());
        let b = Arc::new(Hal::new(&chip, bus(150), &PinConfig::new(4, 5).with_nss(6)).unwrap());
        chip.trace().take();

        let lock = BusLock::new();
        a.set_bus_lock(Some(lock.clone()));
        b.set_bus_lock(Some(lock.clone()));
        assert_eq!(lock.handle_count(), 3);

        hammer(&[Arc::clone(&a), Arc::clone(&b)], 2, 40);
        assert_eq!(detector.transfers(), 160);
        assert_eq!(detector.peak(), 1);

        // No chip select is ever asserted while another is
        let mut selected: Option<Offset> = None;
        for event in chip.trace().take() {
            match event {
                TraceEvent::Drive { offset, level: Level::Low } => {
                    assert_eq!(selected, None);
                    selected = Some(offset);
                }
                TraceEvent::Drive { offset, level: Level::High } => {
                    assert_eq!(selected, Some(offset));
                    selected = None;
                }
                TraceEvent::Transfer { .. } => assert!(selected.is_some()),
            }
        }
    }

    #[test]
    fn test_single_instance_serialized_without_bus_lock() {
        let chip = SimChip::new(32);
        let detector = OverlapDetector::new();
        let spi = SimSpi::new(chip.trace())
            .with_overlap(detector.clone())
            .with_hold(Duration::from_micros(200));
        let hal = Arc::new(Hal::new(&chip, spi, &board_pins()).unwrap());

        hammer(&[hal], 4, 25);
        assert_eq!(detector.transfers(), 100);
        assert_eq!(detector.peak(), 1);
    }

    #[test]
    fn test_held_bus_lock_blocks_transfer() {
        let chip = SimChip::new(32);
        let detector = OverlapDetector::new();
        let spi = SimSpi::new(chip.trace()).with_overlap(detector.clone());
        let hal = Arc::new(Hal::new(&chip, spi, &board_pins()).unwrap());
        let lock = BusLock::new();
        hal.set_bus_lock(Some(lock.clone()));

        let guard = lock.lock();
        let worker = {
            let hal = Arc::clone(&hal);
            thread::spawn(move || hal.spi_transfer(&[0xC0, 0x00], &mut [0u8; 2]))
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(detector.transfers(), 0);

        drop(guard);
        worker.join().unwrap().unwrap();
        assert_eq!(detector.transfers(), 1);
    }

    #[test]
    fn test_bus_lock_replace_and_remove() {
        let (_chip, hal) = open(&board_pins());
        assert!(hal.bus_lock().is_none());

        let first = BusLock::new();
        let second = BusLock::new();
        hal.set_bus_lock(Some(first.clone()));
        assert!(hal.bus_lock().is_some_and(|l| l.same_as(&first)));

        hal.set_bus_lock(Some(second.clone()));
        assert!(hal.bus_lock().is_some_and(|l| l.same_as(&second)));
        assert_eq!(first.handle_count(), 1);

        // A held lock that is no longer installed does not block transfers
        let _stale = first.lock();
        hal.set_bus_lock(None);
        assert!(hal.bus_lock().is_none());
        hal.spi_transfer(&[0xC0, 0x00], &mut [0u8; 2]).unwrap();
    }
}
