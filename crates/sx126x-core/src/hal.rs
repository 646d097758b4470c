//! The HAL callback surface and the generic HAL that implements it

use crate::error::{Error, Result};
use crate::irq::{IrqDispatcher, IrqHandler};
use crate::line::{EdgeDetection, GpioBackend, InputLine, OptionalLine, OutputLine};
use crate::lock::BusLock;
use crate::pin::{Level, PinConfig, PinFunction};
use crate::spi::{ActiveLowCs, SpiBinding, SpiBus};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Physical I/O the SX126x protocol core delegates to the platform
///
/// Every method may be called from the thread that owns the radio and,
/// concurrently, from the interrupt dispatch thread.
pub trait RadioHal: Send + Sync {
    /// Sample the line serving `func`; unknown roles read as low
    fn gpio_read(&self, func: PinFunction) -> Level;

    /// Drive the line serving `func`; unknown roles are ignored
    fn gpio_write(&self, func: PinFunction, level: Level);

    /// Blocking full-duplex transfer framed by chip select
    fn spi_transfer(&self, tx: &[u8], rx: &mut [u8]) -> Result<()>;

    /// Called before a transmission starts
    fn pre_tx(&self);

    /// Called after a transmission ends
    fn post_tx(&self);

    /// Called before a reception starts
    fn pre_rx(&self);

    /// Called after a reception ends
    fn post_rx(&self);
}

impl<H: RadioHal + ?Sized> RadioHal for Arc<H> {
    fn gpio_read(&self, func: PinFunction) -> Level {
        (**self).gpio_read(func)
    }

    fn gpio_write(&self, func: PinFunction, level: Level) {
        (**self).gpio_write(func, level)
    }

    fn spi_transfer(&self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        (**self).spi_transfer(tx, rx)
    }

    fn pre_tx(&self) {
        (**self).pre_tx()
    }

    fn post_tx(&self) {
        (**self).post_tx()
    }

    fn pre_rx(&self) {
        (**self).pre_rx()
    }

    fn post_rx(&self) {
        (**self).post_rx()
    }
}

/// SX126x HAL over any GPIO backend and SPI bus
///
/// Owns every claimed line, the SPI binding and the interrupt dispatcher.
/// Dropping it stops the dispatch thread and releases all lines.
pub struct Hal<B: GpioBackend, S: SpiBus> {
    pins: PinConfig,
    busy: B::Input,
    reset: B::Output,
    tx_en: OptionalLine<B::Output>,
    rx_en: OptionalLine<B::Output>,
    spi: Mutex<SpiBinding<S>>,
    bus_lock: RwLock<Option<BusLock>>,
    irq: Mutex<IrqDispatcher<B::Edges>>,
}

impl<B: GpioBackend, S: SpiBus> Hal<B, S> {
    /// Claim every line named in `pins` and bind the SPI bus
    ///
    /// Lines are claimed in the order BUSY, NRESET, NSS, TXEN, RXEN, DIOx.
    /// If any claim fails the ones already made are released and the error
    /// is returned.
    pub fn new(gpio: &B, spi: S, pins: &PinConfig) -> Result<Self> {
        pins.validate()?;
        let busy = pins.busy.ok_or(Error::MissingPin("busy"))?;
        let nrst = pins.nrst.ok_or(Error::MissingPin("nrst"))?;

        let busy = gpio.request_input(busy, "SX126x BUSY")?;
        let reset = gpio.request_output(nrst, Level::High, "SX126x NRESET")?;

        let spi = match pins.nss {
            Some(nss) => {
                let nss = gpio.request_output(nss, Level::High, "SX126x NSS")?;
                SpiBinding::with_chip_select(spi, ActiveLowCs::new(nss))
            }
            None => SpiBinding::new(spi),
        };

        let tx_en: OptionalLine<B::Output> = pins
            .tx_en
            .map(|offset| gpio.request_output(offset, Level::Low, "SX126x TXEN"))
            .transpose()?
            .into();
        let rx_en: OptionalLine<B::Output> = pins
            .rx_en
            .map(|offset| gpio.request_output(offset, Level::Low, "SX126x RXEN"))
            .transpose()?
            .into();

        let dio = pins.dio_lines();
        let edges = if dio.is_empty() {
            None
        } else {
            Some(gpio.request_edges(&dio, EdgeDetection::Rising)?)
        };

        log::info!(
            "sx126x: HAL ready ({}; {} chip select, {} kHz)",
            pins,
            if spi.has_chip_select() {
                "gpio"
            } else {
                "hardware"
            },
            spi.speed_hz() / 1000
        );

        Ok(Self {
            pins: *pins,
            busy,
            reset,
            tx_en,
            rx_en,
            spi: Mutex::new(spi),
            bus_lock: RwLock::new(None),
            irq: Mutex::new(IrqDispatcher::new(edges)),
        })
    }

    /// Pin configuration this instance was built from
    pub fn pin_config(&self) -> &PinConfig {
        &self.pins
    }

    /// Change the SPI clock
    pub fn set_spi_speed(&self, speed_hz: u32) -> Result<()> {
        lock(&self.spi).set_speed(speed_hz)
    }

    /// Current SPI clock in Hz
    pub fn spi_speed(&self) -> u32 {
        lock(&self.spi).speed_hz()
    }

    /// Install, replace or (with `None`) remove the shared bus lock
    ///
    /// Transfers already waiting on or holding the previous lock finish
    /// under it; later transfers use the new one.
    pub fn set_bus_lock(&self, bus_lock: Option<BusLock>) {
        *self.bus_lock.write().unwrap_or_else(|e| e.into_inner()) = bus_lock;
    }

    /// Currently installed bus lock
    pub fn bus_lock(&self) -> Option<BusLock> {
        self.bus_lock
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Start the interrupt dispatch thread
    ///
    /// `handler` is called once per rising edge on any DIO line. `priority`
    /// requests SCHED_RR for the thread (see [`crate::DEFAULT_IRQ_PRIORITY`]);
    /// `None` leaves the default policy.
    pub fn start_irq_handler(
        &self,
        handler: Arc<dyn IrqHandler>,
        priority: Option<i32>,
    ) -> Result<()> {
        lock(&self.irq).start(handler, priority)
    }

    /// Stop the interrupt dispatch thread and wait for it to exit
    ///
    /// The join happens without holding the dispatcher lock, so a handler
    /// still running may call [`irq_running`](Self::irq_running) (which
    /// reports `true` until the stop completes) or this method. Called from
    /// the handler itself the thread is detached rather than joined; the DIO
    /// lines become available for a restart once the handler returns.
    pub fn stop_irq_handler(&self) -> Result<()> {
        let Some(listener) = lock(&self.irq).begin_stop() else {
            return Ok(());
        };
        let result = listener.finish();
        lock(&self.irq).end_stop();
        result
    }

    /// True while the dispatch thread is alive
    pub fn irq_running(&self) -> bool {
        lock(&self.irq).is_running()
    }

    /// True if a TX enable line is wired up
    pub fn has_tx_en(&self) -> bool {
        self.tx_en.is_present()
    }

    /// True if an RX enable line is wired up
    pub fn has_rx_en(&self) -> bool {
        self.rx_en.is_present()
    }
}

impl<B: GpioBackend, S: SpiBus> RadioHal for Hal<B, S> {
    fn gpio_read(&self, func: PinFunction) -> Level {
        match func {
            PinFunction::Busy => self.busy.read().unwrap_or_else(|e| {
                log::error!("sx126x: Failed to read BUSY: {}", e);
                Level::Low
            }),
            _ => Level::Low,
        }
    }

    fn gpio_write(&self, func: PinFunction, level: Level) {
        if func == PinFunction::Reset {
            if let Err(e) = self.reset.write(level) {
                log::error!("sx126x: Failed to set NRESET: {}", e);
            }
        }
    }

    fn spi_transfer(&self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        // Cloned out so set_bus_lock never waits behind a transfer.
        let bus_lock = self.bus_lock();
        let _bus = bus_lock.as_ref().map(BusLock::lock);
        lock(&self.spi).transfer(tx, rx)
    }

    fn pre_tx(&self) {
        drive(&self.tx_en, Level::High, "TXEN");
    }

    fn post_tx(&self) {
        drive(&self.tx_en, Level::Low, "TXEN");
    }

    fn pre_rx(&self) {
        drive(&self.rx_en, Level::High, "RXEN");
    }

    fn post_rx(&self) {
        drive(&self.rx_en, Level::Low, "RXEN");
    }
}

fn drive<O: OutputLine>(line: &OptionalLine<O>, level: Level, name: &str) {
    if let Err(e) = line.drive(level) {
        log::error!("sx126x: Failed to set {}: {}", name, e);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
