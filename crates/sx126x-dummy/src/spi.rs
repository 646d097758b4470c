//! Simulated SPI bus
//!
//! [`SimSpi`] echoes the transmit buffer back (MOSI wired to MISO), records
//! every transfer in a [`Trace`] and can share an [`OverlapDetector`] with
//! other buses to prove that transfers never run concurrently.

use crate::error::SimError;
use crate::trace::{Trace, TraceEvent};

use sx126x_core::spi::DEFAULT_SPEED_HZ;
use sx126x_core::{Error, Result, SpiBus};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
struct OverlapState {
    active: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

/// Counts transfers in flight across every bus sharing it
#[derive(Debug, Clone, Default)]
pub struct OverlapDetector {
    inner: Arc<OverlapState>,
}

impl OverlapDetector {
    /// Create a fresh detector
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest number of transfers ever in flight at once
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    /// Transfers started so far
    pub fn transfers(&self) -> usize {
        self.inner.total.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        self.inner.total.fetch_add(1, Ordering::SeqCst);
        InFlight(&self.inner)
    }
}

struct InFlight<'a>(&'a OverlapState);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Loopback SPI bus
pub struct SimSpi {
    speed_hz: u32,
    trace: Trace,
    overlap: Option<OverlapDetector>,
    hold: Duration,
    fail: Arc<AtomicBool>,
}

impl SimSpi {
    /// Bus recording into `trace`
    pub fn new(trace: Trace) -> Self {
        Self {
            speed_hz: DEFAULT_SPEED_HZ,
            trace,
            overlap: None,
            hold: Duration::ZERO,
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report transfers to `detector`
    pub fn with_overlap(mut self, detector: OverlapDetector) -> Self {
        self.overlap = Some(detector);
        self
    }

    /// Keep each transfer in flight for `hold`
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Switch that makes every transfer fail while set
    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail)
    }
}

impl SpiBus for SimSpi {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        if tx.len() != rx.len() {
            return Err(Error::LengthMismatch {
                tx: tx.len(),
                rx: rx.len(),
            });
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SimError::InjectedFailure.into());
        }

        let _in_flight = self.overlap.as_ref().map(OverlapDetector::enter);
        if !self.hold.is_zero() {
            thread::sleep(self.hold);
        }
        rx.copy_from_slice(tx);
        self.trace.push(TraceEvent::Transfer { tx: tx.to_vec() });

        log::trace!("sim_spi: {} byte transfer", tx.len());
        Ok(())
    }

    fn set_speed(&mut self, speed_hz: u32) -> Result<()> {
        if speed_hz == 0 {
            return Err(Error::InvalidParameter("SPI speed must be non-zero".into()));
        }
        self.speed_hz = speed_hz;
        Ok(())
    }

    fn speed_hz(&self) -> u32 {
        self.speed_hz
    }
}
