//! Interrupt dispatch thread
//!
//! One dedicated thread waits on all configured DIO lines and calls the
//! protocol core's interrupt entry point once per rising edge. Falling edges
//! are observed and dropped.
//!
//! The listener polls with a short timeout so a stop request is noticed
//! without closing the line request. The thread hands the edge source back
//! when it exits, which is what makes a stopped dispatcher restartable.

use crate::error::{Error, Result};
use crate::line::{EdgeEvent, EdgeKind, EdgeSource};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default SCHED_RR priority of the dispatch thread
pub const DEFAULT_IRQ_PRIORITY: i32 = 50;

/// Upper bound on how long a stop request waits for the listener to notice
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

const THREAD_NAME: &str = "sx126x-irq";

/// Interrupt-processing entry point of the protocol core
///
/// Runs on the dispatch thread. It may call back into the HAL (typically an
/// SPI transfer to read the IRQ status and drain the FIFO).
pub trait IrqHandler: Send + Sync {
    /// Service whatever interrupt the radio is signalling
    fn process_irqs(&self) -> Result<()>;
}

impl<F> IrqHandler for F
where
    F: Fn() -> Result<()> + Send + Sync,
{
    fn process_irqs(&self) -> Result<()> {
        self()
    }
}

/// Handler that holds its target weakly
///
/// A protocol core that owns the HAL, which owns the dispatch thread, which
/// holds the core, would never be freed. Register the core through a
/// `WeakHandler` instead; once the core is gone dispatch does nothing.
pub struct WeakHandler<T: ?Sized>(pub Weak<T>);

impl<T: IrqHandler + ?Sized> IrqHandler for WeakHandler<T> {
    fn process_irqs(&self) -> Result<()> {
        match self.0.upgrade() {
            Some(target) => target.process_irqs(),
            None => {
                log::trace!("sx126x: IRQ target dropped, ignoring edge");
                Ok(())
            }
        }
    }
}

/// A started dispatch thread, detached from its dispatcher
///
/// Obtained from [`IrqDispatcher::begin_stop`] so the join can happen
/// without holding whatever lock guards the dispatcher.
pub struct Listener {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl Listener {
    /// Ask the thread to exit and wait for it
    ///
    /// An edge already taken off the source is dispatched before the thread
    /// exits. Called on the dispatch thread itself (a handler stopping its
    /// own dispatcher, or dropping the last reference to it) the thread is
    /// detached instead; it exits once the handler returns.
    pub fn finish(self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        if self.thread.thread().id() == thread::current().id() {
            log::debug!("sx126x: Stop requested from the dispatch thread, detaching");
            return Ok(());
        }
        self.thread.join().map_err(|_| Error::IrqThreadPanicked)?;
        log::debug!("sx126x: Interrupt dispatch thread stopped");
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Owner of the edge source and, while started, the dispatch thread
///
/// The source lives in a slot shared with the thread. The thread takes it
/// on start and puts it back when it exits, which is what makes a stopped
/// dispatcher restartable.
pub struct IrqDispatcher<E: EdgeSource> {
    source: Arc<Mutex<Option<E>>>,
    running: Option<Listener>,
    stopping: bool,
}

impl<E: EdgeSource> IrqDispatcher<E> {
    /// Wrap an edge source; `None` means no interrupt lines are configured
    pub fn new(source: Option<E>) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            running: None,
            stopping: false,
        }
    }

    /// True while the listener thread is alive or being stopped
    pub fn is_running(&self) -> bool {
        self.stopping || self.running.as_ref().is_some_and(|r| !r.is_finished())
    }

    /// Spawn the dispatch thread
    ///
    /// `priority` requests SCHED_RR at that priority. Failing to get it is
    /// logged and otherwise ignored.
    pub fn start(&mut self, handler: Arc<dyn IrqHandler>, priority: Option<i32>) -> Result<()> {
        if self.is_running() {
            return Err(Error::IrqAlreadyRunning);
        }
        // A listener that died on a source error is reaped here.
        if let Some(finished) = self.running.take() {
            finished.finish()?;
        }
        if lock(&self.source).is_none() {
            return Err(Error::NoIrqLines);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let slot = self.source.clone();

        // Spawn failure drops the closure before it runs, leaving the source
        // in its slot.
        let thread = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                let Some(source) = lock(&slot).take() else {
                    return;
                };
                let source = listen(source, &*handler, &thread_stop, priority);
                *lock(&slot) = Some(source);
            })
            .map_err(Error::ThreadSpawn)?;

        self.running = Some(Listener { stop, thread });
        log::debug!("sx126x: Interrupt dispatch thread started");
        Ok(())
    }

    /// Ask the listener to exit and wait for it
    ///
    /// When this returns no dispatch is in progress and none will follow.
    /// Stopping a dispatcher that is not running does nothing.
    pub fn stop(&mut self) -> Result<()> {
        match self.begin_stop() {
            Some(listener) => {
                let result = listener.finish();
                self.end_stop();
                result
            }
            None => Ok(()),
        }
    }

    /// First half of [`stop`](Self::stop): request the exit and hand out
    /// the thread to join
    ///
    /// Until [`end_stop`](Self::end_stop) is called the dispatcher reports
    /// itself running and refuses to start.
    pub fn begin_stop(&mut self) -> Option<Listener> {
        let listener = self.running.take()?;
        listener.stop.store(true, Ordering::Release);
        self.stopping = true;
        Some(listener)
    }

    /// Second half of [`stop`](Self::stop), after the listener was finished
    pub fn end_stop(&mut self) {
        self.stopping = false;
    }
}

impl<E: EdgeSource> Drop for IrqDispatcher<E> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("sx126x: {}", e);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn listen<E: EdgeSource>(
    mut source: E,
    handler: &dyn IrqHandler,
    stop: &AtomicBool,
    priority: Option<i32>,
) -> E {
    if let Some(priority) = priority {
        set_realtime_priority(priority);
    }

    while !stop.load(Ordering::Acquire) {
        let event = match source.wait_edge(POLL_INTERVAL) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                log::error!("sx126x: Interrupt listener stopped: {}", e);
                break;
            }
        };

        // Dispatched even if a stop was requested meanwhile; the edge is
        // already off the source and would otherwise be lost.
        match event.kind {
            EdgeKind::Rising => dispatch(handler, &event),
            EdgeKind::Falling => {
                log::trace!("sx126x: Ignoring falling edge on line {}", event.offset)
            }
        }
    }

    source
}

fn dispatch(handler: &dyn IrqHandler, event: &EdgeEvent) {
    log::trace!(
        "sx126x: Rising edge on line {} at {} ns",
        event.offset,
        event.timestamp_ns
    );
    match panic::catch_unwind(AssertUnwindSafe(|| handler.process_irqs())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!(
            "sx126x: IRQ processing failed (line {}): {}",
            event.offset,
            e
        ),
        Err(_) => log::error!("sx126x: IRQ processing panicked (line {})", event.offset),
    }
}

#[cfg(target_os = "linux")]
fn set_realtime_priority(priority: i32) {
    // SAFETY: sched_param is plain data; zeroed is a valid value on every libc.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = priority;

    // SAFETY: pthread_self() is always a valid handle for the calling thread.
    let ret = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_RR, &param) };
    if ret == 0 {
        log::debug!("sx126x: Interrupt thread running SCHED_RR priority {}", priority);
    } else {
        log::warn!(
            "sx126x: Failed to set SCHED_RR priority {}: {} (continuing with default scheduling)",
            priority,
            std::io::Error::from_raw_os_error(ret)
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn set_realtime_priority(priority: i32) {
    log::warn!(
        "sx126x: Real-time priority {} not supported on this platform",
        priority
    );
}
