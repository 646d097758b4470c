//! Shared record of everything the simulated devices saw

use sx126x_core::{Level, Offset};
use std::sync::{Arc, Mutex, MutexGuard};

/// One observed device operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// An output line was driven (including its initial level at claim time)
    Drive {
        /// Line offset
        offset: Offset,
        /// Level written
        level: Level,
    },
    /// An SPI transfer completed
    Transfer {
        /// Bytes clocked out
        tx: Vec<u8>,
    },
}

/// Ordered event log shared between a [`SimChip`](crate::SimChip) and
/// [`SimSpi`](crate::SimSpi)
#[derive(Debug, Clone, Default)]
pub struct Trace {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl Trace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&self, event: TraceEvent) {
        self.lock().push(event);
    }

    /// Copy of all events so far
    pub fn events(&self) -> Vec<TraceEvent> {
        self.lock().clone()
    }

    /// Remove and return all events so far
    pub fn take(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.lock())
    }

    /// Levels written to `offset`, in order
    pub fn drives(&self, offset: Offset) -> Vec<Level> {
        self.lock()
            .iter()
            .filter_map(|event| match *event {
                TraceEvent::Drive { offset: o, level } if o == offset => Some(level),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TraceEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}
