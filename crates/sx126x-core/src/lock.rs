//! Bus lock shared by transceivers on one SPI controller
//!
//! Each HAL instance already serializes its own transfers. When several
//! radios hang off the same controller (different chip selects, same
//! clock and data lines), their transfers must also exclude each other.
//! Hand every such instance a clone of one [`BusLock`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable handle to a mutex guarding one physical SPI bus
///
/// Clones refer to the same lock. The lock lives as long as any handle, so
/// it always outlives the instances using it.
#[derive(Clone, Default)]
pub struct BusLock {
    inner: Arc<Mutex<()>>,
}

impl BusLock {
    /// Create a new, unshared lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the bus is free and hold it until the guard drops
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True if both handles refer to the same lock
    pub fn same_as(&self, other: &BusLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of handles sharing this lock
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for BusLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusLock")
            .field("handles", &self.handle_count())
            .finish()
    }
}
