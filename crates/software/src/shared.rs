//! Access to the [`Engine`] from several execution contexts.
//!
//! The floor controller poll, the SysEx receiver and the scheduler tick all mutate the same state. Each of them takes
//! the lock for the duration of a single handler call, collects the resulting
//! [`Actions`](crate::dispatch::Actions) and only then performs any
//! I/O, so the critical sections stay short and nothing awaits while holding them.

use crate::dispatch::Engine;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};

/// An [`Engine`] behind a critical-section mutex.
pub struct SharedEngine {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Engine>>,
}

impl SharedEngine {
    /// Wraps `engine`.
    pub const fn new(engine: Engine) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(engine)),
        }
    }

    /// Runs `f` with exclusive access to the engine.
    ///
    /// # Panics
    ///
    /// Panics if called from within `f`.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}
