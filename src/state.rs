//! Lock-protected state shared between the sampling loop and its readers.
//!
//! [`SharedState`] holds the running count, the error latch and the duration
//! of the most recent sample. Every access goes through a closure-scoped
//! critical section, so nothing can `.await` while the lock is held: a
//! cancelled sampling loop never leaves the state half-updated or the lock
//! taken.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant};

use crate::error::{Fault, PendingErrors};

struct EncoderState<E> {
    count: i32,
    pending: Option<PendingErrors<E>>,
    last_sample: Duration,
}

/// Running position and error latch of one encoder.
///
/// Written only by the sampling loop; read (and drained) by any number of
/// consumers. Place it in a `static` or an `Arc` to share it.
///
/// The guard is a [`CriticalSectionRawMutex`]. On a microcontroller that
/// masks interrupts; on `std` the `critical-section` implementation is one
/// process-wide lock, shared with every other session and every Embassy
/// primitive in the process. Each section here only touches the three fields
/// above, so contention stays short, but it is not per-encoder.
pub struct SharedState<E> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<EncoderState<E>>>,
}

impl<E> SharedState<E> {
    /// Zero count, empty latch.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(EncoderState {
                count: 0,
                pending: None,
                last_sample: Duration::from_ticks(0),
            })),
        }
    }

    /// Read the count, or drain the error latch if it holds anything.
    ///
    /// When faults are pending the count is withheld: the latch is returned
    /// and cleared, and the next call (barring new faults) yields the count.
    /// Never blocks beyond the critical section.
    pub fn read_and_drain(&self) -> Result<i32, PendingErrors<E>> {
        self.inner.lock(|state| {
            let mut state = state.borrow_mut();
            match state.pending.take() {
                Some(pending) => Err(pending),
                None => Ok(state.count),
            }
        })
    }

    /// Time spent processing the most recent counted edge.
    pub fn last_sample_duration(&self) -> Duration {
        self.inner.lock(|state| state.borrow().last_sample)
    }

    /// Number of faults latched since the last drain.
    pub fn pending_error_count(&self) -> u32 {
        self.inner
            .lock(|state| state.borrow().pending.as_ref().map_or(0, |p| p.count))
    }

    /// Apply one decoded step. `started` marks when the sample began.
    pub(crate) fn apply(&self, delta: i32, started: Instant) {
        self.inner.lock(|state| {
            let mut state = state.borrow_mut();
            state.count = state.count.wrapping_add(delta);
            state.last_sample = started.elapsed();
        });
    }

    /// Latch a fault, replacing the previous one as the last cause.
    pub(crate) fn record_fault(&self, fault: Fault<E>) {
        self.inner.lock(|state| {
            let mut state = state.borrow_mut();
            if let Some(pending) = state.pending.as_mut() {
                pending.count = pending.count.saturating_add(1);
                pending.last = fault;
            } else {
                state.pending = Some(PendingErrors { count: 1, last: fault });
            }
        });
    }
}

impl<E> Default for SharedState<E> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────
