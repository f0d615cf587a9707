//! The edge-driven sampling loop and its cancellation token.
//!
//! [`sampling_loop`] is a plain `async fn`. The threaded
//! [`EncoderSession`](crate::EncoderSession) drives it on a dedicated thread;
//! on an Embassy target wrap it in a concrete task instead, since Embassy
//! tasks cannot be generic:
//!
//! ```ignore
//! static STATE: SharedState<MyError> = SharedState::new();
//! static CANCEL: CancelToken = CancelToken::new();
//!
//! #[embassy_executor::task]
//! async fn encoder_task(mut lines: LinePair<MyLine>, initial: Levels) {
//!     sampling_loop(&mut lines, initial, &STATE, &CANCEL, CountDirection::Normal).await;
//! }
//! ```

use core::future::poll_fn;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::Poll;

use embassy_futures::select::{select, Either};
use embassy_sync::waitqueue::AtomicWaker;
use embassy_time::Instant;
use embedded_hal::digital::{ErrorType, InputPin};
use embedded_hal_async::digital::Wait;

use crate::config::CountDirection;
use crate::decoder::{decode, Levels};
use crate::error::Fault;
use crate::line::LinePair;
use crate::state::SharedState;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Sticky, wakeable cancellation flag.
///
/// Once [`cancel`](Self::cancel) has been called the token stays cancelled.
pub struct CancelToken {
    cancelled: AtomicBool,
    waker: AtomicWaker,
}

impl CancelToken {
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            waker: AtomicWaker::new(),
        }
    }

    /// Request cancellation and wake the waiting loop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.waker.wake();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        poll_fn(|cx| {
            self.waker.register(cx.waker());
            if self.is_cancelled() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Sampling loop
// ---------------------------------------------------------------------------

/// Observe both lines and keep `state` current until `cancel` fires.
///
/// `initial` seeds the private level snapshot; it must reflect the lines'
/// levels when the loop starts.
///
/// # Control flow
///
/// 1. Return if cancelled. Otherwise wait until either line leaves the level
///    last observed on it, racing the wait against `cancel`. A failed wait is
///    latched as [`Fault::Wait`].
/// 2. Re-read both levels. A failed read is latched as [`Fault::Read`].
/// 3. Unchanged levels are a spurious wake: go round again.
/// 4. Decode. Both channels changing is latched as
///    [`Fault::InvalidTransition`] and leaves the count alone.
/// 5. Otherwise apply the delta and the sample duration under the lock.
/// 6. Remember the new levels.
///
/// No fault ends the loop, and there is no backoff: a line that fails
/// persistently keeps the loop turning at the rate the wait returns errors.
/// The only `.await` is the line wait, so cancellation can only take effect
/// there or at the top of an iteration, never inside the critical section.
pub async fn sampling_loop<L>(
    lines: &mut LinePair<L>,
    initial: Levels,
    state: &SharedState<<L as ErrorType>::Error>,
    cancel: &CancelToken,
    direction: CountDirection,
) where
    L: InputPin + Wait,
{
    let mut levels = initial;

    loop {
        // ── Step 1: wait for either line to move ─────────────────────
        if cancel.is_cancelled() {
            return;
        }

        // Level waits, not edge waits: a line that moved while the previous
        // sample was being processed resolves at once instead of being lost.
        let edge = select(
            cancel.cancelled(),
            select(
                wait_for_change(&mut lines.a, levels.a),
                wait_for_change(&mut lines.b, levels.b),
            ),
        )
        .await;

        let woke = match edge {
            Either::First(()) => return,
            Either::Second(Either::First(r)) | Either::Second(Either::Second(r)) => r,
        };
        if let Err(e) = woke {
            #[cfg(feature = "defmt")]
            defmt::warn!("Edge wait failed");
            state.record_fault(Fault::Wait(e));
            continue;
        }

        // ── Step 2: fresh read of both levels ────────────────────────
        let started = Instant::now();
        let current = match read_levels(lines) {
            Ok(current) => current,
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Level read failed");
                state.record_fault(Fault::Read(e));
                continue;
            }
        };

        // ── Step 3: spurious wake ────────────────────────────────────
        if current == levels {
            continue;
        }

        // ── Step 4: decode ───────────────────────────────────────────
        // Step 6 happens here too: the snapshot follows what the lines read,
        // even when the step cannot be counted.
        let previous = core::mem::replace(&mut levels, current);

        let Some(delta) = decode(previous, current).delta() else {
            #[cfg(feature = "defmt")]
            defmt::warn!("Invalid transition {} -> {}", previous, current);
            state.record_fault(Fault::InvalidTransition {
                from: previous,
                to: current,
            });
            continue;
        };

        // ── Step 5: apply under the lock ─────────────────────────────
        state.apply(direction.apply(delta), started);

        #[cfg(feature = "defmt")]
        defmt::trace!("Edge {} -> {}: delta={}", previous, current, delta);
    }
}

/// Resolve once `line` no longer reads `level`, immediately if it already moved.
async fn wait_for_change<L: Wait>(line: &mut L, level: bool) -> Result<(), L::Error> {
    if level {
        line.wait_for_low().await
    } else {
        line.wait_for_high().await
    }
}

fn read_levels<L: InputPin>(lines: &mut LinePair<L>) -> Result<Levels, L::Error> {
    let a = lines.a.is_high()?;
    let b = lines.b.is_high()?;
    Ok(Levels::new(a, b))
}

// ── Unit Tests ───────────────────────────────────────────────────────
