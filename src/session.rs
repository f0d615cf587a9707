//! Threaded encoder session.
//!
//! [`EncoderSession::launch`] claims both lines, seeds the level snapshot,
//! and starts [`sampling_loop`] on a dedicated thread.
//! [`EncoderSession::terminate`] cancels and joins that thread and releases
//! the lines. A session dropped while still active is shut down the same
//! way, with errors discarded.
//!
//! ```text
//!  launch()                      sampling thread                 consumers
//!  ────────                      ───────────────                 ─────────
//!  acquire + configure A, B
//!  read initial levels
//!  spawn ──────────────────────▶ wait for lines
//!  hand lines over ────────────▶ loop { wait edge, decode,  ──▶  read_and_drain()
//!                                       lock, apply }            last_sample_duration()
//!  terminate(): cancel ────────▶ return lines
//!               join  ◀──────────┘
//!               release A, B
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use embassy_time::Duration;
use embedded_hal::digital::InputPin;

use crate::config::EncoderConfig;
use crate::decoder::Levels;
use crate::error::{Channel, LaunchError, PendingErrors, TerminationError};
use crate::line::{Edge, GpioChip, LineDirection, LinePair};
use crate::sampling::{sampling_loop, CancelToken};
use crate::state::SharedState;

type Worker<L> = JoinHandle<Option<WorkerExit<L>>>;

/// What the sampling thread needs to start.
struct Handoff<L> {
    lines: LinePair<L>,
    levels: Levels,
}

/// What the sampling thread hands back when it stops.
struct WorkerExit<L> {
    lines: LinePair<L>,
    /// The sampling loop panicked. The lines are still returned for release.
    panicked: bool,
}

/// One running encoder: two claimed lines and the thread sampling them.
///
/// # Example
///
/// ```ignore
/// use quadrature_encoder::{EncoderConfig, EncoderSession};
///
/// // `chip` is any `GpioChip` implementation
/// let session = EncoderSession::launch(chip, EncoderConfig::new(23, 24))?;
///
/// match session.read_and_drain() {
///     Ok(position) => println!("position {}", position),
///     Err(errors) => println!("{}", errors),
/// }
///
/// session.terminate()?;
/// ```
pub struct EncoderSession<C: GpioChip> {
    chip: C,
    config: EncoderConfig,
    state: Arc<SharedState<C::Error>>,
    cancel: Arc<CancelToken>,
    worker: Option<Worker<C::Line>>,
}

impl<C: GpioChip> EncoderSession<C> {
    /// Claim both lines and start sampling.
    ///
    /// Each line is acquired, configured as an input notifying on both
    /// edges, and read once to seed the decoder.
    ///
    /// # Errors
    ///
    /// Any failing step aborts the launch. Lines claimed up to that point are
    /// released before the error is returned.
    pub fn launch(mut chip: C, config: EncoderConfig) -> Result<Self, LaunchError<C::Error>> {
        let state = Arc::new(SharedState::new());
        let cancel = Arc::new(CancelToken::new());

        let worker = {
            let mut claim = Claim::new(&mut chip);
            let level_a = claim.line(Channel::A, config.line_a)?;
            let level_b = claim.line(Channel::B, config.line_b)?;
            let levels = Levels::new(level_a, level_b);

            let (tx, rx) = mpsc::sync_channel(1);
            let worker = spawn_worker::<C>(&config, rx, state.clone(), cancel.clone())?;

            let handed_off = claim.hand_off(|lines| {
                tx.send(Handoff { lines, levels })
                    .map_err(|mpsc::SendError(handoff)| handoff.lines)
            });
            if let Err(e) = handed_off {
                drop(tx);
                let _ = worker.join();
                return Err(e);
            }
            worker
        };

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Encoder started on lines {} (A) and {} (B)",
            config.line_a,
            config.line_b
        );

        Ok(Self {
            chip,
            config,
            state,
            cancel,
            worker: Some(worker),
        })
    }

    /// Read the position, or drain the pending faults.
    ///
    /// See [`SharedState::read_and_drain`].
    pub fn read_and_drain(&self) -> Result<i32, PendingErrors<C::Error>> {
        self.state.read_and_drain()
    }

    /// Time spent processing the most recent counted edge.
    pub fn last_sample_duration(&self) -> Duration {
        self.state.last_sample_duration()
    }

    /// Handle to the shared state, for readers on other threads.
    pub fn shared(&self) -> Arc<SharedState<C::Error>> {
        self.state.clone()
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Stop sampling and release both lines.
    ///
    /// Every step runs even if an earlier one failed.
    ///
    /// # Errors
    ///
    /// [`TerminationError`] lists each step that failed, including a panic in
    /// the sampling loop. Both lines are released in every case.
    pub fn terminate(mut self) -> Result<(), TerminationError<C::Error>> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), TerminationError<C::Error>> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let mut error = TerminationError::new();

        self.cancel.cancel();
        match worker.join() {
            Ok(Some(WorkerExit { lines, panicked })) => {
                error.worker_panicked = panicked;
                error.release_a = self.chip.release(lines.a).err();
                error.release_b = self.chip.release(lines.b).err();
            }
            // The thread never received the lines; launch already released them.
            Ok(None) => {}
            // Panicked outside the loop; the lines went down with the thread.
            Err(_) => error.worker_panicked = true,
        }

        if error.is_empty() {
            #[cfg(feature = "defmt")]
            defmt::info!("Encoder on lines {} and {} terminated", self.config.line_a, self.config.line_b);
            Ok(())
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("Encoder termination incomplete");
            Err(error)
        }
    }
}

impl<C: GpioChip> Drop for EncoderSession<C> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn spawn_worker<C: GpioChip>(
    config: &EncoderConfig,
    rx: mpsc::Receiver<Handoff<C::Line>>,
    state: Arc<SharedState<C::Error>>,
    cancel: Arc<CancelToken>,
) -> std::io::Result<Worker<C::Line>> {
    let direction = config.count_direction;

    thread::Builder::new()
        .name(config.thread_name.into())
        .spawn(move || {
            // A closed channel means launch gave up before handing over.
            let Handoff { mut lines, levels } = rx.recv().ok()?;
            // A panicking loop must still hand its lines back for release.
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                futures::executor::block_on(sampling_loop(
                    &mut lines, levels, &state, &cancel, direction,
                ))
            }));
            Some(WorkerExit {
                lines,
                panicked: outcome.is_err(),
            })
        })
}

// ---------------------------------------------------------------------------
// Launch rollback
// ---------------------------------------------------------------------------

/// Lines claimed during launch. Releases whatever it still holds when dropped.
struct Claim<'c, C: GpioChip> {
    chip: &'c mut C,
    a: Option<C::Line>,
    b: Option<C::Line>,
}

impl<'c, C: GpioChip> Claim<'c, C> {
    fn new(chip: &'c mut C) -> Self {
        Self { chip, a: None, b: None }
    }

    /// Acquire and configure `line` for `channel`, returning its initial level.
    fn line(&mut self, channel: Channel, line: u32) -> Result<bool, LaunchError<C::Error>> {
        let acquired = self
            .chip
            .acquire(line)
            .map_err(|source| LaunchError::Acquire { channel, line, source })?;

        let slot = match channel {
            Channel::A => &mut self.a,
            Channel::B => &mut self.b,
        };
        let claimed = slot.insert(acquired);

        self.chip
            .configure(claimed, LineDirection::Input, Edge::Both)
            .map_err(|source| LaunchError::Configure { channel, line, source })?;

        claimed
            .is_high()
            .map_err(|source| LaunchError::InitialRead { channel, line, source })
    }

    /// Pass both lines to `send`. A send that hands the lines back leaves
    /// them with the claim, which releases them.
    fn hand_off<F>(mut self, send: F) -> Result<(), LaunchError<C::Error>>
    where
        F: FnOnce(LinePair<C::Line>) -> Result<(), LinePair<C::Line>>,
    {
        let lines = match (self.a.take(), self.b.take()) {
            (Some(a), Some(b)) => LinePair { a, b },
            (a, b) => {
                self.a = a;
                self.b = b;
                return Err(LaunchError::Handoff);
            }
        };

        send(lines).map_err(|lines| {
            self.a = Some(lines.a);
            self.b = Some(lines.b);
            LaunchError::Handoff
        })
    }
}

impl<C: GpioChip> Drop for Claim<'_, C> {
    fn drop(&mut self) {
        for line in [self.a.take(), self.b.take()].into_iter().flatten() {
            if self.chip.release(line).is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("Failed to release line during launch rollback");
            }
        }
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────
