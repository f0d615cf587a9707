//! Edge-driven quadrature decoder for a two-line rotary encoder.
//!
//! This crate turns the A/B lines of a quadrature encoder into a running
//! signed position, counting every edge (4× resolution), and survives
//! transient read or wait failures by latching them instead of stopping.
//!
//! # Architecture
//!
//! - **[`decoder`]** — pure single-edge transition table; both channels
//!   changing at once is reported, never guessed.
//! - **[`sampling_loop`]** — waits for an edge on either line, re-reads both
//!   levels, decodes, and updates the [`SharedState`]. Runs until its
//!   [`CancelToken`] fires.
//! - **[`SharedState`]** — the count, the error latch, and the last sample
//!   duration behind one short critical section, with the drain-on-read
//!   accessor [`SharedState::read_and_drain`].
//! - **[`EncoderSession`]** *(`std`)* — claims both lines through a
//!   [`GpioChip`], runs the loop on its own thread, and tears everything
//!   down again.
//!
//! # Quick start
//!
//! ```ignore
//! use quadrature_encoder::{EncoderConfig, EncoderSession};
//!
//! let session = EncoderSession::launch(chip, EncoderConfig::new(23, 24))?;
//! loop {
//!     match session.read_and_drain() {
//!         Ok(position) => show(position),
//!         Err(errors) => log_faults(errors.count, &errors.last),
//!     }
//! }
//! ```
//!
//! # Features
//!
//! - **`std`** *(default)* — [`EncoderSession`], the std time driver, and
//!   `std::error::Error` impls. Without it the crate is `no_std` and the loop
//!   can be spawned from an Embassy task.
//! - **`defmt`** — structured logging and [`defmt::Format`] implementations
//!   on the public types.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod config;
pub mod decoder;
pub mod error;
pub mod line;
pub mod sampling;
#[cfg(feature = "std")]
pub mod session;
pub mod state;

#[cfg(all(test, feature = "std"))]
mod mock;

// ── Re-exports for convenience ───────────────────────────────────────────

pub use config::{CountDirection, EncoderConfig};
pub use decoder::{decode, Levels, Transition};
pub use error::{Channel, Fault, PendingErrors};
#[cfg(feature = "std")]
pub use error::{LaunchError, TerminationError};
pub use line::{Edge, GpioChip, LineDirection, LinePair};
pub use sampling::{sampling_loop, CancelToken};
#[cfg(feature = "std")]
pub use session::EncoderSession;
pub use state::SharedState;
