//! Error types for the quadrature encoder.
//!
//! Per-sample faults ([`Fault`]) never leave the sampling loop directly;
//! they are latched and handed out in aggregate as [`PendingErrors`] by
//! [`SharedState::read_and_drain`](crate::SharedState::read_and_drain).
//! Lifecycle failures are returned synchronously from
//! [`EncoderSession::launch`] and [`EncoderSession::terminate`].

use core::fmt;

use crate::decoder::Levels;

/// One of the two quadrature channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    A,
    B,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Channel::A => f.write_str("A"),
            Channel::B => f.write_str("B"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sampling faults
// ---------------------------------------------------------------------------

/// A failure observed by the sampling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault<E> {
    /// Waiting for an edge on either line failed.
    Wait(E),
    /// Reading a line level after a wake failed.
    Read(E),
    /// Both channels changed between two observations (missed edge or glitch).
    InvalidTransition { from: Levels, to: Levels },
}

impl<E: fmt::Debug> fmt::Display for Fault<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Fault::Wait(e) => write!(f, "edge wait failed: {:?}", e),
            Fault::Read(e) => write!(f, "level read failed: {:?}", e),
            Fault::InvalidTransition { from, to } => write!(
                f,
                "invalid transition ({}, {}) -> ({}, {})",
                from.a as u8, from.b as u8, to.a as u8, to.b as u8
            ),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for Fault<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Fault::Wait(e) => defmt::write!(f, "edge wait failed: {}", e),
            Fault::Read(e) => defmt::write!(f, "level read failed: {}", e),
            Fault::InvalidTransition { from, to } => {
                defmt::write!(f, "invalid transition {} -> {}", from, to)
            }
        }
    }
}

/// Faults accumulated since the last drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingErrors<E> {
    /// Number of faults latched since the previous drain (at least 1).
    pub count: u32,
    /// The most recent fault.
    pub last: Fault<E>,
}

impl<E: fmt::Debug> fmt::Display for PendingErrors<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} pending error(s), last: {}", self.count, self.last)
    }
}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for PendingErrors<E> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} pending error(s), last: {}", self.count, self.last)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle errors
// ---------------------------------------------------------------------------

/// Errors returned by [`EncoderSession::launch`].
///
/// Every line claimed before the failure has already been released when this
/// error is returned.
#[cfg(feature = "std")]
#[derive(Debug)]
pub enum LaunchError<E> {
    /// The line could not be acquired.
    Acquire { channel: Channel, line: u32, source: E },
    /// The line could not be configured as an input with edge notification.
    Configure { channel: Channel, line: u32, source: E },
    /// The initial level of the line could not be read.
    InitialRead { channel: Channel, line: u32, source: E },
    /// The sampling thread could not be spawned.
    Spawn(std::io::Error),
    /// The sampling thread exited before it took ownership of the lines.
    Handoff,
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> fmt::Display for LaunchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LaunchError::Acquire { channel, line, source } => {
                write!(f, "failed to acquire line {} (channel {}): {:?}", line, channel, source)
            }
            LaunchError::Configure { channel, line, source } => {
                write!(f, "failed to configure line {} (channel {}): {:?}", line, channel, source)
            }
            LaunchError::InitialRead { channel, line, source } => {
                write!(f, "failed to read initial level of line {} (channel {}): {:?}", line, channel, source)
            }
            LaunchError::Spawn(e) => write!(f, "failed to spawn sampling thread: {}", e),
            LaunchError::Handoff => f.write_str("sampling thread exited before start"),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for LaunchError<E> {}

#[cfg(feature = "std")]
impl<E> From<std::io::Error> for LaunchError<E> {
    fn from(error: std::io::Error) -> Self {
        LaunchError::Spawn(error)
    }
}

#[cfg(all(feature = "std", feature = "defmt"))]
impl<E: defmt::Format> defmt::Format for LaunchError<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            LaunchError::Acquire { channel, line, source } => {
                defmt::write!(f, "acquire line {} ({}) failed: {}", line, channel, source)
            }
            LaunchError::Configure { channel, line, source } => {
                defmt::write!(f, "configure line {} ({}) failed: {}", line, channel, source)
            }
            LaunchError::InitialRead { channel, line, source } => {
                defmt::write!(f, "initial read of line {} ({}) failed: {}", line, channel, source)
            }
            LaunchError::Spawn(_) => defmt::write!(f, "thread spawn failed"),
            LaunchError::Handoff => defmt::write!(f, "sampling thread exited before start"),
        }
    }
}

/// Error returned by [`EncoderSession::terminate`].
///
/// Termination always runs every cleanup step; this records each one that
/// failed.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct TerminationError<E> {
    /// The sampling loop panicked.
    pub worker_panicked: bool,
    /// Releasing line A failed.
    pub release_a: Option<E>,
    /// Releasing line B failed.
    pub release_b: Option<E>,
}

#[cfg(feature = "std")]
impl<E> TerminationError<E> {
    pub(crate) fn new() -> Self {
        Self {
            worker_panicked: false,
            release_a: None,
            release_b: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.worker_panicked && self.release_a.is_none() && self.release_b.is_none()
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> fmt::Display for TerminationError<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("encoder termination incomplete:")?;
        if self.worker_panicked {
            f.write_str(" sampling thread panicked;")?;
        }
        if let Some(e) = &self.release_a {
            write!(f, " release of line A failed: {:?};", e)?;
        }
        if let Some(e) = &self.release_b {
            write!(f, " release of line B failed: {:?};", e)?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for TerminationError<E> {}

#[cfg(all(feature = "std", feature = "defmt"))]
impl<E: defmt::Format> defmt::Format for TerminationError<E> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "termination incomplete (panicked: {}, release A: {}, release B: {})",
            self.worker_panicked,
            self.release_a,
            self.release_b
        )
    }
}
