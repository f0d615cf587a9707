//! GPIO line capability consumed by the encoder.
//!
//! A line is anything implementing the `embedded-hal` [`InputPin`] (a fresh
//! level read on every call) and the `embedded-hal-async` [`Wait`] traits.
//! [`GpioChip`] adds the acquire / configure / release half that an operating
//! system backend (for example Linux sysfs export and unexport) provides.

use embedded_hal::digital::{ErrorType, InputPin};
use embedded_hal_async::digital::Wait;

/// Line direction.
///
/// The encoder only ever requests [`Input`](Self::Input); `Output` mirrors the
/// backend's vocabulary so a [`GpioChip`] can serve other users too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineDirection {
    Input,
    Output,
}

/// Which edges arm the line's event notification.
///
/// The encoder only ever requests [`Both`](Self::Both); the other variants
/// mirror the backend's vocabulary (sysfs `edge`: `none`, `rising`,
/// `falling`, `both`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    None,
    Rising,
    Falling,
    Both,
}

/// Source of GPIO lines.
///
/// The encoder acquires both of its lines through this trait, configures them
/// as inputs notifying on [`Edge::Both`], and hands each one back through
/// [`release`](GpioChip::release) exactly once.
pub trait GpioChip {
    /// Error shared by the chip and its lines.
    type Error: embedded_hal::digital::Error + Send + 'static;

    /// An acquired line. Moves onto the sampling thread while a session is active.
    type Line: InputPin + Wait + ErrorType<Error = Self::Error> + Send + 'static;

    /// Claim `line_id` for exclusive use.
    fn acquire(&mut self, line_id: u32) -> Result<Self::Line, Self::Error>;

    /// Set the direction and edge notification of an acquired line.
    fn configure(
        &mut self,
        line: &mut Self::Line,
        direction: LineDirection,
        edge: Edge,
    ) -> Result<(), Self::Error>;

    /// Give a line back. Best-effort: callers continue their own cleanup on
    /// failure.
    fn release(&mut self, line: Self::Line) -> Result<(), Self::Error>;
}

/// The two lines of one encoder.
pub struct LinePair<L> {
    pub a: L,
    pub b: L,
}
