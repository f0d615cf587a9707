//! Encoder session configuration.

/// Sign convention applied to every decoded step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CountDirection {
    /// Deltas as decoded. One detent through `(1,0) → (1,1) → (0,1) → (0,0)`
    /// counts −4.
    #[default]
    Normal,
    /// Deltas negated, for encoders wired with A and B the other way round.
    Reversed,
}

impl CountDirection {
    pub const fn apply(self, delta: i32) -> i32 {
        match self {
            CountDirection::Normal => delta,
            CountDirection::Reversed => -delta,
        }
    }
}

/// Configuration for an [`EncoderSession`](crate::EncoderSession).
///
/// [`EncoderConfig::default()`] uses lines 0 and 1; most callers start from
/// [`EncoderConfig::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Line id of channel A.
    pub line_a: u32,
    /// Line id of channel B.
    pub line_b: u32,
    /// Sign convention. Default: [`CountDirection::Normal`].
    pub count_direction: CountDirection,
    /// Name of the sampling thread. Default: `"quadrature-encoder"`.
    pub thread_name: &'static str,
}

impl EncoderConfig {
    pub fn new(line_a: u32, line_b: u32) -> Self {
        Self {
            line_a,
            line_b,
            ..Self::default()
        }
    }

    /// Builder-style override of [`count_direction`](Self::count_direction).
    pub fn with_direction(mut self, direction: CountDirection) -> Self {
        self.count_direction = direction;
        self
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            line_a: 0,
            line_b: 1,
            count_direction: CountDirection::Normal,
            thread_name: "quadrature-encoder",
        }
    }
}
