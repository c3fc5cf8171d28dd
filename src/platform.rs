//! The digital I/O boundary between the protocol driver and the host board.
//!
//! [`Max6675`](crate::Max6675) never touches a GPIO register itself; it goes
//! through the four operations of [`Platform`]. Besides keeping the driver
//! portable, this means the whole clocking sequence can be exercised against
//! a scripted stand-in with no thermocouple in sight.

/// The state of a digital pin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    /// Returns `true` for [`Level::High`].
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// How a pin should be configured before it's used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinMode {
    /// High-impedance input.
    Input,
    /// Push-pull output, driven to the given level as soon as it's claimed.
    Output(Level),
}

/// Host-side access to a set of numbered digital pins.
///
/// Pin numbers mean whatever the implementation says they mean (the
/// Raspberry Pi backend in [`rpi`](crate::rpi) uses BCM numbering). A pin
/// must be configured before it's written, read, or released; writing an
/// input or reading an output is an error.
pub trait Platform {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Claims a pin and configures its direction (and initial level, for
    /// outputs).
    fn configure_pin(&mut self, pin: u8, mode: PinMode) -> Result<(), Self::Error>;

    /// Drives a configured output pin to `level`.
    fn write_pin(&mut self, pin: u8, level: Level) -> Result<(), Self::Error>;

    /// Samples the current level of a configured input pin.
    fn read_pin(&mut self, pin: u8) -> Result<Level, Self::Error>;

    /// Hands a pin back so another owner may claim it. Releasing a pin that
    /// was never configured is allowed and does nothing.
    fn release_pin(&mut self, pin: u8) -> Result<(), Self::Error>;
}
