//! Raspberry Pi GPIO backend, built on `rppal`.
//!
//! Pin numbers are BCM numbers, not physical header positions. Check
//! `pinout` on the Pi itself (or <https://pinout.xyz>) if you're unsure
//! which is which.

use std::collections::HashMap;

use rppal::gpio::{Gpio, InputPin, OutputPin};
use thiserror::Error;
use tracing::debug;

use crate::platform::{Level, PinMode, Platform};

/// An error emitted by the Raspberry Pi GPIO backend.
#[derive(Debug, Error)]
pub enum RpiError {
    /// `rppal` couldn't open the GPIO peripheral or claim a pin. This
    /// usually means a bad pin number, missing permissions on
    /// `/dev/gpiomem`, or a pin already held by another process.
    #[error(transparent)]
    Gpio(#[from] rppal::gpio::Error),
    #[error("BCM pin {0} has not been configured")]
    Unconfigured(u8),
    #[error("BCM pin {0} is not configured as an output")]
    NotAnOutput(u8),
    #[error("BCM pin {0} is not configured as an input")]
    NotAnInput(u8),
}

#[derive(Debug)]
enum Claimed {
    Input(InputPin),
    Output(OutputPin),
}

/// A [`Platform`] over the Raspberry Pi's GPIO header.
#[derive(Debug)]
pub struct RpiPlatform {
    gpio: Gpio,
    claimed: HashMap<u8, Claimed>,
}

impl RpiPlatform {
    /// Opens the GPIO peripheral. Fails if none of the interfaces `rppal`
    /// probes (`/dev/gpiomem` and friends) is accessible.
    pub fn new() -> Result<Self, RpiError> {
        Ok(Self {
            gpio: Gpio::new()?,
            claimed: HashMap::new(),
        })
    }
}

impl Platform for RpiPlatform {
    type Error = RpiError;

    fn configure_pin(&mut self, pin: u8, mode: PinMode) -> Result<(), RpiError> {
        let unclaimed = self.gpio.get(pin)?;
        let claimed = match mode {
            PinMode::Input => Claimed::Input(unclaimed.into_input()),
            PinMode::Output(Level::Low) => Claimed::Output(unclaimed.into_output_low()),
            PinMode::Output(Level::High) => Claimed::Output(unclaimed.into_output_high()),
        };
        self.claimed.insert(pin, claimed);
        debug!(pin, ?mode, "claimed gpio pin");
        Ok(())
    }

    fn write_pin(&mut self, pin: u8, level: Level) -> Result<(), RpiError> {
        match self.claimed.get_mut(&pin) {
            Some(Claimed::Output(output)) => {
                match level {
                    Level::High => output.set_high(),
                    Level::Low => output.set_low(),
                }
                Ok(())
            }
            Some(Claimed::Input(_)) => Err(RpiError::NotAnOutput(pin)),
            None => Err(RpiError::Unconfigured(pin)),
        }
    }

    fn read_pin(&mut self, pin: u8) -> Result<Level, RpiError> {
        match self.claimed.get(&pin) {
            Some(Claimed::Input(input)) => Ok(Level::from(input.is_high())),
            Some(Claimed::Output(_)) => Err(RpiError::NotAnInput(pin)),
            None => Err(RpiError::Unconfigured(pin)),
        }
    }

    fn release_pin(&mut self, pin: u8) -> Result<(), RpiError> {
        // Dropping the handle lets rppal restore the pin to its idle state.
        if self.claimed.remove(&pin).is_some() {
            debug!(pin, "released gpio pin");
        }
        Ok(())
    }
}
