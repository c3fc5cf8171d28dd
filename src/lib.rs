//! # max6675_gpio
//!
//! A library that reads temperature from a MAX6675 thermocouple digitizer
//! over bit-banged GPIO.
//!
//! The MAX6675 speaks a read-only SPI-like serial protocol, but this crate
//! doesn't use a hardware SPI peripheral: it drives chip-select and clock
//! itself and samples the data line on each rising edge, so any three free
//! digital pins will do.
//!
//! ## Wiring
//!
//! Pin numbers mean whatever your [`Platform`] implementation says they
//! mean; the Raspberry Pi backend in [`rpi`] takes BCM numbers. Wiring the
//! chip to the Pi's SPI0 pads looks like this:
//!
//! | MAX6675 signal | Role        | BCM pin |
//! |----------------|-------------|---------|
//! | CS             | chip-select | 8       |
//! | SCK            | clock       | 11      |
//! | SO             | data out    | 9       |
//!
//! ## Usage
//!
//! ```no_run
//! fn main() -> anyhow::Result<()> {
//!     use max6675_gpio::rpi::RpiPlatform;
//!     use max6675_gpio::{Max6675, PinAssignment, Sample, Unit};
//!     use std::time::Duration;
//!
//!     let pins = PinAssignment { cs: 8, sck: 11, so: 9 };
//!     let mut max = Max6675::new(RpiPlatform::new()?, pins, Unit::Celsius)?;
//!
//!     loop {
//!         match max.read_temperature()? {
//!             Sample::Value(temp) => println!("Read Celsius! Got: {temp}."),
//!             Sample::Fault => println!("Thermocouple is open!"),
//!         }
//!         std::thread::sleep(Duration::from_secs(1));
//!     }
//! }
//! ```
//!
//! Each read forces the chip through a fresh conversion, which takes it
//! around 220 ms; [`Max6675::read_temperature`] waits that out on the
//! calling thread, so expect two to three samples per second at most.

use std::fmt;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

pub mod platform;
pub mod rpi;

pub use platform::{Level, PinMode, Platform};

/// Resolution of the MAX6675: 0.25 °C per count.
///
/// See page 5 of [Maxim Integrated's MAX6675 specsheet](https://www.analog.com/media/en/technical-documentation/data-sheets/MAX6675.pdf).
pub const CELSIUS_PER_COUNT: f64 = 0.25;

/// Largest raw reading the chip's 12-bit converter can produce.
pub const MAX_COUNT: u16 = 0x0FFF;

/// How long chip-select is held low to put the chip back in a known state
/// before a read.
const WAKE_HOLD: Duration = Duration::from_millis(2);

/// How long the chip is left deselected so it can run and latch a fresh
/// conversion (nominal conversion period plus margin). Shrinking this risks
/// reading a stale or half-finished conversion.
const CONVERSION_HOLD: Duration = Duration::from_millis(220);

/// High time for the dummy-bit and trailing-bit clock pulses.
const PULSE_HOLD: Duration = Duration::from_millis(1);

/// Settle time between data clock edges. Keeps the emulated clock far below
/// the chip's 4.3 MHz ceiling.
const EDGE_SETTLE: Duration = Duration::from_micros(1);

/// An error emitted due to problems with the MAX6675 or its pins.
///
/// `E` is the error type of the [`Platform`] the driver runs on. An open
/// thermocouple is *not* an error; see [`Sample::Fault`].
#[derive(Debug, Error)]
pub enum Max6675Error<E>
where
    E: std::error::Error + 'static,
{
    #[error("couldn't configure the {role} pin ({pin}): {source}")]
    PinConfiguration {
        role: &'static str,
        pin: u8,
        source: E,
    },
    #[error("chip-select, clock and data-in must be three distinct pins (got {cs}, {sck} and {so})")]
    IndistinctPins { cs: u8, sck: u8, so: u8 },
    #[error("gpio access failed mid-transaction: {0}")]
    Gpio(#[from] E),
    #[error("the driver has been torn down and its pins released")]
    Released,
}

/// The three pins the chip is wired to.
///
/// The numbers must be pairwise distinct; [`Max6675::new`] refuses the
/// assignment otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinAssignment {
    /// Chip-select, driven by the driver (active low).
    pub cs: u8,
    /// Serial clock, driven by the driver.
    pub sck: u8,
    /// Serial data out of the chip, only ever read.
    pub so: u8,
}

/// The unit a driver reports temperature in, fixed at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Unit {
    /// Raw converter counts, 0–4095.
    Raw,
    #[default]
    Celsius,
    Fahrenheit,
}

impl Unit {
    fn convert(self, raw: u16) -> Temperature {
        match self {
            Unit::Raw => Temperature::Raw(raw),
            Unit::Celsius => Temperature::Celsius(celsius_from_raw(raw)),
            Unit::Fahrenheit => Temperature::Fahrenheit(fahrenheit_from_raw(raw)),
        }
    }
}

/// A decoded temperature, tagged with the unit it was requested in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Temperature {
    /// Raw converter counts for data science (and other fun little things).
    Raw(u16),
    Celsius(f64),
    Fahrenheit(f64),
}

impl Temperature {
    /// The numeric value, whatever the unit.
    pub fn value(self) -> f64 {
        match self {
            Temperature::Raw(counts) => f64::from(counts),
            Temperature::Celsius(degrees) | Temperature::Fahrenheit(degrees) => degrees,
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Temperature::Raw(counts) => write!(f, "{counts}"),
            Temperature::Celsius(degrees) => write!(f, "{degrees:.2} °C"),
            Temperature::Fahrenheit(degrees) => write!(f, "{degrees:.2} °F"),
        }
    }
}

/// The outcome of one read: a temperature, or word that the thermocouple
/// input is open.
///
/// A fault is an ordinary outcome rather than an error. The chip reports it
/// on every conversion until a thermocouple is attached, and the caller
/// decides whether to retry on the next cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    /// The thermocouple input is open (no probe attached, or a broken one).
    Fault,
    Value(Temperature),
}

impl Sample {
    /// Returns `true` if the chip reported an open thermocouple.
    pub fn is_fault(&self) -> bool {
        matches!(self, Sample::Fault)
    }

    /// The decoded temperature, unless the read faulted.
    pub fn value(self) -> Option<Temperature> {
        match self {
            Sample::Value(temperature) => Some(temperature),
            Sample::Fault => None,
        }
    }
}

/// Converts raw converter counts to degrees Celsius.
pub fn celsius_from_raw(raw: u16) -> f64 {
    f64::from(raw) * CELSIUS_PER_COUNT
}

/// Converts raw converter counts to degrees Fahrenheit.
pub fn fahrenheit_from_raw(raw: u16) -> f64 {
    celsius_from_raw(raw) * 9.0 / 5.0 + 32.0
}

/// A representation of the MAX6675 thermocouple digitizer, clocked by hand
/// over three GPIO pins.
///
/// Constructing the driver claims and configures the pins; dropping it (or
/// calling [`teardown`](Max6675::teardown)) hands them back. One driver
/// reads one chip: the pins form a single exclusive resource, and
/// `read_temperature` taking `&mut self` is what keeps two transactions
/// from interleaving clock pulses.
#[derive(Debug)]
pub struct Max6675<P: Platform> {
    platform: P,
    pins: PinAssignment,
    unit: Unit,
    released: bool,
}

impl<P: Platform> Max6675<P> {
    /// Claims the three pins and puts the bus in its idle state:
    /// chip-select high, clock low, data-in listening.
    ///
    /// Fails with [`Max6675Error::IndistinctPins`] before touching any
    /// hardware if the assignment reuses a pin, and with
    /// [`Max6675Error::PinConfiguration`] if the platform rejects one of
    /// them (pins claimed before the failure are handed back).
    pub fn new(
        platform: P,
        pins: PinAssignment,
        unit: Unit,
    ) -> Result<Self, Max6675Error<P::Error>> {
        if pins.cs == pins.sck || pins.cs == pins.so || pins.sck == pins.so {
            return Err(Max6675Error::IndistinctPins {
                cs: pins.cs,
                sck: pins.sck,
                so: pins.so,
            });
        }

        let mut driver = Self {
            platform,
            pins,
            unit,
            released: false,
        };

        let setup = [
            (pins.cs, PinMode::Output(Level::High), "chip-select"),
            (pins.sck, PinMode::Output(Level::Low), "clock"),
            (pins.so, PinMode::Input, "data-in"),
        ];
        for (configured, &(pin, mode, role)) in setup.iter().enumerate() {
            if let Err(source) = driver.platform.configure_pin(pin, mode) {
                for &(claimed, _, _) in &setup[..configured] {
                    let _ = driver.platform.release_pin(claimed);
                }
                // Keep Drop from releasing pins that were never claimed.
                driver.released = true;
                return Err(Max6675Error::PinConfiguration { role, pin, source });
            }
        }

        debug!(
            cs = pins.cs,
            sck = pins.sck,
            so = pins.so,
            ?unit,
            "max6675 pins configured"
        );
        Ok(driver)
    }

    /// The unit this driver was constructed with.
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Runs one full transaction against the chip and decodes the result.
    ///
    /// The chip is first deselected for the length of a conversion so it
    /// latches a fresh sample, then 16 bits are clocked out of it: a dummy
    /// bit, the 12-bit reading MSB-first, the open-thermocouple flag, and
    /// two don't-care bits. The whole call blocks for a bit over 220 ms.
    ///
    /// An open thermocouple comes back as `Ok(Sample::Fault)`; `Err` is
    /// reserved for the platform failing underneath us (or the driver
    /// already being torn down).
    pub fn read_temperature(&mut self) -> Result<Sample, Max6675Error<P::Error>> {
        if self.released {
            return Err(Max6675Error::Released);
        }

        // Force the chip through a fresh conversion, latched on deselect,
        // before addressing it.
        self.platform.write_pin(self.pins.cs, Level::Low)?;
        thread::sleep(WAKE_HOLD);
        self.platform.write_pin(self.pins.cs, Level::High)?;
        thread::sleep(CONVERSION_HOLD);

        self.platform.write_pin(self.pins.cs, Level::Low)?;

        // The first bit out of the chip carries no data.
        self.pulse_clock()?;

        let mut raw: u16 = 0;
        for bit in (0..12).rev() {
            if self.clock_in_bit()?.is_high() {
                raw |= 1 << bit;
            }
        }

        let fault = self.clock_in_bit()?.is_high();

        // Two trailing don't-care bits, then close the transaction.
        self.pulse_clock()?;
        self.pulse_clock()?;
        self.platform.write_pin(self.pins.cs, Level::High)?;

        if fault {
            debug!("thermocouple input is open");
            return Ok(Sample::Fault);
        }

        trace!(raw, "decoded max6675 frame");
        Ok(Sample::Value(self.unit.convert(raw)))
    }

    /// Hands all three pins back to the platform.
    ///
    /// Runs on drop as well, so calling it yourself is only needed to
    /// reclaim the pins early or to see the error. Calling it again after
    /// it has run is a no-op.
    pub fn teardown(&mut self) -> Result<(), Max6675Error<P::Error>> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        for pin in [self.pins.cs, self.pins.sck, self.pins.so] {
            self.platform.release_pin(pin)?;
        }
        debug!("max6675 pins released");
        Ok(())
    }

    /// One clock pulse with a long high period, for bits we throw away.
    fn pulse_clock(&mut self) -> Result<(), Max6675Error<P::Error>> {
        self.platform.write_pin(self.pins.sck, Level::High)?;
        thread::sleep(PULSE_HOLD);
        self.platform.write_pin(self.pins.sck, Level::Low)?;
        Ok(())
    }

    /// Raises the clock, samples the data line, lowers the clock.
    fn clock_in_bit(&mut self) -> Result<Level, Max6675Error<P::Error>> {
        self.platform.write_pin(self.pins.sck, Level::High)?;
        thread::sleep(EDGE_SETTLE);
        let level = self.platform.read_pin(self.pins.so)?;
        self.platform.write_pin(self.pins.sck, Level::Low)?;
        thread::sleep(EDGE_SETTLE);
        Ok(level)
    }
}

impl<P: Platform> Drop for Max6675<P> {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn celsius_follows_the_quarter_degree_resolution() {
        for raw in 0..=MAX_COUNT {
            assert_eq!(celsius_from_raw(raw), f64::from(raw) * 0.25);
        }
    }

    #[test]
    fn fahrenheit_matches_the_celsius_identity() {
        for raw in 0..=MAX_COUNT {
            assert_approx_eq!(
                fahrenheit_from_raw(raw),
                celsius_from_raw(raw) * 9.0 / 5.0 + 32.0
            );
        }
    }

    #[test]
    fn conversions_are_strictly_increasing() {
        for raw in 0..MAX_COUNT {
            assert!(celsius_from_raw(raw) < celsius_from_raw(raw + 1));
            assert!(fahrenheit_from_raw(raw) < fahrenheit_from_raw(raw + 1));
        }
    }

    #[test]
    fn boundary_counts() {
        assert_eq!(celsius_from_raw(0), 0.0);
        assert_eq!(celsius_from_raw(MAX_COUNT), 1023.75);
        assert_eq!(fahrenheit_from_raw(0), 32.0);
    }

    #[test]
    fn unit_conversion_tags_the_value() {
        assert_eq!(Unit::Raw.convert(4095), Temperature::Raw(4095));
        assert_eq!(Unit::Celsius.convert(100), Temperature::Celsius(25.0));
        assert_eq!(Unit::Fahrenheit.convert(100), Temperature::Fahrenheit(77.0));
    }

    #[test]
    fn temperature_display() {
        assert_eq!(Temperature::Celsius(25.0).to_string(), "25.00 °C");
        assert_eq!(Temperature::Fahrenheit(77.0).to_string(), "77.00 °F");
        assert_eq!(Temperature::Raw(100).to_string(), "100");
    }

    #[test]
    fn temperature_value_strips_the_unit() {
        assert_eq!(Temperature::Raw(100).value(), 100.0);
        assert_eq!(Temperature::Celsius(25.0).value(), 25.0);
        assert_eq!(Temperature::Fahrenheit(77.0).value(), 77.0);
    }

    #[test]
    fn sample_accessors() {
        let sample = Sample::Value(Temperature::Celsius(25.0));
        assert!(!sample.is_fault());
        assert_eq!(sample.value(), Some(Temperature::Celsius(25.0)));
        assert!(Sample::Fault.is_fault());
        assert_eq!(Sample::Fault.value(), None);
    }
}
