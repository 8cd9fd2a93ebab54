//! This module drives the converter's outputs: two dual 12-bit DACs for the four CVs and a shift register for the
//! eight gates. All three chips share one SPI bus and latch their input on the rising edge of their own select pin.
//!
//! The drivers are generic over the `embedded-hal` traits so they can be exercised without the MCU.

mod dac;
pub use dac::*;

mod shift_register;
pub use shift_register::*;

use cvpal_lib::render::State;
use embedded_hal::{digital::OutputPin, spi::SpiBus};

/// A failure writing to an output chip.
#[derive(Debug)]
pub enum OutputError<S, P> {
    /// The SPI transfer failed.
    Spi(S),
    /// A chip select or latch pin could not be driven.
    Pin(P),
}

/// The converter's output stage.
pub struct Outputs<B, P> {
    bus: B,
    /// DAC for CV outputs 1 and 2.
    dac_a: DualDac<P>,
    /// DAC for CV outputs 3 and 4.
    dac_b: DualDac<P>,
    gates: ShiftRegister<P>,
    /// What was last written, so unchanged chips are left alone.
    written: Option<State>,
}

impl<B, P> Outputs<B, P>
where
    B: SpiBus,
    P: OutputPin,
{
    /// Construct the output stage. Nothing is written until the first [`write`](Self::write).
    pub fn new(bus: B, dac_a: DualDac<P>, dac_b: DualDac<P>, gates: ShiftRegister<P>) -> Self {
        Self {
            bus,
            dac_a,
            dac_b,
            gates,
            written: None,
        }
    }

    /// Write a rendered [`State`] to the hardware, skipping chips whose values have not changed.
    pub fn write(&mut self, state: &State) -> Result<(), OutputError<B::Error, P::Error>> {
        let previous = self.written;
        let changed = |range: core::ops::Range<usize>| {
            previous.is_none_or(|previous| previous.cv[range.clone()] != state.cv[range])
        };

        if changed(0..2) {
            self.dac_a.write(&mut self.bus, state.cv[0], state.cv[1])?;
        }
        if changed(2..4) {
            self.dac_b.write(&mut self.bus, state.cv[2], state.cv[3])?;
        }
        if previous.is_none_or(|previous| previous.gates != state.gates) {
            self.gates.write(&mut self.bus, state)?;
        }
        self.written = Some(*state);
        Ok(())
    }
}
