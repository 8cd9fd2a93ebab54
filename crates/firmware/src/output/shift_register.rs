use super::OutputError;
use cvpal_lib::render::State;
use embedded_hal::{digital::OutputPin, spi::SpiBus};

/// A 74HC595 shift register driving the gate outputs.
pub struct ShiftRegister<P> {
    latch: P,
}

impl<P: OutputPin> ShiftRegister<P> {
    /// Construct a `ShiftRegister`. The latch pin is expected to idle low.
    pub fn new(latch: P) -> Self {
        Self { latch }
    }

    /// Shift the gate levels in and latch them onto the outputs.
    pub fn write<B: SpiBus>(
        &mut self,
        bus: &mut B,
        state: &State,
    ) -> Result<(), OutputError<B::Error, P::Error>> {
        bus.write(&[state.packed_gates()])
            .and_then(|_| bus.flush())
            .map_err(OutputError::Spi)?;
        self.latch.set_high().map_err(OutputError::Pin)?;
        self.latch.set_low().map_err(OutputError::Pin)
    }
}
