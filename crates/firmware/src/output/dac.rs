use super::OutputError;
use embedded_hal::{digital::OutputPin, spi::SpiBus};

/// Selects channel B; channel A when clear.
const CHANNEL_B: u16 = 1 << 15;
/// Keeps the channel active; clear to shut it down.
const ACTIVE: u16 = 1 << 12;
const CODE_MASK: u16 = 0x0FFF;

/// Builds the 16-bit command word setting one channel of an MCP4822-style DAC to `code`, at 2x gain.
fn dac_command(channel_b: bool, code: u16) -> u16 {
    let channel = if channel_b { CHANNEL_B } else { 0 };
    channel | ACTIVE | (code & CODE_MASK)
}

/// A dual 12-bit SPI DAC behind its own chip select.
pub struct DualDac<P> {
    select: P,
}

impl<P: OutputPin> DualDac<P> {
    /// Construct a `DualDac`. The select pin is expected to idle high.
    pub fn new(select: P) -> Self {
        Self { select }
    }

    /// Write both channels, A then B.
    pub fn write<B: SpiBus>(
        &mut self,
        bus: &mut B,
        a: u16,
        b: u16,
    ) -> Result<(), OutputError<B::Error, P::Error>> {
        for command in [dac_command(false, a), dac_command(true, b)] {
            self.select.set_low().map_err(OutputError::Pin)?;
            let transfer = bus
                .write(&command.to_be_bytes())
                .and_then(|_| bus.flush());
            // release the chip even when the transfer failed
            self.select.set_high().map_err(OutputError::Pin)?;
            transfer.map_err(OutputError::Spi)?;
        }
        Ok(())
    }
}
