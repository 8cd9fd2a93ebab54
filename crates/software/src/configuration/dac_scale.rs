use measurements::Voltage;

/// Describes how DAC codes map to output voltage, from which the nominal pitch transfer is derived.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DacScale {
    codes_per_octave: u32,
    max_code: u16,
}

impl DacScale {
    /// Constructs a [`DacScale`] for a DAC of `resolution_bits` (at most 16) whose full-scale output, after any output
    /// amplifier, is `full_scale`, driving an instrument tracking `volts_per_octave`.
    pub fn new(full_scale: Voltage, resolution_bits: u8, volts_per_octave: Voltage) -> Self {
        let codes = 1_u32 << resolution_bits.min(16);
        let codes_per_octave =
            volts_per_octave.as_volts() / full_scale.as_volts() * f64::from(codes);
        Self {
            // adding a half before truncating rounds to the nearest code
            codes_per_octave: (codes_per_octave + 0.5) as u32,
            max_code: (codes - 1) as u16,
        }
    }

    /// DAC codes spanning one octave.
    pub fn codes_per_octave(&self) -> u32 {
        self.codes_per_octave
    }

    /// Highest code the DAC accepts.
    pub fn max_code(&self) -> u16 {
        self.max_code
    }
}

impl Default for DacScale {
    /// A 12-bit DAC with a 2.048 V reference at 2x gain, doubled by the output stage: 2 mV per code at 1 V/octave.
    fn default() -> Self {
        Self::new(Voltage::from_volts(8.192), 12, Voltage::from_volts(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scale() {
        let scale = DacScale::default();
        assert_eq!(500, scale.codes_per_octave());
        assert_eq!(4095, scale.max_code());
    }

    #[test]
    fn sixteen_bit_five_volt() {
        let scale = DacScale::new(Voltage::from_volts(5.0), 16, Voltage::from_volts(1.0));
        assert_eq!(13107, scale.codes_per_octave());
        assert_eq!(u16::MAX, scale.max_code());
    }
}
