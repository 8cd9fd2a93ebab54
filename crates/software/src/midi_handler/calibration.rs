//! Provides a struct [`CalibrationTable`] converting a pitch into a DAC code for one CV output, corrected by eight
//! adjustable calibration points.

use crate::configuration::DacScale;
use wmidi::{Note, U7};

/// Number of adjustable calibration points per output.
pub const CALIBRATION_POINTS: usize = 8;

/// The notes on which the calibration points sit, six semitones apart.
pub const CALIBRATION_NOTES: [u8; CALIBRATION_POINTS] = [42, 48, 54, 60, 66, 72, 78, 84];

/// Pitches are 7.7 fixed point: the note number in the high bits, fractions of a semitone in the low seven.
pub const SEMITONE: i32 = 1 << 7;

const POINT_SPACING: i32 = 6 * SEMITONE;
const FIRST_POINT: i32 = CALIBRATION_NOTES[0] as i32 * SEMITONE;
const LAST_POINT: i32 = CALIBRATION_NOTES[CALIBRATION_POINTS - 1] as i32 * SEMITONE;

/// Converts a [`Note`] to its 7.7 fixed point pitch.
pub fn note_to_pitch(note: Note) -> i16 {
    i16::from(u8::from(note)) << 7
}

/// Pitch-to-code transfer function of one CV output.
///
/// The nominal transfer is linear, `pitch * codes_per_octave / (12 << 7)`. Each calibration point adds a signed
/// offset, in DAC codes, at its note; between two points the offset is interpolated linearly and outside the
/// calibrated range the nearest point's offset applies. Offsets are not clamped.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationTable {
    /// The CV output this table belongs to.
    output: usize,
    scale: DacScale,
    offsets: [i16; CALIBRATION_POINTS],
}

impl CalibrationTable {
    /// Construct the table of a CV output with an identity correction.
    pub fn new(output: usize, scale: DacScale) -> Self {
        Self {
            output,
            scale,
            offsets: [0; CALIBRATION_POINTS],
        }
    }

    /// Current offset of each calibration point, in DAC codes.
    pub fn offsets(&self) -> &[i16; CALIBRATION_POINTS] {
        &self.offsets
    }

    /// Map a 7.7 fixed point pitch to a DAC code, clamped to the DAC range.
    pub fn calibrate(&self, pitch: i16) -> u16 {
        let pitch = i32::from(pitch);
        let nominal = pitch * self.scale.codes_per_octave() as i32 / (12 * SEMITONE);
        let code = nominal + self.offset_at(pitch);
        code.clamp(0, i32::from(self.scale.max_code())) as u16
    }

    /// Nudge calibration point `point` (1-based, `1..=8`) by `delta` DAC codes. Other points are ignored.
    pub fn adjust(&mut self, point: usize, delta: i16) {
        match point.checked_sub(1).and_then(|i| self.offsets.get_mut(i)) {
            Some(offset) => {
                *offset = offset.saturating_add(delta);
                info!(
                    "Calibration of output {} point {} is now {}",
                    self.output, point, *offset
                );
            }
            None => warn!("Ignoring adjustment of calibration point {}", point),
        }
    }

    fn offset_at(&self, pitch: i32) -> i32 {
        if pitch <= FIRST_POINT {
            return i32::from(self.offsets[0]);
        }
        if pitch >= LAST_POINT {
            return i32::from(self.offsets[CALIBRATION_POINTS - 1]);
        }
        let distance = pitch - FIRST_POINT;
        let index = (distance / POINT_SPACING) as usize;
        let fraction = distance % POINT_SPACING;
        let low = i32::from(self.offsets[index]);
        let high = i32::from(self.offsets[index + 1]);
        low + (high - low) * fraction / POINT_SPACING
    }
}

/// Scales a 7-bit value to the DAC's 12-bit range.
pub fn u7_to_code(value: U7) -> u16 {
    u16::from(u8::from(value)) << 5
}
