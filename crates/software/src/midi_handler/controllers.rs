//! Provides a data structure for the continuous controls that shape the monophonic voices: cached Control Change
//! values, legato footswitches and pitch bend.

use super::QUAD_VOICE_COUNT;
use wmidi::U7;

/// Number of cached Control Change values.
pub const CACHED_CC_COUNT: usize = 4;

/// MIDI CC 1..=4 (Modulation Wheel, Breath Controller, undefined, Foot Controller) are cached in slots 0..=3.
const CACHED_CC_FIRST: u8 = 1;

/// MIDI CC 68: Legato Footswitch.
pub const LEGATO_FOOTSWITCH: u8 = 68;

/// A struct grouping the controller state of the voices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Controllers {
    /// MIDI CC 1..=4, regardless of the channel they arrive on
    control_change: [U7; CACHED_CC_COUNT],
    /// MIDI CC 68, per voice
    legato: [bool; QUAD_VOICE_COUNT],
    /// Signed pitch bend per voice, centered on zero
    pitch_bend: [i16; QUAD_VOICE_COUNT],
}

impl Default for Controllers {
    fn default() -> Self {
        Self {
            control_change: [U7::from_u8_lossy(0); CACHED_CC_COUNT],
            legato: [false; QUAD_VOICE_COUNT],
            pitch_bend: [0; QUAD_VOICE_COUNT],
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Controllers {
    fn format(&self, fmt: defmt::Formatter) {
        let Controllers {
            control_change,
            legato,
            pitch_bend,
        } = *self;
        defmt::write!(
            fmt,
            "Controllers {{ control_change: {}, legato: {}, pitch_bend: {} }}",
            control_change.map(u8::from),
            legato,
            pitch_bend
        );
    }
}

impl Controllers {
    /// Returns the slot a Control Change number is cached in, if it is cached at all.
    pub fn cache_slot(control: U7) -> Option<usize> {
        let slot = usize::from(u8::from(control).checked_sub(CACHED_CC_FIRST)?);
        (slot < CACHED_CC_COUNT).then_some(slot)
    }

    /// Returns a cached Control Change value. Slots past the cache read as zero.
    pub fn control_change(&self, slot: usize) -> U7 {
        self.control_change
            .get(slot)
            .copied()
            .unwrap_or_else(|| U7::from_u8_lossy(0))
    }

    /// Caches a Control Change value.
    pub fn set_control_change(&mut self, slot: usize, value: U7) {
        if let Some(cached) = self.control_change.get_mut(slot) {
            *cached = value;
        }
    }

    /// Whether a voice plays legato, suppressing forced retriggers.
    pub fn legato(&self, voice: usize) -> bool {
        self.legato.get(voice).copied().unwrap_or(false)
    }

    /// Sets a voice's legato flag from a switch controller value: 64 and above is on.
    pub fn set_legato(&mut self, voice: usize, value: U7) {
        if let Some(legato) = self.legato.get_mut(voice) {
            *legato = u8::from(value) >= 64;
        }
    }

    /// Returns a voice's pitch bend.
    pub fn pitch_bend(&self, voice: usize) -> i16 {
        self.pitch_bend.get(voice).copied().unwrap_or(0)
    }

    /// Sets a voice's pitch bend.
    pub fn set_pitch_bend(&mut self, voice: usize, bend: i16) {
        if let Some(pitch_bend) = self.pitch_bend.get_mut(voice) {
            *pitch_bend = bend;
        }
    }
}
