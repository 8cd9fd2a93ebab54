//! Provides the [`Voices`] aggregate: everything the renderers read to produce the output state.

use super::{
    CalibrationTable, Controllers, DRUM_CHANNEL_COUNT, DrumChannel, NoteStack, QUAD_VOICE_COUNT,
    VoiceAllocator, note_to_pitch,
};
use crate::configuration::Config;
use wmidi::Note;

/// The note shown on every output when a calibration mode is entered.
const DEFAULT_CALIBRATED_NOTE: Note = Note::C4;

/// Voice, drum and calibration state of the converter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Voices {
    pub(super) mono: [NoteStack; QUAD_VOICE_COUNT],
    pub(super) poly: VoiceAllocator,
    pub(super) controllers: Controllers,
    /// Ticks left during which each voice's gate is forced low after a preempting note.
    pub(super) retrigger: [u8; QUAD_VOICE_COUNT],
    pub(super) drums: [DrumChannel; DRUM_CHANNEL_COUNT],
    pub(super) calibration: [CalibrationTable; QUAD_VOICE_COUNT],
    pub(super) calibrated_note: Note,
}

impl Voices {
    /// Constructs idle voices, stopped drums and identity calibration tables.
    pub fn new(config: &Config) -> Self {
        let trigger_ticks = config.trigger_ticks();
        let clock_gate_ticks = config.clock_gate_ticks();
        Self {
            mono: [NoteStack::new(); QUAD_VOICE_COUNT],
            poly: VoiceAllocator::new(),
            controllers: Controllers::default(),
            retrigger: [0; QUAD_VOICE_COUNT],
            drums: core::array::from_fn(|i| {
                if i < super::EVENT_DRUM_COUNT {
                    DrumChannel::new(trigger_ticks, None)
                } else {
                    DrumChannel::new(trigger_ticks, clock_gate_ticks)
                }
            }),
            calibration: core::array::from_fn(|output| CalibrationTable::new(output, config.dac)),
            calibrated_note: DEFAULT_CALIBRATED_NOTE,
        }
    }

    /// The note stack of a monophonic voice.
    ///
    /// # Panics
    ///
    /// Panics if `voice` is not below [`QUAD_VOICE_COUNT`].
    pub fn mono(&self, voice: usize) -> &NoteStack {
        &self.mono[voice]
    }

    /// The polyphonic voice allocator.
    pub fn poly(&self) -> &VoiceAllocator {
        &self.poly
    }

    /// Cached controller state.
    pub fn controllers(&self) -> &Controllers {
        &self.controllers
    }

    /// Ticks left on a voice's forced retrigger; zero when none is pending.
    pub fn retrigger(&self, voice: usize) -> u8 {
        self.retrigger.get(voice).copied().unwrap_or(0)
    }

    /// A drum channel.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is not below [`DRUM_CHANNEL_COUNT`].
    pub fn drum(&self, channel: usize) -> &DrumChannel {
        &self.drums[channel]
    }

    /// The calibration table of a CV output.
    ///
    /// # Panics
    ///
    /// Panics if `output` is not below [`QUAD_VOICE_COUNT`].
    pub fn calibration(&self, output: usize) -> &CalibrationTable {
        &self.calibration[output]
    }

    /// The note displayed by the calibration modes.
    pub fn calibrated_note(&self) -> Note {
        self.calibrated_note
    }

    /// Converts a bent note into the calibrated DAC code of a CV output. Full pitch bend spans two semitones.
    pub fn note_to_cv(&self, note: Note, bend: i16, output: usize) -> u16 {
        let pitch = note_to_pitch(note) + (bend >> 5);
        self.calibration[output].calibrate(pitch)
    }

    /// Gate level of a voice that holds a note, given the level it had at the previous render.
    ///
    /// While a retrigger is pending, a gate that was high drops for one render so a new edge reaches the envelope.
    pub fn forced_gate(&self, voice: usize, previous: bool) -> bool {
        self.retrigger(voice) == 0 || !previous
    }

    /// Clears the transient state left behind by another mode. Polyphonic voices and calibration survive.
    pub(super) fn reset(&mut self) {
        for stack in self.mono.iter_mut() {
            stack.clear();
        }
        for drum in self.drums.iter_mut() {
            drum.stop();
        }
        self.controllers = Controllers::default();
    }
}
