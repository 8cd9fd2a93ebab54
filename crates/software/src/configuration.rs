//! Tunable parameters of the control core: timing, the drum note map, the DAC's transfer characteristics and which
//! pair of channels may alternate without resetting voices.
//!
//! Configuration is volatile; nothing here is persisted.

mod dac_scale;
pub use dac_scale::*;

use crate::midi_handler::{EVENT_DRUM_COUNT, Mode};
use embassy_time::Duration;
use wmidi::Note;

/// Rate at which the firmware calls [`MidiHandler::tick`](crate::midi_handler::MidiHandler::tick).
pub const TICK_HZ: u32 = 1_000;

/// Settings consulted by the [`MidiHandler`](crate::midi_handler::MidiHandler).
///
/// Durations are converted to whole ticks at [`tick_hz`](Self::tick_hz), rounding up, so anything shorter than a
/// tick still lasts one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Frequency of the periodic tick.
    pub tick_hz: u32,
    /// How long a gate is forced low when a new note preempts one that is still held.
    pub retrigger: Duration,
    /// Width of a drum trigger pulse.
    pub trigger: Duration,
    /// Length after which the gates of the clock-driven drum channels fall by themselves; `None` holds them until the
    /// next mode reset.
    pub clock_gate: Option<Duration>,
    /// The notes striking event-driven drum channels 0 to 3.
    pub drum_notes: [Note; EVENT_DRUM_COUNT],
    /// Two modes which may alternate without resetting voice and drum state, so that two controllers can share the
    /// quad voices.
    pub cooperating_modes: (Mode, Mode),
    /// Transfer characteristics of the CV outputs.
    pub dac: DacScale,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_hz: TICK_HZ,
            retrigger: Duration::from_millis(2),
            trigger: Duration::from_millis(1),
            clock_gate: None,
            // General MIDI bass drum, snare, closed and open hi-hat
            drum_notes: [Note::C2, Note::D2, Note::E2, Note::Bb2],
            cooperating_modes: (Mode::QuadCv2, Mode::QuadCv3),
            dac: DacScale::default(),
        }
    }
}

impl Config {
    /// Number of ticks spanned by a [`Duration`], rounded up.
    pub fn ticks(&self, duration: Duration) -> u64 {
        (duration.as_micros() * u64::from(self.tick_hz)).div_ceil(1_000_000)
    }

    /// Length of a forced retrigger in ticks.
    pub fn retrigger_ticks(&self) -> u8 {
        self.ticks(self.retrigger).min(u64::from(u8::MAX)) as u8
    }

    /// Width of a drum trigger pulse in ticks.
    pub fn trigger_ticks(&self) -> u16 {
        self.ticks(self.trigger).min(u64::from(u16::MAX)) as u16
    }

    /// Auto-stop length of the clock-driven drum gates in ticks.
    pub fn clock_gate_ticks(&self) -> Option<u16> {
        self.clock_gate
            .map(|duration| self.ticks(duration).min(u64::from(u16::MAX)) as u16)
    }

    /// Whether a transition between two modes preserves voice and drum state.
    pub fn cooperate(&self, from: Mode, to: Mode) -> bool {
        let (a, b) = self.cooperating_modes;
        (from == a && to == b) || (from == b && to == a)
    }

    /// The event-driven drum channel struck by a note, if any.
    pub fn drum_for(&self, note: Note) -> Option<usize> {
        self.drum_notes.iter().position(|&n| n == note)
    }
}
