//! Rendering of [`Voices`] into the output [`State`].
//!
//! Each [`Mode`](crate::midi_handler::Mode) has a [`Renderer`] which writes some subset of the outputs. Fields a
//! renderer does not address keep whatever value they last had; the state is initialized once and never cleared, so
//! switching modes never produces a spurious gap on an output the new mode does not use.

use crate::midi_handler::{DRUM_CHANNEL_COUNT, QUAD_VOICE_COUNT, Voices, u7_to_code};
use enum_dispatch::enum_dispatch;

/// Number of CV outputs.
pub const CV_OUTPUT_COUNT: usize = QUAD_VOICE_COUNT;

/// Number of gate/trigger outputs.
pub const GATE_COUNT: usize = DRUM_CHANNEL_COUNT;

/// The values the output drivers write to the hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct State {
    /// DAC codes of the CV outputs.
    pub cv: [u16; CV_OUTPUT_COUNT],
    /// Levels of the gate/trigger outputs.
    pub gates: [bool; GATE_COUNT],
}

impl State {
    /// Gate levels packed into a byte for a shift register, gate 0 in the least significant bit.
    pub fn packed_gates(&self) -> u8 {
        self.gates
            .iter()
            .enumerate()
            .fold(0, |byte, (i, &gate)| byte | (u8::from(gate) << i))
    }
}

/// A strategy writing [`Voices`] to the outputs.
#[enum_dispatch]
pub trait Render {
    /// Update the fields of `state` this strategy is responsible for.
    fn render(&self, voices: &Voices, state: &mut State);
}

/// The renderer of each mode, dispatched statically.
#[enum_dispatch(Render)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Renderer {
    /// See [`MonoCvGate`].
    MonoCvGate,
    /// See [`QuadCvGate`].
    QuadCvGate,
    /// See [`PolyCv`].
    PolyCv,
    /// See [`CcConversion`].
    CcConversion,
    /// See [`MonoCvGateCc`].
    MonoCvGateCc,
    /// See [`DrumVelocity`].
    DrumVelocity,
    /// See [`DrumTrigger`].
    DrumTrigger,
    /// See [`DrumGate`].
    DrumGate,
    /// See [`Calibration`].
    Calibration,
}

/// Gates 4 to 7 pulse with the clock-driven drum channels.
fn clock_triggers(voices: &Voices, state: &mut State) {
    for channel in 4..GATE_COUNT {
        state.gates[channel] = voices.drum(channel).trigger();
    }
}

/// Voice 0 on CV 1 with its velocity on CV 2 and CC1/CC2 on CVs 3 and 4. Gates 0 to 3 all follow the voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonoCvGate;

impl Render for MonoCvGate {
    fn render(&self, voices: &Voices, state: &mut State) {
        let gate = match voices.mono(0).most_recent() {
            Some(held) => {
                let controllers = voices.controllers();
                state.cv[0] = voices.note_to_cv(held.note, controllers.pitch_bend(0), 0);
                state.cv[1] = u7_to_code(held.velocity);
                state.cv[2] = u7_to_code(controllers.control_change(0));
                state.cv[3] = u7_to_code(controllers.control_change(1));
                voices.forced_gate(0, state.gates[0])
            }
            None => false,
        };
        state.gates[..QUAD_VOICE_COUNT].fill(gate);
        clock_triggers(voices, state);
    }
}

/// Four independent voices, each with its own bend, on CVs and gates 0 to 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuadCvGate;

impl Render for QuadCvGate {
    fn render(&self, voices: &Voices, state: &mut State) {
        for voice in 0..QUAD_VOICE_COUNT {
            state.gates[voice] = match voices.mono(voice).most_recent() {
                Some(held) => {
                    let bend = voices.controllers().pitch_bend(voice);
                    state.cv[voice] = voices.note_to_cv(held.note, bend, voice);
                    voices.forced_gate(voice, state.gates[voice])
                }
                None => false,
            };
        }
        clock_triggers(voices, state);
    }
}

/// The polyphonic pool on CVs and gates 0 to 3. All voices share the first voice's bend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolyCv;

impl Render for PolyCv {
    fn render(&self, voices: &Voices, state: &mut State) {
        let bend = voices.controllers().pitch_bend(0);
        for voice in 0..QUAD_VOICE_COUNT {
            state.gates[voice] = match voices.poly().note(voice) {
                Some(note) => {
                    state.cv[voice] = voices.note_to_cv(note, bend, voice);
                    voices.forced_gate(voice, state.gates[voice])
                }
                None => false,
            };
        }
        clock_triggers(voices, state);
    }
}

/// Reserved for converting Control Changes to CVs; leaves every output untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CcConversion;

impl Render for CcConversion {
    fn render(&self, _voices: &Voices, _state: &mut State) {}
}

/// [`MonoCvGate`] with a cached CC on CV 2 instead of velocity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonoCvGateCc {
    /// Slot of the cached CC written to CV 2.
    pub slot: usize,
}

impl Render for MonoCvGateCc {
    fn render(&self, voices: &Voices, state: &mut State) {
        MonoCvGate.render(voices, state);
        state.cv[1] = u7_to_code(voices.controllers().control_change(self.slot));
    }
}

/// Event-driven drums with their velocities on the CVs and their gates on gates 0 to 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrumVelocity;

impl Render for DrumVelocity {
    fn render(&self, voices: &Voices, state: &mut State) {
        for channel in 0..CV_OUTPUT_COUNT {
            let drum = voices.drum(channel);
            state.cv[channel] = u7_to_code(drum.velocity());
            state.gates[channel] = drum.gate();
        }
        clock_triggers(voices, state);
    }
}

/// Trigger pulses of all eight drum channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrumTrigger;

impl Render for DrumTrigger {
    fn render(&self, voices: &Voices, state: &mut State) {
        for (channel, gate) in state.gates.iter_mut().enumerate() {
            *gate = voices.drum(channel).trigger();
        }
    }
}

/// Gates of all eight drum channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrumGate;

impl Render for DrumGate {
    fn render(&self, voices: &Voices, state: &mut State) {
        for (channel, gate) in state.gates.iter_mut().enumerate() {
            *gate = voices.drum(channel).gate();
        }
    }
}

/// The calibrated note on every CV output, each through its own calibration table, with gates 0 to 3 held high.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Calibration;

impl Render for Calibration {
    fn render(&self, voices: &Voices, state: &mut State) {
        state.gates[..CV_OUTPUT_COUNT].fill(true);
        let note = voices.calibrated_note();
        for (output, cv) in state.cv.iter_mut().enumerate() {
            *cv = voices.note_to_cv(note, 0, output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi_handler::MidiHandler;

    fn handler_with(packets: &[[u8; 4]]) -> MidiHandler {
        let mut handler = MidiHandler::default();
        for packet in packets {
            handler.parse(packet);
        }
        handler
    }

    #[test]
    fn gate_packing() {
        let mut state = State::default();
        assert_eq!(0, state.packed_gates());
        state.gates[0] = true;
        assert_eq!(0b0000_0001, state.packed_gates());
        state.gates = [false, false, false, false, true, true, true, true];
        assert_eq!(0b1111_0000, state.packed_gates(), "Expected left but got right");
    }

    #[test]
    fn mono_cv_gate() {
        let mut handler = handler_with(&[[0x0B, 0xB0, 1, 64], [0x09, 0x90, 72, 127]]);
        let state = *handler.render();
        assert_eq!([3000, 127 << 5, 64 << 5, 0], state.cv, "Expected left but got right");
        assert_eq!([true; QUAD_VOICE_COUNT], state.gates[..QUAD_VOICE_COUNT]);
    }

    #[test]
    fn pitch_bend_shifts_cv() {
        // full upward bend is two semitones
        let mut handler = handler_with(&[[0x0E, 0xE0, 0x7F, 0x7F], [0x09, 0x90, 60, 100]]);
        let bent = handler.render().cv[0];
        assert_eq!(2500 + 83, bent, "Expected left but got right");
    }

    #[test]
    fn released_voice_keeps_cv() {
        let mut handler = handler_with(&[[0x09, 0x90, 60, 100]]);
        handler.render();
        handler.parse(&[0x08, 0x80, 60, 0]);
        let state = handler.render();
        assert_eq!(2500, state.cv[0]);
        assert!(!state.gates[0]);
    }

    #[test]
    fn retrigger_drops_gate_for_one_render() {
        let mut handler = handler_with(&[[0x09, 0x92, 60, 100]]);
        assert!(handler.render().gates[1]);

        handler.parse(&[0x09, 0x92, 62, 100]);
        assert!(!handler.render().gates[1], "Gate should drop while the retrigger is pending");
        assert!(handler.render().gates[1], "Gate should rise again on the next render");
        handler.tick();
        handler.tick();
        assert!(handler.render().gates[1]);
    }

    #[test]
    fn quad_voices_are_independent() {
        let mut handler = handler_with(&[[0x09, 0x92, 48, 100], [0x09, 0x93, 72, 100]]);
        let state = *handler.render();
        assert_eq!([0, 2000, 3000, 0], state.cv, "Expected left but got right");
        assert_eq!([false, true, true, false], state.gates[..QUAD_VOICE_COUNT]);
    }

    #[test]
    fn poly_voices() {
        let mut handler = handler_with(&[[0x09, 0x95, 60, 100], [0x09, 0x95, 72, 100]]);
        let state = *handler.render();
        assert_eq!([2500, 3000], state.cv[..2]);
        assert_eq!([true, true, false, false], state.gates[..QUAD_VOICE_COUNT]);
    }

    #[test]
    fn cc_conversion_leaves_outputs_untouched() {
        let mut handler = handler_with(&[[0x09, 0x90, 60, 100]]);
        let before = *handler.render();
        handler.parse(&[0x0B, 0xB6, 1, 127]);
        assert_eq!(before, *handler.render());
    }

    #[test]
    fn mono_cv_gate_cc_replaces_velocity() {
        let mut handler = handler_with(&[
            [0x0B, 0xB7, 2, 10],
            [0x09, 0x97, 60, 100],
        ]);
        let state = *handler.render();
        assert_eq!(2500, state.cv[0]);
        assert_eq!(10 << 5, state.cv[1], "Expected left but got right");
    }

    #[test]
    fn drum_velocity() {
        let mut handler = handler_with(&[[0x09, 0x99, 40, 64]]);
        let state = *handler.render();
        assert_eq!([0, 0, 64 << 5, 0], state.cv, "Expected left but got right");
        assert_eq!([false, false, true, false], state.gates[..QUAD_VOICE_COUNT]);
    }

    #[test]
    fn drum_trigger_and_gate() {
        let mut handler = handler_with(&[[0x09, 0x9A, 36, 100], [0x0F, 0xF8, 0, 0]]);
        let state = *handler.render();
        assert_eq!(
            [true, false, false, false, true, false, false, false],
            state.gates,
            "Expected left but got right"
        );

        handler.tick();
        assert_eq!([false; GATE_COUNT], handler.render().gates, "Triggers fall after a tick");

        let mut handler = handler_with(&[[0x0B, 0xBB, 74, 0], [0x0F, 0xF8, 0, 0]]);
        handler.tick();
        assert!(handler.render().gates[4], "Gates outlive the trigger");
    }

    #[test]
    fn calibration_leaves_clock_gates_untouched() {
        let mut handler = handler_with(&[[0x0F, 0xF8, 0, 0]]);
        assert!(handler.render().gates[4]);

        handler.parse(&[0x09, 0x9C, 60, 100]);
        handler.tick();
        let state = *handler.render();
        assert!(!handler.voices().drum(4).trigger());
        assert_eq!(
            [true, true, true, true, true, false, false, false],
            state.gates,
            "Expected left but got right"
        );
    }

    #[test]
    fn calibration_shows_calibrated_note() {
        let mut handler = handler_with(&[[0x09, 0x9C, 73, 100]]);
        let state = *handler.render();
        assert_eq!([3001, 3000, 3000, 3000], state.cv, "Expected left but got right");
        assert_eq!([true; QUAD_VOICE_COUNT], state.gates[..QUAD_VOICE_COUNT]);
    }
}
