use crate::{
    configuration::Config,
    packet::{Event, Packet},
    render::{Render, State},
};
use bitmask_enum::bitmask;
use wmidi::{MidiMessage, Note, U7};

mod calibration;
pub use calibration::*;

mod controllers;
pub use controllers::*;

mod drum_channel;
pub use drum_channel::*;

mod mode;
pub use mode::*;

mod note_stack;
pub use note_stack::*;

mod voice_allocator;
pub use voice_allocator::*;

mod voices;
pub use voices::*;

/// Number of monophonic voices, one per CV output.
pub const QUAD_VOICE_COUNT: usize = 4;

/// Timing Clock pulses per clock-drum cycle; drum channel 5 also fires halfway through.
const CLOCK_CYCLE: u8 = 6;

/// Operations that may be performed while parsing a buffer of packets.
#[bitmask(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// A note was struck or released.
    NoteChange,
    /// A Control Change or Pitch Bend was received.
    ControllerChange,
    /// A Timing Clock or Start message was received.
    Clock,
    /// A calibration point was nudged or a calibration note selected.
    Calibration,
    /// Voice and drum state was cleared because the mode changed.
    Reset,
}

/// The control core: routes USB-MIDI packets into the voice, drum and calibration state and renders that state into
/// the output [`State`] for the current [`Mode`].
///
/// The firmware owns exactly one instance for its whole lifetime. [`parse`](Self::parse) and [`tick`](Self::tick)
/// must not interleave; taking `&mut self` enforces this as long as the instance sits behind a mutex.
#[derive(Clone, Debug)]
pub struct MidiHandler {
    config: Config,
    mode: Mode,
    needs_refresh: bool,
    voices: Voices,
    state: State,
    /// Timing Clock pulses since the start of the current clock-drum cycle.
    clock_counter: u8,
}

impl Default for MidiHandler {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl MidiHandler {
    /// Construct a `MidiHandler` in [`Mode::MonoCvGate`] with idle voices, every output low and a render pending.
    pub fn new(config: Config) -> Self {
        Self {
            mode: Mode::default(),
            needs_refresh: true,
            voices: Voices::new(&config),
            state: State::default(),
            clock_counter: 0,
            config,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current conversion mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Voice, drum and calibration state.
    pub fn voices(&self) -> &Voices {
        &self.voices
    }

    /// Timing Clock pulses counted in the current clock-drum cycle.
    pub fn clock_counter(&self) -> u8 {
        self.clock_counter
    }

    /// Whether something changed since the last [`render`](Self::render).
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// The output state as of the last render.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Processes a buffer of USB-MIDI Event Packets in order and returns the [`Operation`]s performed.
    ///
    /// Packets that cannot be decoded, including a trailing chunk shorter than four bytes, are skipped.
    pub fn parse(&mut self, data: &[u8]) -> Operation {
        let mut operation = Operation::none();
        for chunk in data.chunks(crate::packet::PACKET_LEN) {
            match Packet::try_from(chunk) {
                Ok(packet) => operation |= self.process(packet),
                Err(e) => warn!("Skipping packet: {}", e),
            }
            self.needs_refresh = true;
        }
        operation
    }

    /// Runs the current mode's renderer if anything changed since the last render and returns the fresh state.
    pub fn refresh(&mut self) -> Option<&State> {
        if self.needs_refresh {
            Some(self.render())
        } else {
            None
        }
    }

    /// Runs the current mode's renderer, clears the refresh flag and returns the state.
    pub fn render(&mut self) -> &State {
        self.mode.renderer().render(&self.voices, &mut self.state);
        self.needs_refresh = false;
        &self.state
    }

    /// Advances drum pulses and gates and counts down pending retriggers. Called at the configured tick rate.
    pub fn tick(&mut self) {
        for drum in self.voices.drums.iter_mut() {
            drum.tick();
        }
        for retrigger in self.voices.retrigger.iter_mut() {
            *retrigger = retrigger.saturating_sub(1);
        }
        self.needs_refresh = true;
    }

    /// Renders any pending change, then ticks. Returns the state rendered before the tick, if there was one.
    ///
    /// A trigger pulse lasts a single tick by default, so ticking before a pending render would drop it without it
    /// ever reaching an output. The periodic tick should go through here rather than [`tick`](Self::tick).
    pub fn tick_after_refresh(&mut self) -> Option<State> {
        let state = self.refresh().copied();
        self.tick();
        state
    }

    fn process(&mut self, packet: Packet) -> Operation {
        let mut operation = Operation::none();
        if packet.is_channel_message() {
            let mode = packet.mode();
            if mode != self.mode && !self.config.cooperate(self.mode, mode) {
                info!("Switching from {} to {}, resetting voices", self.mode, mode);
                self.reset();
                operation |= Operation::Reset;
            }
            self.mode = mode;
        }

        operation
            | match packet.event() {
                Event::NoteOn {
                    mode,
                    note,
                    velocity,
                } => self.note_on(mode, note, velocity),
                Event::NoteOff { mode, note } => self.note_off(mode, note),
                Event::ControlChange {
                    mode,
                    control,
                    value,
                } => self.control_change(mode, control, value),
                Event::PitchBend { mode, bend } => {
                    debug!("Pitch bend {} on voice {}", bend, mode.bend_voice());
                    self.voices
                        .controllers
                        .set_pitch_bend(mode.bend_voice(), bend);
                    Operation::ControllerChange
                }
                Event::Realtime { status } => self.realtime(status),
            }
    }

    fn reset(&mut self) {
        self.voices.reset();
        self.clock_counter = 0;
    }

    fn note_on(&mut self, mode: Mode, note: Note, velocity: U7) -> Operation {
        debug!(
            "NoteOn {} ({}) velocity {} in {}",
            note.to_str(),
            u8::from(note),
            u8::from(velocity),
            mode
        );
        match mode.note_target() {
            NoteTarget::Mono(voice) => {
                let stack = &mut self.voices.mono[voice];
                // preempting a held note must produce a new gate edge unless playing legato
                self.voices.retrigger[voice] =
                    if !stack.is_empty() && !self.voices.controllers.legato(voice) {
                        self.config.retrigger_ticks()
                    } else {
                        0
                    };
                stack.note_on(note, velocity);
                Operation::NoteChange
            }
            NoteTarget::Poly => {
                let allocation = self.voices.poly.note_on(note);
                if let Some(displaced) = allocation.displaced {
                    debug!(
                        "Voice {} taken from {}",
                        allocation.voice,
                        u8::from(displaced)
                    );
                }
                self.voices.retrigger[allocation.voice] = if allocation.displaced.is_some() {
                    self.config.retrigger_ticks()
                } else {
                    0
                };
                Operation::NoteChange
            }
            NoteTarget::Drums => {
                if let Some(channel) = self.config.drum_for(note) {
                    self.voices.drums[channel].trigger_with(velocity);
                }
                Operation::NoteChange
            }
            NoteTarget::Calibration(output) => self.calibrate(output, note),
        }
    }

    fn note_off(&mut self, mode: Mode, note: Note) -> Operation {
        debug!("NoteOff {} ({}) in {}", note.to_str(), u8::from(note), mode);
        match mode.note_target() {
            NoteTarget::Mono(voice) => {
                let stack = &mut self.voices.mono[voice];
                let top = stack.most_recent().map(|held| held.note);
                stack.note_off(note);
                let new_top = stack.most_recent().map(|held| held.note);
                // falling back to an older held note is a note change too
                if new_top.is_some() && new_top != top && !self.voices.controllers.legato(voice) {
                    self.voices.retrigger[voice] = self.config.retrigger_ticks();
                }
                Operation::NoteChange
            }
            NoteTarget::Poly => {
                if self.voices.poly.note_off(note).is_none() {
                    debug!("NoteOff {} matches no voice", u8::from(note));
                }
                Operation::NoteChange
            }
            NoteTarget::Drums => {
                if let Some(channel) = self.config.drum_for(note) {
                    self.voices.drums[channel].stop();
                }
                Operation::NoteChange
            }
            NoteTarget::Calibration(_) => Operation::none(),
        }
    }

    /// A note one semitone below a calibration note nudges that point down, one above nudges it up, and the note
    /// itself only selects it for display.
    fn calibrate(&mut self, output: usize, note: Note) -> Operation {
        let note = u8::from(note);
        for (index, &calibration_note) in CALIBRATION_NOTES.iter().enumerate() {
            let delta = match note.wrapping_sub(calibration_note) {
                0 => 0,
                1 => 1,
                u8::MAX => -1,
                _ => continue,
            };
            self.voices.calibrated_note = Note::from(U7::from_u8_lossy(calibration_note));
            if delta != 0 {
                self.voices.calibration[output].adjust(index + 1, delta);
            }
            return Operation::Calibration;
        }
        Operation::none()
    }

    fn control_change(&mut self, mode: Mode, control: U7, value: U7) -> Operation {
        if let Some(slot) = Controllers::cache_slot(control) {
            self.voices.controllers.set_control_change(slot, value);
        } else if u8::from(control) == LEGATO_FOOTSWITCH {
            if let Some(voice) = mode.legato_voice() {
                self.voices.controllers.set_legato(voice, value);
            }
        } else {
            debug!(
                "Ignoring Control Change {} on channel {}",
                u8::from(control),
                mode.channel() + 1
            );
            return Operation::none();
        }
        Operation::ControllerChange
    }

    fn realtime(&mut self, status: u8) -> Operation {
        match MidiMessage::from_bytes(&[status]) {
            Ok(MidiMessage::TimingClock) => {
                self.voices.drums[4].trigger_with(U7::from_u8_lossy(0));
                self.clock_counter += 1;
                if self.clock_counter == CLOCK_CYCLE / 2 {
                    self.voices.drums[5].trigger_with(U7::from_u8_lossy(0));
                }
                if self.clock_counter >= CLOCK_CYCLE {
                    self.voices.drums[5].trigger_with(U7::from_u8_lossy(0));
                    self.voices.drums[6].trigger_with(U7::from_u8_lossy(0));
                    self.clock_counter = 0;
                }
                Operation::Clock
            }
            Ok(MidiMessage::Start) => {
                info!("Clock started");
                self.clock_counter = 0;
                self.voices.drums[7].trigger_with(U7::from_u8_lossy(0));
                Operation::Clock
            }
            _ => {
                trace!("Ignoring real-time byte {}", status);
                Operation::none()
            }
        }
    }
}
