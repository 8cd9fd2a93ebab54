//! End-to-end behavior of the converter, driven through USB-MIDI packets only.

use cvpal_lib::{
    configuration::Config,
    midi_handler::{MidiHandler, Mode, Operation},
    render::State,
};

fn note_on(channel: u8, note: u8, velocity: u8) -> [u8; 4] {
    [0x09, 0x90 | channel, note, velocity]
}

fn note_off(channel: u8, note: u8) -> [u8; 4] {
    [0x08, 0x80 | channel, note, 0]
}

const CLOCK: [u8; 4] = [0x0F, 0xF8, 0, 0];

fn render(handler: &mut MidiHandler) -> State {
    *handler.render()
}

#[test]
fn note_on_then_off() {
    let mut handler = MidiHandler::default();
    let operation = handler.parse(&note_on(0, 60, 100));
    assert!(operation.contains(Operation::NoteChange));

    let state = render(&mut handler);
    let expected = handler.voices().calibration(0).calibrate(60 << 7);
    assert_eq!(expected, state.cv[0], "Expected left but got right");
    assert_eq!(100 << 5, state.cv[1]);
    assert_eq!([true; 4], state.gates[..4]);

    handler.parse(&note_off(0, 60));
    let state = render(&mut handler);
    assert_eq!([false; 4], state.gates[..4]);
    assert_eq!(expected, state.cv[0], "CV should hold the last note");
}

#[test]
fn most_recent_held_note_sounds() {
    let mut handler = MidiHandler::default();
    for note in [60, 64, 67] {
        handler.parse(&note_on(0, note, 100));
    }
    handler.parse(&note_off(0, 67));
    handler.parse(&note_off(0, 60));

    let state = render(&mut handler);
    assert_eq!(handler.voices().note_to_cv(wmidi::Note::E4, 0, 0), state.cv[0]);
}

#[test]
fn note_stack_forgets_oldest() {
    let mut handler = MidiHandler::default();
    for note in 60..67 {
        handler.parse(&note_on(0, note, 100));
    }
    for note in (61..67).rev() {
        handler.parse(&note_off(0, note));
    }
    assert!(
        handler.voices().mono(0).is_empty(),
        "The seventh note should have pushed out the first"
    );
    assert!(!render(&mut handler).gates[0]);
}

#[test]
fn fifth_poly_note_steals_least_recent_voice() {
    let mut handler = MidiHandler::default();
    for note in [48, 52, 55, 60] {
        handler.parse(&note_on(5, note, 100));
    }
    render(&mut handler);

    handler.parse(&note_on(5, 64, 100));
    let state = render(&mut handler);
    assert_eq!(handler.voices().note_to_cv(wmidi::Note::E4, 0, 0), state.cv[0]);
    assert!(!state.gates[0], "Stolen voice should retrigger");
    assert!(state.gates[1..4].iter().all(|&gate| gate));

    assert!(render(&mut handler).gates[0]);
}

#[test]
fn retrigger_expires() {
    let mut handler = MidiHandler::default();
    handler.parse(&note_on(0, 60, 100));
    render(&mut handler);
    handler.parse(&note_on(0, 62, 100));

    let config = Config::default();
    for _ in 0..config.retrigger_ticks() {
        handler.tick();
    }
    assert_eq!(0, handler.voices().retrigger(0));
    assert!(render(&mut handler).gates[0], "Gate stays high once the retrigger expired");
}

#[test]
fn clock_pulses_on_gates() {
    let mut handler = MidiHandler::default();
    handler.parse(&note_on(10, 36, 100));

    let mut counts = [0; 8];
    for _ in 0..12 {
        handler.parse(&CLOCK);
        for (count, gate) in counts.iter_mut().zip(render(&mut handler).gates) {
            *count += usize::from(gate);
        }
        handler.tick();
    }
    assert_eq!([1, 0, 0, 0, 12, 4, 2, 0], counts, "Expected left but got right");
}

#[test]
fn mode_switch_resets_unless_paired() {
    let mut handler = MidiHandler::default();
    handler.parse(&note_on(0, 60, 100));
    let operation = handler.parse(&note_on(8, 36, 100));
    assert!(operation.contains(Operation::Reset));
    assert_eq!(Mode::MonoCvGateCcB, handler.mode());
    assert!(handler.voices().mono(0).is_empty());

    handler.parse(&note_on(2, 60, 100));
    let operation = handler.parse(&note_on(3, 64, 100));
    assert!(!operation.contains(Operation::Reset));
    let operation = handler.parse(&note_on(2, 62, 100));
    assert!(!operation.contains(Operation::Reset));
    assert_eq!(2, handler.voices().mono(1).len());
    assert_eq!(1, handler.voices().mono(2).len());
}

#[test]
fn calibration_roundtrip() {
    let mut handler = MidiHandler::default();
    let before = handler.voices().calibration(2).calibrate(72 << 7);

    handler.parse(&note_on(14, 73, 100));
    assert_eq!(before + 1, handler.voices().calibration(2).calibrate(72 << 7));

    handler.parse(&note_on(14, 71, 100));
    assert_eq!(before, handler.voices().calibration(2).calibrate(72 << 7));
    assert_eq!(render(&mut handler).cv[2], before);
}

#[test]
fn calibration_interpolates_between_points() {
    let mut handler = MidiHandler::default();
    // raise the point at note 60 by four codes
    for _ in 0..4 {
        handler.parse(&note_on(12, 61, 100));
    }
    let table = handler.voices().calibration(0);
    let nominal = |note: i16| (i32::from(note) * 500 / 12) as u16;

    assert_eq!(nominal(60) + 4, table.calibrate(60 << 7));
    assert_eq!(nominal(63) + 2, table.calibrate(63 << 7));
    assert_eq!(nominal(66), table.calibrate(66 << 7));
    assert_eq!(nominal(54), table.calibrate(54 << 7));
}

#[test]
fn refresh_follows_activity() {
    let mut handler = MidiHandler::default();
    assert!(handler.refresh().is_some(), "A fresh handler renders once");
    assert!(handler.refresh().is_none());

    handler.parse(&CLOCK);
    assert!(handler.needs_refresh());
    assert!(handler.refresh().is_some());
}
