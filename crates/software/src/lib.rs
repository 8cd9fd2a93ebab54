//! This crate contains the architecture-agnostic control core of a USB-MIDI to CV/Gate converter. It consumes
//! [USB-MIDI Event Packets](https://www.usb.org/sites/default/files/midi10.pdf) and maintains a fixed-size output
//! [`State`][render::State] of four control voltages and eight gate/trigger lines which the firmware writes to its
//! DACs and shift register.
//!
//! The MIDI channel of the most recently received channel-voice message selects one of sixteen conversion
//! [modes][midi_handler::Mode]:
//!
//! | Channel | Mode |
//! |---|---|
//! | 1 | Mono CV/Gate with velocity |
//! | 2-5 | Quad CV/Gate |
//! | 6 | Poly CV |
//! | 7 | CC conversion (inert) |
//! | 8-9 | Mono CV/Gate with a cached CC |
//! | 10 | Drums with velocity |
//! | 11 | Drum triggers |
//! | 12 | Drum gates |
//! | 13-16 | Calibration of outputs 1-4 |

#![deny(missing_docs)]
#![no_std]

// must stay first so the logging macros are visible to the modules below
mod fmt;

pub mod configuration;

/// The MIDI handler and the voice, drum and calibration state it routes messages into.
pub mod midi_handler;

pub mod packet;
pub mod render;
