//! Decoding of USB-MIDI Event Packets.
//!
//! Every packet is 32 bits long. The low nibble of the header byte is the Code Index Number (CIN), which classifies
//! the message; the remaining three bytes contain the MIDI message itself. Messages are routed by their CIN rather
//! than by their status byte, so a packet whose CIN and status disagree is still treated as the CIN describes.

use crate::midi_handler::Mode;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use thiserror::Error;
use wmidi::{Note, U7};

/// Length of a USB-MIDI Event Packet in bytes.
pub const PACKET_LEN: usize = 4;

/// Value of a centered pitch bend wheel.
const PITCH_BEND_CENTER: i16 = 8192;

/// The Code Index Numbers this device acts upon. All others are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ToPrimitive, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodeIndexNumber {
    /// Three-byte Note Off.
    NoteOff = 0x8,
    /// Three-byte Note On.
    NoteOn = 0x9,
    /// Three-byte Control Change.
    ControlChange = 0xB,
    /// Three-byte Pitch Bend Change.
    PitchBendChange = 0xE,
    /// A single byte, used here to carry System Real-Time messages.
    SingleByte = 0xF,
}

/// Reasons a chunk of bytes could not be decoded into a [`Packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// USB-MIDI Event Packets must always be 32 bits long.
    #[error("USB-MIDI Event Packets are 4 bytes long, got {len}")]
    Truncated {
        /// Number of bytes actually received.
        len: usize,
    },
    /// The Code Index Number is not one this device understands.
    #[error("unsupported Code Index Number {0:#x}")]
    UnsupportedCodeIndex(u8),
}

/// A MIDI event extracted from a [`Packet`], with data bytes already narrowed to their 7-bit types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// A key was released. Note On messages with a velocity of zero are reported as `NoteOff`, per MIDI convention.
    NoteOff {
        /// Mode selected by the message's channel.
        mode: Mode,
        /// The released key.
        note: Note,
    },
    /// A key was struck.
    NoteOn {
        /// Mode selected by the message's channel.
        mode: Mode,
        /// The struck key.
        note: Note,
        /// Strike velocity, never zero.
        velocity: U7,
    },
    /// A controller moved.
    ControlChange {
        /// Mode selected by the message's channel.
        mode: Mode,
        /// Controller number.
        control: U7,
        /// Controller value.
        value: U7,
    },
    /// The pitch wheel moved.
    PitchBend {
        /// Mode selected by the message's channel.
        mode: Mode,
        /// Signed bend amount, centered on zero (-8192..=8191).
        bend: i16,
    },
    /// A System Real-Time byte such as Timing Clock or Start.
    Realtime {
        /// The raw status byte.
        status: u8,
    },
}

/// A single validated USB-MIDI Event Packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    code_index: CodeIndexNumber,
    status: u8,
    data: [u8; 2],
}

impl TryFrom<&[u8]> for Packet {
    type Error = PacketError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let &[header, status, data_1, data_2] = bytes else {
            return Err(PacketError::Truncated { len: bytes.len() });
        };
        // the high nibble of the header is the cable number, which is not of interest
        let cin = header & 0x0F;
        let code_index =
            CodeIndexNumber::from_u8(cin).ok_or(PacketError::UnsupportedCodeIndex(cin))?;

        Ok(Self {
            code_index,
            status,
            data: [data_1, data_2],
        })
    }
}

impl Packet {
    /// Whether this packet carries a channel-voice message. Only these may change the current [`Mode`].
    pub fn is_channel_message(&self) -> bool {
        self.code_index != CodeIndexNumber::SingleByte
    }

    /// The mode addressed by the channel nibble of the status byte.
    pub fn mode(&self) -> Mode {
        Mode::from_channel(self.status)
    }

    /// Interprets the packet as a MIDI [`Event`].
    pub fn event(&self) -> Event {
        let mode = self.mode();
        let [data_1, data_2] = self.data.map(U7::from_u8_lossy);

        match self.code_index {
            CodeIndexNumber::NoteOff => Event::NoteOff {
                mode,
                note: Note::from(data_1),
            },
            CodeIndexNumber::NoteOn if u8::from(data_2) == 0 => Event::NoteOff {
                mode,
                note: Note::from(data_1),
            },
            CodeIndexNumber::NoteOn => Event::NoteOn {
                mode,
                note: Note::from(data_1),
                velocity: data_2,
            },
            CodeIndexNumber::ControlChange => Event::ControlChange {
                mode,
                control: data_1,
                value: data_2,
            },
            CodeIndexNumber::PitchBendChange => {
                let lsb = i16::from(u8::from(data_1));
                let msb = i16::from(u8::from(data_2));
                Event::PitchBend {
                    mode,
                    bend: (msb << 7) + lsb - PITCH_BEND_CENTER,
                }
            }
            CodeIndexNumber::SingleByte => Event::Realtime {
                status: self.status,
            },
        }
    }
}
