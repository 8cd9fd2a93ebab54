//! Provides the [`Mode`] enum. The MIDI channel of the latest channel-voice message selects how the device converts
//! MIDI: which subsystem Note events feed and how the outputs are rendered.

use crate::render::{
    Calibration, CcConversion, DrumGate, DrumTrigger, DrumVelocity, MonoCvGate, MonoCvGateCc,
    PolyCv, QuadCvGate, Renderer,
};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// A conversion mode, numbered after the zero-based MIDI channel that selects it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ToPrimitive, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mono CV/Gate: pitch, velocity and CC1/CC2 of a single voice; all four gates follow it.
    #[default]
    MonoCvGate = 0,
    /// Quad CV/Gate, addressing voice 1.
    QuadCv1 = 1,
    /// Quad CV/Gate, addressing voice 2.
    QuadCv2 = 2,
    /// Quad CV/Gate, addressing voice 3.
    QuadCv3 = 3,
    /// Quad CV/Gate, addressing voice 4.
    QuadCv4 = 4,
    /// Poly CV: four voices allocated from a shared pool.
    PolyCv = 5,
    /// CC conversion. Reserved; renders nothing.
    CcConversion = 6,
    /// Mono CV/Gate with the second cached CC in place of velocity.
    MonoCvGateCcA = 7,
    /// Mono CV/Gate with the third cached CC in place of velocity.
    MonoCvGateCcB = 8,
    /// Drums with velocity on the CV outputs.
    DrumVelocity = 9,
    /// Drum trigger pulses on all eight gates.
    DrumTrigger = 10,
    /// Drum gates on all eight gates.
    DrumGate = 11,
    /// Calibration of CV output 1.
    Calibration1 = 12,
    /// Calibration of CV output 2.
    Calibration2 = 13,
    /// Calibration of CV output 3.
    Calibration3 = 14,
    /// Calibration of CV output 4.
    Calibration4 = 15,
}

/// The subsystem receiving Note On/Off messages in a given [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NoteTarget {
    /// The note stack of a monophonic voice.
    Mono(usize),
    /// The polyphonic voice allocator.
    Poly,
    /// The event-driven drum channels.
    Drums,
    /// The calibration table of a CV output.
    Calibration(usize),
}

impl Mode {
    /// The mode selected by the channel nibble of a status byte.
    pub fn from_channel(status: u8) -> Self {
        Self::from_u8(status & 0x0F).unwrap_or_default()
    }

    /// Zero-based MIDI channel selecting this mode.
    pub fn channel(self) -> u8 {
        self as u8
    }

    /// The monophonic voice addressed by this mode's channel, if it addresses one.
    pub fn mono_voice(self) -> Option<usize> {
        match self {
            Self::MonoCvGate
            | Self::QuadCv1
            | Self::CcConversion
            | Self::MonoCvGateCcA
            | Self::DrumGate => Some(0),
            Self::QuadCv2 => Some(1),
            Self::QuadCv3 => Some(2),
            Self::QuadCv4 => Some(3),
            _ => None,
        }
    }

    /// The voice whose pitch bend this mode's channel controls. Channels without a voice of their own bend voice 0.
    pub fn bend_voice(self) -> usize {
        self.mono_voice().unwrap_or(0)
    }

    /// The voice whose legato footswitch this mode's channel controls. Only the first five channels have one.
    pub fn legato_voice(self) -> Option<usize> {
        if self.channel() <= Self::QuadCv4.channel() {
            self.mono_voice()
        } else {
            None
        }
    }

    /// Where Note On/Off messages go in this mode.
    pub fn note_target(self) -> NoteTarget {
        match self {
            Self::PolyCv => NoteTarget::Poly,
            Self::MonoCvGateCcB | Self::DrumVelocity | Self::DrumTrigger => NoteTarget::Drums,
            Self::Calibration1 => NoteTarget::Calibration(0),
            Self::Calibration2 => NoteTarget::Calibration(1),
            Self::Calibration3 => NoteTarget::Calibration(2),
            Self::Calibration4 => NoteTarget::Calibration(3),
            mono => NoteTarget::Mono(mono.bend_voice()),
        }
    }

    /// The strategy rendering the outputs in this mode.
    pub fn renderer(self) -> Renderer {
        match self {
            Self::MonoCvGate => MonoCvGate.into(),
            Self::QuadCv1 | Self::QuadCv2 | Self::QuadCv3 | Self::QuadCv4 => QuadCvGate.into(),
            Self::PolyCv => PolyCv.into(),
            Self::CcConversion => CcConversion.into(),
            Self::MonoCvGateCcA | Self::MonoCvGateCcB => MonoCvGateCc {
                slot: usize::from(self.channel() - Self::CcConversion.channel()),
            }
            .into(),
            Self::DrumVelocity => DrumVelocity.into(),
            Self::DrumTrigger => DrumTrigger.into(),
            Self::DrumGate => DrumGate.into(),
            Self::Calibration1 | Self::Calibration2 | Self::Calibration3 | Self::Calibration4 => {
                Calibration.into()
            }
        }
    }
}
