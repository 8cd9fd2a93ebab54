//! Provides a struct [`VoiceAllocator`] which spreads incoming notes across a fixed pool of voices.

use wmidi::Note;

/// Number of voices in the polyphonic pool, one per CV output.
pub const POLY_VOICE_COUNT: usize = 4;

/// The outcome of assigning a note to a voice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Allocation {
    /// Index of the voice now playing the note.
    pub voice: usize,
    /// The note the voice was playing before, if any. Present when a voice was stolen or a held note was struck again.
    pub displaced: Option<Note>,
}

/// Assigns notes to a fixed pool of `N` voices.
///
/// A struck note goes to the least recently triggered free voice. When every voice is busy, the least recently
/// triggered voice is stolen and its note is silently forgotten: no Note Off is synthesized for it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceAllocator<const N: usize = POLY_VOICE_COUNT> {
    /// The note held by each voice.
    notes: [Option<Note>; N],
    /// Voice indices ordered from least to most recently triggered.
    recency: [usize; N],
}

impl Default for VoiceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for VoiceAllocator<N> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "VoiceAllocator [");
        for note in self.notes.iter() {
            defmt::write!(fmt, " {}", note.map(|n| u8::from(n)));
        }
        defmt::write!(fmt, " ]");
    }
}

impl<const N: usize> VoiceAllocator<N> {
    /// Construct a `VoiceAllocator` with every voice free.
    pub fn new() -> Self {
        Self {
            notes: [None; N],
            recency: core::array::from_fn(|voice| voice),
        }
    }

    /// Assign a struck [`Note`] to a voice and return the [`Allocation`].
    ///
    /// A note that is already held keeps its voice.
    pub fn note_on(&mut self, note: Note) -> Allocation {
        let voice = self
            .voice_of(note)
            .or_else(|| {
                self.recency
                    .iter()
                    .copied()
                    .find(|&voice| self.notes[voice].is_none())
            })
            .unwrap_or(self.recency[0]);

        let displaced = self.notes[voice].replace(note);
        self.touch(voice);
        Allocation { voice, displaced }
    }

    /// Release a [`Note`], returning the voice that held it, or `None` if no voice holds it (e.g., it was stolen).
    pub fn note_off(&mut self, note: Note) -> Option<usize> {
        let voice = self.voice_of(note)?;
        self.notes[voice] = None;
        Some(voice)
    }

    /// The note held by a voice. Out-of-range voices hold nothing.
    pub fn note(&self, voice: usize) -> Option<Note> {
        self.notes.get(voice).copied().flatten()
    }

    /// Number of voices currently holding a note.
    pub fn active_count(&self) -> usize {
        self.notes.iter().filter(|note| note.is_some()).count()
    }

    fn voice_of(&self, note: Note) -> Option<usize> {
        self.notes.iter().position(|&held| held == Some(note))
    }

    /// Moves a voice to the most recently triggered position.
    fn touch(&mut self, voice: usize) {
        if let Some(position) = self.recency.iter().position(|&v| v == voice) {
            self.recency[position..].rotate_left(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_free_voices_in_order() {
        let mut allocator = VoiceAllocator::<POLY_VOICE_COUNT>::new();
        let voices = [Note::C4, Note::E4, Note::G4, Note::B4].map(|n| allocator.note_on(n).voice);

        assert_eq!([0, 1, 2, 3], voices, "Expected left but got right");
        assert_eq!(4, allocator.active_count());
    }

    #[test]
    fn steals_least_recently_triggered_voice() {
        let mut allocator = VoiceAllocator::<POLY_VOICE_COUNT>::new();
        for note in [Note::C4, Note::E4, Note::G4, Note::B4] {
            allocator.note_on(note);
        }

        let allocation = allocator.note_on(Note::D5);
        assert_eq!(
            Allocation {
                voice: 0,
                displaced: Some(Note::C4)
            },
            allocation,
            "Expected left but got right"
        );
        assert_eq!(4, allocator.active_count());
        assert_eq!(
            None,
            allocator.note_off(Note::C4),
            "Stolen note should no longer resolve to a voice"
        );
    }

    #[test]
    fn note_off_frees_its_voice() {
        let mut allocator = VoiceAllocator::<POLY_VOICE_COUNT>::new();
        allocator.note_on(Note::C4);
        allocator.note_on(Note::E4);

        assert_eq!(Some(1), allocator.note_off(Note::E4));
        assert_eq!(None, allocator.note(1));
        assert_eq!(Some(Note::C4), allocator.note(0));
    }

    #[test]
    fn note_off_for_unheld_note_is_none() {
        let mut allocator = VoiceAllocator::<POLY_VOICE_COUNT>::new();
        assert_eq!(None, allocator.note_off(Note::C4));
    }

    #[test]
    fn prefers_least_recently_used_free_voice() {
        let mut allocator = VoiceAllocator::<POLY_VOICE_COUNT>::new();
        for note in [Note::C4, Note::E4, Note::G4, Note::B4] {
            allocator.note_on(note);
        }
        allocator.note_off(Note::G4);
        allocator.note_off(Note::E4);

        // voice 1 was triggered before voice 2, so it is reused first
        assert_eq!(1, allocator.note_on(Note::A4).voice);
        assert_eq!(2, allocator.note_on(Note::F4).voice);
    }

    #[test]
    fn restrike_keeps_voice() {
        let mut allocator = VoiceAllocator::<POLY_VOICE_COUNT>::new();
        allocator.note_on(Note::C4);
        allocator.note_on(Note::E4);

        assert_eq!(
            Allocation {
                voice: 0,
                displaced: Some(Note::C4)
            },
            allocator.note_on(Note::C4)
        );
        assert_eq!(2, allocator.active_count());
    }

    #[test]
    fn steal_order_follows_retriggering() {
        let mut allocator = VoiceAllocator::<POLY_VOICE_COUNT>::new();
        for note in [Note::C4, Note::E4, Note::G4, Note::B4] {
            allocator.note_on(note);
        }
        // striking C4 again makes voice 1 the least recently triggered
        allocator.note_on(Note::C4);

        assert_eq!(
            Some(Note::E4),
            allocator.note_on(Note::D5).displaced,
            "Expected left but got right"
        );
    }

    #[test]
    fn out_of_range_voice_holds_nothing() {
        let mut allocator = VoiceAllocator::<POLY_VOICE_COUNT>::new();
        allocator.note_on(Note::C4);
        assert_eq!(None, allocator.note(POLY_VOICE_COUNT));
    }
}
