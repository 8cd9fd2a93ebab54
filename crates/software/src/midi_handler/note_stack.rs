//! Provides a struct [`NoteStack`] for tracking the held notes of a monophonic voice. Many keys may be depressed at
//! once, but only the most recently struck one sounds; releasing it hands the voice back to the key struck before it.

use tinyvec::{ArrayVec, array_vec};
use wmidi::{Note, U7};

/// Number of held notes a monophonic voice remembers.
pub const MONO_STACK_CAPACITY: usize = 6;

/// A held key and the velocity it was struck with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeldNote {
    /// The held key.
    pub note: Note,
    /// The velocity of the most recent strike.
    pub velocity: U7,
}

#[cfg(feature = "defmt")]
impl defmt::Format for HeldNote {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "{} ({}) @ {}",
            self.note.to_str(),
            u8::from(self.note),
            u8::from(self.velocity)
        );
    }
}

/// A bounded, last-note priority stack of held notes.
///
/// Internally, notes are stored as [`U7`] because [`tinyvec`] requires that items implement [`Default`]; the public
/// interface deals in [`Note`]s. Entries are kept in arrival order, oldest first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteStack<const N: usize = MONO_STACK_CAPACITY> {
    /// `(note, velocity)` pairs of the held keys, oldest first
    data: ArrayVec<[(U7, U7); N]>,
}

impl Default for NoteStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for NoteStack<N> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "NoteStack [");
        for (i, held) in self.iter().enumerate() {
            if i != 0 {
                defmt::write!(fmt, ",");
            }
            defmt::write!(fmt, " {}", held);
        }
        defmt::write!(fmt, " ]");
    }
}

impl<const N: usize> NoteStack<N> {
    /// Construct an empty `NoteStack`.
    pub fn new() -> Self {
        Self { data: array_vec!() }
    }

    /// Push a struck [`Note`], making it the most recent one.
    ///
    /// A note that is already held moves to the top with its new velocity rather than being duplicated. When the stack
    /// is full, the oldest held note is forgotten to make room.
    pub fn note_on(&mut self, note: Note, velocity: U7) {
        let key = U7::from_u8_lossy(note as u8);
        self.data.retain(|&(n, _)| n != key);
        if self.data.len() == self.data.capacity() {
            self.data.remove(0);
        }
        self.data.push((key, velocity));
    }

    /// Remove a released [`Note`]. Releasing the top note promotes the note struck before it.
    pub fn note_off(&mut self, note: Note) {
        let key = U7::from_u8_lossy(note as u8);
        self.data.retain(|&(n, _)| n != key);
    }

    /// Number of held notes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the voice is silent.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The most recently struck note still held, if any.
    pub fn most_recent(&self) -> Option<HeldNote> {
        self.data.last().map(|&(note, velocity)| HeldNote {
            note: Note::from(note),
            velocity,
        })
    }

    /// Forget every held note. The caller is responsible for silencing the gate.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Returns an [`Iterator`] over the held notes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = HeldNote> + '_ {
        self.data.iter().map(|&(note, velocity)| HeldNote {
            note: Note::from(note),
            velocity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOFT: U7 = U7::from_u8_lossy(40);
    const LOUD: U7 = U7::from_u8_lossy(120);

    fn held(note: Note, velocity: U7) -> HeldNote {
        HeldNote { note, velocity }
    }

    fn chord() -> NoteStack {
        let mut stack = NoteStack::new();
        stack.note_on(Note::E4, SOFT);
        stack.note_on(Note::C4, SOFT);
        stack.note_on(Note::G4, LOUD);
        stack
    }

    #[test]
    fn new_is_empty() {
        let stack = NoteStack::<MONO_STACK_CAPACITY>::new();
        assert!(stack.is_empty());
        assert_eq!(0, stack.len());
        assert_eq!(None, stack.most_recent());
    }

    #[test]
    fn most_recent_is_last_struck() {
        assert_eq!(
            Some(held(Note::G4, LOUD)),
            chord().most_recent(),
            "Expected left but got right"
        );
    }

    #[test]
    fn restrike_moves_to_top_without_duplicate() {
        let mut stack = chord();
        stack.note_on(Note::E4, LOUD);

        assert_eq!(3, stack.len(), "Expected no duplicate entry");
        assert_eq!(
            Some(held(Note::E4, LOUD)),
            stack.most_recent(),
            "Expected left but got right"
        );
    }

    #[test]
    fn releasing_a_buried_note_keeps_the_top() {
        let mut stack = chord();
        stack.note_off(Note::C4);

        assert_eq!(2, stack.len());
        assert_eq!(Some(held(Note::G4, LOUD)), stack.most_recent());
    }

    #[test]
    fn releasing_the_top_reveals_the_previous_note() {
        let mut stack = chord();
        stack.note_off(Note::G4);
        assert_eq!(Some(held(Note::C4, SOFT)), stack.most_recent());

        stack.note_off(Note::C4);
        assert_eq!(Some(held(Note::E4, SOFT)), stack.most_recent());
    }

    #[test]
    fn releasing_an_unheld_note_is_ignored() {
        let mut stack = chord();
        stack.note_off(Note::A4);
        assert_eq!(chord(), stack, "Expected left but got right");
    }

    #[test]
    fn overflow_forgets_the_oldest_note() {
        let mut stack = NoteStack::<MONO_STACK_CAPACITY>::new();
        for n in 60..=66 {
            stack.note_on(Note::from(U7::from_u8_lossy(n)), SOFT);
        }

        assert_eq!(MONO_STACK_CAPACITY, stack.len());
        assert_eq!(Some(Note::Db4), stack.iter().next().map(|h| h.note));
        assert_eq!(Some(Note::Gb4), stack.most_recent().map(|h| h.note));
    }

    #[test]
    fn clear() {
        let mut stack = chord();
        stack.clear();
        assert!(stack.is_empty());
    }

    #[test]
    fn iter_is_in_arrival_order() {
        let stack = chord();
        let mut iter = stack.iter();
        assert_eq!(Some(Note::E4), iter.next().map(|h| h.note));
        assert_eq!(Some(Note::C4), iter.next().map(|h| h.note));
        assert_eq!(Some(Note::G4), iter.next().map(|h| h.note));
        assert_eq!(None, iter.next());
    }
}
