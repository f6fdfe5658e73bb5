//! Note table
//!
//! Equal-tempered chromatic scale anchored at octave 8. Lower octaves are derived by
//! integer division by powers of two, exactly as the LEDC `writeNote` call does on
//! hardware, so results are truncated (C4 is 261 Hz, not 261.63 Hz).

use crate::{LedcError, Result};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::fmt;

/// Highest octave supported by the note table
pub const MAX_OCTAVE: u8 = 8;

/// Octave 8 frequencies in Hz, one per semitone starting at C
pub const NOTE_FREQUENCY_BASE: [u32; 12] = [
    4186, 4435, 4699, 4978, 5274, 5588, 5920, 6272, 6645, 7040, 7459, 7902,
];

/// Chromatic note within an octave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum Note {
    /// C
    C = 0,
    /// C sharp
    Cs,
    /// D
    D,
    /// E flat
    Eb,
    /// E
    E,
    /// F
    F,
    /// F sharp
    Fs,
    /// G
    G,
    /// G sharp
    Gs,
    /// A
    A,
    /// B flat
    Bb,
    /// B
    B,
}

impl Note {
    /// All notes in ascending order
    pub const ALL: [Note; 12] = [
        Note::C,
        Note::Cs,
        Note::D,
        Note::Eb,
        Note::E,
        Note::F,
        Note::Fs,
        Note::G,
        Note::Gs,
        Note::A,
        Note::Bb,
        Note::B,
    ];

    /// Convert a raw note index (0 = C … 11 = B)
    ///
    /// # Errors
    /// Returns [`LedcError::InvalidNote`] for indices above 11.
    pub fn from_index(index: u8) -> Result<Self> {
        Note::from_u8(index).ok_or(LedcError::InvalidNote {
            note: index,
            octave: 0,
        })
    }

    /// Parse a note name such as `"A"`, `"c#"`, `"Bb"` or `"F#"`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "c" => Some(Note::C),
            "c#" | "cs" | "db" => Some(Note::Cs),
            "d" => Some(Note::D),
            "d#" | "ds" | "eb" => Some(Note::Eb),
            "e" => Some(Note::E),
            "f" => Some(Note::F),
            "f#" | "fs" | "gb" => Some(Note::Fs),
            "g" => Some(Note::G),
            "g#" | "gs" | "ab" => Some(Note::Gs),
            "a" => Some(Note::A),
            "a#" | "as" | "bb" => Some(Note::Bb),
            "b" => Some(Note::B),
            _ => None,
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Note::C => "C",
            Note::Cs => "C#",
            Note::D => "D",
            Note::Eb => "Eb",
            Note::E => "E",
            Note::F => "F",
            Note::Fs => "F#",
            Note::G => "G",
            Note::Gs => "G#",
            Note::A => "A",
            Note::Bb => "Bb",
            Note::B => "B",
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Frequency in Hz of `note` in `octave` (0..=8)
///
/// # Errors
/// Returns [`LedcError::InvalidNote`] when `octave > 8`.
pub fn note_frequency(note: Note, octave: u8) -> Result<u32> {
    if octave > MAX_OCTAVE {
        return Err(LedcError::InvalidNote {
            note: note as u8,
            octave,
        });
    }
    Ok(NOTE_FREQUENCY_BASE[note as usize] >> (MAX_OCTAVE - octave))
}
