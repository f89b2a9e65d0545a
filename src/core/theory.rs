/// Pitch, scale, and note-value vocabulary for the composer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chromatic pitch-class names, indexed by semitone above C.
pub const CHROMATIC: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scales a style may prefer. Intervals are semitones above the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleKind {
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    HarmonicMinor,
    PentatonicMajor,
    PentatonicMinor,
}

impl ScaleKind {
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Self::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Self::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Self::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Self::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Self::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Self::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Self::PentatonicMajor => &[0, 2, 4, 7, 9],
            Self::PentatonicMinor => &[0, 3, 5, 7, 10],
        }
    }

    pub fn degree_count(&self) -> usize {
        self.intervals().len()
    }
}

/// A concrete pitch as a MIDI note number (C4 = 60).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pitch(pub u8);

impl Pitch {
    /// Pitch for a pitch class (0-11) plus semitone offset in a given octave.
    pub fn from_parts(root_pc: u8, semitones: u8, octave: u8) -> Pitch {
        let midi = (u16::from(octave) + 1) * 12 + u16::from(root_pc) + u16::from(semitones);
        Pitch(midi.min(127) as u8)
    }

    pub fn pitch_class(&self) -> u8 {
        self.0 % 12
    }

    /// Scientific octave number (MIDI 60 is octave 4).
    pub fn octave(&self) -> i8 {
        (self.0 / 12) as i8 - 1
    }

    /// Note name such as "C#4".
    pub fn name(&self) -> String {
        format!("{}{}", CHROMATIC[usize::from(self.pitch_class())], self.octave())
    }

    pub fn frequency(&self) -> f64 {
        440.0 * 2f64.powf((f64::from(self.0) - 69.0) / 12.0)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Note value relative to a 4/4 bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl NoteValue {
    /// Transport notation ("4n", "8n", ...).
    pub fn notation(&self) -> &'static str {
        match self {
            Self::Whole => "1n",
            Self::Half => "2n",
            Self::Quarter => "4n",
            Self::Eighth => "8n",
            Self::Sixteenth => "16n",
        }
    }

    /// Length in beats (quarter notes).
    pub fn beats(&self) -> f64 {
        match self {
            Self::Whole => 4.0,
            Self::Half => 2.0,
            Self::Quarter => 1.0,
            Self::Eighth => 0.5,
            Self::Sixteenth => 0.25,
        }
    }

    /// Length in seconds at a tempo.
    pub fn seconds(&self, bpm: u32) -> f64 {
        self.beats() * 60.0 / f64::from(bpm.max(1))
    }
}

/// Linear gain (0..1) to decibels, floored at `floor_db`.
pub fn gain_to_db(gain: f64, floor_db: f64) -> f64 {
    if gain <= 0.0 {
        return floor_db;
    }
    (20.0 * gain.log10()).max(floor_db)
}
