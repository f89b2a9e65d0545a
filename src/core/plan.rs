/// Musical plan — deterministic note material derived from commit statistics.
///
/// Everything here is a pure function of `(StyleProfile, CommitAnalysis)`.
/// The only randomness is a `SeededRng` seeded with the analysis hash seed,
/// so a reloaded game rebuilds exactly the music it was saved with.

use serde::{Deserialize, Serialize};

use crate::core::audio::StepEvent;
use crate::core::rng::SeededRng;
use crate::core::style_profile::StyleProfile;
use crate::core::theory::{NoteValue, Pitch, ScaleKind, CHROMATIC};
use crate::schema::analysis::CommitAnalysis;
use crate::schema::style::Style;

pub const MELODY_STEPS: usize = 16;
const BASS_PATTERN: [usize; 8] = [0, 0, 2, 0, 1, 0, 3, 0];
const DREAD_CHORD_DEGREES: [usize; 3] = [0, 1, 6];
const CHORD_DEGREES: [usize; 4] = [0, 3, 4, 5];
const ENERGETIC_THRESHOLD: f64 = 0.6;
const REST_WEIGHT: f64 = 0.3;
const BASS_VELOCITY: f64 = 0.7;
const PAD_VELOCITY: f64 = 0.35;

const CALM_DURATIONS: [NoteValue; 3] = [NoteValue::Quarter, NoteValue::Eighth, NoteValue::Half];
const ENERGETIC_DURATIONS: [NoteValue; 3] =
    [NoteValue::Sixteenth, NoteValue::Eighth, NoteValue::Eighth];

#[rustfmt::skip]
const MARCH_KIT: [f64; 16] = [
    0.9, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0,
    0.8, 0.0, 0.3, 0.0, 0.5, 0.0, 0.0, 0.0,
];
#[rustfmt::skip]
const PULSE_KIT: [f64; 16] = [
    0.9, 0.0, 0.4, 0.0, 0.7, 0.0, 0.4, 0.2,
    0.9, 0.0, 0.4, 0.0, 0.7, 0.0, 0.4, 0.6,
];
#[rustfmt::skip]
const HEARTBEAT_KIT: [f64; 16] = [
    0.8, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.3, 0.0,
];

/// The generated material for one game: key, scale and four looped parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicalPlan {
    /// Root pitch class, 0-11 above C.
    pub root: u8,
    pub scale: ScaleKind,
    pub bpm: u32,
    /// Scale degrees across the style's melody octaves, low to high.
    pub note_pool: Vec<Pitch>,
    /// Sixteen eighth-note steps.
    pub melody: Vec<StepEvent>,
    /// Eight quarter-note steps walking the first four degrees.
    pub bass: Vec<StepEvent>,
    /// One triad per bar.
    pub chords: Vec<Vec<Pitch>>,
    /// Sixteen sixteenth-note velocities; zero is silence.
    pub percussion: Vec<f64>,
}

impl MusicalPlan {
    /// Derive the plan for a style and commit history.
    pub fn derive(profile: &StyleProfile, analysis: &CommitAnalysis) -> MusicalPlan {
        let seed = analysis.hash_seed;
        let mut rng = SeededRng::new(seed);
        let music = &profile.music;

        let root = (seed % 12) as u8;
        let scale = rng.pick(&music.scales).copied().unwrap_or(ScaleKind::Major);
        let intervals = scale.intervals();

        let (low, high) = music.melody_octaves;
        let note_pool: Vec<Pitch> = (low..=high)
            .flat_map(|octave| {
                intervals
                    .iter()
                    .map(move |&semi| Pitch::from_parts(root, semi, octave))
            })
            .collect();

        let melody = melody(&mut rng, &note_pool, analysis);
        let bass = bass_line(root, intervals, music.bass_octave);
        let chords = chords(root, intervals, music.chord_octave, profile.style.is_dread());

        MusicalPlan {
            root,
            scale,
            bpm: analysis.music.bpm,
            note_pool,
            melody,
            bass,
            chords,
            percussion: percussion_kit(profile.style).to_vec(),
        }
    }

    pub fn root_name(&self) -> &'static str {
        CHROMATIC[usize::from(self.root % 12)]
    }

    /// Pad part: each chord held for a whole bar.
    pub fn pad_steps(&self) -> Vec<StepEvent> {
        self.chords
            .iter()
            .map(|triad| StepEvent::Note {
                pitches: triad.clone(),
                duration: NoteValue::Whole,
                velocity: PAD_VELOCITY,
            })
            .collect()
    }

    /// Percussion part as hits and rests.
    pub fn percussion_steps(&self) -> Vec<StepEvent> {
        self.percussion
            .iter()
            .map(|&velocity| {
                if velocity > 0.0 {
                    StepEvent::Hit { velocity }
                } else {
                    StepEvent::Rest
                }
            })
            .collect()
    }
}

/// Melody index for a step: a deterministic sine contour over the pool.
pub fn contour_index(step: usize, hash_seed: u32, pool_len: usize) -> usize {
    if pool_len == 0 {
        return 0;
    }
    let phase = step as f64 * 0.7 + f64::from(hash_seed) * 0.001;
    (phase.sin().abs() * pool_len as f64).floor() as usize % pool_len
}

fn melody(rng: &mut SeededRng, pool: &[Pitch], analysis: &CommitAnalysis) -> Vec<StepEvent> {
    let rest_chance = analysis.fix_ratio * REST_WEIGHT;
    let durations: &[NoteValue] = if analysis.music.energy > ENERGETIC_THRESHOLD {
        &ENERGETIC_DURATIONS
    } else {
        &CALM_DURATIONS
    };

    (0..MELODY_STEPS)
        .map(|step| {
            if rng.next_f64() < rest_chance {
                return StepEvent::Rest;
            }
            let Some(&pitch) = pool.get(contour_index(step, analysis.hash_seed, pool.len())) else {
                return StepEvent::Rest;
            };
            let duration = rng.pick(durations).copied().unwrap_or(NoteValue::Eighth);
            let velocity = 0.4 + rng.next_f64() * 0.5;
            StepEvent::Note {
                pitches: vec![pitch],
                duration,
                velocity,
            }
        })
        .collect()
}

fn bass_line(root: u8, intervals: &[u8], octave: u8) -> Vec<StepEvent> {
    let degrees: Vec<Pitch> = intervals
        .iter()
        .take(4)
        .map(|&semi| Pitch::from_parts(root, semi, octave))
        .collect();
    BASS_PATTERN
        .iter()
        .filter_map(|&i| degrees.get(i).or_else(|| degrees.first()))
        .map(|&pitch| StepEvent::Note {
            pitches: vec![pitch],
            duration: NoteValue::Quarter,
            velocity: BASS_VELOCITY,
        })
        .collect()
}

fn chords(root: u8, intervals: &[u8], octave: u8, dread: bool) -> Vec<Vec<Pitch>> {
    let len = intervals.len();
    if len == 0 {
        return Vec::new();
    }
    let degrees: &[usize] = if dread {
        &DREAD_CHORD_DEGREES
    } else {
        &CHORD_DEGREES
    };
    degrees
        .iter()
        .map(|&deg| {
            [deg, deg + 2, deg + 4]
                .iter()
                .map(|&d| Pitch::from_parts(root, intervals[d % len], octave))
                .collect()
        })
        .collect()
}

fn percussion_kit(style: Style) -> &'static [f64; 16] {
    match style {
        Style::Fantasy => &MARCH_KIT,
        Style::Scifi => &PULSE_KIT,
        Style::Horror => &HEARTBEAT_KIT,
    }
}
