//! Melody playback
//!
//! A melody is a list of `(frequency, duration)` steps where a frequency of 0 is a
//! rest. Steps are played one after another through [`Tone::play_tone`], with an
//! optional gap of silence between steps so repeated notes stay distinct.

use crate::tone::Tone;
use crate::{Ledc, Pin, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// One note or rest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MelodyStep {
    /// Frequency in Hz, 0 for a rest
    pub frequency: u32,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl MelodyStep {
    /// A note of `frequency` Hz
    pub const fn note(frequency: u32, duration_ms: u64) -> Self {
        MelodyStep {
            frequency,
            duration_ms,
        }
    }

    /// A rest
    pub const fn rest(duration_ms: u64) -> Self {
        MelodyStep {
            frequency: 0,
            duration_ms,
        }
    }

    /// Whether this step is silent
    pub fn is_rest(&self) -> bool {
        self.frequency == 0
    }
}

/// Two rising beeps (A4, A5)
pub const STARTUP_MELODY: &[MelodyStep] = &[MelodyStep::note(440, 150), MelodyStep::note(880, 200)];

/// Three short high beeps
pub const ERROR_MELODY: &[MelodyStep] = &[
    MelodyStep::note(1200, 100),
    MelodyStep::rest(50),
    MelodyStep::note(1200, 100),
    MelodyStep::rest(50),
    MelodyStep::note(1200, 100),
];

/// "Twinkle Twinkle Little Star", first phrase
pub const TWINKLE_MELODY: &[MelodyStep] = &[
    MelodyStep::note(262, 250),
    MelodyStep::note(262, 250),
    MelodyStep::note(392, 250),
    MelodyStep::note(392, 250),
    MelodyStep::note(440, 250),
    MelodyStep::note(440, 250),
    MelodyStep::note(392, 500),
    MelodyStep::note(349, 250),
    MelodyStep::note(349, 250),
    MelodyStep::note(330, 250),
    MelodyStep::note(330, 250),
    MelodyStep::note(294, 250),
    MelodyStep::note(294, 250),
    MelodyStep::note(262, 500),
];

/// Named sequence of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Melody {
    /// Display name
    pub name: String,
    /// Steps in playing order
    pub steps: Vec<MelodyStep>,
}

impl Melody {
    /// Create a melody from steps
    pub fn new(name: impl Into<String>, steps: impl Into<Vec<MelodyStep>>) -> Self {
        Melody {
            name: name.into(),
            steps: steps.into(),
        }
    }

    /// Built-in startup chime
    pub fn startup() -> Self {
        Self::new("startup", STARTUP_MELODY)
    }

    /// Built-in error alert
    pub fn error_alert() -> Self {
        Self::new("error", ERROR_MELODY)
    }

    /// Built-in "Twinkle Twinkle Little Star"
    pub fn twinkle() -> Self {
        Self::new("twinkle", TWINKLE_MELODY)
    }

    /// Parse a melody from JSON
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a melody from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Wall-clock length when played with `gap` between steps
    pub fn duration(&self, gap: Duration) -> Duration {
        let notes: u64 = self.steps.iter().map(|s| s.duration_ms).sum();
        let gaps = gap * self.steps.len().saturating_sub(1) as u32;
        Duration::from_millis(notes) + gaps
    }
}

/// Plays melodies on one pin through the tone facade
pub struct MelodyPlayer<'a> {
    tone: Tone<'a>,
    gap: Duration,
}

impl<'a> MelodyPlayer<'a> {
    /// Player using the controller's configured note gap
    pub fn new(ledc: &'a Ledc) -> Self {
        let gap = Duration::from_millis(ledc.config().note_gap_ms);
        MelodyPlayer {
            tone: Tone::new(ledc),
            gap,
        }
    }

    /// Override the silence between steps
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }

    /// Silence between steps
    pub fn gap(&self) -> Duration {
        self.gap
    }

    /// Play `steps` on `pin`, blocking until the last step has finished
    pub fn play_steps(&self, pin: Pin, steps: &[MelodyStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.tone.play_tone(pin, step.frequency, step.duration_ms)?;
            if i + 1 < steps.len() && !self.gap.is_zero() {
                thread::sleep(self.gap);
            }
        }
        Ok(())
    }

    /// Play `melody` on `pin`
    pub fn play(&self, pin: Pin, melody: &Melody) -> Result<()> {
        log::info!(
            "Playing melody '{}' with {} notes",
            melody.name,
            melody.steps.len()
        );
        self.play_steps(pin, &melody.steps)?;
        log::info!("Melody '{}' finished", melody.name);
        Ok(())
    }
}
