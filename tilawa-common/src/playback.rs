//! Playback configuration shared between the engine, persistence and API
//!
//! The configuration is caller-supplied and mutable for the lifetime of a
//! session. The engine re-reads it every time it makes a sequencing decision,
//! so a live update takes effect at the next verse end.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// End-of-playlist behavior in listening mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last verse
    #[default]
    None,
    /// Loop the last verse indefinitely
    One,
    /// Loop the whole playlist
    All,
}

impl std::fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepeatMode::None => write!(f, "none"),
            RepeatMode::One => write!(f, "one"),
            RepeatMode::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for RepeatMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(RepeatMode::None),
            "one" => Ok(RepeatMode::One),
            "all" => Ok(RepeatMode::All),
            other => Err(Error::InvalidInput(format!("Unknown repeat mode: {}", other))),
        }
    }
}

/// Which calling context a session serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Plain listening; `RepeatMode` governs the end of the playlist
    Listening,
    /// Repetition drilling; the session always ends after the last verse
    Memorization,
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Listening => write!(f, "listening"),
            PlaybackMode::Memorization => write!(f, "memorization"),
        }
    }
}

/// Longest accepted inter-verse delay
pub const MAX_INTER_VERSE_DELAY_SECS: f64 = 3600.0;

/// Repetition, delay and rate settings for a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackConfiguration {
    /// How many times each verse plays before advancing (1 = no repeat)
    pub repetitions_per_verse: u32,
    /// Pause inserted before moving to a different verse
    pub inter_verse_delay_secs: f64,
    /// Playback speed multiplier
    pub playback_rate: f64,
    pub repeat_mode: RepeatMode,
    /// Also insert the inter-verse delay before replaying the same verse
    #[serde(default)]
    pub delay_between_repetitions: bool,
}

impl Default for PlaybackConfiguration {
    fn default() -> Self {
        Self {
            repetitions_per_verse: 3,
            inter_verse_delay_secs: 3.0,
            playback_rate: 1.0,
            repeat_mode: RepeatMode::None,
            delay_between_repetitions: false,
        }
    }
}

impl PlaybackConfiguration {
    pub fn validate(&self) -> Result<()> {
        if self.repetitions_per_verse < 1 {
            return Err(Error::InvalidInput(
                "repetitionsPerVerse must be at least 1".to_string(),
            ));
        }
        if !self.inter_verse_delay_secs.is_finite()
            || self.inter_verse_delay_secs < 0.0
            || self.inter_verse_delay_secs > MAX_INTER_VERSE_DELAY_SECS
        {
            return Err(Error::InvalidInput(format!(
                "interVerseDelaySeconds must be between 0 and {} (got {})",
                MAX_INTER_VERSE_DELAY_SECS, self.inter_verse_delay_secs
            )));
        }
        if !self.playback_rate.is_finite() || self.playback_rate <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "playbackRate must be positive (got {})",
                self.playback_rate
            )));
        }
        Ok(())
    }

    /// Clamped to `0..=MAX_INTER_VERSE_DELAY_SECS`; NaN counts as no delay
    pub fn inter_verse_delay(&self) -> Duration {
        let secs = self
            .inter_verse_delay_secs
            .clamp(0.0, MAX_INTER_VERSE_DELAY_SECS);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    /// Delay before replaying the same verse
    pub fn repetition_delay(&self) -> Duration {
        if self.delay_between_repetitions {
            self.inter_verse_delay()
        } else {
            Duration::ZERO
        }
    }
}

/// Partial update of a `PlaybackConfiguration`
///
/// Fields left as `None` keep their current value. The merged result is
/// validated as a whole before it replaces the current configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationUpdate {
    pub repetitions_per_verse: Option<u32>,
    pub inter_verse_delay_secs: Option<f64>,
    pub playback_rate: Option<f64>,
    pub repeat_mode: Option<RepeatMode>,
    pub delay_between_repetitions: Option<bool>,
}

impl ConfigurationUpdate {
    pub fn repetitions(count: u32) -> Self {
        Self {
            repetitions_per_verse: Some(count),
            ..Self::default()
        }
    }

    pub fn delay(seconds: f64) -> Self {
        Self {
            inter_verse_delay_secs: Some(seconds),
            ..Self::default()
        }
    }

    pub fn rate(multiplier: f64) -> Self {
        Self {
            playback_rate: Some(multiplier),
            ..Self::default()
        }
    }

    pub fn repeat_mode(mode: RepeatMode) -> Self {
        Self {
            repeat_mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, base: &PlaybackConfiguration) -> Result<PlaybackConfiguration> {
        let merged = PlaybackConfiguration {
            repetitions_per_verse: self.repetitions_per_verse.unwrap_or(base.repetitions_per_verse),
            inter_verse_delay_secs: self.inter_verse_delay_secs.unwrap_or(base.inter_verse_delay_secs),
            playback_rate: self.playback_rate.unwrap_or(base.playback_rate),
            repeat_mode: self.repeat_mode.unwrap_or(base.repeat_mode),
            delay_between_repetitions: self
                .delay_between_repetitions
                .unwrap_or(base.delay_between_repetitions),
        };
        merged.validate()?;
        Ok(merged)
    }
}
