//! Domain types: verses, surahs, saved sections and verse ranges
//!
//! A `Verse` is the immutable unit of playback content. Playlists are plain
//! `Vec<Verse>` values built by the content layer and handed to a session,
//! which never re-sorts them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of surahs in the Quran
pub const SURAH_COUNT: u16 = 114;

/// One verse (ayah) with its audio sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verse {
    /// Absolute verse number across the whole text (1-based)
    pub global_number: u32,
    pub surah_number: u16,
    pub number_in_surah: u16,
    /// Display text, only used by presentation code
    #[serde(default)]
    pub text: String,
    /// Main audio source
    #[serde(default)]
    pub primary_audio_url: Option<String>,
    /// Alternate sources, tried in order after the primary
    #[serde(default)]
    pub fallback_audio_urls: Vec<String>,
}

impl Verse {
    pub fn position(&self) -> VersePosition {
        VersePosition {
            surah: self.surah_number,
            ayah: self.number_in_surah,
        }
    }

    /// Human-readable label, e.g. "2:255"
    pub fn label(&self) -> String {
        format!("{}:{}", self.surah_number, self.number_in_surah)
    }
}

/// A chapter with its verses in ascending `number_in_surah` order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surah {
    pub number: u16,
    pub name: String,
    pub english_name: String,
    pub verses: Vec<Verse>,
}

/// Location of a verse: surah number plus in-surah number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersePosition {
    pub surah: u16,
    pub ayah: u16,
}

impl VersePosition {
    pub fn new(surah: u16, ayah: u16) -> Self {
        Self { surah, ayah }
    }

    pub fn validate(&self) -> Result<()> {
        validate_surah_number(self.surah)?;
        if self.ayah == 0 {
            return Err(Error::InvalidInput(format!(
                "Ayah numbers start at 1 (got {}:{})",
                self.surah, self.ayah
            )));
        }
        Ok(())
    }
}

/// Inclusive verse range, possibly spanning several surahs (juz, hizb, page)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseRange {
    pub start: VersePosition,
    pub end: VersePosition,
}

impl VerseRange {
    pub fn new(start: VersePosition, end: VersePosition) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Range covering `start_ayah..=end_ayah` of a single surah
    pub fn within_surah(surah: u16, start_ayah: u16, end_ayah: u16) -> Result<Self> {
        Self::new(
            VersePosition::new(surah, start_ayah),
            VersePosition::new(surah, end_ayah),
        )
    }

    pub fn validate(&self) -> Result<()> {
        self.start.validate()?;
        self.end.validate()?;
        if self.start > self.end {
            return Err(Error::InvalidInput(format!(
                "Range start {}:{} is after end {}:{}",
                self.start.surah, self.start.ayah, self.end.surah, self.end.ayah
            )));
        }
        Ok(())
    }

    pub fn contains(&self, position: VersePosition) -> bool {
        position >= self.start && position <= self.end
    }

    /// Surah numbers touched by this range, ascending
    pub fn surahs(&self) -> std::ops::RangeInclusive<u16> {
        self.start.surah..=self.end.surah
    }
}

/// User-defined verse range used for memorization drills
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSection {
    pub id: Uuid,
    pub name: String,
    pub surah_number: u16,
    pub start_ayah: u16,
    pub end_ayah: u16,
}

impl SavedSection {
    pub fn new(name: impl Into<String>, surah_number: u16, start_ayah: u16, end_ayah: u16) -> Result<Self> {
        let section = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            surah_number,
            start_ayah,
            end_ayah,
        };
        section.validate()?;
        Ok(section)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Section name must not be empty".to_string()));
        }
        self.range().map(|_| ())
    }

    pub fn range(&self) -> Result<VerseRange> {
        VerseRange::within_surah(self.surah_number, self.start_ayah, self.end_ayah)
    }
}

fn validate_surah_number(surah: u16) -> Result<()> {
    if surah == 0 || surah > SURAH_COUNT {
        return Err(Error::InvalidInput(format!(
            "Surah number must be between 1 and {} (got {})",
            SURAH_COUNT, surah
        )));
    }
    Ok(())
}
