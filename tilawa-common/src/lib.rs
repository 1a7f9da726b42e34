//! # Tilawa Common Library
//!
//! Shared code for the Tilawa recitation player:
//! - Domain types (verses, surahs, saved sections, verse ranges)
//! - Playback configuration and its validation
//! - Event types (TilawaEvent enum) and the EventBus
//! - Configuration file location and loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod playback;

pub use error::{Error, Result};
pub use model::{SavedSection, Surah, Verse, VersePosition, VerseRange};
pub use playback::{
    ConfigurationUpdate, PlaybackConfiguration, PlaybackMode, RepeatMode, MAX_INTER_VERSE_DELAY_SECS,
};
