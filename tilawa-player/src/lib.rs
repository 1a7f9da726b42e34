//! # Tilawa Player Library (tilawa-player)
//!
//! Verse playback engine for recitation listening and memorization drills.
//!
//! **Purpose:** Walk an ordered list of verses, stream each verse's audio from
//! its primary or fallback URLs, apply per-verse repetition and inter-verse
//! delays, recover from load failures, and republish session state to the UI.
//!
//! **Architecture:** source resolver → single-verse player (reqwest + symphonia
//! + cpal) → playback session actor → session controller → HTTP/SSE surface.

pub mod api;
pub mod audio;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use state::{SessionSnapshot, SharedState};
