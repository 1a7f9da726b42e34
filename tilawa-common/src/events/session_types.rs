//! Session-related type definitions
//!
//! Supporting types for session status, termination and verse failures.

use serde::{Deserialize, Serialize};

/// Playback session status
///
/// `idle → loading → playing ⇄ paused → ended`, with `error` reachable from
/// `loading` or `playing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, nothing requested yet
    Idle,
    /// Fetching/decoding the current verse's audio
    Loading,
    Playing,
    Paused,
    /// Finished, or stopped with nothing left to play
    Ended,
    /// Current verse could not be played; auto-advance is pending
    Error,
}

impl SessionStatus {
    /// True while the session is actively producing (or about to produce) audio
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Loading | SessionStatus::Playing)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Loading => write!(f, "loading"),
            SessionStatus::Playing => write!(f, "playing"),
            SessionStatus::Paused => write!(f, "paused"),
            SessionStatus::Ended => write!(f, "ended"),
            SessionStatus::Error => write!(f, "error"),
        }
    }
}

/// Why a session reached `ended`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Last verse finished (or `next` past the end)
    Completed,
    /// Session was created with an empty verse list
    NothingToPlay,
    /// Every verse of a full pass failed in a row
    AllVersesFailed,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::Completed => write!(f, "completed"),
            EndReason::NothingToPlay => write!(f, "nothing to play"),
            EndReason::AllVersesFailed => write!(f, "all verses failed"),
        }
    }
}

/// Verse-level failure kinds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerseFailure {
    /// The verse carries no usable audio URL
    NoSource,
    /// Every candidate URL failed to load
    AllSourcesFailed {
        /// Number of load attempts made
        attempts: usize,
        /// Reason reported by the last attempt
        last_reason: String,
    },
}

impl std::fmt::Display for VerseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerseFailure::NoSource => write!(f, "no audio source"),
            VerseFailure::AllSourcesFailed { attempts, last_reason } => {
                write!(f, "all {} audio sources failed ({})", attempts, last_reason)
            }
        }
    }
}
