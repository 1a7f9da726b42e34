//! Single-verse player interface
//!
//! A player wraps exactly one audio resource at a time. Transport calls are
//! synchronous and never block; everything asynchronous (load completion,
//! end of audio, progress) comes back as a `PlayerEvent` on the channel the
//! player was created with.
//!
//! Every event carries the generation of the `load` it belongs to, so the
//! session can drop events from a load it has already moved past.

pub mod streaming;

pub use streaming::{StreamingPlayer, StreamingPlayerFactory};

use tokio::sync::mpsc;

/// Tag of one `load` request, issued by the session, strictly increasing
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEventKind {
    /// Loaded and playable; duration in seconds
    Ready { duration_secs: f64 },
    Playing,
    Paused,
    /// Played through to the end (exactly once per completed playback)
    Ended,
    Progress { position_secs: f64 },
    /// Per-bucket peak amplitudes, sent after `Ready` by waveform backends
    Waveform { peaks: Vec<f32> },
    /// The current load attempt failed; the player does not retry
    LoadFailed { reason: String },
    /// Loaded but the backend refused to start playback
    PlayRejected { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEvent {
    pub generation: Generation,
    pub kind: PlayerEventKind,
}

impl PlayerEvent {
    pub fn new(generation: Generation, kind: PlayerEventKind) -> Self {
        Self { generation, kind }
    }
}

pub type PlayerEventSender = mpsc::UnboundedSender<PlayerEvent>;

/// One playable resource at a time
pub trait VersePlayer: Send {
    /// Replace the current resource with `url`
    ///
    /// Completion is reported as `Ready` or `LoadFailed` tagged with `generation`.
    fn load(&mut self, url: &str, generation: Generation);

    /// Start or resume; replays from 0 after `Ended`
    fn play(&mut self);

    fn pause(&mut self);

    /// Abort any load, release the resource and reset the position
    fn stop(&mut self);

    /// Clamp to `[0, duration]`; None while no duration is known
    fn seek(&mut self, seconds: f64) -> Option<f64>;

    /// Applies now if loaded and is kept for later loads
    fn set_rate(&mut self, rate: f64);

    fn position(&self) -> f64;

    fn duration(&self) -> Option<f64>;
}

/// Creates the player a new session will own
pub trait PlayerFactory: Send + Sync {
    fn create(&self, events: PlayerEventSender) -> Box<dyn VersePlayer>;
}
