//! Verse playback engine
//!
//! - `source`: candidate URL resolution per verse
//! - `player`: the single-verse player interface and its streaming backend
//! - `session`: the playback session state machine (one actor task per session)
//! - `controller`: owns at most one session and forwards user intents to it

pub mod controller;
pub mod player;
pub mod session;
pub mod source;

pub use controller::SessionController;
pub use player::{Generation, PlayerEvent, PlayerEventKind, PlayerFactory, VersePlayer};
pub use session::{SessionHandle, SessionOptions};
pub use source::candidate_urls;
