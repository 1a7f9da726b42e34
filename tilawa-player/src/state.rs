//! Shared playback state
//!
//! Read model of the active session plus the event bus, shared between the
//! session actor, the controller and the HTTP layer.

use serde::Serialize;
use std::sync::Arc;
use tilawa_common::events::{EventBus, SessionStatus, TilawaEvent};
use tilawa_common::{PlaybackConfiguration, PlaybackMode};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// Point-in-time view of the active session
///
/// Published by the session after every transition; the HTTP layer and the
/// controller only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub mode: Option<PlaybackMode>,
    pub status: SessionStatus,
    pub current_index: Option<usize>,
    pub surah_number: Option<u16>,
    pub number_in_surah: Option<u16>,
    pub global_number: Option<u32>,
    /// 1-based repetition of the current verse
    pub repetition: u32,
    pub repetitions_per_verse: u32,
    /// Candidate URL index in use (primary = 0)
    pub active_source_index: usize,
    pub active_source_url: Option<String>,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    pub playing: bool,
    pub total_verses: usize,
    pub config: PlaybackConfiguration,
    pub last_error: Option<String>,
    /// Backend refused to start playback; waiting for an explicit play
    pub blocked: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        let config = PlaybackConfiguration::default();
        Self {
            session_id: None,
            mode: None,
            status: SessionStatus::Idle,
            current_index: None,
            surah_number: None,
            number_in_surah: None,
            global_number: None,
            repetition: 0,
            repetitions_per_verse: config.repetitions_per_verse,
            active_source_index: 0,
            active_source_url: None,
            position_secs: 0.0,
            duration_secs: None,
            playing: false,
            total_verses: 0,
            config,
            last_error: None,
            blocked: false,
        }
    }
}

/// Shared state accessible by all components
pub struct SharedState {
    snapshot: watch::Sender<SessionSnapshot>,
    events: EventBus,
}

impl SharedState {
    pub fn new(events: EventBus) -> Arc<Self> {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Arc::new(Self { snapshot, events })
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: TilawaEvent) {
        self.events.emit_lossy(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<TilawaEvent> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Replace the published snapshot
    ///
    /// Watchers are only woken when the value actually changed.
    pub fn publish_snapshot(&self, snapshot: SessionSnapshot) {
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }
}
