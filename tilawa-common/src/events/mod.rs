//! Event types for the Tilawa event system
//!
//! Provides the shared event vocabulary and the EventBus used to republish
//! session state changes to presentation code.

mod session_types;

pub use session_types::{EndReason, SessionStatus, VerseFailure};

use crate::playback::{PlaybackConfiguration, PlaybackMode};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Tilawa event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Every event names the session it belongs to so that a UI can ignore
/// stragglers from a session it already replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TilawaEvent {
    /// A new session took ownership of the playback surface
    SessionStarted {
        session_id: Uuid,
        mode: PlaybackMode,
        total_verses: usize,
        config: PlaybackConfiguration,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session status transition
    SessionStatusChanged {
        session_id: Uuid,
        old_status: SessionStatus,
        new_status: SessionStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Current verse changed (repetition count reset to 1)
    VerseChanged {
        session_id: Uuid,
        /// Index into the session's verse list
        index: usize,
        surah_number: u16,
        number_in_surah: u16,
        global_number: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A playing cycle of the current verse began
    ///
    /// Fired once per repetition, not on resume after pause.
    RepetitionStarted {
        session_id: Uuid,
        index: usize,
        /// 1-based repetition number
        repetition: u32,
        repetitions_per_verse: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Position update for progress bars and waveform cursors
    PlaybackProgress {
        session_id: Uuid,
        index: usize,
        position_secs: f64,
        duration_secs: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Peak amplitudes for the loaded verse (waveform-visualized backends only)
    WaveformReady {
        session_id: Uuid,
        index: usize,
        peaks: Vec<f32>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A candidate URL failed and the next one is being tried
    ///
    /// Transient notice; never fatal.
    SourceFallback {
        session_id: Uuid,
        index: usize,
        /// Candidate index now being loaded (primary = 0)
        source_index: usize,
        url: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Verse could not be played; the session will move on
    ///
    /// One per verse-level failure. UIs show it as an auto-dismissing toast.
    VerseFailed {
        session_id: Uuid,
        index: usize,
        surah_number: u16,
        number_in_surah: u16,
        failure: VerseFailure,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Audio is loaded but the backend refused to start it ("tap to resume")
    PlaybackBlocked {
        session_id: Uuid,
        index: usize,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Live configuration update accepted
    ConfigurationChanged {
        session_id: Uuid,
        config: PlaybackConfiguration,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session reached `ended`
    SessionEnded {
        session_id: Uuid,
        reason: EndReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session torn down and its audio resources released
    SessionClosed {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TilawaEvent {
    /// Variant name, used as the SSE `event:` field
    pub fn event_name(&self) -> &'static str {
        match self {
            TilawaEvent::SessionStarted { .. } => "SessionStarted",
            TilawaEvent::SessionStatusChanged { .. } => "SessionStatusChanged",
            TilawaEvent::VerseChanged { .. } => "VerseChanged",
            TilawaEvent::RepetitionStarted { .. } => "RepetitionStarted",
            TilawaEvent::PlaybackProgress { .. } => "PlaybackProgress",
            TilawaEvent::WaveformReady { .. } => "WaveformReady",
            TilawaEvent::SourceFallback { .. } => "SourceFallback",
            TilawaEvent::VerseFailed { .. } => "VerseFailed",
            TilawaEvent::PlaybackBlocked { .. } => "PlaybackBlocked",
            TilawaEvent::ConfigurationChanged { .. } => "ConfigurationChanged",
            TilawaEvent::SessionEnded { .. } => "SessionEnded",
            TilawaEvent::SessionClosed { .. } => "SessionClosed",
        }
    }

    pub fn session_id(&self) -> Uuid {
        match self {
            TilawaEvent::SessionStarted { session_id, .. }
            | TilawaEvent::SessionStatusChanged { session_id, .. }
            | TilawaEvent::VerseChanged { session_id, .. }
            | TilawaEvent::RepetitionStarted { session_id, .. }
            | TilawaEvent::PlaybackProgress { session_id, .. }
            | TilawaEvent::WaveformReady { session_id, .. }
            | TilawaEvent::SourceFallback { session_id, .. }
            | TilawaEvent::VerseFailed { session_id, .. }
            | TilawaEvent::PlaybackBlocked { session_id, .. }
            | TilawaEvent::ConfigurationChanged { session_id, .. }
            | TilawaEvent::SessionEnded { session_id, .. }
            | TilawaEvent::SessionClosed { session_id, .. } => *session_id,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the session)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use tilawa_common::events::{EventBus, TilawaEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(TilawaEvent::SessionClosed {
///     session_id: uuid::Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TilawaEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Progress events arrive several times per second, so desktop use wants a
    /// few hundred slots; tests get by with 10-100.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TilawaEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: TilawaEvent,
    ) -> Result<usize, broadcast::error::SendError<TilawaEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TilawaEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No subscribers for event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(session_id: Uuid) -> TilawaEvent {
        TilawaEvent::SessionClosed {
            session_id,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);

        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(closed(Uuid::new_v4())).is_err());

        // Lossy variant must not panic
        bus.emit_lossy(closed(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_emit_with_subscriber() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let session_id = Uuid::new_v4();

        assert_eq!(bus.emit(closed(session_id)).unwrap(), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id(), session_id);
        assert_eq!(received.event_name(), "SessionClosed");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = TilawaEvent::VerseFailed {
            session_id: Uuid::nil(),
            index: 4,
            surah_number: 2,
            number_in_surah: 5,
            failure: VerseFailure::AllSourcesFailed {
                attempts: 2,
                last_reason: "HTTP 404".to_string(),
            },
            message: "Failed to load audio for verse 2:5".to_string(),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "VerseFailed");
        assert_eq!(json["failure"]["kind"], "all_sources_failed");
        assert_eq!(json["failure"]["attempts"], 2);
    }

    #[test]
    fn test_status_display_and_activity() {
        assert_eq!(SessionStatus::Playing.to_string(), "playing");
        assert!(SessionStatus::Loading.is_active());
        assert!(!SessionStatus::Paused.is_active());
        assert_eq!(EndReason::NothingToPlay.to_string(), "nothing to play");
    }
}
