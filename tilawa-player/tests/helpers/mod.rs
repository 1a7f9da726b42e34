//! Test helpers for tilawa-player integration tests
//!
//! - `ScriptedFactory` / `Script`: in-memory player with per-URL outcomes
//! - `EventLog`: records session events and waits for specific ones
//! - verse and controller builders

#![allow(dead_code)]

pub mod scripted_player;

pub use scripted_player::{Call, Outcome, Script, ScriptedFactory};

use std::sync::Arc;
use std::time::Duration;
use tilawa_common::events::{EventBus, TilawaEvent};
use tilawa_common::Verse;
use tilawa_player::playback::SessionController;
use tilawa_player::SharedState;
use tokio::sync::broadcast;

/// Verse `1:n` with the given candidate URLs (first one is primary)
pub fn verse(number: u16, urls: &[&str]) -> Verse {
    Verse {
        global_number: number as u32,
        surah_number: 1,
        number_in_surah: number,
        text: String::new(),
        primary_audio_url: urls.first().map(|u| u.to_string()),
        fallback_audio_urls: urls.iter().skip(1).map(|u| u.to_string()).collect(),
    }
}

/// Verses `1:1..=n`, each with one working URL of `duration` seconds
pub fn playable_verses(script: &Script, count: u16, duration: f64) -> Vec<Verse> {
    (1..=count)
        .map(|n| {
            let url = format!("https://audio.test/{}.mp3", n);
            script.set(&url, Outcome::Ok(duration));
            verse(n, &[url.as_str()])
        })
        .collect()
}

pub struct Harness {
    pub script: Arc<Script>,
    pub controller: SessionController,
    pub state: Arc<SharedState>,
    pub events: EventLog,
}

pub fn harness() -> Harness {
    let script = Script::new();
    let state = SharedState::new(EventBus::new(1024));
    let events = EventLog::new(state.subscribe_events());
    let controller = SessionController::new(
        ScriptedFactory::new(Arc::clone(&script)),
        Arc::clone(&state),
        Duration::from_millis(500),
    );
    Harness {
        script,
        controller,
        state,
        events,
    }
}

/// Records every event received so far
pub struct EventLog {
    rx: broadcast::Receiver<TilawaEvent>,
    pub seen: Vec<TilawaEvent>,
}

impl EventLog {
    pub fn new(rx: broadcast::Receiver<TilawaEvent>) -> Self {
        Self { rx, seen: Vec::new() }
    }

    /// Wait (in virtual time) for the first event matching `predicate`
    pub async fn wait_for(&mut self, predicate: impl Fn(&TilawaEvent) -> bool) -> TilawaEvent {
        let deadline = Duration::from_secs(3600);
        tokio::time::timeout(deadline, async {
            loop {
                let event = self.rx.recv().await.expect("event bus closed or lagged");
                self.seen.push(event.clone());
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    /// Collect whatever has been emitted without waiting
    pub fn drain(&mut self) -> Vec<TilawaEvent> {
        let mut fresh = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            self.seen.push(event.clone());
            fresh.push(event);
        }
        fresh
    }

    /// Names of the events seen so far, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.seen.iter().map(TilawaEvent::event_name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.seen.iter().filter(|e| e.event_name() == name).count()
    }

    /// (index, repetition) of every RepetitionStarted seen
    pub fn repetitions(&self) -> Vec<(usize, u32)> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                TilawaEvent::RepetitionStarted {
                    index, repetition, ..
                } => Some((*index, *repetition)),
                _ => None,
            })
            .collect()
    }
}

pub fn is(name: &'static str) -> impl Fn(&TilawaEvent) -> bool {
    move |event| event.event_name() == name
}

/// Let spawned tasks run without moving virtual time forward
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
