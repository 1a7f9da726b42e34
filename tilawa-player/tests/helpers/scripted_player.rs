//! Scripted in-memory verse player
//!
//! Each URL is given an outcome up front. Loads resolve after `load_delay`
//! of (virtual) time and are never cancelled, so late results from
//! superseded loads still reach the session, which must discard them.
//! Playback "ends" after duration / rate of virtual time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tilawa_player::playback::player::{
    Generation, PlayerEvent, PlayerEventKind, PlayerEventSender, PlayerFactory, VersePlayer,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub enum Outcome {
    /// Loads fine; audio lasts this many seconds
    Ok(f64),
    /// Load fails with this reason
    Fail(&'static str),
}

/// Calls made on any player created by the factory
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load(String),
    Play,
    Pause,
    Stop,
    Seek(f64),
    SetRate(f64),
}

pub struct Script {
    outcomes: Mutex<HashMap<String, Outcome>>,
    load_delay: Mutex<Duration>,
    reject_play: AtomicBool,
    /// URL whose load panics inside the session task
    crash_on_load: Mutex<Option<String>>,
    calls: Mutex<Vec<Call>>,
    ended: AtomicUsize,
    ready: AtomicUsize,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(HashMap::new()),
            load_delay: Mutex::new(Duration::from_millis(100)),
            reject_play: AtomicBool::new(false),
            crash_on_load: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            ended: AtomicUsize::new(0),
            ready: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, url: &str, outcome: Outcome) -> &Self {
        self.outcomes.lock().unwrap().insert(url.to_string(), outcome);
        self
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock().unwrap() = delay;
    }

    pub fn reject_play(&self, reject: bool) {
        self.reject_play.store(reject, Ordering::SeqCst);
    }

    pub fn crash_on_load(&self, url: &str) {
        *self.crash_on_load.lock().unwrap() = Some(url.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Load(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    /// `Ready` events sent
    pub fn ready_count(&self) -> usize {
        self.ready.load(Ordering::SeqCst)
    }

    /// `Ended` events sent
    pub fn ended_count(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn outcome(&self, url: &str) -> Outcome {
        self.outcomes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Outcome::Fail("unscripted url"))
    }
}

pub struct ScriptedFactory {
    pub script: Arc<Script>,
}

impl ScriptedFactory {
    pub fn new(script: Arc<Script>) -> Arc<Self> {
        Arc::new(Self { script })
    }
}

impl PlayerFactory for ScriptedFactory {
    fn create(&self, events: PlayerEventSender) -> Box<dyn VersePlayer> {
        Box::new(ScriptedPlayer {
            script: Arc::clone(&self.script),
            events,
            inner: Arc::new(Mutex::new(Inner::default())),
            end_task: None,
        })
    }
}

#[derive(Debug)]
struct Inner {
    generation: Generation,
    duration: Option<f64>,
    /// Position when playback last started or paused
    position: f64,
    started_at: Option<Instant>,
    rate: f64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            generation: 0,
            duration: None,
            position: 0.0,
            started_at: None,
            rate: 1.0,
        }
    }
}

impl Inner {
    fn current_position(&self) -> f64 {
        let elapsed = self
            .started_at
            .map(|at| at.elapsed().as_secs_f64() * self.rate)
            .unwrap_or(0.0);
        let position = self.position + elapsed;
        self.duration.map_or(position, |d| position.min(d))
    }
}

pub struct ScriptedPlayer {
    script: Arc<Script>,
    events: PlayerEventSender,
    inner: Arc<Mutex<Inner>>,
    end_task: Option<JoinHandle<()>>,
}

impl ScriptedPlayer {
    fn send(&self, generation: Generation, kind: PlayerEventKind) {
        let _ = self.events.send(PlayerEvent::new(generation, kind));
    }

    fn cancel_end(&mut self) {
        if let Some(task) = self.end_task.take() {
            task.abort();
        }
    }

    fn schedule_end(&mut self) {
        self.cancel_end();
        let (generation, remaining) = {
            let inner = self.inner.lock().unwrap();
            let Some(duration) = inner.duration else { return };
            (inner.generation, (duration - inner.position).max(0.0) / inner.rate)
        };

        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        let script = Arc::clone(&self.script);
        self.end_task = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
            {
                let mut inner = inner.lock().unwrap();
                if inner.generation != generation {
                    return;
                }
                inner.position = inner.duration.unwrap_or(0.0);
                inner.started_at = None;
            }
            script.ended.fetch_add(1, Ordering::SeqCst);
            let _ = events.send(PlayerEvent::new(generation, PlayerEventKind::Ended));
        }));
    }
}

impl VersePlayer for ScriptedPlayer {
    fn load(&mut self, url: &str, generation: Generation) {
        self.script.record(Call::Load(url.to_string()));
        if self.script.crash_on_load.lock().unwrap().as_deref() == Some(url) {
            panic!("player crashed loading {}", url);
        }
        self.cancel_end();
        {
            let mut inner = self.inner.lock().unwrap();
            inner.generation = generation;
            inner.duration = None;
            inner.position = 0.0;
            inner.started_at = None;
        }

        let outcome = self.script.outcome(url);
        let delay = *self.script.load_delay.lock().unwrap();
        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        let script = Arc::clone(&self.script);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let kind = match outcome {
                Outcome::Ok(duration_secs) => {
                    let mut inner = inner.lock().unwrap();
                    if inner.generation == generation {
                        inner.duration = Some(duration_secs);
                    }
                    script.ready.fetch_add(1, Ordering::SeqCst);
                    PlayerEventKind::Ready { duration_secs }
                }
                Outcome::Fail(reason) => PlayerEventKind::LoadFailed {
                    reason: reason.to_string(),
                },
            };
            // Deliberately unconditional: stale results must be filtered by the session
            let _ = events.send(PlayerEvent::new(generation, kind));
        });
    }

    fn play(&mut self) {
        self.script.record(Call::Play);
        let generation = self.inner.lock().unwrap().generation;

        if self.script.reject_play.load(Ordering::SeqCst) {
            self.send(generation, PlayerEventKind::PlayRejected {
                reason: "autoplay not allowed".to_string(),
            });
            return;
        }

        {
            let mut inner = self.inner.lock().unwrap();
            let Some(duration) = inner.duration else { return };
            if inner.started_at.is_some() {
                return;
            }
            if inner.position >= duration {
                inner.position = 0.0;
            }
            inner.started_at = Some(Instant::now());
        }
        self.schedule_end();
        self.send(generation, PlayerEventKind::Playing);
    }

    fn pause(&mut self) {
        self.script.record(Call::Pause);
        self.cancel_end();
        let generation = {
            let mut inner = self.inner.lock().unwrap();
            inner.position = inner.current_position();
            inner.started_at = None;
            inner.generation
        };
        self.send(generation, PlayerEventKind::Paused);
    }

    fn stop(&mut self) {
        self.script.record(Call::Stop);
        self.cancel_end();
        let mut inner = self.inner.lock().unwrap();
        inner.duration = None;
        inner.position = 0.0;
        inner.started_at = None;
    }

    fn seek(&mut self, seconds: f64) -> Option<f64> {
        self.script.record(Call::Seek(seconds));
        let (target, playing) = {
            let mut inner = self.inner.lock().unwrap();
            let duration = inner.duration?;
            let target = seconds.clamp(0.0, duration);
            inner.position = target;
            let playing = inner.started_at.is_some();
            if playing {
                inner.started_at = Some(Instant::now());
            }
            (target, playing)
        };
        if playing {
            self.schedule_end();
        }
        Some(target)
    }

    fn set_rate(&mut self, rate: f64) {
        self.script.record(Call::SetRate(rate));
        let playing = {
            let mut inner = self.inner.lock().unwrap();
            inner.position = inner.current_position();
            let playing = inner.started_at.is_some();
            if playing {
                inner.started_at = Some(Instant::now());
            }
            inner.rate = rate;
            playing
        };
        if playing {
            self.schedule_end();
        }
    }

    fn position(&self) -> f64 {
        self.inner.lock().unwrap().current_position()
    }

    fn duration(&self) -> Option<f64> {
        self.inner.lock().unwrap().duration
    }
}
