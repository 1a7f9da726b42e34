//! Session state machine
//!
//! States: idle → loading → playing ⇄ paused → ended, with error reachable
//! from loading. All asynchronous work is tagged with `generation`; the
//! counter moves on every verse change, every load and teardown, and player
//! events carrying an older tag are dropped unseen.

use super::{Reply, SessionCommand, SessionOptions};
use crate::error::{Error, Result};
use crate::playback::player::{Generation, PlayerEvent, PlayerEventKind, VersePlayer};
use crate::playback::source::candidate_urls;
use crate::state::{SessionSnapshot, SharedState};
use std::sync::Arc;
use std::time::Duration;
use tilawa_common::events::{EndReason, SessionStatus, TilawaEvent, VerseFailure};
use tilawa_common::{
    ConfigurationUpdate, PlaybackConfiguration, PlaybackMode, RepeatMode, Verse,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Deferred sequencing decision
#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    /// Play the loaded verse again as repetition `repetition`
    Replay { repetition: u32 },
    /// Move to verse `index` and load it
    Advance { index: usize },
    /// Move past a verse that could not be played
    SkipFailed,
}

#[derive(Debug)]
struct Timer {
    at: Instant,
    step: Step,
}

enum Input {
    Command(SessionCommand),
    Player(PlayerEvent),
    Timer,
    /// Every handle is gone
    Detached,
}

pub(super) struct Session {
    id: Uuid,
    mode: PlaybackMode,
    verses: Vec<Verse>,
    config: PlaybackConfiguration,
    options: SessionOptions,
    player: Box<dyn VersePlayer>,
    state: Arc<SharedState>,

    generation: Generation,
    status: SessionStatus,
    index: usize,
    /// 1-based
    repetition: u32,
    candidates: Vec<String>,
    source_index: usize,
    loaded: bool,
    load_in_flight: bool,
    duration: Option<f64>,
    position: f64,
    /// The user asked for audio; cleared by pause, end and playback rejection
    wants_playback: bool,
    timer: Option<Timer>,
    /// Step postponed by a pause; `play` performs it
    deferred: Option<Step>,
    /// RepetitionStarted already sent for the current repetition
    cycle_announced: bool,
    consecutive_failures: usize,
    last_error: Option<String>,
    blocked: bool,
    closed: bool,
}

impl Session {
    pub(super) fn new(
        id: Uuid,
        mode: PlaybackMode,
        verses: Vec<Verse>,
        config: PlaybackConfiguration,
        options: SessionOptions,
        player: Box<dyn VersePlayer>,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            id,
            mode,
            verses,
            config,
            options,
            player,
            state,
            generation: 0,
            status: SessionStatus::Idle,
            index: 0,
            repetition: 1,
            candidates: Vec::new(),
            source_index: 0,
            loaded: false,
            load_in_flight: false,
            duration: None,
            position: 0.0,
            wants_playback: false,
            timer: None,
            deferred: None,
            cycle_announced: false,
            consecutive_failures: 0,
            last_error: None,
            blocked: false,
            closed: false,
        }
    }

    pub(super) async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut player_events: mpsc::UnboundedReceiver<PlayerEvent>,
    ) {
        self.start();
        self.publish();

        while !self.closed {
            let deadline = self.timer.as_ref().map(|timer| timer.at);

            let input = tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => Input::Command(command),
                    None => Input::Detached,
                },
                Some(event) = player_events.recv() => Input::Player(event),
                _ = sleep_until(deadline) => Input::Timer,
            };

            self.dispatch(input);
            if !self.closed {
                self.publish();
            }
        }

        debug!("Session {} task exiting", self.id);
    }

    fn dispatch(&mut self, input: Input) {
        match input {
            Input::Command(command) => self.on_command(command),
            Input::Player(event) => self.on_player_event(event),
            Input::Timer => {
                if let Some(timer) = self.timer.take() {
                    trace!("Timer fired: {:?}", timer.step);
                    self.run_step(timer.step);
                }
            }
            Input::Detached => self.close(),
        }
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Play(reply) => {
                let result = self.play();
                self.respond(reply, result);
            }
            SessionCommand::Pause(reply) => {
                self.pause();
                self.respond(reply, Ok(()));
            }
            SessionCommand::Next(reply) => {
                let result = self.next();
                self.respond(reply, result);
            }
            SessionCommand::Previous(reply) => {
                let result = self.previous();
                self.respond(reply, result);
            }
            SessionCommand::JumpTo(index, reply) => {
                let result = self.jump_to(index);
                self.respond(reply, result);
            }
            SessionCommand::Seek(seconds, reply) => {
                let result = self.seek(seconds);
                self.respond(reply, result);
            }
            SessionCommand::Configure(update, reply) => {
                let result = self.configure(update);
                self.respond(reply, result);
            }
            SessionCommand::Stop(reply) => {
                self.close();
                self.respond(reply, Ok(()));
            }
        }
    }

    /// Publish before replying so a caller never reads a stale snapshot
    fn respond<T>(&self, reply: Reply<T>, result: Result<T>) {
        if !self.closed {
            self.publish();
        }
        let _ = reply.send(result);
    }

    // ========================================
    // Lifecycle
    // ========================================

    fn start(&mut self) {
        info!(
            "Session {} started: {} mode, {} verses",
            self.id,
            self.mode,
            self.verses.len()
        );
        self.emit(TilawaEvent::SessionStarted {
            session_id: self.id,
            mode: self.mode,
            total_verses: self.verses.len(),
            config: self.config,
            timestamp: chrono::Utc::now(),
        });
        self.player.set_rate(self.config.playback_rate);

        if self.verses.is_empty() {
            self.end(EndReason::NothingToPlay);
            return;
        }

        let start = self.options.start_index.min(self.verses.len() - 1);
        self.enter_verse(start);
        if self.options.autoplay {
            self.wants_playback = true;
            self.load_current();
        }
    }

    fn end(&mut self, reason: EndReason) {
        self.cancel_pending();
        self.player.stop();
        self.generation += 1;
        self.loaded = false;
        self.load_in_flight = false;
        self.wants_playback = false;
        self.cycle_announced = false;

        info!("Session {} ended: {}", self.id, reason);
        self.set_status(SessionStatus::Ended);
        self.emit(TilawaEvent::SessionEnded {
            session_id: self.id,
            reason,
            timestamp: chrono::Utc::now(),
        });
    }

    fn close(&mut self) {
        self.cancel_pending();
        self.player.stop();
        self.generation += 1;
        self.closed = true;

        info!("Session {} closed", self.id);
        self.emit(TilawaEvent::SessionClosed {
            session_id: self.id,
            timestamp: chrono::Utc::now(),
        });
    }

    // ========================================
    // Verse sequencing
    // ========================================

    /// Make verse `index` current: repetition 1, primary source, nothing loaded
    fn enter_verse(&mut self, index: usize) {
        self.cancel_pending();
        self.player.stop();
        self.generation += 1;

        self.index = index;
        self.repetition = 1;
        self.source_index = 0;
        self.candidates = self.verses.get(index).map(candidate_urls).unwrap_or_default();
        self.loaded = false;
        self.load_in_flight = false;
        self.duration = None;
        self.position = 0.0;
        self.cycle_announced = false;

        if let Some(verse) = self.verses.get(index) {
            debug!("Verse {} ({}/{})", verse.label(), index + 1, self.verses.len());
            self.emit(TilawaEvent::VerseChanged {
                session_id: self.id,
                index,
                surah_number: verse.surah_number,
                number_in_surah: verse.number_in_surah,
                global_number: verse.global_number,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Load the candidate at `source_index` under a fresh generation
    fn load_current(&mut self) {
        self.generation += 1;
        self.loaded = false;
        self.duration = None;
        self.position = 0.0;

        let Some(url) = self.candidates.get(self.source_index).cloned() else {
            self.verse_failed(VerseFailure::NoSource);
            return;
        };

        debug!(
            "Loading verse index {} source {} (generation {}): {}",
            self.index, self.source_index, self.generation, url
        );
        self.load_in_flight = true;
        self.set_status(SessionStatus::Loading);
        self.player.load(&url, self.generation);
    }

    /// Begin (or resume) a playing cycle of the loaded verse
    fn start_cycle(&mut self) {
        self.blocked = false;
        self.player.play();
        self.set_status(SessionStatus::Playing);

        if !self.cycle_announced {
            self.cycle_announced = true;
            self.emit(TilawaEvent::RepetitionStarted {
                session_id: self.id,
                index: self.index,
                repetition: self.repetition,
                repetitions_per_verse: self.config.repetitions_per_verse,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// One playthrough of the current verse finished
    ///
    /// Reads the configuration as it is now, not as it was at session start.
    fn on_segment_ended(&mut self) {
        self.cycle_announced = false;
        if let Some(duration) = self.duration {
            self.position = duration;
        }

        let repetitions = self.config.repetitions_per_verse;
        if self.repetition < repetitions {
            let next = Step::Replay {
                repetition: self.repetition + 1,
            };
            self.schedule(next, self.config.repetition_delay());
        } else if self.index + 1 < self.verses.len() {
            let next = Step::Advance {
                index: self.index + 1,
            };
            self.schedule(next, self.config.inter_verse_delay());
        } else {
            match (self.mode, self.config.repeat_mode) {
                (PlaybackMode::Listening, RepeatMode::All) => {
                    self.schedule(Step::Advance { index: 0 }, self.config.inter_verse_delay());
                }
                (PlaybackMode::Listening, RepeatMode::One) => {
                    self.schedule(Step::Replay { repetition: 1 }, self.config.inter_verse_delay());
                }
                _ => self.end(EndReason::Completed),
            }
        }
    }

    fn schedule(&mut self, step: Step, delay: Duration) {
        if !self.wants_playback {
            self.deferred = Some(step);
            return;
        }
        if delay.is_zero() {
            self.run_step(step);
        } else {
            trace!("Scheduling {:?} in {:?}", step, delay);
            self.timer = Some(Timer {
                at: Instant::now() + delay,
                step,
            });
        }
    }

    fn run_step(&mut self, step: Step) {
        match step {
            Step::Replay { repetition } => {
                self.repetition = repetition;
                self.position = 0.0;
                if self.loaded {
                    self.player.seek(0.0);
                    self.start_cycle();
                } else {
                    self.load_current();
                }
            }
            Step::Advance { index } => {
                self.enter_verse(index);
                self.load_current();
            }
            Step::SkipFailed => match self.following_index() {
                Some(index) => {
                    self.enter_verse(index);
                    self.load_current();
                }
                None => self.end(EndReason::Completed),
            },
        }
    }

    /// Index after the current one, wrapping only when the playlist loops
    fn following_index(&self) -> Option<usize> {
        if self.index + 1 < self.verses.len() {
            Some(self.index + 1)
        } else if self.mode == PlaybackMode::Listening
            && self.config.repeat_mode == RepeatMode::All
        {
            Some(0)
        } else {
            None
        }
    }

    fn verse_failed(&mut self, failure: VerseFailure) {
        self.load_in_flight = false;
        self.loaded = false;

        let (surah_number, number_in_surah, label) = self
            .verses
            .get(self.index)
            .map(|v| (v.surah_number, v.number_in_surah, v.label()))
            .unwrap_or_default();
        let message = format!("Failed to load audio for verse {}: {}", label, failure);
        warn!("{}", message);

        self.last_error = Some(message.clone());
        self.set_status(SessionStatus::Error);
        self.emit(TilawaEvent::VerseFailed {
            session_id: self.id,
            index: self.index,
            surah_number,
            number_in_surah,
            failure,
            message,
            timestamp: chrono::Utc::now(),
        });

        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.verses.len() {
            self.end(EndReason::AllVersesFailed);
            return;
        }

        if self.wants_playback {
            self.schedule(Step::SkipFailed, self.options.error_advance_delay);
        } else {
            self.deferred = Some(Step::SkipFailed);
        }
    }

    // ========================================
    // Player events
    // ========================================

    fn on_player_event(&mut self, event: PlayerEvent) {
        if event.generation != self.generation {
            trace!(
                "Dropping stale player event {:?} (generation {} != {})",
                event.kind,
                event.generation,
                self.generation
            );
            return;
        }

        match event.kind {
            PlayerEventKind::Ready { duration_secs } => {
                debug!("Verse index {} ready ({:.2}s)", self.index, duration_secs);
                self.load_in_flight = false;
                self.loaded = true;
                self.duration = Some(duration_secs);
                self.position = 0.0;
                self.consecutive_failures = 0;

                if self.wants_playback {
                    self.start_cycle();
                } else {
                    self.set_status(SessionStatus::Paused);
                }
            }
            PlayerEventKind::LoadFailed { reason } => {
                self.load_in_flight = false;
                if self.source_index + 1 < self.candidates.len() {
                    self.source_index += 1;
                    let url = self.candidates[self.source_index].clone();
                    warn!(
                        "Source {} failed for verse index {}: {}; trying {}",
                        self.source_index - 1,
                        self.index,
                        reason,
                        url
                    );
                    self.emit(TilawaEvent::SourceFallback {
                        session_id: self.id,
                        index: self.index,
                        source_index: self.source_index,
                        url,
                        reason,
                        timestamp: chrono::Utc::now(),
                    });
                    self.load_current();
                } else {
                    self.verse_failed(VerseFailure::AllSourcesFailed {
                        attempts: self.candidates.len(),
                        last_reason: reason,
                    });
                }
            }
            PlayerEventKind::PlayRejected { reason } => {
                let message = format!("Playback was blocked ({}); press play to resume", reason);
                warn!("{}", message);
                self.blocked = true;
                self.wants_playback = false;
                self.set_status(SessionStatus::Paused);
                self.emit(TilawaEvent::PlaybackBlocked {
                    session_id: self.id,
                    index: self.index,
                    message,
                    timestamp: chrono::Utc::now(),
                });
            }
            PlayerEventKind::Progress { position_secs } => {
                if self.status != SessionStatus::Playing {
                    return;
                }
                self.position = position_secs;
                if let Some(duration_secs) = self.duration {
                    self.emit(TilawaEvent::PlaybackProgress {
                        session_id: self.id,
                        index: self.index,
                        position_secs,
                        duration_secs,
                        timestamp: chrono::Utc::now(),
                    });
                }
            }
            PlayerEventKind::Waveform { peaks } => {
                self.emit(TilawaEvent::WaveformReady {
                    session_id: self.id,
                    index: self.index,
                    peaks,
                    timestamp: chrono::Utc::now(),
                });
            }
            PlayerEventKind::Ended => self.on_segment_ended(),
            PlayerEventKind::Playing | PlayerEventKind::Paused => {}
        }
    }

    // ========================================
    // User intents
    // ========================================

    fn play(&mut self) -> Result<()> {
        if self.verses.is_empty() {
            return Err(Error::NothingToPlay);
        }
        if self.wants_playback {
            // Already playing, loading, or waiting out a delay
            return Ok(());
        }

        self.wants_playback = true;
        self.blocked = false;

        if self.status == SessionStatus::Ended {
            self.consecutive_failures = 0;
            self.enter_verse(0);
            self.load_current();
        } else if let Some(step) = self.deferred.take() {
            self.run_step(step);
        } else if self.loaded {
            self.start_cycle();
        } else if self.load_in_flight {
            self.set_status(SessionStatus::Loading);
        } else {
            self.load_current();
        }
        Ok(())
    }

    fn pause(&mut self) {
        if !self.wants_playback {
            return;
        }
        self.wants_playback = false;

        if let Some(timer) = self.timer.take() {
            self.deferred = Some(timer.step);
        }
        if self.loaded {
            self.player.pause();
            self.position = self.player.position();
        }
        if matches!(self.status, SessionStatus::Playing | SessionStatus::Loading) {
            self.set_status(SessionStatus::Paused);
        }
    }

    fn next(&mut self) -> Result<()> {
        if self.verses.is_empty() {
            return Err(Error::NothingToPlay);
        }
        if self.status == SessionStatus::Ended {
            return Ok(());
        }

        match self.following_index() {
            Some(index) => self.navigate(index),
            None => self.end(EndReason::Completed),
        }
        Ok(())
    }

    fn previous(&mut self) -> Result<()> {
        if self.verses.is_empty() {
            return Err(Error::NothingToPlay);
        }
        if self.index > 0 {
            self.navigate(self.index - 1);
        }
        Ok(())
    }

    fn jump_to(&mut self, index: usize) -> Result<()> {
        if index >= self.verses.len() {
            return Err(Error::BadRequest(format!(
                "Verse index {} out of range (session has {} verses)",
                index,
                self.verses.len()
            )));
        }
        self.navigate(index);
        Ok(())
    }

    /// User-initiated move: pending delays and in-flight loads are dropped
    fn navigate(&mut self, index: usize) {
        self.consecutive_failures = 0;
        self.enter_verse(index);

        if self.wants_playback {
            self.load_current();
        } else if self.status != SessionStatus::Idle {
            self.set_status(SessionStatus::Paused);
        }
    }

    fn seek(&mut self, seconds: f64) -> Result<f64> {
        if !seconds.is_finite() {
            return Err(Error::BadRequest(format!("Invalid seek position: {}", seconds)));
        }
        if !matches!(self.status, SessionStatus::Playing | SessionStatus::Paused) {
            return Err(Error::InvalidState(format!(
                "Cannot seek while {}",
                self.status
            )));
        }

        let duration_secs = self
            .duration
            .filter(|_| self.loaded)
            .ok_or_else(|| Error::InvalidState("Duration not known yet".to_string()))?;
        let position_secs = self
            .player
            .seek(seconds)
            .ok_or_else(|| Error::InvalidState("Nothing loaded".to_string()))?;

        self.position = position_secs;
        self.emit(TilawaEvent::PlaybackProgress {
            session_id: self.id,
            index: self.index,
            position_secs,
            duration_secs,
            timestamp: chrono::Utc::now(),
        });
        Ok(position_secs)
    }

    fn configure(&mut self, update: ConfigurationUpdate) -> Result<PlaybackConfiguration> {
        let config = update.apply_to(&self.config)?;

        if config.playback_rate != self.config.playback_rate {
            self.player.set_rate(config.playback_rate);
        }
        self.config = config;

        info!(
            "Session {} configuration: {} repetitions, {:.1}s delay, rate {}, repeat {}",
            self.id,
            config.repetitions_per_verse,
            config.inter_verse_delay_secs,
            config.playback_rate,
            config.repeat_mode
        );
        self.emit(TilawaEvent::ConfigurationChanged {
            session_id: self.id,
            config,
            timestamp: chrono::Utc::now(),
        });
        Ok(config)
    }

    // ========================================
    // Helpers
    // ========================================

    fn cancel_pending(&mut self) {
        self.timer = None;
        self.deferred = None;
    }

    fn set_status(&mut self, new_status: SessionStatus) {
        let old_status = self.status;
        if old_status == new_status {
            return;
        }
        self.status = new_status;
        debug!("Session {}: {} -> {}", self.id, old_status, new_status);
        self.emit(TilawaEvent::SessionStatusChanged {
            session_id: self.id,
            old_status,
            new_status,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit(&self, event: TilawaEvent) {
        self.state.broadcast_event(event);
    }

    fn publish(&self) {
        let verse = self.verses.get(self.index);
        self.state.publish_snapshot(SessionSnapshot {
            session_id: Some(self.id),
            mode: Some(self.mode),
            status: self.status,
            current_index: verse.map(|_| self.index),
            surah_number: verse.map(|v| v.surah_number),
            number_in_surah: verse.map(|v| v.number_in_surah),
            global_number: verse.map(|v| v.global_number),
            repetition: self.repetition,
            repetitions_per_verse: self.config.repetitions_per_verse,
            active_source_index: self.source_index,
            active_source_url: self.candidates.get(self.source_index).cloned(),
            position_secs: self.position,
            duration_secs: self.duration,
            playing: self.status == SessionStatus::Playing,
            total_verses: self.verses.len(),
            config: self.config,
            last_error: self.last_error.clone(),
            blocked: self.blocked,
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
