//! Session controller
//!
//! Thin façade between UI intents and the active session. Holds at most one
//! session; starting a new playlist fully tears down the previous session
//! (timers cancelled, player released) before the new one is created, so two
//! sessions never produce audio at once.

use super::player::PlayerFactory;
use super::session::{SessionHandle, SessionOptions};
use crate::error::{Error, Result};
use crate::state::{SessionSnapshot, SharedState};
use std::sync::Arc;
use std::time::Duration;
use tilawa_common::{ConfigurationUpdate, PlaybackConfiguration, PlaybackMode, RepeatMode, Verse};
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

pub struct SessionController {
    session: Mutex<Option<SessionHandle>>,
    factory: Arc<dyn PlayerFactory>,
    state: Arc<SharedState>,
    error_advance_delay: Duration,
}

impl SessionController {
    pub fn new(
        factory: Arc<dyn PlayerFactory>,
        state: Arc<SharedState>,
        error_advance_delay: Duration,
    ) -> Self {
        Self {
            session: Mutex::new(None),
            factory,
            state,
            error_advance_delay,
        }
    }

    /// Replace the active session with one over `verses`
    ///
    /// An empty list still replaces the session (it ends at once) but is
    /// reported as `NothingToPlay`.
    pub async fn start(
        &self,
        verses: Vec<Verse>,
        mode: PlaybackMode,
        config: PlaybackConfiguration,
        start_index: usize,
        autoplay: bool,
    ) -> Result<Uuid> {
        config.validate()?;
        if !verses.is_empty() && start_index >= verses.len() {
            return Err(Error::BadRequest(format!(
                "Start index {} out of range ({} verses)",
                start_index,
                verses.len()
            )));
        }

        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            info!("Replacing session {}", previous.id());
            previous.shutdown().await;
        }

        let empty = verses.is_empty();
        let options = SessionOptions {
            start_index,
            autoplay,
            error_advance_delay: self.error_advance_delay,
        };
        let handle = SessionHandle::spawn(
            verses,
            mode,
            config,
            options,
            self.factory.as_ref(),
            Arc::clone(&self.state),
        );
        let id = handle.id();
        *session = Some(handle);

        if empty {
            return Err(Error::NothingToPlay);
        }
        Ok(id)
    }

    /// Tear down the active session, if any
    pub async fn stop(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if let Some(handle) = session.take() {
            handle.shutdown().await;
            self.state.publish_snapshot(SessionSnapshot::default());
        }
        Ok(())
    }

    pub async fn play(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.active(&mut session)?.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.active(&mut session)?.pause().await
    }

    pub async fn next(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.active(&mut session)?.next().await
    }

    pub async fn previous(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.active(&mut session)?.previous().await
    }

    pub async fn jump_to(&self, index: usize) -> Result<()> {
        let mut session = self.session.lock().await;
        self.active(&mut session)?.jump_to(index).await
    }

    pub async fn seek(&self, seconds: f64) -> Result<f64> {
        let mut session = self.session.lock().await;
        self.active(&mut session)?.seek(seconds).await
    }

    pub async fn configure(&self, update: ConfigurationUpdate) -> Result<PlaybackConfiguration> {
        let mut session = self.session.lock().await;
        self.active(&mut session)?.configure(update).await
    }

    pub async fn set_repetitions(&self, count: u32) -> Result<PlaybackConfiguration> {
        self.configure(ConfigurationUpdate::repetitions(count)).await
    }

    pub async fn set_delay(&self, seconds: f64) -> Result<PlaybackConfiguration> {
        self.configure(ConfigurationUpdate::delay(seconds)).await
    }

    pub async fn set_rate(&self, rate: f64) -> Result<PlaybackConfiguration> {
        self.configure(ConfigurationUpdate::rate(rate)).await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<PlaybackConfiguration> {
        self.configure(ConfigurationUpdate::repeat_mode(mode)).await
    }

    pub async fn session_id(&self) -> Option<Uuid> {
        let mut session = self.session.lock().await;
        self.active(&mut session).ok().map(SessionHandle::id)
    }

    /// Latest published session state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// The running session, if any
    ///
    /// A session whose task has died is dropped here and its stale snapshot
    /// replaced, so callers see "No active session" instead of a frozen one.
    fn active<'a>(&self, session: &'a mut Option<SessionHandle>) -> Result<&'a SessionHandle> {
        if session.as_ref().is_some_and(|handle| !handle.is_running()) {
            if let Some(dead) = session.take() {
                error!("Session {} stopped unexpectedly; discarding it", dead.id());
            }
            self.state.publish_snapshot(SessionSnapshot::default());
        }
        session
            .as_ref()
            .ok_or_else(|| Error::InvalidState("No active session".to_string()))
    }
}
