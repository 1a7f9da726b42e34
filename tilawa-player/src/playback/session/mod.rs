//! Playback session
//!
//! A session walks an ordered verse list with one player. It runs as a
//! single tokio task that owns all session state; user commands, player
//! events and the delay timer are funnelled into one dispatch function, so
//! transitions never interleave. `SessionHandle` is the only way in.

mod machine;

use super::player::PlayerFactory;
use crate::error::{Error, Result};
use crate::state::SharedState;
use machine::Session;
use std::sync::Arc;
use std::time::Duration;
use tilawa_common::{ConfigurationUpdate, PlaybackConfiguration, PlaybackMode, Verse};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

const COMMAND_QUEUE: usize = 32;

/// Session creation options
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Verse to start at (clamped to the list)
    pub start_index: usize,
    /// Begin loading and playing immediately
    pub autoplay: bool,
    /// Wait after a verse-level failure before moving on
    pub error_advance_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            start_index: 0,
            autoplay: true,
            error_advance_delay: Duration::from_millis(500),
        }
    }
}

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// User intents accepted by a session
pub(crate) enum SessionCommand {
    Play(Reply<()>),
    Pause(Reply<()>),
    Next(Reply<()>),
    Previous(Reply<()>),
    JumpTo(usize, Reply<()>),
    /// Replies with the clamped position
    Seek(f64, Reply<f64>),
    Configure(ConfigurationUpdate, Reply<PlaybackConfiguration>),
    Stop(Reply<()>),
}

/// Owner's handle on a running session
pub struct SessionHandle {
    id: Uuid,
    commands: mpsc::Sender<SessionCommand>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Create the session's player and start its task
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        verses: Vec<Verse>,
        mode: PlaybackMode,
        config: PlaybackConfiguration,
        options: SessionOptions,
        factory: &dyn PlayerFactory,
        state: Arc<SharedState>,
    ) -> Self {
        let id = Uuid::new_v4();
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (player_tx, player_rx) = mpsc::unbounded_channel();
        let player = factory.create(player_tx);

        let session = Session::new(id, mode, verses, config, options, player, state);
        let task = tokio::spawn(session.run(command_rx, player_rx));

        Self { id, commands, task }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// False once the session task has exited
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| Error::InvalidState("Session is closed".to_string()))?;
        response
            .await
            .map_err(|_| Error::InvalidState("Session is closed".to_string()))?
    }

    pub async fn play(&self) -> Result<()> {
        self.request(SessionCommand::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(SessionCommand::Pause).await
    }

    pub async fn next(&self) -> Result<()> {
        self.request(SessionCommand::Next).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.request(SessionCommand::Previous).await
    }

    pub async fn jump_to(&self, index: usize) -> Result<()> {
        self.request(|reply| SessionCommand::JumpTo(index, reply)).await
    }

    pub async fn seek(&self, seconds: f64) -> Result<f64> {
        self.request(|reply| SessionCommand::Seek(seconds, reply)).await
    }

    pub async fn configure(&self, update: ConfigurationUpdate) -> Result<PlaybackConfiguration> {
        self.request(|reply| SessionCommand::Configure(update, reply)).await
    }

    /// Tear down: cancel timers, stop and release the player, then wait for
    /// the task to exit
    pub async fn shutdown(self) {
        if let Err(e) = self.request(SessionCommand::Stop).await {
            debug!("Session {} already stopped: {}", self.id, e);
        }
        if let Err(e) = self.task.await {
            warn!("Session {} task failed: {}", self.id, e);
        }
    }
}
