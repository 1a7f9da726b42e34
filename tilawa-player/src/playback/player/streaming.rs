//! Streaming verse player
//!
//! Fetches a verse over HTTP, decodes it fully in memory on a blocking thread,
//! and renders it through a cpal output stream. The output device is opened on
//! the first `play()`; if that fails the play request is rejected instead of
//! erroring the session.

use super::{Generation, PlayerEvent, PlayerEventKind, PlayerEventSender, PlayerFactory, VersePlayer};
use crate::audio::{AudioOutput, OutputSignal, SimpleDecoder, Transport, VerseBuffer};
use crate::config::AudioConfig;
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

fn lock(transport: &Mutex<Transport>) -> MutexGuard<'_, Transport> {
    transport.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds `StreamingPlayer`s sharing one HTTP client
#[derive(Clone)]
pub struct StreamingPlayerFactory {
    http_client: reqwest::Client,
    device: Option<String>,
    progress_interval: Duration,
    waveform_buckets: Option<usize>,
    load_timeout: Duration,
}

impl StreamingPlayerFactory {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("tilawa-player/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            device: config.device.clone(),
            progress_interval: config.progress_interval(),
            waveform_buckets: config.waveform_buckets,
            load_timeout: config.load_timeout(),
        })
    }
}

impl PlayerFactory for StreamingPlayerFactory {
    fn create(&self, events: PlayerEventSender) -> Box<dyn VersePlayer> {
        Box::new(StreamingPlayer::new(self.clone(), events))
    }
}

pub struct StreamingPlayer {
    settings: StreamingPlayerFactory,
    transport: Arc<Mutex<Transport>>,
    output: Option<AudioOutput>,
    output_signals: mpsc::UnboundedSender<OutputSignal>,
    events: PlayerEventSender,
    /// Generation of the most recent `load`
    generation: Generation,
    load_task: Option<JoinHandle<()>>,
    ticker: JoinHandle<()>,
    pump: JoinHandle<()>,
}

impl StreamingPlayer {
    /// Must be called inside a tokio runtime
    pub fn new(settings: StreamingPlayerFactory, events: PlayerEventSender) -> Self {
        let transport = Arc::new(Mutex::new(Transport::new()));
        let (output_signals, signal_rx) = mpsc::unbounded_channel();

        let ticker = tokio::spawn(progress_ticker(
            Arc::clone(&transport),
            events.clone(),
            settings.progress_interval,
        ));
        let pump = tokio::spawn(forward_output_signals(signal_rx, events.clone()));

        Self {
            settings,
            transport,
            output: None,
            output_signals,
            events,
            generation: 0,
            load_task: None,
            ticker,
            pump,
        }
    }

    fn send(&self, kind: PlayerEventKind) {
        let _ = self.events.send(PlayerEvent::new(self.generation, kind));
    }

    fn abort_load(&mut self) {
        if let Some(task) = self.load_task.take() {
            task.abort();
        }
    }

    fn ensure_output(&mut self) -> Result<()> {
        if self.output.is_none() {
            let output = AudioOutput::open(
                self.settings.device.clone(),
                Arc::clone(&self.transport),
                self.output_signals.clone(),
            )?;
            self.output = Some(output);
        }
        Ok(())
    }
}

impl VersePlayer for StreamingPlayer {
    fn load(&mut self, url: &str, generation: Generation) {
        self.abort_load();
        lock(&self.transport).clear(generation);
        self.generation = generation;

        debug!("Loading {} (generation {})", url, generation);
        self.load_task = Some(tokio::spawn(load_verse(
            self.settings.clone(),
            url.to_string(),
            generation,
            Arc::clone(&self.transport),
            self.events.clone(),
        )));
    }

    fn play(&mut self) {
        if let Err(e) = self.ensure_output() {
            warn!("Cannot start playback: {}", e);
            self.send(PlayerEventKind::PlayRejected { reason: e.to_string() });
            return;
        }

        if lock(&self.transport).play() {
            self.send(PlayerEventKind::Playing);
        } else {
            debug!("play() ignored: nothing loaded");
        }
    }

    fn pause(&mut self) {
        lock(&self.transport).pause();
        self.send(PlayerEventKind::Paused);
    }

    fn stop(&mut self) {
        self.abort_load();
        lock(&self.transport).clear(self.generation);
    }

    fn seek(&mut self, seconds: f64) -> Option<f64> {
        lock(&self.transport).seek(seconds)
    }

    fn set_rate(&mut self, rate: f64) {
        lock(&self.transport).set_rate(rate);
    }

    fn position(&self) -> f64 {
        lock(&self.transport).position_secs()
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.transport).duration_secs()
    }
}

impl Drop for StreamingPlayer {
    fn drop(&mut self) {
        self.abort_load();
        self.ticker.abort();
        self.pump.abort();
        if let Some(output) = self.output.take() {
            info!("Releasing audio output '{}'", output.device_name());
        }
    }
}

async fn load_verse(
    settings: StreamingPlayerFactory,
    url: String,
    generation: Generation,
    transport: Arc<Mutex<Transport>>,
    events: PlayerEventSender,
) {
    let result = fetch_and_decode(&settings.http_client, &url, settings.load_timeout).await;

    match result {
        Ok(buffer) => {
            let duration_secs = buffer.duration_secs();
            let peaks = settings.waveform_buckets.map(|buckets| buffer.peaks(buckets));
            {
                let mut transport = lock(&transport);
                if transport.token() != generation {
                    debug!("Discarding superseded load of {}", url);
                    return;
                }
                transport.load(buffer, generation);
            }

            let _ = events.send(PlayerEvent::new(generation, PlayerEventKind::Ready { duration_secs }));
            if let Some(peaks) = peaks {
                let _ = events.send(PlayerEvent::new(generation, PlayerEventKind::Waveform { peaks }));
            }
        }
        Err(e) => {
            warn!("Failed to load {}: {}", url, e);
            let _ = events.send(PlayerEvent::new(
                generation,
                PlayerEventKind::LoadFailed { reason: e.to_string() },
            ));
        }
    }
}

async fn fetch_and_decode(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<VerseBuffer> {
    let response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Content(format!("HTTP {} from {}", status, url)));
    }

    let bytes = response.bytes().await?.to_vec();
    let hint = SimpleDecoder::extension_hint(url).map(str::to_string);

    tokio::task::spawn_blocking(move || SimpleDecoder::decode_bytes(bytes, hint.as_deref()))
        .await
        .map_err(|e| Error::Internal(format!("Decode task failed: {}", e)))?
}

async fn progress_ticker(
    transport: Arc<Mutex<Transport>>,
    events: PlayerEventSender,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let progress = {
            let transport = lock(&transport);
            transport
                .is_playing()
                .then(|| (transport.token(), transport.position_secs()))
        };

        if let Some((generation, position_secs)) = progress {
            if events
                .send(PlayerEvent::new(generation, PlayerEventKind::Progress { position_secs }))
                .is_err()
            {
                break;
            }
        }
    }
}

async fn forward_output_signals(
    mut signals: mpsc::UnboundedReceiver<OutputSignal>,
    events: PlayerEventSender,
) {
    while let Some(signal) = signals.recv().await {
        match signal {
            OutputSignal::Ended { token } => {
                if events.send(PlayerEvent::new(token, PlayerEventKind::Ended)).is_err() {
                    break;
                }
            }
        }
    }
}
