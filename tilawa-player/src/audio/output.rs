//! Audio output using cpal
//!
//! The output stream lives on a dedicated thread (cpal streams are not `Send`
//! on every platform). It renders whatever the shared `Transport` holds: a
//! decoded verse, a fractional read cursor, a play flag and a rate.

use super::types::{AudioFrame, VerseBuffer};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How long `open` waits for the output thread to report the device
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Signals raised from the audio callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSignal {
    /// The cursor ran past the last frame of the buffer loaded under `token`
    Ended { token: u64 },
}

/// Playback state shared between the player and the audio callback
#[derive(Debug)]
pub struct Transport {
    buffer: VerseBuffer,
    /// Read position in source frames
    cursor: f64,
    playing: bool,
    rate: f64,
    /// Tag of the load that filled `buffer`
    token: u64,
    ended: bool,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            buffer: VerseBuffer::default(),
            cursor: 0.0,
            playing: false,
            rate: 1.0,
            token: 0,
            ended: false,
        }
    }

    /// Install a decoded verse, paused at position 0
    pub fn load(&mut self, buffer: VerseBuffer, token: u64) {
        self.buffer = buffer;
        self.token = token;
        self.cursor = 0.0;
        self.playing = false;
        self.ended = false;
    }

    /// Drop the current buffer; `token` tags whatever load comes next
    pub fn clear(&mut self, token: u64) {
        self.load(VerseBuffer::default(), token);
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn is_loaded(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Start rendering; false if nothing is loaded
    pub fn play(&mut self) -> bool {
        if !self.is_loaded() {
            return false;
        }
        if self.ended {
            // Replay after the end starts over
            self.cursor = 0.0;
            self.ended = false;
        }
        self.playing = true;
        true
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn set_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.rate = rate;
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.is_loaded().then(|| self.buffer.duration_secs())
    }

    pub fn position_secs(&self) -> f64 {
        if self.buffer.sample_rate == 0 {
            return 0.0;
        }
        (self.cursor / self.buffer.sample_rate as f64).min(self.buffer.duration_secs())
    }

    /// Move the cursor, clamped to `[0, duration]`; None when nothing is loaded
    pub fn seek(&mut self, seconds: f64) -> Option<f64> {
        let duration = self.duration_secs()?;
        let target = if seconds.is_finite() {
            seconds.clamp(0.0, duration)
        } else {
            0.0
        };
        self.cursor = target * self.buffer.sample_rate as f64;
        self.ended = false;
        Some(target)
    }

    /// Produce the next output frame at `device_rate`
    ///
    /// Raises `Ended` exactly once when the cursor passes the last frame.
    pub fn next_frame(&mut self, device_rate: u32) -> (AudioFrame, Option<OutputSignal>) {
        if !self.playing || device_rate == 0 {
            return (AudioFrame::zero(), None);
        }

        let frames = self.buffer.frames() as f64;
        if self.cursor < frames {
            if let Some(frame) = self.buffer.frame_at(self.cursor) {
                self.cursor += self.rate * self.buffer.sample_rate as f64 / device_rate as f64;
                return (frame, None);
            }
        }

        self.playing = false;
        self.cursor = frames;
        if self.ended {
            (AudioFrame::zero(), None)
        } else {
            self.ended = true;
            (AudioFrame::zero(), Some(OutputSignal::Ended { token: self.token }))
        }
    }
}

/// Audio output manager using cpal.
///
/// Dropping it stops the stream and joins the output thread.
pub struct AudioOutput {
    shutdown: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    device_name: String,
    sample_rate: u32,
}

impl AudioOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open the output device and start rendering `transport`
    ///
    /// Falls back to the default device when `device_name` is not found.
    pub fn open(
        device_name: Option<String>,
        transport: Arc<Mutex<Transport>>,
        signals: mpsc::UnboundedSender<OutputSignal>,
    ) -> Result<Self> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(String, u32)>>();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("tilawa-audio-out".to_string())
            .spawn(move || {
                let stream = match Self::start_stream(device_name.as_deref(), transport, signals) {
                    Ok((stream, name, rate)) => {
                        let _ = ready_tx.send(Ok((name, rate)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Park until the owner drops us
                let _ = shutdown_rx.recv();
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause stream: {}", e);
                }
                drop(stream);
                debug!("Audio output thread exiting");
            })?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok((device_name, sample_rate))) => {
                info!("Audio output open on '{}' at {} Hz", device_name, sample_rate);
                Ok(Self {
                    shutdown: Some(shutdown_tx),
                    thread: Some(thread),
                    device_name,
                    sample_rate,
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                drop(shutdown_tx);
                Err(Error::AudioOutput("Timed out opening audio device".to_string()))
            }
        }
    }

    fn start_stream(
        device_name: Option<&str>,
        transport: Arc<Mutex<Transport>>,
        signals: mpsc::UnboundedSender<OutputSignal>,
    ) -> Result<(Stream, String, u32)> {
        let device = Self::select_device(device_name)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config = supported.config();

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, transport, signals)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, transport, signals)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, transport, signals)?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        Ok((stream, name, config.sample_rate.0))
    }

    fn select_device(device_name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(device);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        host.default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        transport: Arc<Mutex<Transport>>,
        signals: mpsc::UnboundedSender<OutputSignal>,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        let device_rate = config.sample_rate.0;

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    write_frames(data, channels, device_rate, &transport, &signals);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Fill one device buffer from the transport
///
/// Never blocks: if the player holds the lock, this buffer is silence.
fn write_frames<T>(
    data: &mut [T],
    channels: usize,
    device_rate: u32,
    transport: &Mutex<Transport>,
    signals: &mpsc::UnboundedSender<OutputSignal>,
) where
    T: SizedSample + FromSample<f32>,
{
    let silence = T::from_sample(0.0f32);
    let Ok(mut transport) = transport.try_lock() else {
        data.iter_mut().for_each(|s| *s = silence);
        return;
    };

    for frame in data.chunks_mut(channels.max(1)) {
        let (audio, signal) = transport.next_frame(device_rate);
        if let Some(signal) = signal {
            let _ = signals.send(signal);
        }

        match frame.len() {
            1 => frame[0] = T::from_sample(audio.mono().clamp(-1.0, 1.0)),
            _ => {
                for (ch, sample) in frame.iter_mut().enumerate() {
                    *sample = match ch {
                        0 => T::from_sample(audio.left.clamp(-1.0, 1.0)),
                        1 => T::from_sample(audio.right.clamp(-1.0, 1.0)),
                        _ => silence,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, sample_rate: u32) -> VerseBuffer {
        let samples = (0..frames)
            .flat_map(|i| {
                let v = i as f32 / frames as f32;
                [v, -v]
            })
            .collect();
        VerseBuffer::new(samples, sample_rate)
    }

    #[test]
    fn test_silent_until_played() {
        let mut transport = Transport::new();
        transport.load(ramp(4, 8000), 1);

        assert_eq!(transport.next_frame(8000), (AudioFrame::zero(), None));
        assert!(transport.play());
        assert_eq!(transport.next_frame(8000).0, AudioFrame { left: 0.0, right: -0.0 });
    }

    #[test]
    fn test_ended_signalled_exactly_once() {
        let mut transport = Transport::new();
        transport.load(ramp(2, 8000), 7);
        transport.play();

        let mut signals = Vec::new();
        for _ in 0..10 {
            if let (_, Some(signal)) = transport.next_frame(8000) {
                signals.push(signal);
            }
        }

        assert_eq!(signals, vec![OutputSignal::Ended { token: 7 }]);
        assert!(!transport.is_playing());
        assert_eq!(transport.position_secs(), transport.duration_secs().unwrap());

        // Replaying after the end restarts from 0 and may end again
        assert!(transport.play());
        assert_eq!(transport.position_secs(), 0.0);
    }

    #[test]
    fn test_rate_scales_cursor_step() {
        let mut transport = Transport::new();
        transport.load(ramp(8000, 8000), 1);
        transport.set_rate(2.0);
        transport.play();

        for _ in 0..100 {
            transport.next_frame(8000);
        }
        assert!((transport.position_secs() - 200.0 / 8000.0).abs() < 1e-9);

        // Device at twice the source rate halves the step
        transport.seek(0.0);
        transport.set_rate(1.0);
        for _ in 0..100 {
            transport.next_frame(16000);
        }
        assert!((transport.position_secs() - 50.0 / 8000.0).abs() < 1e-9);
    }

    #[test]
    fn test_seek_clamps_and_requires_buffer() {
        let mut transport = Transport::new();
        assert_eq!(transport.seek(1.0), None);

        transport.load(ramp(8000, 8000), 1);
        assert_eq!(transport.seek(0.25), Some(0.25));
        assert_eq!(transport.position_secs(), 0.25);
        assert_eq!(transport.seek(5.0), Some(1.0));
        assert_eq!(transport.seek(-1.0), Some(0.0));
    }

    #[test]
    fn test_clear_releases_buffer() {
        let mut transport = Transport::new();
        transport.load(ramp(16, 8000), 1);
        transport.clear(2);

        assert!(!transport.is_loaded());
        assert!(!transport.play());
        assert_eq!(transport.token(), 2);
        assert_eq!(transport.duration_secs(), None);
    }

    #[test]
    fn test_rate_survives_clear_and_load() {
        let mut transport = Transport::new();
        transport.load(ramp(8000, 8000), 1);
        transport.set_rate(2.0);

        transport.clear(2);
        assert_eq!(transport.rate(), 2.0);

        transport.load(ramp(8000, 8000), 2);
        assert_eq!(transport.rate(), 2.0);

        // New verse plays at the retained rate
        transport.play();
        for _ in 0..100 {
            transport.next_frame(8000);
        }
        assert!((transport.position_secs() - 200.0 / 8000.0).abs() < 1e-9);
    }
}
