//! Core audio data types
//!
//! A verse is small enough (seconds to a few minutes) to be decoded fully
//! into RAM, which makes seeking and rate changes trivial.

/// Decoded audio for one verse
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Stereo interleaved: [L, R, L, R, ...]
/// - Native sample rate of the source (no resampling at decode time)
#[derive(Debug, Clone, Default)]
pub struct VerseBuffer {
    /// PCM audio samples (interleaved stereo)
    pub samples: Vec<f32>,

    /// Sample rate of the source file
    pub sample_rate: u32,
}

impl VerseBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Get audio frame at specific frame index
    pub fn frame(&self, index: usize) -> Option<AudioFrame> {
        let i = index * 2;
        match (self.samples.get(i), self.samples.get(i + 1)) {
            (Some(&left), Some(&right)) => Some(AudioFrame { left, right }),
            _ => None,
        }
    }

    /// Linearly interpolated frame at a fractional position
    pub fn frame_at(&self, position: f64) -> Option<AudioFrame> {
        if position < 0.0 {
            return None;
        }
        let index = position.floor() as usize;
        let frac = (position - index as f64) as f32;

        let current = self.frame(index)?;
        let next = self.frame(index + 1).unwrap_or(current);
        Some(AudioFrame {
            left: current.left + (next.left - current.left) * frac,
            right: current.right + (next.right - current.right) * frac,
        })
    }

    /// Peak amplitude per bucket, for waveform display
    ///
    /// Returns `buckets` values in `[0.0, 1.0]`; fewer frames than buckets
    /// yields one value per frame.
    pub fn peaks(&self, buckets: usize) -> Vec<f32> {
        let frames = self.frames();
        if buckets == 0 || frames == 0 {
            return Vec::new();
        }

        let buckets = buckets.min(frames);
        (0..buckets)
            .map(|b| {
                let start = b * frames / buckets;
                let end = ((b + 1) * frames / buckets).max(start + 1);
                self.samples[start * 2..end * 2]
                    .iter()
                    .fold(0.0f32, |peak, s| peak.max(s.abs()))
                    .min(1.0)
            })
            .collect()
    }
}

/// AudioFrame represents a single stereo sample (one frame of audio).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFrame {
    pub left: f32,
    pub right: f32,
}

impl AudioFrame {
    /// Create a silent frame (0.0, 0.0)
    pub fn zero() -> Self {
        AudioFrame {
            left: 0.0,
            right: 0.0,
        }
    }

    /// Mono mix for single-channel devices
    pub fn mono(&self) -> f32 {
        (self.left + self.right) * 0.5
    }
}
