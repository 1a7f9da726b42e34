//! Audio decoder using symphonia
//!
//! Decodes a fetched verse (MP3, FLAC, AAC, Vorbis, MP4) held in memory into
//! interleaved stereo f32 samples.

use super::types::VerseBuffer;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Simple audio decoder using symphonia.
pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode an entire in-memory file to stereo f32
    ///
    /// `extension` is a format hint (e.g. "mp3"); probing still works without it.
    ///
    /// # Errors
    /// - Unsupported or unrecognised format
    /// - No audio track, or a track without a sample rate
    /// - No decodable audio at all
    pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<VerseBuffer> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let detected = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to detect format: {}", e)))?;

        let mut format = detected.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut decode_errors = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let channels = spec.channels.count();

                    let frames = decoded.capacity();

                    let too_small = sample_buf
                        .as_ref()
                        .map_or(true, |buf| buf.capacity() < frames * channels);
                    if too_small {
                        sample_buf = Some(SampleBuffer::new(frames as u64, spec));
                    }

                    if let Some(buf) = sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        Self::push_stereo(buf.samples(), channels, &mut samples);
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt frame; skip it
                    decode_errors += 1;
                    debug!("Decode error: {}", e);
                }
                Err(e) => {
                    warn!("Decoder failed: {}", e);
                    break;
                }
            }
        }

        if samples.is_empty() {
            return Err(Error::Decode(format!(
                "No audio decoded ({} corrupt packets)",
                decode_errors
            )));
        }

        let buffer = VerseBuffer::new(samples, sample_rate);
        debug!(
            "Decoded {} frames at {} Hz ({:.2}s)",
            buffer.frames(),
            sample_rate,
            buffer.duration_secs()
        );
        Ok(buffer)
    }

    /// Format hint from a URL path, ignoring query and fragment
    pub fn extension_hint(url: &str) -> Option<&str> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file = path.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        if ext.is_empty() || ext.len() > 5 {
            None
        } else {
            Some(ext)
        }
    }

    /// Append interleaved samples as stereo: mono is duplicated, extra
    /// channels are folded into left/right by parity
    fn push_stereo(interleaved: &[f32], channels: usize, output: &mut Vec<f32>) {
        match channels {
            0 => {}
            1 => {
                output.reserve(interleaved.len() * 2);
                for &sample in interleaved {
                    output.push(sample);
                    output.push(sample);
                }
            }
            2 => output.extend_from_slice(interleaved),
            n => {
                let half = n as f32 / 2.0;
                for frame in interleaved.chunks_exact(n) {
                    let (mut left, mut right) = (0.0f32, 0.0f32);
                    for (ch, sample) in frame.iter().enumerate() {
                        if ch % 2 == 0 {
                            left += sample;
                        } else {
                            right += sample;
                        }
                    }
                    output.push(left / half);
                    output.push(right / half);
                }
            }
        }
    }
}
