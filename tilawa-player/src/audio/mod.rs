//! Audio decoding and device output
//!
//! Building blocks for the streaming verse player: symphonia decoding of a
//! fetched verse into memory and a cpal output stream that renders it.

pub mod decoder;
pub mod output;
pub mod types;

pub use decoder::SimpleDecoder;
pub use output::{AudioOutput, OutputSignal, Transport};
pub use types::{AudioFrame, VerseBuffer};
