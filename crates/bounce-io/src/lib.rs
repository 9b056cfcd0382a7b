//! File I/O for rendered audio and MIDI.
//!
//! The engine streams rendered audio through the [`AudioWriter`] trait
//! and hands finished MIDI sequences to a [`MidiWriter`]. This crate
//! provides the file-backed implementations: WAV via `hound` and
//! standard MIDI files via `midly`.

mod midi_file;
mod wav;

pub use midi_file::{MidiWriter, SmfFileWriter, TICKS_PER_QUARTER_NOTE};
pub use wav::{AudioWriter, WavBlockWriter, read_wav, write_wav};

/// Errors from reading or writing audio and MIDI files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV encoding or decoding failed.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Underlying file system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The writer was used after `close` or `discard`.
    #[error("writer is closed")]
    Closed,

    /// Only 16, 24 and 32 bit output is supported.
    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),
}

/// Convenience alias for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
