//! Standard MIDI file output.

use std::path::{Path, PathBuf};

use bounce_graph::{BeatSequence, MidiMessage, TempoSequence};
use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::Result;

/// Tick resolution of written MIDI files, in ticks per quarter note.
pub const TICKS_PER_QUARTER_NOTE: u16 = 960;

/// Destination for a completed MIDI render.
pub trait MidiWriter: Send {
    /// Write `sequence` using the tempo map that produced it.
    fn write(&mut self, sequence: &BeatSequence, tempo: &TempoSequence) -> Result<()>;
}

/// Writes a single-track standard MIDI file.
///
/// Tempo changes from the tempo map are interleaved with the events at
/// their beat positions.
pub struct SmfFileWriter {
    path: PathBuf,
}

impl SmfFileWriter {
    /// Write to `path` when the render completes.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

// (absolute tick, event kind) before delta encoding
type AbsoluteEvent<'a> = (u64, TrackEventKind<'a>);

fn beats_to_ticks(beats: f64) -> u64 {
    (beats.max(0.0) * f64::from(TICKS_PER_QUARTER_NOTE)).round() as u64
}

fn channel_voice(message: MidiMessage) -> TrackEventKind<'static> {
    let (channel, payload) = match message {
        MidiMessage::NoteOn {
            channel,
            note,
            velocity,
        } => (
            channel,
            midly::MidiMessage::NoteOn {
                key: u7::new(note.min(127)),
                vel: u7::new(velocity.min(127)),
            },
        ),
        MidiMessage::NoteOff {
            channel,
            note,
            velocity,
        } => (
            channel,
            midly::MidiMessage::NoteOff {
                key: u7::new(note.min(127)),
                vel: u7::new(velocity.min(127)),
            },
        ),
        MidiMessage::ControlChange {
            channel,
            controller,
            value,
        } => (
            channel,
            midly::MidiMessage::Controller {
                controller: u7::new(controller.min(127)),
                value: u7::new(value.min(127)),
            },
        ),
        MidiMessage::ProgramChange { channel, program } => (
            channel,
            midly::MidiMessage::ProgramChange {
                program: u7::new(program.min(127)),
            },
        ),
    };
    TrackEventKind::Midi {
        channel: u4::new(channel.min(15)),
        message: payload,
    }
}

impl MidiWriter for SmfFileWriter {
    fn write(&mut self, sequence: &BeatSequence, tempo: &TempoSequence) -> Result<()> {
        let mut absolute: Vec<AbsoluteEvent<'_>> = Vec::new();

        for (index, change) in tempo.changes().iter().enumerate() {
            let micros_per_quarter = (60_000_000.0 / change.bpm).round() as u32;
            absolute.push((
                beats_to_ticks(tempo.beats_at_change(index)),
                TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_quarter))),
            ));
        }
        for event in sequence.events() {
            absolute.push((beats_to_ticks(event.beats), channel_voice(event.message)));
        }
        absolute.sort_by_key(|&(tick, _)| tick);

        let mut track = Vec::with_capacity(absolute.len() + 1);
        let mut last_tick = 0u64;
        for (tick, kind) in absolute {
            track.push(TrackEvent {
                delta: u28::new((tick - last_tick) as u32),
                kind,
            });
            last_tick = tick;
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header: Header::new(
                Format::SingleTrack,
                Timing::Metrical(u15::new(TICKS_PER_QUARTER_NOTE)),
            ),
            tracks: vec![track],
        };
        smf.save(&self.path)?;
        tracing::debug!(path = %self.path.display(), "wrote MIDI file");
        Ok(())
    }
}
