//! MIDI messages, block buffers and timeline sequences.

use crate::time::sample_to_time;

/// A channel voice MIDI message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note-on with velocity.
    NoteOn {
        /// MIDI channel, 0-15.
        channel: u8,
        /// Note number, 0-127.
        note: u8,
        /// Velocity, 1-127.
        velocity: u8,
    },
    /// Note-off.
    NoteOff {
        /// MIDI channel, 0-15.
        channel: u8,
        /// Note number, 0-127.
        note: u8,
        /// Release velocity, 0-127.
        velocity: u8,
    },
    /// Continuous controller change.
    ControlChange {
        /// MIDI channel, 0-15.
        channel: u8,
        /// Controller number, 0-127.
        controller: u8,
        /// Controller value, 0-127.
        value: u8,
    },
    /// Program change.
    ProgramChange {
        /// MIDI channel, 0-15.
        channel: u8,
        /// Program number, 0-127.
        program: u8,
    },
}

impl MidiMessage {
    /// Shorthand for a note-on message.
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::NoteOn {
            channel,
            note,
            velocity,
        }
    }

    /// Shorthand for a note-off message.
    pub fn note_off(channel: u8, note: u8) -> Self {
        Self::NoteOff {
            channel,
            note,
            velocity: 0,
        }
    }

    /// The MIDI channel the message is addressed to.
    pub fn channel(&self) -> u8 {
        match *self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::ControlChange { channel, .. }
            | Self::ProgramChange { channel, .. } => channel,
        }
    }
}

/// A timestamped MIDI message.
///
/// Inside a block buffer the time is in seconds relative to the block
/// start; inside a [`MidiSequence`] it is absolute seconds on the timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MidiEvent {
    /// Event time in seconds.
    pub time: f64,
    /// The message payload.
    pub message: MidiMessage,
}

/// The MIDI half of a node's block output.
///
/// Event times are seconds relative to the start of the current block.
#[derive(Clone, Debug, Default)]
pub struct MidiBuffer {
    events: Vec<MidiEvent>,
}

impl MidiBuffer {
    /// Remove all events. Called at the start of every block.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Append an event.
    pub fn push(&mut self, event: MidiEvent) {
        self.events.push(event);
    }

    /// Append a message at a block-relative offset in seconds.
    pub fn add_message(&mut self, message: MidiMessage, offset: f64) {
        self.events.push(MidiEvent {
            time: offset,
            message,
        });
    }

    /// Append every event from `other`, preserving their offsets.
    pub fn merge_from(&mut self, other: &MidiBuffer) {
        self.events.extend_from_slice(&other.events);
    }

    /// The events in insertion order.
    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    /// Number of events in the buffer.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when the buffer holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// An edit-time MIDI sequence with absolute event times in seconds.
#[derive(Clone, Debug, Default)]
pub struct MidiSequence {
    events: Vec<MidiEvent>,
}

impl MidiSequence {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence from unsorted events.
    pub fn from_events(mut events: Vec<MidiEvent>) -> Self {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { events }
    }

    /// Insert a message at an absolute time in seconds, keeping the
    /// sequence sorted.
    pub fn add_event(&mut self, time: f64, message: MidiMessage) {
        let index = self
            .events
            .partition_point(|existing| existing.time <= time);
        self.events.insert(index, MidiEvent { time, message });
    }

    /// All events in time order.
    pub fn events(&self) -> &[MidiEvent] {
        &self.events
    }

    /// Events with times in `[start, end)` seconds.
    pub fn events_in(&self, start: f64, end: f64) -> impl Iterator<Item = &MidiEvent> {
        self.events
            .iter()
            .skip_while(move |e| e.time < start)
            .take_while(move |e| e.time < end)
    }

    /// Number of events in the sequence.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when the sequence holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Convenience for scheduling an event at a sample position.
    pub fn add_event_at_sample(&mut self, sample: i64, sample_rate: f64, message: MidiMessage) {
        self.add_event(sample_to_time(sample, sample_rate), message);
    }
}

/// A MIDI event positioned in quarter notes rather than seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeatEvent {
    /// Position in quarter notes from the start of the render.
    pub beats: f64,
    /// The message payload.
    pub message: MidiMessage,
}

/// A rendered MIDI sequence expressed in quarter notes.
#[derive(Clone, Debug, Default)]
pub struct BeatSequence {
    events: Vec<BeatEvent>,
}

impl BeatSequence {
    /// Append an event. Events are expected in non-decreasing beat order.
    pub fn push(&mut self, event: BeatEvent) {
        self.events.push(event);
    }

    /// All events in insertion order.
    pub fn events(&self) -> &[BeatEvent] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when the sequence holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
