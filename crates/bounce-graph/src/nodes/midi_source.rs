//! Timeline-backed MIDI source.

use crate::error::GraphError;
use crate::midi::{MidiEvent, MidiSequence};
use crate::node::{Node, NodeProperties, PrepareContext, ProcessContext};
use crate::time::sample_to_time;

/// Plays back a [`MidiSequence`] against the block timeline.
///
/// Tracks its own read position so event emission is immune to float
/// drift between blocks; the position resynchronizes from the block's
/// sample range whenever the transport jumps.
pub struct MidiSequenceNode {
    sequence: MidiSequence,
    sample_rate: f64,
    last_time: f64,
}

impl MidiSequenceNode {
    /// A source that plays `sequence`.
    pub fn new(sequence: MidiSequence) -> Self {
        Self {
            sequence,
            sample_rate: 0.0,
            last_time: 0.0,
        }
    }
}

impl Node for MidiSequenceNode {
    fn properties(&self) -> NodeProperties {
        NodeProperties {
            has_audio: false,
            has_midi: true,
            num_channels: 0,
            latency_samples: 0,
        }
    }

    fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), GraphError> {
        self.sample_rate = ctx.sample_rate;
        self.last_time = 0.0;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let duration = ctx.sample_range.len() as f64 / self.sample_rate;
        if !ctx.play_head.is_contiguous_with_previous_block() {
            self.last_time = sample_to_time(ctx.sample_range.start, self.sample_rate);
        }
        let start = self.last_time;
        let end = start + duration;
        for event in self.sequence.events_in(start, end) {
            ctx.midi.push(MidiEvent {
                time: event.time - start,
                message: event.message,
            });
        }
        self.last_time = end;
        Ok(())
    }
}
