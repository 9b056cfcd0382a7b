//! The offline MIDI render driver.
//!
//! A stripped-down version of the audio block loop: no warm-up, no
//! pacing and no latency drop. Each block's MIDI output is converted
//! from seconds to quarter notes against the tempo map and collected
//! into one sequence for the writer.

use std::time::Duration;

use bounce_graph::{
    BeatEvent, BeatSequence, PlayHead, PlayHeadState, Player, SampleRange, TempoSequence,
    leaf_nodes_ready, time_to_sample,
};
use bounce_io::MidiWriter;

use crate::error::Result;
use crate::render::TransportSync;

/// How a MIDI render ended.
#[derive(Clone, Debug)]
pub enum MidiRenderOutcome {
    /// The render finished and the sequence reached the writer.
    Completed(BeatSequence),
    /// The render was cancelled before the end of the range.
    Cancelled,
    /// The tree produced no MIDI at all; nothing was written.
    NoEvents,
}

/// Drives a MIDI render over `[start, end)` seconds of a node tree.
pub struct MidiRenderContext<'a, P: Player> {
    player: P,
    sample_rate: f64,
    block_size: usize,
    start_time: f64,
    end_time: f64,
    tempo: &'a TempoSequence,
    writer: &'a mut dyn MidiWriter,
    transport: Option<Box<dyn TransportSync>>,
}

impl<'a, P: Player> MidiRenderContext<'a, P> {
    /// Prepare `player` for rendering `[start_time, end_time)`.
    pub fn new(
        mut player: P,
        sample_rate: f64,
        block_size: usize,
        start_time: f64,
        end_time: f64,
        tempo: &'a TempoSequence,
        writer: &'a mut dyn MidiWriter,
    ) -> Result<Self> {
        player.prepare_to_play(sample_rate, block_size)?;
        Ok(Self {
            player,
            sample_rate,
            block_size,
            start_time,
            end_time,
            tempo,
            writer,
            transport: None,
        })
    }

    /// Attach a sink for external timers.
    pub fn with_transport(mut self, transport: Box<dyn TransportSync>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Run the render to one of the three outcomes.
    pub fn render(
        mut self,
        should_cancel: impl Fn() -> bool,
        mut progress: impl FnMut(f32),
    ) -> Result<MidiRenderOutcome> {
        let block_length = self.block_size as f64 / self.sample_rate;
        let mut stream_time = self.start_time;

        let mut play_head = PlayHead::new();
        play_head.stop();
        play_head.set_position(time_to_sample(stream_time, self.sample_rate));
        play_head.play_synced_to_range(SampleRange::until_stopped(time_to_sample(
            stream_time,
            self.sample_rate,
        )));

        let mut state = PlayHeadState::new();
        state.update(
            &play_head,
            SampleRange::new(
                time_to_sample(stream_time, self.sample_rate),
                time_to_sample(stream_time + block_length, self.sample_rate),
            ),
        );

        while !leaf_nodes_ready(self.player.root()) {
            std::thread::sleep(Duration::from_millis(100));
            if should_cancel() {
                return Ok(MidiRenderOutcome::Cancelled);
            }
        }

        let mut cursor = self.tempo.cursor();
        let mut output = BeatSequence::default();
        let length = (self.end_time - self.start_time).max(f64::EPSILON);

        loop {
            if should_cancel() {
                return Ok(MidiRenderOutcome::Cancelled);
            }
            if stream_time > self.end_time {
                break;
            }

            let block_end = stream_time + block_length;
            if let Some(transport) = &mut self.transport {
                transport.update_timers(stream_time, self.block_size);
            }

            let range = SampleRange::new(
                time_to_sample(stream_time, self.sample_rate),
                time_to_sample(block_end, self.sample_rate),
            );
            state.update(&play_head, range);
            self.player.process_block(range, state)?;

            let root = self.player.root().clone();
            let block_output = root.processed_output();
            for event in block_output.midi().events() {
                cursor.set_time(event.time + stream_time - self.start_time);
                output.push(BeatEvent {
                    beats: cursor.beats(),
                    message: event.message,
                });
            }
            drop(block_output);

            stream_time = block_end;
            progress((((stream_time - self.start_time) / length) as f32).clamp(0.0, 1.0));
        }

        play_head.stop();

        if output.is_empty() {
            tracing::info!("no MIDI found to render");
            return Ok(MidiRenderOutcome::NoEvents);
        }

        self.writer.write(&output, self.tempo)?;
        tracing::info!(events = output.len(), "MIDI render complete");
        Ok(MidiRenderOutcome::Completed(output))
    }
}
