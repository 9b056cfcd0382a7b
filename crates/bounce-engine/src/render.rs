//! The offline audio render driver.
//!
//! Runs a prepared node tree block by block from a warm-up countdown
//! through steady state to one of the termination conditions, streaming
//! the output into an [`AudioWriter`] with latency compensation, optional
//! leading-silence trimming and running level measurement.

use std::time::{Duration, Instant};

use bounce_graph::{
    AudioBuffer, PlayHead, PlayHeadState, Player, ProcessedOutput, SampleRange, leaf_nodes_ready,
    sample_to_time, time_to_sample,
};
use bounce_io::AudioWriter;

use crate::error::{RenderError, Result};

// Samples quieter than this don't count towards the audible duration.
const NON_ZERO_THRESHOLD: f32 = 1e-4;

/// Receives wall-clock stream time once per block so external timers can
/// stay in step with the render.
pub trait TransportSync {
    /// Called at the start of every block with the block's stream time.
    fn update_timers(&mut self, stream_time: f64, block_size: usize);
}

/// Receives the written audio for waveform displays and meters.
pub trait VisualSink {
    /// Called once before the first block.
    fn reset(&mut self, channels: usize, sample_rate: f64, total_samples: i64);

    /// Called for every chunk that reaches the writer stage.
    fn append(&mut self, stream_offset: i64, audio: &AudioBuffer, offset: usize, frames: usize);
}

/// What and how to render.
#[derive(Clone, Debug)]
pub struct RenderParameters {
    /// Sample rate of the render.
    pub sample_rate: f64,
    /// Block size in samples.
    pub block_size: usize,
    /// Start of the rendered range in seconds.
    pub start_time: f64,
    /// End of the rendered range in seconds, before latency extension.
    pub end_time: f64,
    /// Pace the render at one block per block-duration of wall time.
    pub real_time: bool,
    /// Always write a mono file.
    pub must_render_in_mono: bool,
    /// Write a mono file when the tree is mono anyway.
    pub can_render_in_mono: bool,
    /// Skip writing until the first non-silent block.
    pub trim_leading_silence: bool,
    /// Extra tail time in seconds to let reverbs and delays ring out.
    pub end_allowance: f64,
    /// Block magnitude at or below which the tail may stop early.
    pub stop_threshold: f32,
    /// Scale progress to 90% because a post-processing pass follows.
    pub post_processing_follows: bool,
}

impl RenderParameters {
    /// Parameters for an offline stereo render of `[start, end)` seconds.
    pub fn new(sample_rate: f64, block_size: usize, start_time: f64, end_time: f64) -> Self {
        Self {
            sample_rate,
            block_size,
            start_time,
            end_time,
            real_time: false,
            must_render_in_mono: false,
            can_render_in_mono: false,
            trim_leading_silence: false,
            end_allowance: 0.0,
            stop_threshold: 0.0,
            post_processing_follows: false,
        }
    }
}

/// Level statistics accumulated over the written audio.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderStats {
    /// Peak absolute sample value.
    pub peak: f32,
    /// Mean of the per-channel-per-block RMS levels.
    pub rms: f32,
    /// Seconds of audibly non-silent audio.
    pub audio_duration: f64,
    /// Frames that reached the writer.
    pub frames_written: u64,
}

/// How a render ended.
#[derive(Clone, Copy, Debug)]
pub enum RenderOutcome {
    /// The render ran to completion; the output file is closed and valid.
    Completed(RenderStats),
    /// The render was cancelled; any partial output was removed.
    Cancelled,
}

enum BlockOutcome {
    Continue,
    Finished,
    Cancelled,
}

/// Drives one render from construction to a [`RenderOutcome`].
pub struct RenderContext<P: Player> {
    params: RenderParameters,
    player: P,
    writer: Box<dyn AudioWriter>,
    transport: Option<Box<dyn TransportSync>>,
    visual_sink: Option<Box<dyn VisualSink>>,

    play_head: PlayHead,
    play_head_state: PlayHeadState,

    num_output_channels: usize,
    block_length: f64,
    num_pre_render_blocks: i64,
    precount: i64,
    stream_time: f64,
    effective_end: f64,
    samples_to_write: i64,
    latency_samples_to_drop: usize,
    last_pace_mark: Option<Instant>,

    // Measurement state. The peak floor avoids a zero result feeding
    // into normalisation gain calculations downstream.
    peak: f32,
    rms_total: f64,
    rms_count: u64,
    num_non_zero_samples: u64,
    last_block_peak: f32,

    has_started_saving: bool,
    samples_trimmed: u64,
    frames_written: u64,
    samples_written_to_sink: i64,
}

impl<P: Player> RenderContext<P> {
    /// Prepare `player` and set up the render described by `params`.
    ///
    /// Fails when the tree has no audio or the writer is not open. The
    /// tree's reported latency extends the rendered range so the full
    /// musical length survives the compensation drop.
    pub fn new(
        mut player: P,
        params: RenderParameters,
        writer: Box<dyn AudioWriter>,
    ) -> Result<Self> {
        player.prepare_to_play(params.sample_rate, params.block_size)?;

        let properties = player.root().properties();
        if !properties.has_audio {
            return Err(RenderError::NoAudioToRender);
        }
        if !writer.is_open() {
            return Err(RenderError::CannotWriteTarget);
        }

        let mut num_output_channels = 2;
        if params.must_render_in_mono
            || (params.can_render_in_mono && properties.num_channels < 2)
        {
            num_output_channels = 1;
        }

        let latency_seconds = sample_to_time(properties.latency_samples as i64, params.sample_rate);
        let effective_end = params.end_time + latency_seconds;
        let block_length = params.block_size as f64 / params.sample_rate;

        // Blank blocks played before the start to let the tree warm up.
        let num_pre_render_blocks =
            ((params.sample_rate / 2.0) / params.block_size as f64) as i64 + 1;
        let precount = num_pre_render_blocks;
        let stream_time = params.start_time - precount as f64 * block_length;

        let samples_to_write = ((effective_end - params.start_time + params.end_allowance)
            * params.sample_rate)
            .round() as i64;

        let mut play_head = PlayHead::new();
        play_head.stop();
        play_head.set_position(time_to_sample(params.start_time, params.sample_rate));

        tracing::info!(
            sample_rate = params.sample_rate,
            block_size = params.block_size,
            start = params.start_time,
            end = params.end_time,
            latency = properties.latency_samples,
            channels = num_output_channels,
            "starting render"
        );

        Ok(Self {
            latency_samples_to_drop: properties.latency_samples,
            has_started_saving: !params.trim_leading_silence,
            params,
            player,
            writer,
            transport: None,
            visual_sink: None,
            play_head,
            play_head_state: PlayHeadState::new(),
            num_output_channels,
            block_length,
            num_pre_render_blocks,
            precount,
            stream_time,
            effective_end,
            samples_to_write,
            last_pace_mark: None,
            peak: 0.0001,
            rms_total: 0.0,
            rms_count: 0,
            num_non_zero_samples: 0,
            last_block_peak: 0.0,
            samples_trimmed: 0,
            frames_written: 0,
            samples_written_to_sink: 0,
        })
    }

    /// Attach a sink for external timers.
    pub fn with_transport(mut self, transport: Box<dyn TransportSync>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Attach a waveform sink fed with everything that reaches the writer.
    pub fn with_visual_sink(mut self, mut sink: Box<dyn VisualSink>) -> Self {
        sink.reset(
            self.num_output_channels,
            self.params.sample_rate,
            self.samples_to_write,
        );
        self.visual_sink = Some(sink);
        self
    }

    /// Run the render to completion or cancellation.
    ///
    /// `should_cancel` is polled at least once per block; `progress`
    /// receives values in `[0, 1]`.
    pub fn render(
        mut self,
        should_cancel: impl Fn() -> bool,
        mut progress: impl FnMut(f32),
    ) -> Result<RenderOutcome> {
        loop {
            match self.render_next_block(&should_cancel, &mut progress)? {
                BlockOutcome::Continue => {}
                BlockOutcome::Finished => {
                    return Ok(RenderOutcome::Completed(self.finish()?));
                }
                BlockOutcome::Cancelled => {
                    self.abandon()?;
                    return Ok(RenderOutcome::Cancelled);
                }
            }
        }
    }

    fn render_next_block(
        &mut self,
        should_cancel: &impl Fn() -> bool,
        progress: &mut impl FnMut(f32),
    ) -> Result<BlockOutcome> {
        if should_cancel() {
            return Ok(BlockOutcome::Cancelled);
        }

        let mut block_end = self.stream_time + self.block_length;
        if self.precount > 0 {
            block_end = block_end.min(self.params.start_time);
        }

        // Walk the playhead towards the start during the first half of
        // the warm-up, then let it play so time-dependent nodes settle.
        if self.precount > self.num_pre_render_blocks / 2 {
            self.play_head
                .set_position(time_to_sample(self.stream_time, self.params.sample_rate));
        } else if self.precount == self.num_pre_render_blocks / 2 {
            self.play_head.play_synced_to_range(SampleRange::until_stopped(
                time_to_sample(self.stream_time, self.params.sample_rate),
            ));
        }

        if self.precount == 0 {
            self.stream_time = self.params.start_time;
            block_end = self.stream_time + self.block_length;
            self.play_head.play_synced_to_range(SampleRange::until_stopped(
                time_to_sample(self.stream_time, self.params.sample_rate),
            ));
        }

        if self.params.real_time {
            let now = Instant::now();
            if let Some(mark) = self.last_pace_mark {
                let budget = Duration::from_secs_f64(self.block_length);
                let elapsed = now.duration_since(mark);
                if elapsed < budget {
                    std::thread::sleep(budget - elapsed);
                }
            }
            self.last_pace_mark = Some(now);
        }

        if let Some(transport) = &mut self.transport {
            transport.update_timers(self.stream_time, self.params.block_size);
        }

        // Hold the block until slow sources have their data.
        while !leaf_nodes_ready(self.player.root()) {
            if should_cancel() {
                return Ok(BlockOutcome::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        let range = SampleRange::new(
            time_to_sample(self.stream_time, self.params.sample_rate),
            time_to_sample(block_end, self.params.sample_rate),
        );
        self.play_head_state.update(&self.play_head, range);
        self.player.process_block(range, self.play_head_state)?;

        let root = self.player.root().clone();
        let output = root.processed_output();
        self.last_block_peak = output.audio().peak();

        if self.precount <= 0 {
            let frames_in_block = range.len() as i64;
            let mut frames_to_handle =
                self.samples_to_write.min(frames_in_block).max(0) as usize;
            self.samples_to_write -= frames_to_handle as i64;

            let mut offset = 0;
            if self.latency_samples_to_drop > 0 {
                let dropped = self.latency_samples_to_drop.min(frames_to_handle);
                self.latency_samples_to_drop -= dropped;
                frames_to_handle -= dropped;
                offset = dropped;
            }

            if frames_to_handle > 0 {
                self.write_audio_block(&output, offset, frames_to_handle)?;
            }
        }
        drop(output);

        if self.stream_time > self.effective_end + self.params.end_allowance {
            return Ok(BlockOutcome::Finished);
        }
        if self.stream_time > self.effective_end
            && self.last_block_peak <= self.params.stop_threshold
        {
            // The tail went quiet before the end allowance ran out.
            return Ok(BlockOutcome::Finished);
        }

        let length = (self.effective_end - self.params.start_time).max(1.0);
        let mut prog = ((self.stream_time - self.params.start_time) / length) as f32;
        if self.params.post_processing_follows {
            prog *= 0.9;
        }
        progress(prog.clamp(0.0, 1.0));

        self.precount -= 1;
        self.stream_time = block_end;
        Ok(BlockOutcome::Continue)
    }

    fn write_audio_block(
        &mut self,
        output: &ProcessedOutput<'_>,
        offset: usize,
        frames: usize,
    ) -> Result<()> {
        let audio = output.audio();
        let available = audio.num_frames().saturating_sub(offset);
        let frames = frames.min(available);
        if frames == 0 {
            return Ok(());
        }

        let magnitude = audio.peak_region(offset, frames);
        self.peak = self.peak.max(magnitude);
        for c in 0..audio.num_channels().min(self.num_output_channels) {
            self.rms_total += f64::from(audio.rms_region(c, offset, frames));
            self.rms_count += 1;
        }
        for i in 0..frames {
            if audio.frame_magnitude(offset + i) > NON_ZERO_THRESHOLD {
                self.num_non_zero_samples += 1;
            }
        }

        if !self.has_started_saving && magnitude > 0.0 {
            self.has_started_saving = true;
        }
        if !self.has_started_saving {
            self.samples_trimmed += frames as u64;
        }

        // Thumbnails see the trimmed region too; only the file skips it.
        if let Some(sink) = &mut self.visual_sink {
            sink.append(self.samples_written_to_sink, audio, offset, frames);
            self.samples_written_to_sink += frames as i64;
        }

        if self.has_started_saving {
            self.writer.append(audio, offset, frames)?;
            self.frames_written += frames as u64;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<RenderStats> {
        self.play_head.stop();
        self.writer.close()?;
        let stats = RenderStats {
            peak: self.peak,
            rms: if self.rms_count > 0 {
                (self.rms_total / self.rms_count as f64) as f32
            } else {
                0.0
            },
            audio_duration: self.num_non_zero_samples as f64 / self.params.sample_rate,
            frames_written: self.frames_written,
        };
        tracing::info!(
            peak = stats.peak,
            rms = stats.rms,
            frames = stats.frames_written,
            trimmed = self.samples_trimmed,
            "render complete"
        );
        Ok(stats)
    }

    fn abandon(&mut self) -> Result<()> {
        self.play_head.stop();
        self.writer.discard()?;
        tracing::info!("render cancelled");
        Ok(())
    }
}
