//! End-to-end render tests with in-memory and file-backed writers.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bounce_engine::{
    MidiRenderContext, MidiRenderOutcome, RenderContext, RenderError, RenderOutcome,
    RenderParameters,
};
use bounce_graph::nodes::{LatencyNode, MidiSequenceNode, SineNode};
use bounce_graph::{
    AudioBuffer, BeatSequence, GraphError, MidiMessage, MidiSequence, Node, NodeProperties,
    ProcessContext, SingleThreadedPlayer, TempoSequence, make_node,
};
use bounce_io::{AudioWriter, MidiWriter, WavBlockWriter};

const SR: f64 = 44100.0;
const BLOCK: usize = 512;

/// Frames captured by a [`MemoryWriter`], observable after the engine
/// has consumed the writer box.
#[derive(Default)]
struct CapturedFrames {
    channels: Mutex<Vec<Vec<f32>>>,
}

/// Collects appended audio in memory, mimicking a file writer.
#[derive(Default)]
struct MemoryWriter {
    channels: Vec<Vec<f32>>,
    closed: Arc<AtomicBool>,
    discarded: Arc<AtomicBool>,
    captured: Option<Arc<CapturedFrames>>,
}

impl MemoryWriter {
    fn capturing(captured: Arc<CapturedFrames>) -> Self {
        Self {
            captured: Some(captured),
            ..Self::default()
        }
    }
}

impl AudioWriter for MemoryWriter {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.discarded.load(Ordering::SeqCst)
    }

    fn append(
        &mut self,
        audio: &AudioBuffer,
        offset: usize,
        frames: usize,
    ) -> bounce_io::Result<()> {
        if self.channels.len() < audio.num_channels() {
            self.channels.resize(audio.num_channels(), Vec::new());
        }
        for c in 0..audio.num_channels() {
            self.channels[c].extend_from_slice(&audio.channel(c)[offset..offset + frames]);
        }
        Ok(())
    }

    fn close(&mut self) -> bounce_io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(captured) = &self.captured {
            *captured.channels.lock().unwrap() = self.channels.clone();
        }
        Ok(())
    }

    fn discard(&mut self) -> bounce_io::Result<()> {
        self.discarded.store(true, Ordering::SeqCst);
        self.channels.clear();
        Ok(())
    }
}

fn run_render(
    root: bounce_graph::NodeRef,
    params: RenderParameters,
) -> (RenderOutcome, Vec<Vec<f32>>) {
    let captured = Arc::new(CapturedFrames::default());
    let writer = MemoryWriter::capturing(captured.clone());
    let context = RenderContext::new(SingleThreadedPlayer::new(root), params, Box::new(writer))
        .unwrap();
    let outcome = context.render(|| false, |_| {}).unwrap();
    let channels = captured.channels.lock().unwrap().clone();
    (outcome, channels)
}

fn completed(outcome: RenderOutcome) -> bounce_engine::RenderStats {
    match outcome {
        RenderOutcome::Completed(stats) => stats,
        RenderOutcome::Cancelled => panic!("render was cancelled"),
    }
}

#[test]
fn test_sine_render_levels_and_length() {
    let params = RenderParameters::new(SR, BLOCK, 0.0, 2.0);
    let (outcome, channels) = run_render(make_node(SineNode::new(440.0, 2)), params);

    let stats = completed(outcome);
    assert_eq!(stats.frames_written, (2.0 * SR) as u64);
    assert_eq!(channels[0].len(), (2.0 * SR) as usize);
    assert!(stats.peak >= 0.99 && stats.peak <= 1.001);
    assert!((stats.rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.02);
    assert!((stats.audio_duration - 2.0).abs() < 0.01);
}

#[test]
fn test_latency_is_dropped_and_length_preserved() {
    // Reference render without latency.
    let (reference_outcome, reference) = run_render(
        make_node(SineNode::new(440.0, 1)),
        RenderParameters::new(SR, BLOCK, 0.0, 2.0),
    );
    let reference_stats = completed(reference_outcome);

    let latency = 1000;
    let tree = make_node(LatencyNode::new(make_node(SineNode::new(440.0, 1)), latency));
    let (outcome, delayed) = run_render(tree, RenderParameters::new(SR, BLOCK, 0.0, 2.0));
    let stats = completed(outcome);

    // Compensation drops exactly the delay, so length and content match
    // the latency-free render bit for bit.
    assert_eq!(stats.frames_written, reference_stats.frames_written);
    assert_eq!(delayed[0], reference[0]);
}

#[test]
fn test_mono_tree_renders_mono_when_allowed() {
    let mut params = RenderParameters::new(SR, BLOCK, 0.0, 0.5);
    params.can_render_in_mono = true;
    let (_, channels) = run_render(make_node(SineNode::new(440.0, 1)), params);
    assert_eq!(channels.len(), 1);
}

#[test]
fn test_midi_only_tree_has_no_audio() {
    let root = make_node(MidiSequenceNode::new(MidiSequence::new()));
    let result = RenderContext::new(
        SingleThreadedPlayer::new(root),
        RenderParameters::new(SR, BLOCK, 0.0, 1.0),
        Box::new(MemoryWriter::default()),
    );
    assert!(matches!(result, Err(RenderError::NoAudioToRender)));
}

// Silent until `from_sample` on the timeline, then a constant level.
struct GatedTone {
    from_sample: i64,
    level: f32,
}

impl Node for GatedTone {
    fn properties(&self) -> NodeProperties {
        NodeProperties {
            has_audio: true,
            has_midi: false,
            num_channels: 1,
            latency_samples: 0,
        }
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let start = ctx.sample_range.start;
        let channel = ctx.audio.channel_mut(0);
        for (i, sample) in channel.iter_mut().enumerate() {
            if start + i as i64 >= self.from_sample {
                *sample = self.level;
            }
        }
        Ok(())
    }
}

#[test]
fn test_trim_skips_leading_silent_blocks() {
    let silent_seconds = 1.0;
    let mut params = RenderParameters::new(SR, BLOCK, 0.0, 2.0);
    params.trim_leading_silence = true;
    let tree = make_node(GatedTone {
        from_sample: (silent_seconds * SR) as i64,
        level: 0.5,
    });
    let (outcome, channels) = run_render(tree, params);

    let stats = completed(outcome);
    let total = (2.0 * SR) as u64;
    let silent = (silent_seconds * SR) as u64;
    // Only whole silent blocks are trimmed.
    let trimmed = (silent / BLOCK as u64) * BLOCK as u64;
    assert_eq!(stats.frames_written, total - trimmed);
    assert!(channels[0].iter().any(|&s| s != 0.0));
    assert!((stats.audio_duration - 1.0).abs() < 0.05);
}

#[test]
fn test_cancellation_discards_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cancelled.wav");
    let writer = WavBlockWriter::create(&path, 2, SR as u32, 32).unwrap();

    let params = RenderParameters::new(SR, BLOCK, 0.0, 10.0);
    let context = RenderContext::new(
        SingleThreadedPlayer::new(make_node(SineNode::new(440.0, 2))),
        params,
        Box::new(writer),
    )
    .unwrap();

    // Let a few hundred blocks through, then cancel.
    let calls = AtomicUsize::new(0);
    let outcome = context
        .render(|| calls.fetch_add(1, Ordering::SeqCst) > 200, |_| {})
        .unwrap();
    assert!(matches!(outcome, RenderOutcome::Cancelled));
    assert!(!path.exists());
}

#[test]
fn test_progress_is_monotonic_and_scaled_for_post_pass() {
    let mut params = RenderParameters::new(SR, BLOCK, 0.0, 1.0);
    params.post_processing_follows = true;

    let context = RenderContext::new(
        SingleThreadedPlayer::new(make_node(SineNode::new(440.0, 2))),
        params,
        Box::new(MemoryWriter::default()),
    )
    .unwrap();

    let last = Cell::new(0.0f32);
    context
        .render(
            || false,
            |p| {
                assert!(p >= last.get());
                assert!(p <= 0.9 + 1e-6);
                last.set(p);
            },
        )
        .unwrap();
    assert!(last.get() > 0.5);
}

/// Captures the sequence handed to the writer.
#[derive(Default)]
struct MemoryMidiWriter {
    written: Arc<Mutex<Option<BeatSequence>>>,
}

impl MidiWriter for MemoryMidiWriter {
    fn write(&mut self, sequence: &BeatSequence, _tempo: &TempoSequence) -> bounce_io::Result<()> {
        *self.written.lock().unwrap() = Some(sequence.clone());
        Ok(())
    }
}

fn midi_tree(times: &[f64]) -> bounce_graph::NodeRef {
    let mut sequence = MidiSequence::new();
    for (i, &t) in times.iter().enumerate() {
        sequence.add_event(t, MidiMessage::note_on(0, 60 + i as u8, 100));
    }
    make_node(MidiSequenceNode::new(sequence))
}

#[test]
fn test_midi_render_converts_seconds_to_beats() {
    let tempo = TempoSequence::constant(120.0);
    let mut writer = MemoryMidiWriter::default();
    let written = writer.written.clone();

    let context = MidiRenderContext::new(
        SingleThreadedPlayer::new(midi_tree(&[0.0, 0.5, 1.0, 1.5])),
        SR,
        BLOCK,
        0.0,
        2.0,
        &tempo,
        &mut writer,
    )
    .unwrap();
    let outcome = context.render(|| false, |_| {}).unwrap();

    let sequence = match outcome {
        MidiRenderOutcome::Completed(sequence) => sequence,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(sequence.len(), 4);
    // 120 bpm turns half-second steps into single beats.
    for (i, event) in sequence.events().iter().enumerate() {
        assert!((event.beats - i as f64).abs() < 0.02, "event {i}");
    }
    assert!(written.lock().unwrap().is_some());
}

#[test]
fn test_midi_render_reports_empty_trees() {
    let tempo = TempoSequence::constant(120.0);
    let mut writer = MemoryMidiWriter::default();
    let written = writer.written.clone();
    let context = MidiRenderContext::new(
        SingleThreadedPlayer::new(midi_tree(&[])),
        SR,
        BLOCK,
        0.0,
        1.0,
        &tempo,
        &mut writer,
    )
    .unwrap();
    let outcome = context.render(|| false, |_| {}).unwrap();
    assert!(matches!(outcome, MidiRenderOutcome::NoEvents));
    assert!(written.lock().unwrap().is_none());
}

#[test]
fn test_midi_render_can_be_cancelled() {
    let tempo = TempoSequence::constant(120.0);
    let mut writer = MemoryMidiWriter::default();
    let context = MidiRenderContext::new(
        SingleThreadedPlayer::new(midi_tree(&[0.5])),
        SR,
        BLOCK,
        0.0,
        60.0,
        &tempo,
        &mut writer,
    )
    .unwrap();
    let outcome = context.render(|| true, |_| {}).unwrap();
    assert!(matches!(outcome, MidiRenderOutcome::Cancelled));
}

#[test]
fn test_quiet_tail_stops_before_end_allowance() {
    // A tone that goes silent at 1 s, rendered with a long allowance,
    // should stop once the tail is quiet rather than play it all out.
    let mut params = RenderParameters::new(SR, BLOCK, 0.0, 1.5);
    params.end_allowance = 10.0;

    struct DyingTone;
    impl Node for DyingTone {
        fn properties(&self) -> NodeProperties {
            NodeProperties {
                has_audio: true,
                has_midi: false,
                num_channels: 1,
                latency_samples: 0,
            }
        }
        fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
            let start = ctx.sample_range.start;
            let cutoff = SR as i64;
            let channel = ctx.audio.channel_mut(0);
            for (i, sample) in channel.iter_mut().enumerate() {
                if start + i as i64 >= 0 && start + (i as i64) < cutoff {
                    *sample = 0.25;
                }
            }
            Ok(())
        }
    }

    let (outcome, channels) = run_render(make_node(DyingTone), params);
    assert!(matches!(outcome, RenderOutcome::Completed(_)));
    // Far less than the 11.5 s the full allowance would have produced.
    assert!(channels[0].len() < (3.0 * SR) as usize);
}
