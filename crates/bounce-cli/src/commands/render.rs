//! Offline audio render command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use bounce_engine::{RenderContext, RenderOutcome, RenderParameters, RenderStats};
use bounce_graph::nodes::{
    LatencyNode, ReturnNode, SendNode, SilenceNode, SineNode, SumNode, gain_node,
};
use bounce_graph::{
    BusId, MultiThreadedPlayer, NodeRef, Player, SingleThreadedPlayer, make_node,
};
use bounce_io::{WavBlockWriter, read_wav, write_wav};

#[derive(Clone, Copy, ValueEnum)]
enum DemoGraph {
    /// A single sine oscillator
    Sine,
    /// Two detuned sines summed into one tree
    Chain,
    /// A sine routed through a send/return bus
    SendReturn,
}

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Demo tree to render
    #[arg(long, value_enum, default_value = "sine")]
    graph: DemoGraph,

    /// Oscillator frequency in Hz
    #[arg(long, default_value = "440.0")]
    frequency: f32,

    /// Rendered length in seconds
    #[arg(long, default_value = "5.0")]
    duration: f64,

    /// Sample rate
    #[arg(long, default_value = "44100")]
    sample_rate: u32,

    /// Processing block size
    #[arg(long, default_value = "512")]
    block_size: usize,

    /// Tree channel count
    #[arg(long, default_value = "2")]
    channels: usize,

    /// Worker threads (0 renders on the calling thread)
    #[arg(long, default_value = "0")]
    threads: usize,

    /// Pace the render at wall-clock speed
    #[arg(long)]
    realtime: bool,

    /// Skip leading silence in the output file
    #[arg(long)]
    trim: bool,

    /// Normalise the file to peak 1.0 after rendering
    #[arg(long)]
    normalize: bool,

    /// Extra tail time in seconds
    #[arg(long, default_value = "0.0")]
    tail: f64,

    /// Report latency on the tree root, in milliseconds
    #[arg(long, default_value = "0.0")]
    latency_ms: f64,

    /// Output bit depth (16, 24, or 32)
    #[arg(long, default_value = "32")]
    bit_depth: u16,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut root = build_graph(&args);
    if args.latency_ms > 0.0 {
        let samples = (args.latency_ms / 1000.0 * f64::from(args.sample_rate)).round() as usize;
        root = make_node(LatencyNode::new(root, samples));
    }

    let mut params = RenderParameters::new(
        f64::from(args.sample_rate),
        args.block_size,
        0.0,
        args.duration,
    );
    params.real_time = args.realtime;
    params.trim_leading_silence = args.trim;
    params.end_allowance = args.tail;
    params.can_render_in_mono = args.channels < 2;
    params.post_processing_follows = args.normalize;

    let file_channels = if args.channels < 2 { 1 } else { 2 };
    let writer = WavBlockWriter::create(
        &args.output,
        file_channels,
        args.sample_rate,
        args.bit_depth,
    )?;

    println!("Rendering {:.2}s to {}...", args.duration, args.output.display());

    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("##-"),
    );

    let cancel = super::cancel_flag();
    let outcome = if args.threads == 0 {
        run_render(SingleThreadedPlayer::new(root), params, writer, &cancel, &pb)?
    } else {
        run_render(
            MultiThreadedPlayer::with_workers(root, args.threads),
            params,
            writer,
            &cancel,
            &pb,
        )?
    };
    pb.finish_and_clear();

    match outcome {
        RenderOutcome::Cancelled => {
            println!("Render cancelled; partial output removed.");
        }
        RenderOutcome::Completed(stats) => {
            if args.normalize {
                normalize_file(&args.output, args.bit_depth, stats.peak)?;
            }
            print_stats(&stats);
            println!("Done!");
        }
    }

    Ok(())
}

fn build_graph(args: &RenderArgs) -> NodeRef {
    match args.graph {
        DemoGraph::Sine => gain_node(
            make_node(SineNode::new(args.frequency, args.channels)),
            0.5,
        ),
        DemoGraph::Chain => {
            let low = gain_node(
                make_node(SineNode::new(args.frequency, args.channels)),
                0.4,
            );
            let high = gain_node(
                make_node(SineNode::new(args.frequency * 1.5, args.channels)),
                0.4,
            );
            make_node(SumNode::new(vec![low, high]))
        }
        DemoGraph::SendReturn => {
            let dry = gain_node(
                make_node(SineNode::new(args.frequency, args.channels)),
                0.5,
            );
            let send = make_node(SendNode::new(dry, BusId(1)));
            let ret = make_node(ReturnNode::new(
                make_node(SilenceNode::new(args.channels)),
                BusId(1),
            ));
            gain_node(make_node(SumNode::new(vec![send, ret])), 0.5)
        }
    }
}

fn run_render<P: Player>(
    player: P,
    params: RenderParameters,
    writer: WavBlockWriter,
    cancel: &Arc<AtomicBool>,
    pb: &ProgressBar,
) -> anyhow::Result<RenderOutcome> {
    let context = RenderContext::new(player, params, Box::new(writer))?;
    let outcome = context.render(
        || cancel.load(Ordering::SeqCst),
        |progress| pb.set_position((progress * 1000.0) as u64),
    )?;
    Ok(outcome)
}

// Rewrites the finished file scaled so its peak hits 1.0.
fn normalize_file(path: &Path, bit_depth: u16, peak: f32) -> anyhow::Result<()> {
    if peak <= 0.0 {
        return Ok(());
    }
    let gain = 1.0 / peak;
    let (mut channels, sample_rate) = read_wav(path)?;
    for channel in &mut channels {
        for sample in channel {
            *sample *= gain;
        }
    }
    write_wav(path, &channels, sample_rate, bit_depth)?;
    println!("Normalised by {:.1} dB", linear_to_db(gain));
    Ok(())
}

fn print_stats(stats: &RenderStats) {
    println!("\nStats:");
    println!(
        "  Peak {:.1} dB, RMS {:.1} dB",
        linear_to_db(stats.peak),
        linear_to_db(stats.rms)
    );
    println!(
        "  {} frames written, {:.2}s of audible audio",
        stats.frames_written, stats.audio_duration
    );
}

fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}
