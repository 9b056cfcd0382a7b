//! Offline MIDI render command.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use bounce_engine::{MidiRenderContext, MidiRenderOutcome};
use bounce_graph::nodes::MidiSequenceNode;
use bounce_graph::{
    MidiEvent, MidiMessage, MidiSequence, SingleThreadedPlayer, TempoSequence, make_node,
};
use bounce_io::SmfFileWriter;

#[derive(Args)]
pub struct RenderMidiArgs {
    /// Output MIDI file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Tempo in beats per minute
    #[arg(long, default_value = "120.0")]
    bpm: f64,

    /// Rendered length in seconds
    #[arg(long, default_value = "4.0")]
    duration: f64,

    /// Sample rate driving the block loop
    #[arg(long, default_value = "44100")]
    sample_rate: u32,

    /// Processing block size
    #[arg(long, default_value = "512")]
    block_size: usize,
}

pub fn run(args: RenderMidiArgs) -> anyhow::Result<()> {
    let root = make_node(MidiSequenceNode::new(arpeggio(args.duration)));
    let player = SingleThreadedPlayer::new(root);

    let tempo = TempoSequence::constant(args.bpm);
    let mut writer = SmfFileWriter::new(&args.output);

    println!(
        "Rendering {:.2}s of MIDI to {}...",
        args.duration,
        args.output.display()
    );

    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("##-"),
    );

    let cancel = super::cancel_flag();
    let context = MidiRenderContext::new(
        player,
        f64::from(args.sample_rate),
        args.block_size,
        0.0,
        args.duration,
        &tempo,
        &mut writer,
    )?;
    let outcome = context.render(
        || cancel.load(Ordering::SeqCst),
        |progress| pb.set_position((progress * 1000.0) as u64),
    )?;
    pb.finish_and_clear();

    match outcome {
        MidiRenderOutcome::Completed(sequence) => {
            println!("Wrote {} events at {} bpm. Done!", sequence.len(), args.bpm);
        }
        MidiRenderOutcome::NoEvents => {
            println!("The tree produced no MIDI; nothing was written.");
        }
        MidiRenderOutcome::Cancelled => {
            println!("Render cancelled; nothing was written.");
        }
    }

    Ok(())
}

// A C major arpeggio, one note every half second.
fn arpeggio(duration: f64) -> MidiSequence {
    let notes = [60u8, 64, 67, 72];
    let mut events = Vec::new();
    let mut time = 0.0;
    let mut step = 0;
    while time < duration {
        let note = notes[step % notes.len()];
        events.push(MidiEvent {
            time,
            message: MidiMessage::note_on(0, note, 96),
        });
        events.push(MidiEvent {
            time: time + 0.4,
            message: MidiMessage::note_off(0, note),
        });
        time += 0.5;
        step += 1;
    }
    MidiSequence::from_events(events)
}
