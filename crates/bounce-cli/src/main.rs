//! Bounce CLI - offline rendering of demo node trees.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bounce")]
#[command(author, version, about = "Offline audio and MIDI render engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a demo node tree to a WAV file
    Render(commands::render::RenderArgs),

    /// Render a demo MIDI arpeggio to a standard MIDI file
    RenderMidi(commands::render_midi::RenderMidiArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::RenderMidi(args) => commands::render_midi::run(args),
    }
}
