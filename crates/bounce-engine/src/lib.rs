//! Offline rendering on top of [`bounce_graph`].
//!
//! [`RenderContext`] drives an audio render block by block into an
//! [`bounce_io::AudioWriter`], handling warm-up, latency compensation,
//! level measurement, trimming and cancellation. [`MidiRenderContext`]
//! does the same for MIDI, collecting events in quarter notes.
//! [`RackBuilder`] lowers pin-level plugin wiring onto a node tree.

mod error;
mod midi_render;
mod rack;
mod render;

pub use error::{RenderError, Result};
pub use midi_render::{MidiRenderContext, MidiRenderOutcome};
pub use rack::{
    PinEndpoint, PluginId, RackBuilder, RackConnection, RackError, RackProcessor,
};
pub use render::{
    RenderContext, RenderOutcome, RenderParameters, RenderStats, TransportSync, VisualSink,
};
