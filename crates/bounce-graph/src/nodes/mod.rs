//! Built-in node implementations.

mod bus;
mod channel_map;
mod function;
mod latency;
mod midi_source;
mod source;
mod sum;

pub use bus::{ReturnNode, SendNode};
pub use channel_map::ChannelMapNode;
pub use function::{FunctionNode, gain_node};
pub use latency::LatencyNode;
pub use midi_source::MidiSequenceNode;
pub use source::{SilenceNode, SineNode};
pub use sum::SumNode;
