//! Block-wise audio/MIDI processing graphs.
//!
//! A render is described as a tree of [`Node`]s. Each node declares its
//! inputs, and a [`Player`] pulls the tree one block at a time in a
//! dependency-respecting order, either on the calling thread or across a
//! worker pool. Send/return nodes let signals cross the tree without
//! breaking the single-ownership rule.
//!
//! # Example
//!
//! ```rust
//! use bounce_graph::{
//!     Player, SingleThreadedPlayer, PlayHead, PlayHeadState, SampleRange,
//!     make_node, nodes::SineNode, nodes::gain_node,
//! };
//!
//! let tone = make_node(SineNode::new(440.0, 2));
//! let root = gain_node(tone, 0.5);
//!
//! let mut player = SingleThreadedPlayer::new(root);
//! player.prepare_to_play(44100.0, 512).unwrap();
//!
//! let mut head = PlayHead::new();
//! head.play_synced_to_range(SampleRange::until_stopped(0));
//! let mut state = PlayHeadState::new();
//! state.update(&head, SampleRange::new(0, 512));
//!
//! player.process_block(SampleRange::new(0, 512), state).unwrap();
//! let output = player.root().processed_output();
//! assert_eq!(output.audio().num_frames(), 512);
//! ```

mod buffer;
mod error;
mod midi;
mod multi_player;
mod node;
pub mod nodes;
mod play_head;
mod player;
mod pool;
mod tempo;
mod time;
mod traversal;

pub use buffer::AudioBuffer;
pub use error::{GraphError, Result};
pub use midi::{BeatEvent, BeatSequence, MidiBuffer, MidiEvent, MidiMessage, MidiSequence};
pub use multi_player::MultiThreadedPlayer;
pub use node::{
    BusId, IdSource, Node, NodeCell, NodeId, NodeProperties, NodeRef, PrepareContext,
    ProcessContext, ProcessedOutput, make_node,
};
pub use play_head::{PlayHead, PlayHeadState};
pub use player::{Player, SingleThreadedPlayer, prepare_tree};
pub use pool::WorkerPool;
pub use tempo::{TempoChange, TempoCursor, TempoSequence};
pub use time::{SampleRange, sample_to_time, time_range_to_samples, time_to_sample};
pub use traversal::{
    TraversalOrder, aggregate_latency, assign_node_ids, enumerate_nodes, leaf_nodes_ready,
};
