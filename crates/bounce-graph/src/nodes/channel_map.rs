//! Channel routing node.

use crate::error::GraphError;
use crate::node::{Node, NodeProperties, NodeRef, ProcessContext};

/// Routes source channels onto destination channels.
///
/// Each `(source, dest)` pair adds the source channel into the
/// destination, so several sources may legally land on one destination.
/// The declared width is one past the highest destination; unmapped
/// destinations stay silent and out-of-range pairs are skipped.
pub struct ChannelMapNode {
    input: NodeRef,
    map: Vec<(usize, usize)>,
    pass_midi: bool,
}

impl ChannelMapNode {
    /// Route `input` through `map`, optionally forwarding its MIDI.
    pub fn new(input: NodeRef, map: Vec<(usize, usize)>, pass_midi: bool) -> Self {
        Self {
            input,
            map,
            pass_midi,
        }
    }
}

impl Node for ChannelMapNode {
    fn properties(&self) -> NodeProperties {
        let input = self.input.properties();
        NodeProperties {
            has_audio: true,
            has_midi: self.pass_midi && input.has_midi,
            num_channels: self.map.iter().map(|&(_, dest)| dest + 1).max().unwrap_or(0),
            latency_samples: input.latency_samples,
        }
    }

    fn direct_inputs(&self) -> Vec<NodeRef> {
        vec![self.input.clone()]
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let source = self.input.processed_output();
        let frames = ctx.audio.num_frames().min(source.audio().num_frames());
        for &(src, dest) in &self.map {
            if src >= source.audio().num_channels() || dest >= ctx.audio.num_channels() {
                continue;
            }
            let from = source.audio().channel(src);
            let to = ctx.audio.channel_mut(dest);
            for i in 0..frames {
                to[i] += from[i];
            }
        }
        if self.pass_midi {
            ctx.midi.merge_from(source.midi());
        }
        Ok(())
    }
}
