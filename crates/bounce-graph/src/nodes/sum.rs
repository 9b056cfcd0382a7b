//! Mixing node.

use crate::error::GraphError;
use crate::node::{Node, NodeProperties, NodeRef, ProcessContext};

/// Sums the audio of its inputs and concatenates their MIDI.
///
/// Inputs are accumulated in declaration order, so the mix is
/// bit-identical whichever scheduler processed the inputs. Narrow inputs
/// leave the extra channels of wider siblings untouched.
pub struct SumNode {
    owned: Vec<NodeRef>,
    referenced: Vec<NodeRef>,
}

impl SumNode {
    /// Sum `inputs`, all structurally owned.
    pub fn new(inputs: Vec<NodeRef>) -> Self {
        Self {
            owned: inputs,
            referenced: Vec::new(),
        }
    }

    /// Sum owned inputs plus `referenced` nodes owned elsewhere in the
    /// tree. Used by returns to mix in their sends.
    pub fn with_references(owned: Vec<NodeRef>, referenced: Vec<NodeRef>) -> Self {
        Self { owned, referenced }
    }
}

impl Node for SumNode {
    fn properties(&self) -> NodeProperties {
        let mut properties = NodeProperties::default();
        for input in self.owned.iter().chain(&self.referenced) {
            let p = input.properties();
            properties.has_audio |= p.has_audio;
            properties.has_midi |= p.has_midi;
            properties.num_channels = properties.num_channels.max(p.num_channels);
            properties.latency_samples = properties.latency_samples.max(p.latency_samples);
        }
        properties
    }

    fn direct_inputs(&self) -> Vec<NodeRef> {
        self.owned.iter().chain(&self.referenced).cloned().collect()
    }

    fn owned_inputs(&self) -> Vec<NodeRef> {
        self.owned.clone()
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        for input in self.owned.iter().chain(&self.referenced) {
            let source = input.processed_output();
            ctx.audio.accumulate_from(source.audio());
            ctx.midi.merge_from(source.midi());
        }
        Ok(())
    }
}
