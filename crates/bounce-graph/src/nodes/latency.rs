//! Fixed-delay node for latency compensation testing.

use std::collections::VecDeque;

use crate::error::GraphError;
use crate::node::{Node, NodeProperties, NodeRef, PrepareContext, ProcessContext};

/// Delays its input by a fixed number of samples and reports that amount
/// as latency, so the render driver's compensation realigns the output.
pub struct LatencyNode {
    input: NodeRef,
    latency_samples: usize,
    delay_lines: Vec<VecDeque<f32>>,
}

impl LatencyNode {
    /// Delay `input` by `latency_samples`.
    pub fn new(input: NodeRef, latency_samples: usize) -> Self {
        Self {
            input,
            latency_samples,
            delay_lines: Vec::new(),
        }
    }
}

impl Node for LatencyNode {
    fn properties(&self) -> NodeProperties {
        let mut properties = self.input.properties();
        properties.latency_samples += self.latency_samples;
        properties
    }

    fn direct_inputs(&self) -> Vec<NodeRef> {
        vec![self.input.clone()]
    }

    fn prepare(&mut self, _ctx: &PrepareContext) -> Result<(), GraphError> {
        let channels = self.input.properties().num_channels;
        self.delay_lines = (0..channels)
            .map(|_| VecDeque::from(vec![0.0; self.latency_samples]))
            .collect();
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let source = self.input.processed_output();
        let channels = ctx
            .audio
            .num_channels()
            .min(source.audio().num_channels())
            .min(self.delay_lines.len());
        let frames = ctx.audio.num_frames().min(source.audio().num_frames());
        for c in 0..channels {
            let line = &mut self.delay_lines[c];
            let src = source.audio().channel(c);
            let dest = ctx.audio.channel_mut(c);
            for i in 0..frames {
                line.push_back(src[i]);
                dest[i] = line.pop_front().unwrap_or(0.0);
            }
        }
        ctx.midi.merge_from(source.midi());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::make_node;
    use crate::nodes::SineNode;
    use crate::play_head::PlayHeadState;
    use crate::time::SampleRange;

    #[test]
    fn test_output_is_delayed_copy() {
        let source = make_node(SineNode::new(500.0, 1));
        let delayed = make_node(LatencyNode::new(source.clone(), 10));
        let ctx = PrepareContext::new(48000.0, 32);
        source.prepare(&ctx).unwrap();
        delayed.prepare(&ctx).unwrap();
        assert_eq!(delayed.properties().latency_samples, 10);

        let mut raw = Vec::new();
        let mut shifted = Vec::new();
        for block in 0..4 {
            let range = SampleRange::new(block * 32, (block + 1) * 32);
            source.process(range, PlayHeadState::new()).unwrap();
            delayed.process(range, PlayHeadState::new()).unwrap();
            raw.extend_from_slice(source.processed_output().audio().channel(0));
            shifted.extend_from_slice(delayed.processed_output().audio().channel(0));
        }

        for i in 0..10 {
            assert_eq!(shifted[i], 0.0);
        }
        for i in 10..shifted.len() {
            assert_eq!(shifted[i], raw[i - 10]);
        }
    }
}
