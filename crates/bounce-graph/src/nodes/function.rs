//! Per-sample transform node.

use crate::error::GraphError;
use crate::node::{Node, NodeProperties, NodeRef, ProcessContext, make_node};

/// Applies a pure function to every sample of its input.
pub struct FunctionNode {
    input: NodeRef,
    function: Box<dyn Fn(f32) -> f32 + Send + Sync>,
}

impl FunctionNode {
    /// Apply `function` to the output of `input`.
    pub fn new(input: NodeRef, function: impl Fn(f32) -> f32 + Send + Sync + 'static) -> Self {
        Self {
            input,
            function: Box::new(function),
        }
    }
}

impl Node for FunctionNode {
    fn properties(&self) -> NodeProperties {
        self.input.properties()
    }

    fn direct_inputs(&self) -> Vec<NodeRef> {
        vec![self.input.clone()]
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let source = self.input.processed_output();
        let channels = ctx.audio.num_channels().min(source.audio().num_channels());
        let frames = ctx.audio.num_frames().min(source.audio().num_frames());
        for c in 0..channels {
            let dest = ctx.audio.channel_mut(c);
            let src = source.audio().channel(c);
            for i in 0..frames {
                dest[i] = (self.function)(src[i]);
            }
        }
        ctx.midi.merge_from(source.midi());
        Ok(())
    }
}

/// A node that scales its input by a constant gain.
pub fn gain_node(input: NodeRef, gain: f32) -> NodeRef {
    make_node(FunctionNode::new(input, move |sample| sample * gain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PrepareContext;
    use crate::nodes::SineNode;
    use crate::play_head::PlayHeadState;
    use crate::time::SampleRange;

    #[test]
    fn test_gain_scales_input() {
        let source = make_node(SineNode::new(440.0, 2));
        let gain = gain_node(source.clone(), 0.5);
        let ctx = PrepareContext::new(44100.0, 128);
        source.prepare(&ctx).unwrap();
        gain.prepare(&ctx).unwrap();

        let range = SampleRange::new(0, 128);
        source.process(range, PlayHeadState::new()).unwrap();
        gain.process(range, PlayHeadState::new()).unwrap();

        let src = source.processed_output();
        let out = gain.processed_output();
        for c in 0..2 {
            for i in 0..128 {
                assert!((out.audio().channel(c)[i] - src.audio().channel(c)[i] * 0.5).abs() < 1e-7);
            }
        }
    }
}
