//! Leaf nodes that generate audio from nothing.

use crate::error::GraphError;
use crate::node::{Node, NodeProperties, PrepareContext, ProcessContext};

/// Produces silence on a fixed number of channels.
pub struct SilenceNode {
    channels: usize,
}

impl SilenceNode {
    /// A silent source with `channels` output channels.
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl Node for SilenceNode {
    fn properties(&self) -> NodeProperties {
        NodeProperties {
            has_audio: true,
            has_midi: false,
            num_channels: self.channels,
            latency_samples: 0,
        }
    }

    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        // Output buffers arrive cleared.
        Ok(())
    }
}

/// A phase-continuous sine oscillator.
///
/// The phase advances across blocks regardless of playhead jumps, which
/// makes the output a clean reference signal for latency and level tests.
pub struct SineNode {
    frequency: f32,
    channels: usize,
    phase: f32,
    phase_increment: f32,
}

impl SineNode {
    /// A sine source at `frequency` Hz, duplicated on `channels` channels.
    pub fn new(frequency: f32, channels: usize) -> Self {
        Self {
            frequency,
            channels,
            phase: 0.0,
            phase_increment: 0.0,
        }
    }
}

impl Node for SineNode {
    fn properties(&self) -> NodeProperties {
        NodeProperties {
            has_audio: true,
            has_midi: false,
            num_channels: self.channels,
            latency_samples: 0,
        }
    }

    fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), GraphError> {
        self.phase_increment = std::f32::consts::TAU * self.frequency / ctx.sample_rate as f32;
        self.phase = 0.0;
        Ok(())
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let frames = ctx.audio.num_frames();
        for i in 0..frames {
            let sample = self.phase.sin();
            for c in 0..ctx.audio.num_channels() {
                ctx.audio.channel_mut(c)[i] = sample;
            }
            self.phase += self.phase_increment;
            if self.phase >= std::f32::consts::TAU {
                self.phase -= std::f32::consts::TAU;
            }
        }
        Ok(())
    }
}
