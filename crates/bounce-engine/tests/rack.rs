//! Rack wiring tests: pin routing, sends/returns and cycle detection.

use bounce_engine::{PinEndpoint, PluginId, RackBuilder, RackError, RackProcessor};
use bounce_graph::nodes::{FunctionNode, SilenceNode};
use bounce_graph::{
    BusId, NodeRef, PlayHead, PlayHeadState, Player, SampleRange, SingleThreadedPlayer, make_node,
};

const SR: f64 = 44100.0;
const BLOCK: usize = 256;

/// A processor that scales every sample.
struct GainProcessor {
    gain: f32,
    pins: usize,
}

impl RackProcessor for GainProcessor {
    fn num_input_pins(&self) -> usize {
        self.pins
    }

    fn num_output_pins(&self) -> usize {
        self.pins
    }

    fn into_node(self: Box<Self>, input: NodeRef) -> NodeRef {
        let gain = self.gain;
        make_node(FunctionNode::new(input, move |s| s * gain))
    }
}

/// A processor that adds a fixed offset, making routing visible.
struct OffsetProcessor {
    offset: f32,
    pins: usize,
}

impl RackProcessor for OffsetProcessor {
    fn num_input_pins(&self) -> usize {
        self.pins
    }

    fn num_output_pins(&self) -> usize {
        self.pins
    }

    fn into_node(self: Box<Self>, input: NodeRef) -> NodeRef {
        let offset = self.offset;
        make_node(FunctionNode::new(input, move |s| s + offset))
    }
}

fn constant_input(value: f32, channels: usize) -> NodeRef {
    make_node(FunctionNode::new(
        make_node(SilenceNode::new(channels)),
        move |_| value,
    ))
}

fn render_one_block(root: NodeRef) -> Vec<Vec<f32>> {
    let mut player = SingleThreadedPlayer::new(root);
    player.prepare_to_play(SR, BLOCK).unwrap();
    let mut head = PlayHead::new();
    head.play_synced_to_range(SampleRange::until_stopped(0));
    let mut state = PlayHeadState::new();
    let range = SampleRange::new(0, BLOCK as i64);
    state.update(&head, range);
    player.process_block(range, state).unwrap();
    let out = player.root().processed_output();
    (0..out.audio().num_channels())
        .map(|c| out.audio().channel(c).to_vec())
        .collect()
}

#[test]
fn test_straight_chain_processes_in_order() {
    let mut rack = RackBuilder::new(1, 1);
    let double = rack.add_processor(Box::new(GainProcessor { gain: 2.0, pins: 1 }));
    let plus = rack.add_processor(Box::new(OffsetProcessor {
        offset: 0.1,
        pins: 1,
    }));
    rack.connect(PinEndpoint::Rack, 0, PinEndpoint::Plugin(double), 0)
        .unwrap();
    rack.connect(PinEndpoint::Plugin(double), 0, PinEndpoint::Plugin(plus), 0)
        .unwrap();
    rack.connect(PinEndpoint::Plugin(plus), 0, PinEndpoint::Rack, 0)
        .unwrap();

    let root = rack.build(constant_input(0.25, 1)).unwrap();
    let output = render_one_block(root);
    // 0.25 * 2 + 0.1
    assert!(output[0].iter().all(|&s| (s - 0.6).abs() < 1e-6));
}

#[test]
fn test_fanned_out_source_feeds_both_destinations() {
    // One plugin's output wired to two rack output pins.
    let mut rack = RackBuilder::new(1, 2);
    let gain = rack.add_processor(Box::new(GainProcessor { gain: 0.5, pins: 1 }));
    rack.connect(PinEndpoint::Rack, 0, PinEndpoint::Plugin(gain), 0)
        .unwrap();
    rack.connect(PinEndpoint::Plugin(gain), 0, PinEndpoint::Rack, 0)
        .unwrap();
    rack.connect(PinEndpoint::Plugin(gain), 0, PinEndpoint::Rack, 1)
        .unwrap();

    let root = rack.build(constant_input(0.5, 1)).unwrap();
    let output = render_one_block(root);
    assert_eq!(output.len(), 2);
    assert!(output[0].iter().all(|&s| (s - 0.25).abs() < 1e-6));
    assert!(output[1].iter().all(|&s| (s - 0.25).abs() < 1e-6));
}

// A stereo source with distinct per-channel levels.
struct TwoLevels;

impl bounce_graph::Node for TwoLevels {
    fn properties(&self) -> bounce_graph::NodeProperties {
        bounce_graph::NodeProperties {
            has_audio: true,
            has_midi: false,
            num_channels: 2,
            latency_samples: 0,
        }
    }

    fn process(
        &mut self,
        ctx: &mut bounce_graph::ProcessContext<'_>,
    ) -> Result<(), bounce_graph::GraphError> {
        ctx.audio.channel_mut(0).fill(0.2);
        ctx.audio.channel_mut(1).fill(0.7);
        Ok(())
    }
}

#[test]
fn test_pin_crossover_swaps_channels() {
    let mut rack = RackBuilder::new(2, 2);
    rack.connect(PinEndpoint::Rack, 0, PinEndpoint::Rack, 1).unwrap();
    rack.connect(PinEndpoint::Rack, 1, PinEndpoint::Rack, 0).unwrap();

    let root = rack.build(make_node(TwoLevels)).unwrap();
    let output = render_one_block(root);
    assert_eq!(output.len(), 2);
    assert!(output[0].iter().all(|&s| (s - 0.7).abs() < 1e-6));
    assert!(output[1].iter().all(|&s| (s - 0.2).abs() < 1e-6));
}

#[test]
fn test_feedback_through_bus_is_allowed() {
    // gain -> send -> (bus 1) ... return mixes the send back in. The
    // direct connections stay acyclic, so this builds and runs.
    let mut rack = RackBuilder::new(1, 1);
    let send = rack.add_send(BusId(1), 1);
    let ret = rack.add_return(BusId(1), 1);
    rack.connect(PinEndpoint::Rack, 0, PinEndpoint::Plugin(send), 0)
        .unwrap();
    rack.connect(PinEndpoint::Plugin(send), 0, PinEndpoint::Rack, 0)
        .unwrap();
    rack.connect(PinEndpoint::Plugin(ret), 0, PinEndpoint::Rack, 0)
        .unwrap();

    let root = rack.build(constant_input(0.3, 1)).unwrap();
    let output = render_one_block(root);
    // Dry path carries 0.3; the return's own input is silence and the
    // bus contributes another 0.3.
    assert!(output[0].iter().all(|&s| (s - 0.6).abs() < 1e-6));
}

#[test]
fn test_direct_cycle_is_rejected() {
    let mut rack = RackBuilder::new(1, 1);
    let a = rack.add_processor(Box::new(GainProcessor { gain: 1.0, pins: 1 }));
    let b = rack.add_processor(Box::new(GainProcessor { gain: 1.0, pins: 1 }));
    rack.connect(PinEndpoint::Plugin(a), 0, PinEndpoint::Plugin(b), 0)
        .unwrap();
    rack.connect(PinEndpoint::Plugin(b), 0, PinEndpoint::Plugin(a), 0)
        .unwrap();
    assert!(matches!(
        rack.build(constant_input(0.0, 1)),
        Err(RackError::CycleDetected)
    ));
}

#[test]
fn test_unknown_plugin_and_bad_pin_are_rejected() {
    let mut rack = RackBuilder::new(1, 1);
    let gain = rack.add_processor(Box::new(GainProcessor { gain: 1.0, pins: 1 }));
    assert!(matches!(
        rack.connect(PinEndpoint::Plugin(gain), 5, PinEndpoint::Rack, 0),
        Err(RackError::PinOutOfRange { pin: 5, .. })
    ));
    assert!(matches!(
        rack.connect(PinEndpoint::Rack, 0, PinEndpoint::Plugin(gain), 9),
        Err(RackError::PinOutOfRange { pin: 9, .. })
    ));

    let bogus = unknown_id();
    assert!(matches!(
        rack.connect(PinEndpoint::Plugin(bogus), 0, PinEndpoint::Rack, 0),
        Err(RackError::UnknownPlugin(_))
    ));
}

// Ids are opaque; fabricate one by exhausting a throwaway builder.
fn unknown_id() -> PluginId {
    let mut other = RackBuilder::new(0, 0);
    for _ in 0..100 {
        other.add_processor(Box::new(GainProcessor { gain: 1.0, pins: 1 }));
    }
    other.add_processor(Box::new(GainProcessor { gain: 1.0, pins: 1 }))
}

#[test]
fn test_unconnected_rack_outputs_silence() {
    let rack = RackBuilder::new(1, 2);
    let root = rack.build(constant_input(0.9, 1)).unwrap();
    let output = render_one_block(root);
    assert_eq!(output.len(), 2);
    assert!(output.iter().all(|c| c.iter().all(|&s| s == 0.0)));
}
