//! Rack graphs: pin-level plugin wiring lowered onto a node tree.
//!
//! A rack is a small patchbay: plugins with numbered input and output
//! pins, wired to each other and to the rack's own input and output
//! pins. Building a rack resolves the wiring into ordinary graph nodes,
//! with a channel-mapped summing stage in front of every plugin.
//! Feedback is only possible through send/return buses, never through
//! direct pin connections.

use std::collections::{HashMap, HashSet, VecDeque};

use bounce_graph::nodes::{ChannelMapNode, ReturnNode, SendNode, SilenceNode, SumNode};
use bounce_graph::{
    BusId, GraphError, Node, NodeProperties, NodeRef, ProcessContext, make_node,
};

/// Identifies one slot in a rack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PluginId(u32);

/// One end of a rack connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PinEndpoint {
    /// The rack's own input pins (as a source) or output pins (as a
    /// destination).
    Rack,
    /// A plugin slot's pins.
    Plugin(PluginId),
}

/// A single pin-to-pin wire.
#[derive(Clone, Copy, Debug)]
pub struct RackConnection {
    /// Where the signal comes from.
    pub source: PinEndpoint,
    /// Output pin index on the source.
    pub source_pin: usize,
    /// Where the signal goes.
    pub dest: PinEndpoint,
    /// Input pin index on the destination.
    pub dest_pin: usize,
}

/// A processor that can sit in a rack slot.
pub trait RackProcessor: Send {
    /// Number of audio input pins.
    fn num_input_pins(&self) -> usize;

    /// Number of audio output pins.
    fn num_output_pins(&self) -> usize;

    /// Consume the processor, wrapping `input` into its node form.
    fn into_node(self: Box<Self>, input: NodeRef) -> NodeRef;
}

/// Errors raised while building a rack.
#[derive(Debug, thiserror::Error)]
pub enum RackError {
    /// A connection references a plugin id the rack does not contain.
    #[error("rack connection references unknown plugin {0:?}")]
    UnknownPlugin(PluginId),

    /// A connection addresses a pin past the endpoint's declared width.
    #[error("connection pin {pin} out of range for endpoint with {width} pins")]
    PinOutOfRange {
        /// The offending pin index.
        pin: usize,
        /// The endpoint's declared pin count.
        width: usize,
    },

    /// The direct connections form a loop. Feedback must go through a
    /// send/return bus instead.
    #[error("rack contains a cycle in its direct connections")]
    CycleDetected,
}

// A read-only tap on a node owned elsewhere. A source wired to several
// destinations is owned by the first and tapped by the rest, keeping the
// single-ownership rule intact.
struct SharedSource {
    inner: NodeRef,
}

impl Node for SharedSource {
    fn properties(&self) -> NodeProperties {
        self.inner.properties()
    }

    fn direct_inputs(&self) -> Vec<NodeRef> {
        vec![self.inner.clone()]
    }

    fn owned_inputs(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError> {
        let source = self.inner.processed_output();
        ctx.audio.copy_from(source.audio());
        ctx.midi.merge_from(source.midi());
        Ok(())
    }
}

enum SlotKind {
    Processor(Box<dyn RackProcessor>),
    Send(BusId, usize),
    Return(BusId, usize),
}

impl SlotKind {
    fn num_input_pins(&self) -> usize {
        match self {
            SlotKind::Processor(p) => p.num_input_pins(),
            SlotKind::Send(_, pins) | SlotKind::Return(_, pins) => *pins,
        }
    }

    fn num_output_pins(&self) -> usize {
        match self {
            SlotKind::Processor(p) => p.num_output_pins(),
            SlotKind::Send(_, pins) | SlotKind::Return(_, pins) => *pins,
        }
    }
}

/// Builds a node tree from plugins and pin connections.
pub struct RackBuilder {
    num_input_pins: usize,
    num_output_pins: usize,
    ids: Vec<PluginId>,
    kinds: Vec<SlotKind>,
    connections: Vec<RackConnection>,
    next_id: u32,
}

impl RackBuilder {
    /// A rack with the given input and output pin counts.
    pub fn new(num_input_pins: usize, num_output_pins: usize) -> Self {
        Self {
            num_input_pins,
            num_output_pins,
            ids: Vec::new(),
            kinds: Vec::new(),
            connections: Vec::new(),
            next_id: 0,
        }
    }

    fn push_slot(&mut self, kind: SlotKind) -> PluginId {
        let id = PluginId(self.next_id);
        self.next_id += 1;
        self.ids.push(id);
        self.kinds.push(kind);
        id
    }

    /// Add a processor slot.
    pub fn add_processor(&mut self, processor: Box<dyn RackProcessor>) -> PluginId {
        self.push_slot(SlotKind::Processor(processor))
    }

    /// Add a send slot with `pins` pass-through pins.
    pub fn add_send(&mut self, bus: BusId, pins: usize) -> PluginId {
        self.push_slot(SlotKind::Send(bus, pins))
    }

    /// Add a return slot with `pins` pass-through pins.
    pub fn add_return(&mut self, bus: BusId, pins: usize) -> PluginId {
        self.push_slot(SlotKind::Return(bus, pins))
    }

    fn slot_index(&self, id: PluginId) -> Result<usize, RackError> {
        self.ids
            .iter()
            .position(|&existing| existing == id)
            .ok_or(RackError::UnknownPlugin(id))
    }

    /// Wire `source_pin` of `source` into `dest_pin` of `dest`.
    pub fn connect(
        &mut self,
        source: PinEndpoint,
        source_pin: usize,
        dest: PinEndpoint,
        dest_pin: usize,
    ) -> Result<(), RackError> {
        let source_width = match source {
            PinEndpoint::Rack => self.num_input_pins,
            PinEndpoint::Plugin(id) => self.kinds[self.slot_index(id)?].num_output_pins(),
        };
        if source_pin >= source_width {
            return Err(RackError::PinOutOfRange {
                pin: source_pin,
                width: source_width,
            });
        }
        let dest_width = match dest {
            PinEndpoint::Rack => self.num_output_pins,
            PinEndpoint::Plugin(id) => self.kinds[self.slot_index(id)?].num_input_pins(),
        };
        if dest_pin >= dest_width {
            return Err(RackError::PinOutOfRange {
                pin: dest_pin,
                width: dest_width,
            });
        }
        self.connections.push(RackConnection {
            source,
            source_pin,
            dest,
            dest_pin,
        });
        Ok(())
    }

    // Kahn's algorithm over the plugin-to-plugin edges.
    fn topological_order(&self) -> Result<Vec<usize>, RackError> {
        let index_of: HashMap<PluginId, usize> = self
            .ids
            .iter()
            .enumerate()
            .map(|(index, &id)| (id, index))
            .collect();

        let mut in_degree = vec![0usize; self.ids.len()];
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); self.ids.len()];
        for connection in &self.connections {
            if let (PinEndpoint::Plugin(from), PinEndpoint::Plugin(to)) =
                (connection.source, connection.dest)
            {
                let from = index_of[&from];
                let to = index_of[&to];
                edges[from].push(to);
                in_degree[to] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..self.ids.len())
            .filter(|&index| in_degree[index] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.ids.len());
        while let Some(index) = queue.pop_front() {
            order.push(index);
            for &next in &edges[index] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != self.ids.len() {
            return Err(RackError::CycleDetected);
        }
        Ok(order)
    }

    /// Resolve the rack into a node tree fed by `rack_input`.
    ///
    /// The returned node carries the rack's output pins; unconnected
    /// output pins are silent and mismatched widths degrade to silence
    /// rather than erroring.
    pub fn build(mut self, rack_input: NodeRef) -> Result<NodeRef, RackError> {
        let order = self.topological_order()?;

        let mut built: HashMap<PluginId, NodeRef> = HashMap::new();
        let mut owned_sources: HashSet<PinEndpoint> = HashSet::new();
        let connections = std::mem::take(&mut self.connections);

        let mut kinds: Vec<Option<SlotKind>> = self.kinds.into_iter().map(Some).collect();
        let ids = self.ids;

        for index in order {
            let id = ids[index];
            let kind = match kinds[index].take() {
                Some(kind) => kind,
                None => continue,
            };
            let input = gather(
                &connections,
                PinEndpoint::Plugin(id),
                kind.num_input_pins(),
                &rack_input,
                &built,
                &mut owned_sources,
            );
            let node = match kind {
                SlotKind::Send(bus, _) => make_node(SendNode::new(input, bus)),
                SlotKind::Return(bus, _) => make_node(ReturnNode::new(input, bus)),
                SlotKind::Processor(processor) => processor.into_node(input),
            };
            built.insert(id, node);
        }

        Ok(gather(
            &connections,
            PinEndpoint::Rack,
            self.num_output_pins,
            &rack_input,
            &built,
            &mut owned_sources,
        ))
    }
}

// Sum every connection arriving at `dest`, each wire through a channel
// map from its source pin onto its destination pin. The first wire from
// a given source owns it; later wires tap it through a SharedSource.
// MIDI rides the pin-zero-to-pin-zero wires so it is never duplicated.
fn gather(
    connections: &[RackConnection],
    dest: PinEndpoint,
    fallback_pins: usize,
    rack_input: &NodeRef,
    built: &HashMap<PluginId, NodeRef>,
    owned_sources: &mut HashSet<PinEndpoint>,
) -> NodeRef {
    let mut mapped = Vec::new();
    for connection in connections {
        if connection.dest != dest {
            continue;
        }
        let source_node = match connection.source {
            PinEndpoint::Rack => rack_input.clone(),
            // Topological order guarantees the source is built.
            PinEndpoint::Plugin(id) => match built.get(&id) {
                Some(node) => node.clone(),
                None => continue,
            },
        };
        let source_node = if owned_sources.insert(connection.source) {
            source_node
        } else {
            make_node(SharedSource { inner: source_node })
        };
        let pass_midi = connection.source_pin == 0 && connection.dest_pin == 0;
        mapped.push(make_node(ChannelMapNode::new(
            source_node,
            vec![(connection.source_pin, connection.dest_pin)],
            pass_midi,
        )));
    }
    match mapped.len() {
        0 => make_node(SilenceNode::new(fallback_pins)),
        1 => mapped.remove(0),
        _ => make_node(SumNode::new(mapped)),
    }
}
