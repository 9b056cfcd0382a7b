//! The node abstraction at the heart of the processing graph.
//!
//! A tree of nodes describes one block-wise audio/MIDI computation. Each
//! node is wrapped in a shared [`NodeCell`] that owns its output buffers
//! and tracks its processed flag, so schedulers can pull a tree in any
//! dependency-respecting order, including from several threads at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::buffer::AudioBuffer;
use crate::error::GraphError;
use crate::midi::MidiBuffer;
use crate::play_head::PlayHeadState;
use crate::time::SampleRange;

/// Identifies a send/return bus within one node tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusId(pub u32);

/// Stable identity assigned to each node when its tree is prepared.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    const UNASSIGNED: u32 = u32::MAX;

    /// The zero-based index of this node in preparation order.
    pub fn index(self) -> u32 {
        self.0
    }

    pub(crate) fn from_index(index: u32) -> Self {
        // The sentinel value is reserved for unassigned cells.
        debug_assert!(index != Self::UNASSIGNED);
        Self(index)
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Static description of what a node produces.
///
/// Composite nodes fold their inputs' properties, so a root's properties
/// describe the whole tree: `num_channels` is the widest path and
/// `latency_samples` the worst-case path latency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeProperties {
    /// True when the node produces audio.
    pub has_audio: bool,
    /// True when the node produces MIDI.
    pub has_midi: bool,
    /// Number of audio channels produced.
    pub num_channels: usize,
    /// Total latency in samples introduced along the node's worst path.
    pub latency_samples: usize,
}

/// A shared handle to a node and its output buffers.
pub type NodeRef = Arc<NodeCell>;

/// Hands out ids for nodes synthesized after the initial id assignment,
/// such as the summing nodes a return inserts while resolving its sends.
#[derive(Clone, Debug)]
pub struct IdSource(Arc<AtomicU32>);

impl IdSource {
    /// An id source whose first id is `first`.
    pub fn starting_at(first: u32) -> Self {
        Self(Arc::new(AtomicU32::new(first)))
    }

    /// Take the next unused id.
    pub fn next(&self) -> NodeId {
        NodeId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Everything a node can see while its tree is being prepared.
pub struct PrepareContext {
    /// Sample rate of the upcoming render.
    pub sample_rate: f64,
    /// Largest block the tree will be asked to process.
    pub block_size: usize,
    sends: Vec<(BusId, NodeRef)>,
    ids: IdSource,
}

impl PrepareContext {
    /// A context with no registered sends.
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            sends: Vec::new(),
            ids: IdSource::starting_at(0),
        }
    }

    /// Register the send nodes discoverable through [`Self::sends_for_bus`].
    pub fn with_sends(mut self, sends: Vec<(BusId, NodeRef)>) -> Self {
        self.sends = sends;
        self
    }

    /// Use `ids` for nodes synthesized during preparation.
    pub fn with_id_source(mut self, ids: IdSource) -> Self {
        self.ids = ids;
        self
    }

    /// Every send in the tree feeding `bus`.
    pub fn sends_for_bus(&self, bus: BusId) -> Vec<NodeRef> {
        self.sends
            .iter()
            .filter(|(b, _)| *b == bus)
            .map(|(_, node)| node.clone())
            .collect()
    }

    /// Take an id for a node synthesized during preparation.
    pub fn next_id(&self) -> NodeId {
        self.ids.next()
    }
}

/// Everything a node can see while processing one block.
pub struct ProcessContext<'a> {
    /// The sample range covered by this block.
    pub sample_range: SampleRange,
    /// Transport snapshot for this block.
    pub play_head: PlayHeadState,
    /// The node's audio output, pre-cleared to silence.
    pub audio: &'a mut AudioBuffer,
    /// The node's MIDI output, pre-cleared.
    pub midi: &'a mut MidiBuffer,
}

/// One processing step in a node tree.
///
/// Implementations read their inputs' completed output through
/// [`NodeCell::processed_output`] and write into the buffers on the
/// [`ProcessContext`]. A node must not lock any cell other than its own
/// direct inputs during `process`.
pub trait Node: Send {
    /// Static description of this node's output.
    fn properties(&self) -> NodeProperties;

    /// Every node whose output this node reads, owned or referenced.
    fn direct_inputs(&self) -> Vec<NodeRef> {
        Vec::new()
    }

    /// The subset of [`Self::direct_inputs`] this node structurally owns.
    ///
    /// Referenced inputs (a return reading sends elsewhere in the tree)
    /// are excluded so ownership walks visit each node exactly once.
    fn owned_inputs(&self) -> Vec<NodeRef> {
        self.direct_inputs()
    }

    /// True when the node could process right now.
    ///
    /// The default requires every direct input to have completed the
    /// current block. Source nodes waiting on external data override this.
    fn is_ready(&self) -> bool {
        self.direct_inputs().iter().all(|input| input.has_processed())
    }

    /// One-time setup before the first block.
    fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), GraphError> {
        let _ = ctx;
        Ok(())
    }

    /// Produce one block of output.
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), GraphError>;

    /// The bus this node feeds, when it is a send.
    fn send_bus(&self) -> Option<BusId> {
        None
    }
}

struct NodeInner {
    node: Box<dyn Node>,
    audio: AudioBuffer,
    midi: MidiBuffer,
}

/// Wraps a [`Node`] with its identity, processed flag and output buffers.
///
/// The cell is the unit schedulers operate on. Its lock covers the node
/// state and output together; lock acquisition always runs parent to
/// child, so pulling a tree never deadlocks.
pub struct NodeCell {
    id: AtomicU32,
    prepared: AtomicBool,
    processed: AtomicBool,
    inner: Mutex<NodeInner>,
}

/// Wrap a node in a fresh, unprepared cell.
pub fn make_node(node: impl Node + 'static) -> NodeRef {
    NodeCell::from_boxed(Box::new(node))
}

impl NodeCell {
    /// Wrap an already-boxed node.
    pub fn from_boxed(node: Box<dyn Node>) -> NodeRef {
        Arc::new(Self {
            id: AtomicU32::new(NodeId::UNASSIGNED),
            prepared: AtomicBool::new(false),
            processed: AtomicBool::new(false),
            inner: Mutex::new(NodeInner {
                node,
                audio: AudioBuffer::default(),
                midi: MidiBuffer::default(),
            }),
        })
    }

    /// The id assigned during preparation, if any.
    pub fn id(&self) -> Option<NodeId> {
        let raw = self.id.load(Ordering::Relaxed);
        (raw != NodeId::UNASSIGNED).then_some(NodeId(raw))
    }

    /// Assign `id` if the cell has none yet. Returns false when an id was
    /// already present, which means two parents claim to own this node.
    pub(crate) fn claim_id(&self, id: NodeId) -> bool {
        self.id
            .compare_exchange(
                NodeId::UNASSIGNED,
                id.0,
                Ordering::Relaxed,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// True once this block's output is complete.
    pub fn has_processed(&self) -> bool {
        self.processed.load(Ordering::Acquire)
    }

    pub(crate) fn reset_processed(&self) {
        self.processed.store(false, Ordering::Release);
    }

    /// True once the cell has been prepared.
    pub fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::Acquire)
    }

    /// Whether the node could process right now.
    pub fn is_ready(&self) -> bool {
        self.inner.lock().node.is_ready()
    }

    /// The node's static properties.
    pub fn properties(&self) -> NodeProperties {
        self.inner.lock().node.properties()
    }

    /// Every node whose output this node reads.
    pub fn direct_inputs(&self) -> Vec<NodeRef> {
        self.inner.lock().node.direct_inputs()
    }

    /// The structurally owned subset of the direct inputs.
    pub fn owned_inputs(&self) -> Vec<NodeRef> {
        self.inner.lock().node.owned_inputs()
    }

    /// The bus this node feeds, when it is a send.
    pub fn send_bus(&self) -> Option<BusId> {
        self.inner.lock().node.send_bus()
    }

    /// Prepare the node and allocate its output buffers.
    ///
    /// Fails with [`GraphError::AlreadyPrepared`] on a second call; a tree
    /// is prepared exactly once per render.
    pub fn prepare(&self, ctx: &PrepareContext) -> Result<(), GraphError> {
        if self.prepared.swap(true, Ordering::AcqRel) {
            return Err(GraphError::AlreadyPrepared);
        }
        let mut inner = self.inner.lock();
        inner.node.prepare(ctx)?;
        // Properties may have changed during prepare (returns swap their
        // input for a summing node), so size the output afterwards.
        let channels = inner.node.properties().num_channels;
        inner.audio.allocate(channels, ctx.block_size);
        Ok(())
    }

    /// Process one block and publish the output.
    pub fn process(&self, range: SampleRange, state: PlayHeadState) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();
        let frames = range.len();
        let NodeInner { node, audio, midi } = &mut *inner;
        audio.begin_block(frames);
        midi.clear();
        let mut ctx = ProcessContext {
            sample_range: range,
            play_head: state,
            audio,
            midi,
        };
        node.process(&mut ctx)?;
        drop(inner);
        self.processed.store(true, Ordering::Release);
        Ok(())
    }

    /// Borrow this node's completed output for the current block.
    ///
    /// Holds the cell lock for the guard's lifetime; only call on direct
    /// inputs from inside [`Node::process`], or on the root between blocks.
    pub fn processed_output(&self) -> ProcessedOutput<'_> {
        ProcessedOutput {
            guard: self.inner.lock(),
        }
    }
}

/// Read guard over a node's completed block output.
pub struct ProcessedOutput<'a> {
    guard: MutexGuard<'a, NodeInner>,
}

impl ProcessedOutput<'_> {
    /// The audio half of the output.
    pub fn audio(&self) -> &AudioBuffer {
        &self.guard.audio
    }

    /// The MIDI half of the output.
    pub fn midi(&self) -> &MidiBuffer {
        &self.guard.midi
    }
}
