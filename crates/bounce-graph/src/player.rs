//! Graph players.
//!
//! A player owns a node tree and turns "process this block" into a
//! dependency-respecting traversal of the tree.

use crate::error::GraphError;
use crate::node::{IdSource, NodeRef, PrepareContext};
use crate::play_head::PlayHeadState;
use crate::time::SampleRange;
use crate::traversal::{TraversalOrder, assign_node_ids, enumerate_nodes};

/// Drives one node tree block by block.
pub trait Player: Send {
    /// Prepare the whole tree for rendering. Must be called exactly once
    /// before the first block.
    fn prepare_to_play(&mut self, sample_rate: f64, block_size: usize) -> Result<(), GraphError>;

    /// Process one block; on return the root's output is complete.
    fn process_block(&mut self, range: SampleRange, state: PlayHeadState)
    -> Result<(), GraphError>;

    /// The root of the tree this player drives.
    fn root(&self) -> &NodeRef;
}

/// Prepare the tree under `root` and return its nodes in post order.
///
/// Assigns ids in ownership order, registers every send in the tree, and
/// prepares nodes inputs-first. The tree is re-enumerated afterwards
/// because returns may have swapped subtrees in while resolving sends.
pub fn prepare_tree(
    root: &NodeRef,
    sample_rate: f64,
    block_size: usize,
) -> Result<Vec<NodeRef>, GraphError> {
    let count = assign_node_ids(root)?;
    let sends = enumerate_nodes(root, TraversalOrder::Pre)
        .into_iter()
        .filter_map(|node| node.send_bus().map(|bus| (bus, node)))
        .collect();
    let ctx = PrepareContext::new(sample_rate, block_size)
        .with_sends(sends)
        .with_id_source(IdSource::starting_at(count));
    for node in enumerate_nodes(root, TraversalOrder::Post) {
        node.prepare(&ctx)?;
    }
    let nodes = enumerate_nodes(root, TraversalOrder::Post);
    tracing::debug!(nodes = nodes.len(), sample_rate, block_size, "prepared node tree");
    Ok(nodes)
}

/// Processes the tree recursively on the calling thread.
pub struct SingleThreadedPlayer {
    root: NodeRef,
    nodes: Vec<NodeRef>,
    prepared: bool,
}

impl SingleThreadedPlayer {
    /// A player over the tree rooted at `root`.
    pub fn new(root: NodeRef) -> Self {
        Self {
            root,
            nodes: Vec::new(),
            prepared: false,
        }
    }
}

impl Player for SingleThreadedPlayer {
    fn prepare_to_play(&mut self, sample_rate: f64, block_size: usize) -> Result<(), GraphError> {
        self.nodes = prepare_tree(&self.root, sample_rate, block_size)?;
        self.prepared = true;
        Ok(())
    }

    fn process_block(
        &mut self,
        range: SampleRange,
        state: PlayHeadState,
    ) -> Result<(), GraphError> {
        if !self.prepared {
            return Err(GraphError::NotPrepared);
        }
        for node in &self.nodes {
            node.reset_processed();
        }
        // Post order already respects dependencies.
        for node in &self.nodes {
            node.process(range, state)?;
        }
        Ok(())
    }

    fn root(&self) -> &NodeRef {
        &self.root
    }
}
