//! Tree walks used by preparation and the schedulers.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::GraphError;
use crate::node::{NodeCell, NodeId, NodeRef};

/// Visit order for [`enumerate_nodes`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Parents before their inputs.
    Pre,
    /// Inputs before their parents.
    Post,
}

/// Collect every node reachable from `root` through direct inputs.
///
/// Each node appears exactly once even when it is referenced from several
/// parents. Post order places every node after all of its inputs, so the
/// returned list is a valid sequential processing order.
pub fn enumerate_nodes(root: &NodeRef, order: TraversalOrder) -> Vec<NodeRef> {
    let mut visited = HashSet::new();
    let mut out = Vec::new();
    visit(root, order, &mut visited, &mut out);
    out
}

fn visit(
    node: &NodeRef,
    order: TraversalOrder,
    visited: &mut HashSet<*const NodeCell>,
    out: &mut Vec<NodeRef>,
) {
    if !visited.insert(Arc::as_ptr(node)) {
        return;
    }
    if order == TraversalOrder::Pre {
        out.push(node.clone());
    }
    for input in node.direct_inputs() {
        visit(&input, order, visited, out);
    }
    if order == TraversalOrder::Post {
        out.push(node.clone());
    }
}

/// Assign sequential ids to every node in ownership order.
///
/// Walks owned inputs only and fails with [`GraphError::DuplicateNode`]
/// when a node is reachable through the owned edges of two parents.
/// Returns the number of nodes visited.
pub fn assign_node_ids(root: &NodeRef) -> Result<u32, GraphError> {
    let mut next = 0u32;
    assign(root, &mut next)?;
    Ok(next)
}

fn assign(node: &NodeRef, next: &mut u32) -> Result<(), GraphError> {
    let id = NodeId::from_index(*next);
    if !node.claim_id(id) {
        // The cell already carries its first owner's id.
        return Err(GraphError::DuplicateNode(node.id().unwrap_or(id)));
    }
    *next += 1;
    for input in node.owned_inputs() {
        assign(&input, next)?;
    }
    Ok(())
}

/// End-to-end latency of the tree rooted at `root`, in samples.
///
/// Properties compose bottom-up, so the root already carries the maximum
/// over every source-to-sink path.
pub fn aggregate_latency(root: &NodeRef) -> usize {
    root.properties().latency_samples
}

/// True when every leaf (a node with no direct inputs) reports ready.
///
/// Drivers poll this before each block so source nodes backed by slow
/// media can hold the render until their data arrives.
pub fn leaf_nodes_ready(root: &NodeRef) -> bool {
    enumerate_nodes(root, TraversalOrder::Post)
        .iter()
        .filter(|node| node.direct_inputs().is_empty())
        .all(|node| node.is_ready())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::make_node;
    use crate::nodes::{SilenceNode, SumNode};

    #[test]
    fn test_orders_and_dedup() {
        let a = make_node(SilenceNode::new(1));
        let b = make_node(SilenceNode::new(1));
        let root = make_node(SumNode::new(vec![a.clone(), b.clone()]));

        let pre = enumerate_nodes(&root, TraversalOrder::Pre);
        let post = enumerate_nodes(&root, TraversalOrder::Post);
        assert_eq!(pre.len(), 3);
        assert_eq!(post.len(), 3);
        assert!(Arc::ptr_eq(&pre[0], &root));
        assert!(Arc::ptr_eq(&post[2], &root));
    }

    #[test]
    fn test_assign_ids_rejects_shared_ownership() {
        let shared = make_node(SilenceNode::new(1));
        let root = make_node(SumNode::new(vec![shared.clone(), shared.clone()]));
        assert!(matches!(
            assign_node_ids(&root),
            Err(GraphError::DuplicateNode(_))
        ));
    }

    #[test]
    fn test_assign_ids_counts_tree() {
        let a = make_node(SilenceNode::new(1));
        let b = make_node(SilenceNode::new(1));
        let root = make_node(SumNode::new(vec![a, b]));
        assert_eq!(assign_node_ids(&root).unwrap(), 3);
        assert_eq!(root.id().map(NodeId::index), Some(0));
    }
}
