//! Error types for graph construction and block processing.

use crate::node::NodeId;

/// Errors raised while preparing or processing a node tree.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A node was prepared a second time. Each tree owns its nodes exactly
    /// once and is prepared exactly once.
    #[error("node has already been prepared")]
    AlreadyPrepared,

    /// A player was asked to process before `prepare_to_play` succeeded.
    #[error("graph has not been prepared")]
    NotPrepared,

    /// A node is reachable through the owned inputs of more than one parent.
    #[error("node {0:?} is owned by more than one parent")]
    DuplicateNode(NodeId),

    /// A node's `process` implementation failed.
    #[error("node processing failed: {0}")]
    ProcessFailed(String),

    /// The worker pool shut down while a block was still in flight.
    #[error("worker pool shut down during processing")]
    PoolShutDown,
}

/// Convenience alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
