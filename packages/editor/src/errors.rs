//! Error types for the editor

use crate::NodeKey;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Broken invariant: {0}")]
    BrokenInvariant(String),

    #[error("No rendered element for key {0}")]
    NotFound(NodeKey),

    #[error("A deferred commit is already pending")]
    ConcurrentUpdate,

    #[error("Editor has been torn down")]
    Detached,

    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),
}

/// Failures of the snapshot mutation helpers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Duplicate node key: {0}")]
    DuplicateKey(NodeKey),

    #[error("Node cannot have children: {0}")]
    NotAContainer(NodeKey),

    #[error("Node is still attached to a tree: {0}")]
    NotDetached(NodeKey),

    #[error("Snapshot is read-only, fork it first")]
    ReadOnly,

    #[error("Node has children and cannot hold text: {0}")]
    HasChildren(NodeKey),

    #[error("Node is not text: {0}")]
    NotText(NodeKey),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("The body node cannot be removed")]
    CannotRemoveBody,

    #[error("Index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },
}
