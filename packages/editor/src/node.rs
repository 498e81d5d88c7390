//! # Document Nodes
//!
//! A node is "a thing with a key and a type". Concrete kinds are produced by
//! factories registered in the [`NodeRegistry`](crate::NodeRegistry); the core
//! only distinguishes containers from text leaves.
//!
//! Parent links are keys, resolved through the owning snapshot's node map.
//! Nodes never own their parent.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Key of the root node of every snapshot
pub const BODY_KEY: &str = "body";

/// Stable identity of a node within a snapshot lineage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key of the body root
    pub fn body() -> Self {
        Self(BODY_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_body(&self) -> bool {
        self.0 == BODY_KEY
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Kind-specific payload of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum NodeData {
    /// Container with ordered children (block and body kinds)
    Block,

    /// Text leaf
    Text(String),

    /// Collaborator-defined container kind
    Custom(serde_json::Value),
}

/// A document element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique key within the snapshot
    pub key: NodeKey,

    /// Type tag the node was registered under
    pub node_type: String,

    /// Parent key (navigational only)
    pub parent: Option<NodeKey>,

    /// Ordered child keys
    pub children: Vec<NodeKey>,

    /// Payload
    pub data: NodeData,
}

impl Node {
    /// Create a detached node of the given type
    pub fn new(key: impl Into<NodeKey>, node_type: impl Into<String>, data: NodeData) -> Self {
        Self {
            key: key.into(),
            node_type: node_type.into(),
            parent: None,
            children: Vec::new(),
            data,
        }
    }

    /// Create an empty block node
    pub fn block(key: impl Into<NodeKey>) -> Self {
        Self::new(key, "block", NodeData::Block)
    }

    /// Create a text node with content
    pub fn text(key: impl Into<NodeKey>, text: impl Into<String>) -> Self {
        Self::new(key, "text", NodeData::Text(text.into()))
    }

    /// Create the body root
    pub fn body() -> Self {
        Self::new(NodeKey::body(), "body", NodeData::Block)
    }

    /// Whether this node may hold children
    pub fn is_container(&self) -> bool {
        !matches!(self.data, NodeData::Text(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Text content, for text nodes
    pub fn text_content(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Builder-style text replacement, used by factories and tests
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        if let NodeData::Text(current) = &mut self.data {
            *current = text.into();
        }
        self
    }
}
