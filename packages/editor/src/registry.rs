//! # Extensibility Registries
//!
//! Per-editor registries that keep the document model open:
//!
//! - [`NodeRegistry`]: type tag → node factory (last writer wins)
//! - [`TransformRegistry`]: unordered set of text transforms
//!
//! Both hand out an [`Unregister`] capability from `register`. State lives
//! behind a shared cell so registrations can be added or removed at any time,
//! including from inside a candidate mutator. Changes only affect future
//! lookups.

use crate::{MutationError, Node, NodeKey};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Builds a node of one kind from its key
pub type NodeFactory = Rc<dyn Fn(NodeKey) -> Node>;

/// Rewrites the text of a dirty text node before commit
///
/// Transforms run in unspecified order and must commute with each other.
pub type TextTransform = Rc<dyn Fn(&NodeKey, &mut String)>;

/// Capability that removes exactly one registration
#[must_use = "dropping an Unregister keeps the registration alive forever"]
pub struct Unregister(Box<dyn FnOnce()>);

impl Unregister {
    fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Remove the registration this capability was issued for
    pub fn unregister(self) {
        (self.0)()
    }
}

impl fmt::Debug for Unregister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unregister")
    }
}

struct NodeEntry {
    id: u64,
    factory: NodeFactory,
}

#[derive(Default)]
struct NodeRegistryInner {
    entries: HashMap<String, NodeEntry>,
    next_id: u64,
}

/// Mapping from type tag to node factory
pub struct NodeRegistry {
    inner: Rc<RefCell<NodeRegistryInner>>,
}

impl NodeRegistry {
    /// Registry with the built-in `block`, `text` and `body` kinds
    pub fn new() -> Self {
        let registry = Self::empty();

        let block: NodeFactory = Rc::new(|key: NodeKey| Node::block(key));
        let text: NodeFactory = Rc::new(|key: NodeKey| Node::text(key, ""));
        let body: NodeFactory = Rc::new(|key: NodeKey| {
            let mut node = Node::block(key);
            node.node_type = "body".to_string();
            node
        });

        // Built-ins are never unregistered
        let _ = registry.register("block", block);
        let _ = registry.register("text", text);
        let _ = registry.register("body", body);

        registry
    }

    /// Registry with no kinds at all
    pub fn empty() -> Self {
        Self {
            inner: Rc::new(RefCell::new(NodeRegistryInner::default())),
        }
    }

    /// Insert or replace the factory for `node_type`
    pub fn register(&self, node_type: impl Into<String>, factory: NodeFactory) -> Unregister {
        let node_type = node_type.into();
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            if inner
                .entries
                .insert(node_type.clone(), NodeEntry { id, factory })
                .is_some()
            {
                tracing::debug!(node_type = %node_type, "Replacing node factory");
            }
            id
        };

        let weak: Weak<RefCell<NodeRegistryInner>> = Rc::downgrade(&self.inner);
        Unregister::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.borrow_mut();
                // A later registration under the same tag stays in place
                if inner.entries.get(&node_type).is_some_and(|e| e.id == id) {
                    inner.entries.remove(&node_type);
                }
            }
        })
    }

    /// Factory registered for `node_type`, if any
    pub fn lookup(&self, node_type: &str) -> Option<NodeFactory> {
        self.inner
            .borrow()
            .entries
            .get(node_type)
            .map(|entry| entry.factory.clone())
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.inner.borrow().entries.contains_key(node_type)
    }

    /// Build a node through the registered factory
    pub fn create(&self, node_type: &str, key: impl Into<NodeKey>) -> Result<Node, MutationError> {
        let factory = self
            .lookup(node_type)
            .ok_or_else(|| MutationError::UnknownNodeType(node_type.to_string()))?;
        let mut node = factory(key.into());
        node.node_type = node_type.to_string();
        Ok(node)
    }

    /// Registered type tags, sorted
    pub fn node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.inner.borrow().entries.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}

/// Unordered set of text transforms, compared by identity
#[derive(Default)]
pub struct TransformRegistry {
    transforms: Rc<RefCell<Vec<TextTransform>>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transform; registering the same transform twice is a no-op
    pub fn register(&self, transform: TextTransform) -> Unregister {
        {
            let mut transforms = self.transforms.borrow_mut();
            if !transforms.iter().any(|t| Rc::ptr_eq(t, &transform)) {
                transforms.push(transform.clone());
            }
        }

        let weak = Rc::downgrade(&self.transforms);
        Unregister::new(move || {
            if let Some(transforms) = weak.upgrade() {
                transforms
                    .borrow_mut()
                    .retain(|t| !Rc::ptr_eq(t, &transform));
            }
        })
    }

    pub fn contains(&self, transform: &TextTransform) -> bool {
        self.transforms
            .borrow()
            .iter()
            .any(|t| Rc::ptr_eq(t, transform))
    }

    pub fn len(&self) -> usize {
        self.transforms.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.borrow().is_empty()
    }

    /// Apply every transform to one text value
    ///
    /// Works on a copy of the set so a transform may register or unregister
    /// transforms while running.
    pub fn apply(&self, key: &NodeKey, text: &mut String) {
        let transforms: Vec<TextTransform> = self.transforms.borrow().clone();
        for transform in transforms {
            transform(key, text);
        }
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("len", &self.len())
            .finish()
    }
}
