//! # Snapshots
//!
//! A snapshot is the document tree plus the change tracking needed to render
//! it incrementally.
//!
//! ## Lifecycle
//!
//! ```text
//! committed ──fork──▶ candidate (Fresh) ──mutate──▶ commit ──extract_diff──▶ Extracted
//! ```
//!
//! - Node storage is shared copy-on-write between a snapshot and its forks,
//!   so writing to a candidate never touches the snapshot it came from.
//! - Writing a node records its key in the dirty-node set and records every
//!   ancestor in the dirty-subtree set.
//! - A diff is a one-shot artifact: extracting it consumes the dirty sets.
//! - Only `Fresh` snapshots accept mutations. Committed snapshots are
//!   read-only; edits always go through a new fork.

use crate::{EditorError, MutationError, Node, NodeData, NodeKey, TransformRegistry};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a snapshot; clones share it, forks get a new one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(u64);

impl SnapshotId {
    fn next() -> Self {
        Self(NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a snapshot is in the diff lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    /// Dirty tracking was never started (initial snapshot of an editor)
    Untracked,

    /// Dirty sets are live and the diff has not been taken
    Fresh,

    /// The diff was extracted; the dirty sets are gone
    Extracted,
}

#[derive(Debug, Clone, Default)]
struct DirtySets {
    nodes: IndexSet<NodeKey>,
    subtrees: IndexSet<NodeKey>,
}

#[derive(Debug, Clone)]
enum Tracking {
    Untracked,
    Fresh(DirtySets),
    Extracted,
}

/// A position inside a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPoint {
    pub key: NodeKey,
    pub offset: usize,
}

/// Selection record
///
/// Opaque to the core: it is stored, replaced, and copied into diffs by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Option<SelectionPoint>,
    pub focus: Option<SelectionPoint>,
}

impl Selection {
    /// Collapsed selection at one point
    pub fn caret(key: impl Into<NodeKey>, offset: usize) -> Self {
        let point = SelectionPoint {
            key: key.into(),
            offset,
        };
        Self {
            anchor: Some(point.clone()),
            focus: Some(point),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anchor.is_none() && self.focus.is_none()
    }
}

/// Changes recorded in one snapshot, ready for the renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    /// Keys whose descendants changed
    pub dirty_subtrees: IndexSet<NodeKey>,

    /// Changed nodes, in the order they were first written
    pub nodes: Vec<Node>,

    /// Selection at extraction time
    pub selection: Selection,

    /// Wall clock time of extraction
    pub timestamp: DateTime<Utc>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Keys of the changed nodes
    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.nodes.iter().map(|node| &node.key)
    }
}

/// Document tree plus change tracking
#[derive(Debug, Clone)]
pub struct Snapshot {
    id: SnapshotId,
    node_map: HashMap<NodeKey, Rc<Node>>,
    tracking: Tracking,
    selection: Selection,
}

impl Snapshot {
    /// Snapshot holding only an empty body, with tracking not started
    pub fn new() -> Self {
        let body = Node::body();
        let mut node_map = HashMap::new();
        node_map.insert(body.key.clone(), Rc::new(body));

        Self {
            id: SnapshotId::next(),
            node_map,
            tracking: Tracking::Untracked,
            selection: Selection::default(),
        }
    }

    /// Start a candidate from this snapshot
    ///
    /// The candidate shares node storage with `self` until it writes, and
    /// starts with empty dirty sets.
    pub fn fork(&self) -> Snapshot {
        let candidate = Snapshot {
            id: SnapshotId::next(),
            node_map: self.node_map.clone(),
            tracking: Tracking::Fresh(DirtySets::default()),
            selection: self.selection.clone(),
        };
        tracing::debug!(base = %self.id, snapshot = %candidate.id, "Forked snapshot");
        candidate
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn status(&self) -> TrackingStatus {
        match self.tracking {
            Tracking::Untracked => TrackingStatus::Untracked,
            Tracking::Fresh(_) => TrackingStatus::Fresh,
            Tracking::Extracted => TrackingStatus::Extracted,
        }
    }

    /// The body root
    pub fn body(&self) -> &Node {
        self.node_map
            .get(crate::node::BODY_KEY)
            .map(|node| node.as_ref())
            .unwrap_or_else(|| unreachable!("snapshot without a body node"))
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.node_map.get(key).map(|node| node.as_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.node_map.contains_key(key)
    }

    /// Number of nodes, body included
    pub fn node_count(&self) -> usize {
        self.node_map.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.node_map.keys()
    }

    pub fn children(&self, key: &str) -> Option<&[NodeKey]> {
        self.node(key).map(|node| node.children.as_slice())
    }

    /// Parent node, resolved through the node map
    pub fn parent(&self, key: &str) -> Option<&Node> {
        self.node(key)
            .and_then(|node| node.parent.as_ref())
            .and_then(|parent| self.node(parent.as_str()))
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Directly written keys, while tracking is live
    pub fn dirty_nodes(&self) -> Option<&IndexSet<NodeKey>> {
        match &self.tracking {
            Tracking::Fresh(dirty) => Some(&dirty.nodes),
            _ => None,
        }
    }

    /// Keys with a written descendant, while tracking is live
    pub fn dirty_subtrees(&self) -> Option<&IndexSet<NodeKey>> {
        match &self.tracking {
            Tracking::Fresh(dirty) => Some(&dirty.subtrees),
            _ => None,
        }
    }

    /// Concatenated text of every text node in document order
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self.body()];
        while let Some(node) = stack.pop() {
            if let Some(text) = node.text_content() {
                out.push_str(text);
            }
            for child in node.children.iter().rev() {
                if let Some(child) = self.node(child.as_str()) {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Keys of `key` and all its descendants, pre-order
    pub fn subtree_keys(&self, key: &str) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        let mut stack: Vec<&Node> = self.node(key).into_iter().collect();
        while let Some(node) = stack.pop() {
            keys.push(node.key.clone());
            for child in node.children.iter().rev() {
                if let Some(child) = self.node(child.as_str()) {
                    stack.push(child);
                }
            }
        }
        keys
    }

    // ----- mutation helpers -----

    fn ensure_writable(&self) -> Result<(), MutationError> {
        match self.tracking {
            Tracking::Fresh(_) => Ok(()),
            _ => Err(MutationError::ReadOnly),
        }
    }

    /// Record `key` as written and flag its ancestors' subtrees
    fn mark_dirty(&mut self, key: &NodeKey) {
        let Tracking::Fresh(dirty) = &mut self.tracking else {
            return;
        };
        dirty.nodes.insert(key.clone());

        let mut parent = self.node_map.get(key).and_then(|node| node.parent.clone());
        while let Some(key) = parent {
            // Ancestors above an already flagged key are flagged too
            if !dirty.subtrees.insert(key.clone()) {
                break;
            }
            parent = self.node_map.get(&key).and_then(|node| node.parent.clone());
        }
    }

    /// Writable node, cloned out of shared storage if needed
    fn writable(&mut self, key: &str) -> Result<&mut Node, MutationError> {
        self.ensure_writable()?;
        let node_key = self
            .node_map
            .get_key_value(key)
            .map(|(k, _)| k.clone())
            .ok_or_else(|| MutationError::NodeNotFound(NodeKey::from(key)))?;
        self.mark_dirty(&node_key);

        let node = self
            .node_map
            .get_mut(key)
            .ok_or_else(|| MutationError::NodeNotFound(node_key))?;
        Ok(Rc::make_mut(node))
    }

    /// Recompute the dirty-subtree set from the remaining dirty nodes
    fn rebuild_subtrees(&mut self) {
        let Tracking::Fresh(dirty) = &mut self.tracking else {
            return;
        };

        let mut subtrees = IndexSet::new();
        for key in &dirty.nodes {
            let mut parent = self.node_map.get(key).and_then(|node| node.parent.clone());
            while let Some(key) = parent {
                if !subtrees.insert(key.clone()) {
                    break;
                }
                parent = self.node_map.get(&key).and_then(|node| node.parent.clone());
            }
        }
        dirty.subtrees = subtrees;
    }

    /// Replace a node's payload, returning the old one; marks it dirty
    ///
    /// A node that still has children cannot become a text leaf.
    pub fn replace_data(&mut self, key: &str, data: NodeData) -> Result<NodeData, MutationError> {
        self.ensure_writable()?;
        let node = self
            .node(key)
            .ok_or_else(|| MutationError::NodeNotFound(NodeKey::from(key)))?;
        if matches!(data, NodeData::Text(_)) && !node.children.is_empty() {
            return Err(MutationError::HasChildren(node.key.clone()));
        }

        Ok(std::mem::replace(&mut self.writable(key)?.data, data))
    }

    /// Replace the text of a text node
    pub fn set_text(&mut self, key: &str, text: impl Into<String>) -> Result<(), MutationError> {
        self.ensure_writable()?;
        match self.node(key) {
            None => return Err(MutationError::NodeNotFound(NodeKey::from(key))),
            Some(node) if !node.is_text() => return Err(MutationError::NotText(node.key.clone())),
            Some(_) => {}
        }

        if let NodeData::Text(current) = &mut self.writable(key)?.data {
            *current = text.into();
        }
        Ok(())
    }

    /// Append a detached node as the last child of `parent`
    pub fn append_child(&mut self, parent: &str, node: Node) -> Result<(), MutationError> {
        let index = self
            .children(parent)
            .map(<[NodeKey]>::len)
            .ok_or_else(|| MutationError::NodeNotFound(NodeKey::from(parent)))?;
        self.insert_child(parent, index, node)
    }

    /// Insert a detached node at `index` among `parent`'s children
    pub fn insert_child(
        &mut self,
        parent: &str,
        index: usize,
        mut node: Node,
    ) -> Result<(), MutationError> {
        self.ensure_writable()?;

        if self.node_map.contains_key(&node.key) {
            return Err(MutationError::DuplicateKey(node.key));
        }
        if !node.children.is_empty() {
            return Err(MutationError::NotDetached(node.key));
        }

        let parent_node = self
            .node(parent)
            .ok_or_else(|| MutationError::NodeNotFound(NodeKey::from(parent)))?;
        if !parent_node.is_container() {
            return Err(MutationError::NotAContainer(parent_node.key.clone()));
        }
        let len = parent_node.children.len();
        if index > len {
            return Err(MutationError::IndexOutOfBounds { index, len });
        }
        let parent_key = parent_node.key.clone();

        let key = node.key.clone();
        node.parent = Some(parent_key.clone());
        self.writable(parent)?.children.insert(index, key.clone());
        self.node_map.insert(key.clone(), Rc::new(node));
        self.mark_dirty(&key);

        tracing::trace!(snapshot = %self.id, key = %key, parent = %parent_key, index, "Inserted node");
        Ok(())
    }

    /// Remove a node and its whole subtree
    ///
    /// Removed keys leave the dirty sets and the former parent becomes
    /// dirty. Ancestors left without a dirty descendant are unflagged.
    pub fn remove_node(&mut self, key: &str) -> Result<Node, MutationError> {
        self.ensure_writable()?;
        if key == crate::node::BODY_KEY {
            return Err(MutationError::CannotRemoveBody);
        }

        let parent_key = self
            .node(key)
            .ok_or_else(|| MutationError::NodeNotFound(NodeKey::from(key)))?
            .parent
            .clone();

        let removed_keys = self.subtree_keys(key);

        if let Some(parent_key) = &parent_key {
            self.writable(parent_key.as_str())?
                .children
                .retain(|child| child.as_str() != key);
        }

        let mut root = None;
        for removed in &removed_keys {
            if let Some(node) = self.node_map.remove(removed) {
                if removed.as_str() == key {
                    root = Some(node);
                }
            }
        }

        if let Tracking::Fresh(dirty) = &mut self.tracking {
            for removed in &removed_keys {
                dirty.nodes.shift_remove(removed);
            }
        }
        self.rebuild_subtrees();

        tracing::trace!(snapshot = %self.id, key, removed = removed_keys.len(), "Removed subtree");

        let mut root = root
            .map(Rc::unwrap_or_clone)
            .ok_or_else(|| MutationError::NodeNotFound(NodeKey::from(key)))?;
        root.parent = None;
        Ok(root)
    }

    /// Replace the selection record
    pub fn set_selection(&mut self, selection: Selection) -> Result<(), MutationError> {
        self.ensure_writable()?;
        self.selection = selection;
        Ok(())
    }

    /// Run text transforms over every dirty text node
    pub(crate) fn apply_text_transforms(&mut self, transforms: &TransformRegistry) {
        if transforms.is_empty() {
            return;
        }
        let Tracking::Fresh(dirty) = &self.tracking else {
            return;
        };

        for key in dirty.nodes.clone() {
            if let Some(node) = self.node_map.get_mut(&key) {
                if node.is_text() {
                    if let NodeData::Text(text) = &mut Rc::make_mut(node).data {
                        transforms.apply(&key, text);
                    }
                }
            }
        }
    }

    /// Take the diff recorded in this snapshot
    ///
    /// Succeeds once. Afterwards, and on snapshots whose tracking never
    /// started, it fails with [`EditorError::InvalidState`].
    pub fn extract_diff(&mut self) -> Result<Diff, EditorError> {
        let dirty = match std::mem::replace(&mut self.tracking, Tracking::Extracted) {
            Tracking::Fresh(dirty) => dirty,
            Tracking::Untracked => {
                self.tracking = Tracking::Untracked;
                return Err(EditorError::InvalidState(format!(
                    "snapshot {} has no dirty tracking",
                    self.id
                )));
            }
            Tracking::Extracted => {
                return Err(EditorError::InvalidState(format!(
                    "diff for snapshot {} was already extracted",
                    self.id
                )));
            }
        };

        let nodes = dirty
            .nodes
            .iter()
            .map(|key| {
                self.node_map
                    .get(key)
                    .map(|node| Node::clone(node))
                    .ok_or_else(|| {
                        EditorError::BrokenInvariant(format!(
                            "dirty key {key} has no node in snapshot {}",
                            self.id
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Diff {
            dirty_subtrees: dirty.subtrees,
            nodes,
            selection: self.selection.clone(),
            timestamp: Utc::now(),
        })
    }

    /// Record a dirty key without a node, for exercising the invariant check
    #[cfg(test)]
    pub(crate) fn corrupt_dirty_key(&mut self, key: &str) {
        if let Tracking::Fresh(dirty) = &mut self.tracking {
            dirty.nodes.insert(NodeKey::from(key));
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(set: &IndexSet<NodeKey>) -> Vec<&str> {
        set.iter().map(NodeKey::as_str).collect()
    }

    fn sample() -> Snapshot {
        // body
        // └── p1
        //     ├── t1
        //     └── p2
        //         └── t2
        let mut candidate = Snapshot::new().fork();
        candidate.append_child("body", Node::block("p1")).unwrap();
        candidate.append_child("p1", Node::text("t1", "one")).unwrap();
        candidate.append_child("p1", Node::block("p2")).unwrap();
        candidate.append_child("p2", Node::text("t2", "two")).unwrap();
        candidate.extract_diff().unwrap();
        candidate
    }

    #[test]
    fn test_new_snapshot_has_body_only() {
        let snapshot = Snapshot::new();
        assert_eq!(snapshot.node_count(), 1);
        assert!(snapshot.body().children.is_empty());
        assert_eq!(snapshot.status(), TrackingStatus::Untracked);
        assert!(snapshot.dirty_nodes().is_none());
    }

    #[test]
    fn test_fork_starts_fresh_and_clean() {
        let base = Snapshot::new();
        let candidate = base.fork();

        assert_ne!(candidate.id(), base.id());
        assert_eq!(candidate.status(), TrackingStatus::Fresh);
        assert!(candidate.dirty_nodes().unwrap().is_empty());
        assert!(candidate.dirty_subtrees().unwrap().is_empty());
    }

    #[test]
    fn test_untracked_snapshot_is_read_only() {
        let mut snapshot = Snapshot::new();
        assert_eq!(
            snapshot.append_child("body", Node::text("t1", "x")),
            Err(MutationError::ReadOnly)
        );
    }

    #[test]
    fn test_append_marks_parent_and_child() {
        let mut candidate = Snapshot::new().fork();
        candidate.append_child("body", Node::text("t1", "Hello")).unwrap();

        assert_eq!(keys(candidate.dirty_nodes().unwrap()), vec!["body", "t1"]);
        assert_eq!(keys(candidate.dirty_subtrees().unwrap()), vec!["body"]);
        assert_eq!(candidate.parent("t1").unwrap().key, NodeKey::body());
    }

    #[test]
    fn test_set_text_marks_ancestors() {
        let mut candidate = sample().fork();
        candidate.set_text("t2", "changed").unwrap();

        assert_eq!(keys(candidate.dirty_nodes().unwrap()), vec!["t2"]);
        assert_eq!(keys(candidate.dirty_subtrees().unwrap()), vec!["p2", "p1", "body"]);
    }

    #[test]
    fn test_ancestor_walk_stops_at_flagged_key() {
        let mut candidate = sample().fork();
        candidate.set_text("t2", "a").unwrap();
        candidate.set_text("t1", "b").unwrap();

        // t1 only adds p1, which was already flagged through t2
        assert_eq!(keys(candidate.dirty_subtrees().unwrap()), vec!["p2", "p1", "body"]);
        assert_eq!(keys(candidate.dirty_nodes().unwrap()), vec!["t2", "t1"]);
    }

    #[test]
    fn test_set_text_rejects_blocks() {
        let mut candidate = sample().fork();
        assert_eq!(
            candidate.set_text("p1", "x"),
            Err(MutationError::NotText(NodeKey::new("p1")))
        );
        assert_eq!(
            candidate.set_text("missing", "x"),
            Err(MutationError::NodeNotFound(NodeKey::new("missing")))
        );
    }

    #[test]
    fn test_insert_validation() {
        let mut candidate = sample().fork();

        assert_eq!(
            candidate.append_child("body", Node::text("t1", "dup")),
            Err(MutationError::DuplicateKey(NodeKey::new("t1")))
        );
        assert_eq!(
            candidate.append_child("t1", Node::text("t3", "x")),
            Err(MutationError::NotAContainer(NodeKey::new("t1")))
        );
        assert_eq!(
            candidate.insert_child("p1", 5, Node::text("t3", "x")),
            Err(MutationError::IndexOutOfBounds { index: 5, len: 2 })
        );

        let mut attached = Node::block("b9");
        attached.children.push(NodeKey::new("ghost"));
        assert_eq!(
            candidate.append_child("body", attached),
            Err(MutationError::NotDetached(NodeKey::new("b9")))
        );

        // Failed inserts record nothing
        assert!(candidate.dirty_nodes().unwrap().is_empty());
    }

    #[test]
    fn test_insert_at_index() {
        let mut candidate = sample().fork();
        candidate.insert_child("p1", 0, Node::text("t0", "zero")).unwrap();

        assert_eq!(
            candidate.children("p1").unwrap(),
            &[NodeKey::new("t0"), NodeKey::new("t1"), NodeKey::new("p2")]
        );
        assert_eq!(candidate.text_content(), "zeroonetwo");
    }

    #[test]
    fn test_remove_subtree() {
        let mut candidate = sample().fork();
        candidate.set_text("t2", "dirty").unwrap();

        let removed = candidate.remove_node("p2").unwrap();
        assert_eq!(removed.key, NodeKey::new("p2"));
        assert!(removed.parent.is_none());

        assert!(!candidate.contains("p2"));
        assert!(!candidate.contains("t2"));
        assert_eq!(candidate.children("p1").unwrap(), &[NodeKey::new("t1")]);

        // t2 and p2 left the dirty sets, p1 is dirty now
        assert_eq!(keys(candidate.dirty_nodes().unwrap()), vec!["p1"]);
        assert_eq!(keys(candidate.dirty_subtrees().unwrap()), vec!["body"]);

        let diff = candidate.extract_diff().unwrap();
        assert_eq!(diff.keys().map(NodeKey::as_str).collect::<Vec<_>>(), vec!["p1"]);
    }

    #[test]
    fn test_remove_unflags_emptied_subtree() {
        // body -> p1 -> t1, only t1 written before it goes away
        let mut base = Snapshot::new().fork();
        base.append_child("body", Node::block("p1")).unwrap();
        base.append_child("p1", Node::text("t1", "child")).unwrap();
        base.extract_diff().unwrap();

        let mut candidate = base.fork();
        candidate.set_text("t1", "edited").unwrap();
        assert_eq!(keys(candidate.dirty_subtrees().unwrap()), vec!["p1", "body"]);

        candidate.remove_node("t1").unwrap();
        assert_eq!(keys(candidate.dirty_nodes().unwrap()), vec!["p1"]);
        assert_eq!(keys(candidate.dirty_subtrees().unwrap()), vec!["body"]);
    }

    #[test]
    fn test_remove_keeps_other_dirty_branches() {
        let mut candidate = sample().fork();
        candidate.set_text("t1", "kept").unwrap();
        candidate.set_text("t2", "gone").unwrap();

        candidate.remove_node("t2").unwrap();
        assert_eq!(keys(candidate.dirty_nodes().unwrap()), vec!["t1", "p2"]);
        assert_eq!(keys(candidate.dirty_subtrees().unwrap()), vec!["p1", "body"]);
    }

    #[test]
    fn test_replace_data() {
        let mut candidate = sample().fork();

        let old = candidate
            .replace_data("p2", NodeData::Custom(serde_json::json!({ "level": 2 })))
            .unwrap();
        assert_eq!(old, NodeData::Block);
        assert!(candidate.node("p2").unwrap().is_container());
        assert_eq!(keys(candidate.dirty_nodes().unwrap()), vec!["p2"]);

        let old = candidate.replace_data("t1", NodeData::Text("uno".into())).unwrap();
        assert_eq!(old, NodeData::Text("one".into()));
        assert_eq!(candidate.text_content(), "unotwo");
    }

    #[test]
    fn test_replace_data_rejects_text_with_children() {
        let mut candidate = sample().fork();

        assert_eq!(
            candidate.replace_data("p1", NodeData::Text("oops".into())),
            Err(MutationError::HasChildren(NodeKey::new("p1")))
        );
        assert!(candidate.node("p1").unwrap().is_container());
        assert_eq!(candidate.text_content(), "onetwo");
        assert!(candidate.dirty_nodes().unwrap().is_empty());

        // An empty container may become a leaf
        candidate.remove_node("t2").unwrap();
        candidate.replace_data("p2", NodeData::Text("leaf".into())).unwrap();
        assert_eq!(candidate.text_content(), "oneleaf");
    }

    #[test]
    fn test_cannot_remove_body() {
        let mut candidate = Snapshot::new().fork();
        assert_eq!(candidate.remove_node("body"), Err(MutationError::CannotRemoveBody));
    }

    #[test]
    fn test_fork_isolation() {
        let mut base = Snapshot::new().fork();
        base.append_child("body", Node::text("t1", "base")).unwrap();
        base.set_selection(Selection::caret("t1", 1)).unwrap();

        let mut candidate = base.fork();
        candidate.set_text("t1", "changed").unwrap();
        candidate.append_child("body", Node::text("t2", "new")).unwrap();
        candidate.set_selection(Selection::caret("t2", 0)).unwrap();

        assert_eq!(base.node("t1").unwrap().text_content(), Some("base"));
        assert!(!base.contains("t2"));
        assert_eq!(base.body().children, vec![NodeKey::new("t1")]);
        assert_eq!(base.selection(), &Selection::caret("t1", 1));
        assert_eq!(keys(base.dirty_nodes().unwrap()), vec!["body", "t1"]);
    }

    #[test]
    fn test_extract_diff_is_one_shot() {
        let mut candidate = Snapshot::new().fork();
        candidate.append_child("body", Node::text("t1", "Hello")).unwrap();
        candidate.set_selection(Selection::caret("t1", 5)).unwrap();

        let diff = candidate.extract_diff().unwrap();
        assert_eq!(diff.nodes.len(), 2);
        assert_eq!(diff.nodes[1].text_content(), Some("Hello"));
        assert_eq!(keys(&diff.dirty_subtrees), vec!["body"]);
        assert_eq!(diff.selection, Selection::caret("t1", 5));
        assert_eq!(candidate.status(), TrackingStatus::Extracted);

        let second = candidate.extract_diff();
        assert!(matches!(second, Err(EditorError::InvalidState(_))));
    }

    #[test]
    fn test_extract_diff_on_untracked_snapshot() {
        let mut snapshot = Snapshot::new();
        let result = snapshot.extract_diff();
        assert!(matches!(result, Err(EditorError::InvalidState(ref msg)) if msg.contains("no dirty tracking")));
        // Still untracked, not consumed
        assert_eq!(snapshot.status(), TrackingStatus::Untracked);
    }

    #[test]
    fn test_extract_diff_reports_broken_invariant() {
        let mut candidate = Snapshot::new().fork();
        candidate.corrupt_dirty_key("ghost");

        let result = candidate.extract_diff();
        assert!(matches!(result, Err(EditorError::BrokenInvariant(_))));
    }

    #[test]
    fn test_selection_is_copied_into_diff() {
        let mut candidate = Snapshot::new().fork();
        candidate.set_selection(Selection::caret("body", 0)).unwrap();

        let mut diff = candidate.extract_diff().unwrap();
        diff.selection = Selection::default();

        assert_eq!(candidate.selection(), &Selection::caret("body", 0));
    }

    #[test]
    fn test_transforms_rewrite_dirty_text_only() {
        let transforms = TransformRegistry::new();
        let _upper = transforms.register(Rc::new(|_: &NodeKey, text: &mut String| {
            *text = text.to_uppercase();
        }));

        let mut candidate = sample().fork();
        candidate.set_text("t2", "shout").unwrap();
        candidate.apply_text_transforms(&transforms);

        assert_eq!(candidate.node("t2").unwrap().text_content(), Some("SHOUT"));
        assert_eq!(candidate.node("t1").unwrap().text_content(), Some("one"));
    }
}
