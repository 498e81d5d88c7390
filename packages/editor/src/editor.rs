//! # Editor
//!
//! The coordinator that owns the committed snapshot.
//!
//! ## Lifecycle
//!
//! ```text
//! create_candidate ─▶ update(Sync) ─────────────────────▶ commit
//!                  └▶ update(Deferred) ─▶ run_pending ──▶ commit
//! ```
//!
//! A commit runs text transforms over the candidate's dirty text nodes,
//! replaces the committed snapshot, extracts the diff, hands it to the
//! renderer, and notifies the change handler. There is no history: the
//! previous snapshot is dropped.

use crate::{
    CommitMode, Diff, EditorConfig, EditorError, MutationError, Node, NodeFactory, NodeKey,
    NodeRegistry, Scheduler, SchedulerPhase, Snapshot, TextTransform, TrackingStatus,
    TransformRegistry, Unregister, Waker,
};
use std::collections::HashMap;
use std::fmt;

/// Rendered element handles, by node key
pub type ElementMap<E> = HashMap<NodeKey, E>;

/// Turns diffs into surface mutations
///
/// Implementations keep `elements` in sync: every key of the committed
/// snapshot should have a handle once reconciliation finishes.
pub trait Renderer<E> {
    fn reconcile(
        &mut self,
        diff: &Diff,
        snapshot: &Snapshot,
        elements: &mut ElementMap<E>,
    ) -> Result<(), EditorError>;
}

/// Callback invoked after every commit
pub enum ChangeHandler {
    /// Coarse notification with the new committed snapshot
    Snapshot(Box<dyn FnMut(&Snapshot)>),

    /// Fine-grained notification with the extracted diff
    Diff(Box<dyn FnMut(&Diff)>),
}

impl fmt::Debug for ChangeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeHandler::Snapshot(_) => f.write_str("ChangeHandler::Snapshot"),
            ChangeHandler::Diff(_) => f.write_str("ChangeHandler::Diff"),
        }
    }
}

/// Editing state of one surface
pub struct Editor<E> {
    /// Surface handle supplied by the host
    surface: E,

    /// Current committed snapshot
    committed: Snapshot,

    /// Number of commits so far
    version: u64,

    elements: ElementMap<E>,
    node_types: NodeRegistry,
    transforms: TransformRegistry,
    scheduler: Scheduler,
    renderer: Option<Box<dyn Renderer<E>>>,
    on_change: Option<ChangeHandler>,
    config: EditorConfig,
    attached: bool,
}

impl<E: Clone> Editor<E> {
    /// Create an editor over `surface` with an empty body
    pub fn new(surface: E, config: EditorConfig) -> Self {
        let committed = Snapshot::new();
        let mut elements = ElementMap::new();
        elements.insert(NodeKey::body(), surface.clone());

        tracing::info!(snapshot = %committed.id(), "Editor attached");

        Self {
            surface,
            committed,
            version: 0,
            elements,
            node_types: NodeRegistry::new(),
            transforms: TransformRegistry::new(),
            scheduler: Scheduler::new(),
            renderer: None,
            on_change: None,
            config,
            attached: true,
        }
    }

    /// Create an editor and wire its change handler
    ///
    /// A snapshot handler hears about the initial snapshot right away when
    /// `notify_on_attach` is set.
    pub fn with_change_handler(surface: E, on_change: ChangeHandler, config: EditorConfig) -> Self {
        let mut editor = Self::new(surface, config);
        editor.on_change = Some(on_change);

        if editor.config.notify_on_attach {
            if let Some(ChangeHandler::Snapshot(f)) = &mut editor.on_change {
                f(&editor.committed);
            }
        }
        editor
    }
}

impl<E> Editor<E> {
    pub fn surface(&self) -> &E {
        &self.surface
    }

    pub fn committed(&self) -> &Snapshot {
        &self.committed
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Number of commits so far
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Whether a deferred commit is in flight
    pub fn is_updating(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn scheduler_phase(&self) -> SchedulerPhase {
        self.scheduler.phase()
    }

    /// Hook called when a deferred commit needs the host's next turn
    pub fn set_waker(&mut self, waker: Waker) {
        self.scheduler.set_waker(waker);
    }

    pub fn set_on_change(&mut self, on_change: Option<ChangeHandler>) {
        self.on_change = on_change;
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer<E>>) {
        self.renderer = Some(renderer);
    }

    // ----- registries -----

    pub fn node_types(&self) -> &NodeRegistry {
        &self.node_types
    }

    pub fn text_transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    pub fn add_node_type(&self, node_type: impl Into<String>, factory: NodeFactory) -> Unregister {
        self.node_types.register(node_type, factory)
    }

    pub fn add_text_transform(&self, transform: TextTransform) -> Unregister {
        self.transforms.register(transform)
    }

    /// Build a node through the registered factory for `node_type`
    pub fn create_node(&self, node_type: &str, key: impl Into<NodeKey>) -> Result<Node, MutationError> {
        self.node_types.create(node_type, key)
    }

    // ----- rendered elements -----

    /// Rendered handle for `key`
    pub fn element_by_key(&self, key: &str) -> Result<&E, EditorError> {
        self.elements
            .get(key)
            .ok_or_else(|| EditorError::NotFound(NodeKey::from(key)))
    }

    pub fn register_element(&mut self, key: impl Into<NodeKey>, element: E) -> Option<E> {
        self.elements.insert(key.into(), element)
    }

    pub fn unregister_element(&mut self, key: &str) -> Option<E> {
        self.elements.remove(key)
    }

    pub fn elements(&self) -> &ElementMap<E> {
        &self.elements
    }

    // ----- snapshots -----

    /// Fork the committed snapshot and let `mutator` edit the fork
    ///
    /// Nothing is committed; pass the result to [`Editor::update`].
    pub fn create_candidate<F>(&self, mutator: F) -> Result<Snapshot, EditorError>
    where
        F: FnOnce(&mut Snapshot, &Self) -> Result<(), MutationError>,
    {
        let mut candidate = self.committed.fork();
        mutator(&mut candidate, self)?;
        Ok(candidate)
    }

    /// Make `candidate` the committed snapshot, now or on the next turn
    pub fn update(&mut self, candidate: Snapshot, mode: CommitMode) -> Result<(), EditorError> {
        if !self.attached {
            return Err(EditorError::Detached);
        }
        self.scheduler.ensure_idle()?;

        if candidate.id() == self.committed.id() {
            tracing::debug!(snapshot = %candidate.id(), "Candidate is the committed snapshot, skipping");
            return Ok(());
        }
        if candidate.status() != TrackingStatus::Fresh {
            return Err(EditorError::InvalidState(format!(
                "candidate {} is not a fresh fork ({:?})",
                candidate.id(),
                candidate.status()
            )));
        }

        match mode {
            CommitMode::Sync => self.commit(candidate).map(|_| ()),
            CommitMode::Deferred => self.scheduler.schedule(candidate),
        }
    }

    /// [`Editor::update`] with the configured default mode
    pub fn update_default(&mut self, candidate: Snapshot) -> Result<(), EditorError> {
        let mode = self.config.default_commit_mode;
        self.update(candidate, mode)
    }

    /// Continuation of a deferred update; returns whether a commit ran
    pub fn run_pending(&mut self) -> Result<bool, EditorError> {
        let Some(candidate) = self.scheduler.take_pending() else {
            return Ok(false);
        };
        if !self.attached {
            return Err(EditorError::Detached);
        }
        self.commit(candidate)?;
        Ok(true)
    }

    /// Diff of the committed snapshot
    ///
    /// Commits consume the diff themselves, so this only succeeds for
    /// snapshots that reached the editor some other way.
    pub fn extract_diff(&mut self) -> Result<Diff, EditorError> {
        self.committed.extract_diff()
    }

    /// Replace the committed snapshot and notify the renderer and handler
    ///
    /// A failed diff extraction leaves the editor untouched. Once the
    /// snapshot is replaced the commit stands: a renderer error is returned
    /// only after the change handler has run.
    fn commit(&mut self, mut candidate: Snapshot) -> Result<Diff, EditorError> {
        if self.config.run_transforms {
            candidate.apply_text_transforms(&self.transforms);
        }

        let diff = candidate.extract_diff()?;
        self.committed = candidate;
        self.version += 1;
        tracing::debug!(
            snapshot = %self.committed.id(),
            version = self.version,
            dirty = diff.nodes.len(),
            subtrees = diff.dirty_subtrees.len(),
            "Committed snapshot"
        );

        let rendered = match &mut self.renderer {
            Some(renderer) => renderer.reconcile(&diff, &self.committed, &mut self.elements),
            None => Ok(()),
        };
        if let Err(err) = &rendered {
            tracing::error!(snapshot = %self.committed.id(), error = %err, "Renderer failed to reconcile commit");
        }

        match &mut self.on_change {
            Some(ChangeHandler::Snapshot(f)) => f(&self.committed),
            Some(ChangeHandler::Diff(f)) => f(&diff),
            None => {}
        }

        rendered.map(|()| diff)
    }

    /// Detach from the surface; no commit happens afterwards
    pub fn teardown(&mut self) {
        if let Some(pending) = self.scheduler.cancel() {
            tracing::warn!(snapshot = %pending, "Discarding pending commit on teardown");
        }
        self.elements.clear();
        self.renderer = None;
        self.attached = false;
        tracing::info!(snapshot = %self.committed.id(), version = self.version, "Editor torn down");
    }
}

impl<E> fmt::Debug for Editor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("committed", &self.committed.id())
            .field("version", &self.version)
            .field("elements", &self.elements.len())
            .field("node_types", &self.node_types)
            .field("transforms", &self.transforms)
            .field("scheduler", &self.scheduler)
            .field("on_change", &self.on_change)
            .field("attached", &self.attached)
            .finish()
    }
}
