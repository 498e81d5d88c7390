//! # Outline Editor
//!
//! State and reconciliation core of an embeddable rich-text surface.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ host: mounts the surface, forwards onChange │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: committed snapshot + scheduling     │
//! │  - Fork candidates and mutate them          │
//! │  - Commit now or on the host's next turn    │
//! │  - Node type and text transform registries  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ renderer: diff → surface mutations          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Committed snapshots are read-only**: edits go through a fresh fork
//! 2. **Diffs are one-shot**: extracting a diff consumes the dirty sets
//! 3. **One deferred commit at a time**: a second one is an error, not a queue
//! 4. **Open node model**: kinds are looked up by type tag
//!
//! ## Usage
//!
//! ```rust
//! use outline_editor::{CommitMode, Editor, EditorConfig};
//!
//! let mut editor = Editor::new("surface", EditorConfig::default());
//!
//! let candidate = editor
//!     .create_candidate(|candidate, editor| {
//!         let text = editor.create_node("text", "t1")?.with_text("Hello");
//!         candidate.append_child("body", text)
//!     })
//!     .unwrap();
//!
//! editor.update(candidate, CommitMode::Sync).unwrap();
//! assert_eq!(editor.committed().text_content(), "Hello");
//! ```

mod binding;
mod config;
mod editor;
mod errors;
mod node;
mod registry;
mod scheduler;
mod snapshot;

pub use binding::EditorHost;
pub use config::{ConfigError, EditorConfig, DEFAULT_CONFIG_NAME};
pub use editor::{ChangeHandler, Editor, ElementMap, Renderer};
pub use errors::{EditorError, MutationError};
pub use node::{Node, NodeData, NodeKey, BODY_KEY};
pub use registry::{NodeFactory, NodeRegistry, TextTransform, TransformRegistry, Unregister};
pub use scheduler::{CommitMode, Scheduler, SchedulerPhase, Waker};
pub use snapshot::{Diff, Selection, SelectionPoint, Snapshot, SnapshotId, TrackingStatus};
