//! Edit scripts: a JSON list of steps replayed against an editor.
//!
//! ```json
//! [
//!   { "op": "append", "parent": "body", "key": "t1", "text": "Hello" },
//!   { "op": "commit", "mode": "sync" },
//!   { "op": "setText", "key": "t1", "text": "Hello!" },
//!   { "op": "commit" },
//!   { "op": "flush" }
//! ]
//! ```
//!
//! Mutation steps accumulate on one candidate forked from the committed
//! snapshot; `commit` hands that candidate to the editor.

use anyhow::{anyhow, Context, Result};
use outline_editor::{
    ChangeHandler, CommitMode, Diff, Editor, EditorConfig, EditorError, ElementMap, Renderer,
    Selection, Snapshot,
};
use serde::Deserialize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Step {
    /// Append a new node as the last child of `parent`
    Append {
        parent: String,
        key: String,
        #[serde(rename = "type", default = "default_node_type")]
        node_type: String,
        #[serde(default)]
        text: Option<String>,
    },

    /// Insert a new node at `index` among `parent`'s children
    Insert {
        parent: String,
        index: usize,
        key: String,
        #[serde(rename = "type", default = "default_node_type")]
        node_type: String,
        #[serde(default)]
        text: Option<String>,
    },

    SetText {
        key: String,
        text: String,
    },

    Remove {
        key: String,
    },

    /// Collapse the selection at `offset` inside `key`
    Select {
        key: String,
        offset: usize,
    },

    /// Hand the candidate to the editor (configured mode when omitted)
    Commit {
        #[serde(default)]
        mode: Option<CommitMode>,
    },

    /// Run the pending deferred commit, as the host's next turn would
    Flush,
}

fn default_node_type() -> String {
    "text".to_string()
}

/// Parse a script from JSON text
pub fn parse_script(json: &str) -> Result<Vec<Step>> {
    serde_json::from_str(json).context("Invalid edit script")
}

/// Script path as given, or relative to `cwd`
pub fn resolve_script(cwd: &str, script: &Path) -> PathBuf {
    Path::new(cwd).join(script)
}

/// Read and parse a script file
pub fn load_script(path: &Path) -> Result<Vec<Step>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read script {}", path.display()))?;
    parse_script(&content)
}

/// In-memory surface: one descriptive string per rendered key
#[derive(Debug, Default)]
pub struct MemoryRenderer;

impl Renderer<String> for MemoryRenderer {
    fn reconcile(
        &mut self,
        diff: &Diff,
        snapshot: &Snapshot,
        elements: &mut ElementMap<String>,
    ) -> Result<(), EditorError> {
        for node in &diff.nodes {
            if node.key.is_body() {
                continue;
            }
            let element = match node.text_content() {
                Some(text) => format!("<{} {}>{}", node.node_type, node.key, text),
                None => format!("<{} {}>", node.node_type, node.key),
            };
            elements.insert(node.key.clone(), element);
        }
        elements.retain(|key, _| snapshot.contains(key.as_str()));
        Ok(())
    }
}

/// Drives an editor through script steps
pub struct Replay {
    editor: Editor<String>,
    candidate: Option<Snapshot>,
    diffs: Rc<RefCell<Vec<Diff>>>,
}

impl Replay {
    pub fn new(config: EditorConfig) -> Self {
        let diffs = Rc::new(RefCell::new(Vec::new()));
        let sink = diffs.clone();

        let mut editor = Editor::with_change_handler(
            "surface".to_string(),
            ChangeHandler::Diff(Box::new(move |diff: &Diff| sink.borrow_mut().push(diff.clone()))),
            config,
        );
        editor.set_renderer(Box::new(MemoryRenderer));

        Self {
            editor,
            candidate: None,
            diffs,
        }
    }

    pub fn editor(&self) -> &Editor<String> {
        &self.editor
    }

    /// Apply one step, returning the diffs of any commits it caused
    pub fn apply(&mut self, step: &Step) -> Result<Vec<Diff>> {
        match step {
            Step::Append {
                parent,
                key,
                node_type,
                text,
            } => {
                let node = self.build_node(node_type, key, text.as_deref())?;
                self.candidate().append_child(parent, node)?;
            }
            Step::Insert {
                parent,
                index,
                key,
                node_type,
                text,
            } => {
                let node = self.build_node(node_type, key, text.as_deref())?;
                self.candidate().insert_child(parent, *index, node)?;
            }
            Step::SetText { key, text } => {
                self.candidate().set_text(key, text.clone())?;
            }
            Step::Remove { key } => {
                self.candidate().remove_node(key)?;
            }
            Step::Select { key, offset } => {
                self.candidate()
                    .set_selection(Selection::caret(key.as_str(), *offset))?;
            }
            Step::Commit { mode } => {
                // Keep the edits around for a later commit
                if self.editor.is_updating() {
                    return Err(EditorError::ConcurrentUpdate.into());
                }
                let candidate = self
                    .candidate
                    .take()
                    .ok_or_else(|| anyhow!("Nothing to commit"))?;
                let mode = mode.unwrap_or(self.editor.config().default_commit_mode);
                self.editor.update(candidate, mode)?;
            }
            Step::Flush => {
                self.editor.run_pending()?;
            }
        }

        Ok(self.diffs.borrow_mut().drain(..).collect())
    }

    /// Run any pending commit left at the end of a script
    pub fn finish(&mut self) -> Result<Vec<Diff>> {
        if self.candidate.is_some() {
            tracing::warn!("Script ended with uncommitted edits");
        }
        self.editor.run_pending()?;
        Ok(self.diffs.borrow_mut().drain(..).collect())
    }

    fn candidate(&mut self) -> &mut Snapshot {
        let committed = self.editor.committed();
        self.candidate.get_or_insert_with(|| committed.fork())
    }

    fn build_node(
        &self,
        node_type: &str,
        key: &str,
        text: Option<&str>,
    ) -> Result<outline_editor::Node> {
        let node = self.editor.create_node(node_type, key)?;
        Ok(match text {
            Some(text) => node.with_text(text),
            None => node,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"[
        { "op": "append", "parent": "body", "key": "p1", "type": "block" },
        { "op": "append", "parent": "p1", "key": "t1", "text": "Hello" },
        { "op": "commit", "mode": "sync" },
        { "op": "setText", "key": "t1", "text": "Hello, world" },
        { "op": "select", "key": "t1", "offset": 12 },
        { "op": "commit" },
        { "op": "flush" }
    ]"#;

    #[test]
    fn test_parse_script() {
        let steps = parse_script(SCRIPT).unwrap();
        assert_eq!(steps.len(), 7);
        assert_eq!(
            steps[1],
            Step::Append {
                parent: "p1".to_string(),
                key: "t1".to_string(),
                node_type: "text".to_string(),
                text: Some("Hello".to_string()),
            }
        );
        assert_eq!(steps[5], Step::Commit { mode: None });
        assert_eq!(steps[6], Step::Flush);
    }

    #[test]
    fn test_parse_rejects_unknown_op() {
        assert!(parse_script(r#"[{ "op": "undo" }]"#).is_err());
    }

    #[test]
    fn test_replay_script() {
        let steps = parse_script(SCRIPT).unwrap();
        let mut replay = Replay::new(EditorConfig::default());

        let mut diffs = Vec::new();
        for step in &steps {
            diffs.extend(replay.apply(step).unwrap());
        }

        // One sync commit, one deferred commit flushed at the end
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[1].nodes.len(), 1);
        assert_eq!(diffs[1].selection, Selection::caret("t1", 12));

        let editor = replay.editor();
        assert_eq!(editor.committed().text_content(), "Hello, world");
        assert_eq!(editor.element_by_key("t1").unwrap(), "<text t1>Hello, world");
    }

    #[test]
    fn test_commit_without_edits_fails() {
        let mut replay = Replay::new(EditorConfig::default());
        let result = replay.apply(&Step::Commit { mode: None });
        assert!(result.is_err());
    }

    #[test]
    fn test_commit_while_pending_keeps_edits() {
        let mut replay = Replay::new(EditorConfig::default());
        let append = |key: &str| Step::Append {
            parent: "body".to_string(),
            key: key.to_string(),
            node_type: "text".to_string(),
            text: Some(key.to_string()),
        };

        replay.apply(&append("a")).unwrap();
        replay.apply(&Step::Commit { mode: None }).unwrap();

        replay.apply(&append("b")).unwrap();
        let err = replay.apply(&Step::Commit { mode: None }).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EditorError>(),
            Some(&EditorError::ConcurrentUpdate)
        );

        assert!(replay.candidate.as_ref().unwrap().contains("b"));

        // After the pending commit lands, the retained edits commit cleanly
        assert_eq!(replay.apply(&Step::Flush).unwrap().len(), 1);
        let diffs = replay
            .apply(&Step::Commit { mode: Some(CommitMode::Sync) })
            .unwrap();
        assert_eq!(diffs.len(), 1);
        assert!(replay.editor().committed().contains("b"));
    }

    #[test]
    fn test_resolve_script() {
        assert_eq!(
            resolve_script("/work", Path::new("demos/hello.json")),
            PathBuf::from("/work/demos/hello.json")
        );
        assert_eq!(
            resolve_script("/work", Path::new("/tmp/edit.json")),
            PathBuf::from("/tmp/edit.json")
        );
    }

    #[test]
    fn test_finish_flushes_pending_commit() {
        let mut replay = Replay::new(EditorConfig::default());
        replay
            .apply(&Step::Append {
                parent: "body".to_string(),
                key: "t1".to_string(),
                node_type: "text".to_string(),
                text: Some("late".to_string()),
            })
            .unwrap();
        assert!(replay.apply(&Step::Commit { mode: None }).unwrap().is_empty());

        let diffs = replay.finish().unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(replay.editor().committed().text_content(), "late");
    }
}
