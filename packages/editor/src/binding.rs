//! # Host Binding
//!
//! Glue for UI frameworks that mount and unmount the editing surface.
//!
//! The host calls [`EditorHost::attach`] whenever it (re)renders with a
//! surface available and [`EditorHost::detach`] when the surface goes away.
//! Re-attaching with an existing editor only swaps the change handler, so the
//! document survives host re-renders.

use crate::{ChangeHandler, Editor, EditorConfig};

/// Owns the editor for one mounted surface
#[derive(Debug)]
pub struct EditorHost<E> {
    config: EditorConfig,
    editor: Option<Editor<E>>,
}

impl<E: Clone> EditorHost<E> {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            editor: None,
        }
    }

    /// Surface attached or host re-rendered
    ///
    /// Creates the editor the first time; afterwards replaces its change
    /// handler and leaves the document alone.
    pub fn attach(&mut self, surface: E, on_change: Option<ChangeHandler>) -> &mut Editor<E> {
        match &mut self.editor {
            Some(editor) => {
                editor.set_on_change(on_change);
            }
            None => {
                let config = self.config.clone();
                let editor = match on_change {
                    Some(handler) => Editor::with_change_handler(surface, handler, config),
                    None => Editor::new(surface, config),
                };
                self.editor = Some(editor);
            }
        }

        self.editor
            .as_mut()
            .unwrap_or_else(|| unreachable!("editor was just attached"))
    }

    /// Surface detached: tear the editor down and forget it
    pub fn detach(&mut self) -> Option<Editor<E>> {
        let mut editor = self.editor.take()?;
        editor.teardown();
        Some(editor)
    }

    /// Forward a new change handler without recreating the editor
    pub fn set_on_change(&mut self, on_change: Option<ChangeHandler>) {
        if let Some(editor) = &mut self.editor {
            editor.set_on_change(on_change);
        }
    }

    pub fn editor(&self) -> Option<&Editor<E>> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut Editor<E>> {
        self.editor.as_mut()
    }

    pub fn is_attached(&self) -> bool {
        self.editor.is_some()
    }
}

impl<E: Clone> Default for EditorHost<E> {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommitMode, Node, Snapshot};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn counting_handler(count: &Rc<RefCell<u32>>) -> ChangeHandler {
        let count = count.clone();
        ChangeHandler::Snapshot(Box::new(move |_: &Snapshot| *count.borrow_mut() += 1))
    }

    #[test]
    fn test_attach_creates_editor_once() {
        let mut host: EditorHost<String> = EditorHost::default();
        assert!(!host.is_attached());

        let editor = host.attach("root".to_string(), None);
        let candidate = editor
            .create_candidate(|c, _| c.append_child("body", Node::text("t1", "Hi")))
            .unwrap();
        editor.update(candidate, CommitMode::Sync).unwrap();

        // Re-render keeps the document
        let editor = host.attach("root".to_string(), None);
        assert!(editor.committed().contains("t1"));
    }

    #[test]
    fn test_reattach_swaps_change_handler() {
        let first = Rc::new(RefCell::new(0));
        let second = Rc::new(RefCell::new(0));
        let mut host: EditorHost<String> = EditorHost::default();

        host.attach("root".to_string(), Some(counting_handler(&first)));
        // Initial snapshot notification
        assert_eq!(*first.borrow(), 1);

        let editor = host.attach("root".to_string(), Some(counting_handler(&second)));
        let candidate = editor.create_candidate(|c, _| c.append_child("body", Node::block("p1"))).unwrap();
        editor.update(candidate, CommitMode::Sync).unwrap();

        assert_eq!(*first.borrow(), 1);
        assert_eq!(*second.borrow(), 1);
    }

    #[test]
    fn test_detach_tears_down() {
        let mut host: EditorHost<String> = EditorHost::default();
        host.attach("root".to_string(), None);

        let editor = host.detach().unwrap();
        assert!(!editor.is_attached());
        assert!(!host.is_attached());
        assert!(host.detach().is_none());
    }
}
