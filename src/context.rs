//! Per-conversion formatting state: the inline formatting context stack and
//! the list numbering registry.
//!
//! Both are created empty at the start of a conversion and must be fully
//! unwound when it finishes; the emitter checks this and reports a bug
//! diagnostic otherwise.

use crate::styles::{RunDelta, RunStyle};

/// A snapshot of the active inline formatting.
///
/// Snapshots are plain values: pushing copies the current one and applies a
/// delta, popping restores exactly the previous snapshot, so formatting can
/// never leak between sibling subtrees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattingState {
    /// Character formatting for runs emitted under this state.
    pub run: RunStyle,
    /// Hyperlink target covering this subtree, if inside `<a href>`.
    pub link: Option<String>,
}

/// The stack of [`FormattingState`] snapshots driven by the tree walk.
#[derive(Debug)]
pub struct ContextStack {
    stack: Vec<FormattingState>,
}

impl ContextStack {
    /// A stack holding only the default state.
    pub fn new() -> ContextStack {
        ContextStack {
            stack: vec![FormattingState::default()],
        }
    }

    /// The active snapshot.
    pub fn current(&self) -> &FormattingState {
        // The base frame is never popped.
        self.stack.last().expect("context stack underflow")
    }

    /// Push a copy of the current state with `delta` applied.
    pub fn push(&mut self, delta: &RunDelta) {
        let mut state = self.current().clone();
        state.run = state.run.apply(delta);
        self.stack.push(state);
    }

    /// Push a copy of the current state carrying a hyperlink target.
    pub fn push_link(&mut self, target: &str) {
        let mut state = self.current().clone();
        state.link = Some(target.to_string());
        self.stack.push(state);
    }

    /// Pop back to the previous snapshot.  The base frame stays in place.
    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Number of frames, counting the base frame.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl Default for ContextStack {
    fn default() -> Self {
        ContextStack::new()
    }
}

/// Whether a list numbers its items or bullets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

/// Opaque identity grouping list items that share continuous numbering.
pub type NumberingId = u32;

/// Deepest supported list level (0-based); deeper nesting collapses here.
pub const MAX_LIST_LEVEL: u8 = 8;

/// The list the walker is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListContext {
    pub kind: ListKind,
    pub numbering: NumberingId,
    pub level: u8,
}

/// Allocates numbering identities for lists.
///
/// Policy: each top-level list element gets a fresh identity; every list
/// nested beneath it (ordered or not) shares that identity and differs only
/// in level.  Restarting numbering therefore requires a new top-level list,
/// which matches how the converted documents read.
#[derive(Debug)]
pub struct ListRegistry {
    next_id: NumberingId,
}

impl ListRegistry {
    pub fn new() -> ListRegistry {
        ListRegistry { next_id: 1 }
    }

    /// Enter a list.  At nesting level 0 this allocates a new numbering
    /// identity; nested calls inherit the ancestor's identity with the level
    /// incremented and capped at [`MAX_LIST_LEVEL`].
    pub fn open(&mut self, kind: ListKind, parent: Option<&ListContext>) -> ListContext {
        match parent {
            None => {
                let numbering = self.next_id;
                self.next_id += 1;
                ListContext {
                    kind,
                    numbering,
                    level: 0,
                }
            }
            Some(parent) => ListContext {
                kind,
                numbering: parent.numbering,
                level: (parent.level + 1).min(MAX_LIST_LEVEL),
            },
        }
    }
}

impl Default for ListRegistry {
    fn default() -> Self {
        ListRegistry::new()
    }
}
