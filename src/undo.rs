//! Undo/redo for annotation edits.
//!
//! Every edit is recorded as a snapshot of the affected sequence before and
//! after the change. Undo writes the `before` snapshot back, redo the `after`
//! one. A missing snapshot means the annotation did not exist on that side, so
//! creation and deletion are covered by the same command.

use crate::model::{Annotation, AnnotationId, AnnotationStore, BoundingBoxSequence};

// ============================================================================
// Command Types
// ============================================================================

/// A recorded edit that can be undone and redone.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// One annotation changed
    Edit {
        annotation_id: AnnotationId,
        /// Sequence before the edit (`None` if the annotation was created)
        before: Option<BoundingBoxSequence>,
        /// Sequence after the edit (`None` if the annotation was deleted)
        after: Option<BoundingBoxSequence>,
        description: String,
    },
    /// Several edits undone as one step (batch accept)
    Batch {
        description: String,
        commands: Vec<Command>,
    },
}

impl Command {
    pub fn edit(
        annotation_id: AnnotationId,
        before: Option<BoundingBoxSequence>,
        after: Option<BoundingBoxSequence>,
        description: impl Into<String>,
    ) -> Self {
        Command::Edit {
            annotation_id,
            before,
            after,
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Command::Edit { description, .. } | Command::Batch { description, .. } => description,
        }
    }

    /// Annotations touched by this command.
    pub fn annotation_ids(&self) -> Vec<AnnotationId> {
        match self {
            Command::Edit { annotation_id, .. } => vec![*annotation_id],
            Command::Batch { commands, .. } => {
                commands.iter().flat_map(|c| c.annotation_ids()).collect()
            }
        }
    }
}

// ============================================================================
// Undo Stack
// ============================================================================

/// Configuration for the undo stack
#[derive(Debug, Clone)]
pub struct UndoConfig {
    /// Maximum number of commands to keep in history
    pub max_history: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_history: crate::constants::UNDO_HISTORY_SIZE,
        }
    }
}

/// The undo/redo history.
///
/// Recording a command clears the redo side. Undo moves the newest command
/// to the redo side and redo moves it back.
#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    config: UndoConfig,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: UndoConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Record a command that has already been applied.
    pub fn push(&mut self, command: Command) {
        log::debug!("📝 Undo: pushed '{}'", command.description());
        self.undo_stack.push(command);
        self.redo_stack.clear();

        if self.undo_stack.len() > self.config.max_history {
            let excess = self.undo_stack.len() - self.config.max_history;
            self.undo_stack.drain(..excess);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Undo the newest command against `store`.
    ///
    /// Returns the command that was undone.
    pub fn undo(&mut self, store: &mut AnnotationStore) -> Option<&Command> {
        let command = self.undo_stack.pop()?;
        log::debug!("⏪ Undo: '{}'", command.description());
        apply(&command, store, Direction::Backward);
        self.redo_stack.push(command);
        self.redo_stack.last()
    }

    /// Redo the newest undone command against `store`.
    pub fn redo(&mut self, store: &mut AnnotationStore) -> Option<&Command> {
        let command = self.redo_stack.pop()?;
        log::debug!("⏩ Redo: '{}'", command.description());
        apply(&command, store, Direction::Forward);
        self.undo_stack.push(command);
        self.undo_stack.last()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.description())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        log::debug!("🗑️ Undo history cleared");
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

fn apply(command: &Command, store: &mut AnnotationStore, direction: Direction) {
    match command {
        Command::Edit {
            annotation_id,
            before,
            after,
            ..
        } => {
            let target = match direction {
                Direction::Forward => after,
                Direction::Backward => before,
            };
            write_snapshot(store, *annotation_id, target.as_ref());
        }
        Command::Batch { commands, .. } => match direction {
            Direction::Forward => commands.iter().for_each(|c| apply(c, store, direction)),
            Direction::Backward => commands
                .iter()
                .rev()
                .for_each(|c| apply(c, store, direction)),
        },
    }
}

fn write_snapshot(
    store: &mut AnnotationStore,
    id: AnnotationId,
    snapshot: Option<&BoundingBoxSequence>,
) {
    match snapshot {
        Some(sequence) => match store.get_mut(id) {
            Some(annotation) => {
                annotation.sequence = sequence.clone();
                store.mark_dirty();
            }
            None => store.restore(Annotation::new(id, sequence.clone())),
        },
        None => {
            store.remove(id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
