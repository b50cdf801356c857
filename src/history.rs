//! Undo/redo over whole-table snapshots.
//!
//! The manager owns the active table. Snapshots are plain [`Table`] clones;
//! since tables share column buffers through `Arc` and conversions never
//! mutate in place, a snapshot costs one pointer per column rather than a
//! deep copy of the data.

use crate::error::{FastmigError, Result};
use crate::table::Table;

/// Outcome of an undo or redo request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryStatus {
    Applied,
    NothingToUndo,
    NothingToRedo,
}

/// Active table plus undo and redo stacks.
///
/// Every fallible method returns [`FastmigError::NoTableLoaded`] before
/// [`load`](Self::load) has been called.
#[derive(Debug, Clone, Default)]
pub struct HistoryManager {
    current: Option<Table>,
    undo_stack: Vec<Table>,
    redo_stack: Vec<Table>,
    max_depth: Option<usize>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// History that keeps at most `max_depth` undo entries, dropping the oldest.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
            ..Self::default()
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    /// Makes `table` the active table and forgets previous history.
    pub fn load(&mut self, table: Table) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current = Some(table);
    }

    /// The active table.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] before the first [`load`](Self::load).
    pub fn current(&self) -> Result<&Table> {
        self.current.as_ref().ok_or(FastmigError::NoTableLoaded)
    }

    /// Pushes `snapshot` onto the undo stack and clears the redo stack.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] when nothing is loaded.
    pub fn commit(&mut self, snapshot: Table) -> Result<()> {
        if !self.is_loaded() {
            return Err(FastmigError::NoTableLoaded);
        }
        self.push_undo(snapshot);
        self.redo_stack.clear();
        Ok(())
    }

    /// Commits the active table as a checkpoint.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] when nothing is loaded.
    pub fn checkpoint(&mut self) -> Result<()> {
        let snapshot = self.current()?.clone();
        self.commit(snapshot)
    }

    /// Undoable replacement of the active table.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] when nothing is loaded; the active
    /// table is left as it was.
    pub fn replace(&mut self, table: Table) -> Result<()> {
        self.checkpoint()?;
        self.current = Some(table);
        Ok(())
    }

    /// Swaps the active table for the latest undo entry.
    ///
    /// An empty undo stack is reported as [`HistoryStatus::NothingToUndo`],
    /// not as an error.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] when nothing is loaded.
    pub fn undo(&mut self) -> Result<HistoryStatus> {
        let current = self.current.as_mut().ok_or(FastmigError::NoTableLoaded)?;
        let Some(previous) = self.undo_stack.pop() else {
            return Ok(HistoryStatus::NothingToUndo);
        };
        self.redo_stack.push(std::mem::replace(current, previous));
        log::debug!(
            "Undo: {} undo / {} redo entries left",
            self.undo_stack.len(),
            self.redo_stack.len()
        );
        Ok(HistoryStatus::Applied)
    }

    /// Reapplies the latest undone table.
    ///
    /// # Errors
    ///
    /// [`FastmigError::NoTableLoaded`] when nothing is loaded.
    pub fn redo(&mut self) -> Result<HistoryStatus> {
        let current = self.current.as_mut().ok_or(FastmigError::NoTableLoaded)?;
        let Some(next) = self.redo_stack.pop() else {
            return Ok(HistoryStatus::NothingToRedo);
        };
        let undone = std::mem::replace(current, next);
        self.push_undo(undone);
        log::debug!(
            "Redo: {} undo / {} redo entries left",
            self.undo_stack.len(),
            self.redo_stack.len()
        );
        Ok(HistoryStatus::Applied)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    fn push_undo(&mut self, snapshot: Table) {
        self.undo_stack.push(snapshot);
        if let Some(max) = self.max_depth
            && self.undo_stack.len() > max
        {
            let excess = self.undo_stack.len() - max;
            self.undo_stack.drain(..excess);
        }
    }
}
