//! Bounded undo/redo log of slot-grid snapshots.
//!
//! The log is purely in-memory. Moving the cursor is local; saving the
//! snapshot it lands on is the caller's job. Until the caller reports how
//! that save went (`confirm_commit` / `abort_commit`) the log refuses further
//! moves and pushes, so the cursor can never drift from what was saved.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::WeeklySlot;

pub const DEFAULT_CAPACITY: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Load,
    Add,
    Remove,
    Move,
    Resize,
    Template,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Load => "load",
            HistoryAction::Add => "add",
            HistoryAction::Remove => "remove",
            HistoryAction::Move => "move",
            HistoryAction::Resize => "resize",
            HistoryAction::Template => "template",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryAction::Load => "Loaded schedule",
            HistoryAction::Add => "Added slot",
            HistoryAction::Remove => "Removed slot",
            HistoryAction::Move => "Moved slot",
            HistoryAction::Resize => "Resized slot",
            HistoryAction::Template => "Applied template",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub slots: Vec<WeeklySlot>,
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
}

pub struct History {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    capacity: usize,
    // Cursor position to restore if the pending save fails
    pending: Option<usize>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            cursor: 0,
            capacity,
            pending: None,
        }
    }

    /// Records the grid state after an action. Anything that was undone is
    /// dropped; the oldest entry is evicted once capacity is reached.
    pub fn push(&mut self, slots: Vec<WeeklySlot>, action: HistoryAction) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::CommitPending);
        }

        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(HistoryEntry {
            slots,
            action,
            timestamp: Utc::now(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.pending.is_none() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.pending.is_none() && self.cursor + 1 < self.entries.len()
    }

    /// Steps back one entry and returns the snapshot there. At the bottom of
    /// the stack this is a no-op returning the current snapshot.
    pub fn undo(&mut self) -> Result<&[WeeklySlot]> {
        if self.pending.is_some() {
            return Err(Error::CommitPending);
        }
        if self.can_undo() {
            self.pending = Some(self.cursor);
            self.cursor -= 1;
        }
        Ok(self.current())
    }

    pub fn redo(&mut self) -> Result<&[WeeklySlot]> {
        if self.pending.is_some() {
            return Err(Error::CommitPending);
        }
        if self.can_redo() {
            self.pending = Some(self.cursor);
            self.cursor += 1;
        }
        Ok(self.current())
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn confirm_commit(&mut self) {
        self.pending = None;
    }

    /// The save of the reverted snapshot failed: put the cursor back where
    /// the backing store still is.
    pub fn abort_commit(&mut self) {
        if let Some(previous) = self.pending.take() {
            self.cursor = previous;
        }
    }

    pub fn current(&self) -> &[WeeklySlot] {
        self.entries
            .get(self.cursor)
            .map(|e| e.slots.as_slice())
            .unwrap_or(&[])
    }

    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    /// Newest first, flagging the entry the cursor sits on.
    pub fn log(&self) -> Vec<(bool, &HistoryEntry)> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .map(|(i, e)| (i == self.cursor, e))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
