//! Slot-grid editing: validation, conflict resolution, persistence and
//! undo/redo, in that order.
//!
//! A mutation only lands in the history once the backend has accepted it, so
//! the history never records a grid that was not saved.

use std::sync::Arc;

use serde::Serialize;

use crate::conflict::{Cell, Grid, Resolution, DEFAULT_SUGGESTIONS};
use crate::error::{Error, Result};
use crate::history::{History, HistoryAction, HistoryEntry};
use crate::models::{SlotPatch, WeeklySlot};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EditOutcome {
    Applied { slot: WeeklySlot },
    Conflict {
        conflicting: Vec<i64>,
        suggestions: Vec<Cell>,
    },
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied { .. })
    }

    pub fn top_suggestion(&self) -> Option<Cell> {
        match self {
            EditOutcome::Applied { .. } => None,
            EditOutcome::Conflict { suggestions, .. } => suggestions.first().copied(),
        }
    }
}

pub struct ScheduleEditor {
    store: Arc<Store>,
    grid: Grid,
    history: History,
    suggestion_limit: usize,
}

impl ScheduleEditor {
    pub fn new(store: Arc<Store>, grid: Grid, history_capacity: usize) -> Self {
        Self {
            store,
            grid,
            history: History::new(history_capacity),
            suggestion_limit: DEFAULT_SUGGESTIONS,
        }
    }

    pub fn with_suggestion_limit(mut self, limit: usize) -> Self {
        self.suggestion_limit = limit;
        self
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history_log(&self) -> Vec<(bool, &HistoryEntry)> {
        self.history.log()
    }

    /// Fetches the grid and records it as the base of the history.
    pub async fn load(&mut self) -> Result<Vec<WeeklySlot>> {
        let slots = self.store.load_slots().await?;
        self.history.push(slots.clone(), HistoryAction::Load)?;
        Ok(slots)
    }

    pub async fn add_slot(
        &mut self,
        day: u8,
        start: u32,
        end: u32,
        subject_id: i64,
    ) -> Result<EditOutcome> {
        let existing = self.begin_edit().await?;
        let candidate = WeeklySlot {
            id: 0,
            learner_id: self.store.learner_id(),
            day,
            start,
            end,
            subject_id,
        };

        if let Some(conflict) = self.check(&candidate, &existing)? {
            return Ok(conflict);
        }

        let created = self.store.create_slot(candidate).await?;
        log::info!("editor: added slot {} ({} {})", created.id, created.day, created.time_label());
        self.record(HistoryAction::Add).await?;
        Ok(EditOutcome::Applied { slot: created })
    }

    /// Moves a slot to a new day and start, keeping its duration.
    pub async fn move_slot(&mut self, id: i64, day: u8, start: u32) -> Result<EditOutcome> {
        let existing = self.begin_edit().await?;
        let current = find(&existing, id)?;
        let patch = SlotPatch {
            day: Some(day),
            start: Some(start),
            end: Some(start + current.duration()),
            subject_id: None,
        };
        self.patch_slot(current, patch, &existing, HistoryAction::Move).await
    }

    pub async fn resize_slot(&mut self, id: i64, end: u32) -> Result<EditOutcome> {
        let existing = self.begin_edit().await?;
        let current = find(&existing, id)?;
        let patch = SlotPatch {
            end: Some(end),
            ..Default::default()
        };
        self.patch_slot(current, patch, &existing, HistoryAction::Resize).await
    }

    pub async fn remove_slot(&mut self, id: i64) -> Result<WeeklySlot> {
        let existing = self.begin_edit().await?;
        let removed = find(&existing, id)?;
        self.store.delete_slot(id).await?;
        log::info!("editor: removed slot {}", id);
        self.record(HistoryAction::Remove).await?;
        Ok(removed)
    }

    /// Replaces the whole grid in one write and records it under `action`.
    pub async fn replace_all(
        &mut self,
        slots: Vec<WeeklySlot>,
        action: HistoryAction,
    ) -> Result<Vec<WeeklySlot>> {
        self.begin_edit().await?;
        let stored = self.store.replace_slots(slots).await?;
        self.record(action).await?;
        Ok(stored)
    }

    /// Steps back one entry and saves that grid. If the save fails the
    /// history cursor is put back and the error returned.
    pub async fn undo(&mut self) -> Result<Vec<WeeklySlot>> {
        let moved = self.history.can_undo();
        let snapshot = self.history.undo()?.to_vec();
        self.commit_snapshot(moved, snapshot).await
    }

    pub async fn redo(&mut self) -> Result<Vec<WeeklySlot>> {
        let moved = self.history.can_redo();
        let snapshot = self.history.redo()?.to_vec();
        self.commit_snapshot(moved, snapshot).await
    }

    async fn commit_snapshot(
        &mut self,
        moved: bool,
        snapshot: Vec<WeeklySlot>,
    ) -> Result<Vec<WeeklySlot>> {
        if !moved {
            return Ok(snapshot);
        }
        match self.store.replace_slots(snapshot).await {
            Ok(stored) => {
                self.history.confirm_commit();
                Ok(stored)
            }
            Err(e) => {
                log::warn!("editor: reverting history cursor, commit failed: {}", e);
                self.history.abort_commit();
                Err(e)
            }
        }
    }

    async fn patch_slot(
        &mut self,
        current: WeeklySlot,
        patch: SlotPatch,
        existing: &[WeeklySlot],
        action: HistoryAction,
    ) -> Result<EditOutcome> {
        let mut candidate = current.clone();
        patch.apply(&mut candidate);

        if let Some(conflict) = self.check(&candidate, existing)? {
            return Ok(conflict);
        }

        let updated = self.store.update_slot(current.id, patch).await?;
        log::info!(
            "editor: {} slot {} to {} {}",
            action.as_str(),
            updated.id,
            updated.day,
            updated.time_label()
        );
        self.record(action).await?;
        Ok(EditOutcome::Applied { slot: updated })
    }

    /// Validation failures are errors; overlaps come back as a conflict.
    fn check(
        &self,
        candidate: &WeeklySlot,
        existing: &[WeeklySlot],
    ) -> Result<Option<EditOutcome>> {
        match self.grid.resolve(candidate, existing, self.suggestion_limit)? {
            Resolution::Clear => Ok(None),
            Resolution::Conflict {
                conflicting,
                suggestions,
            } => {
                log::debug!(
                    "editor: candidate on day {} at {} conflicts with {:?}",
                    candidate.day,
                    candidate.time_label(),
                    conflicting
                );
                Ok(Some(EditOutcome::Conflict {
                    conflicting,
                    suggestions,
                }))
            }
        }
    }

    // Refuses to edit mid-commit and seeds the history on first use
    async fn begin_edit(&mut self) -> Result<Vec<WeeklySlot>> {
        if self.history.is_pending() {
            return Err(Error::CommitPending);
        }
        if self.history.is_empty() {
            return self.load().await;
        }
        self.store.load_slots().await
    }

    async fn record(&mut self, action: HistoryAction) -> Result<()> {
        let slots = self.store.load_slots().await?;
        self.history.push(slots, action)
    }
}

fn find(slots: &[WeeklySlot], id: i64) -> Result<WeeklySlot> {
    slots
        .iter()
        .find(|s| s.id == id)
        .cloned()
        .ok_or(Error::SlotNotFound(id))
}
