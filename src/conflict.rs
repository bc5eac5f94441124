//! Placement rules for the weekly slot grid.
//!
//! Times are minutes past midnight and intervals are half-open `[start, end)`,
//! so back-to-back slots (17:00-18:00 then 18:00-19:00) do not overlap.
//! Nothing here touches storage: callers validate a candidate, and on a
//! conflict get back ranked free cells they can offer instead.

use serde::Serialize;
use thiserror::Error;

use crate::models::{format_minute, WeeklySlot, MINUTES_PER_DAY};

pub const DAYS_PER_WEEK: u8 = 7;
pub const DEFAULT_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("day {0} is outside 1..=7")]
    InvalidDay(u8),

    #[error("{} is before opening time {}", format_minute(*.start), format_minute(*.open))]
    BeforeOpening { start: u32, open: u32 },

    #[error("{} is not on the {step}-minute grid", format_minute(*.start))]
    Misaligned { start: u32, step: u32 },

    #[error("slot would end at {}, after closing time {}", format_minute(*.end), format_minute(*.close))]
    PastClosing { end: u32, close: u32 },

    #[error("{duration} minutes is shorter than one {step}-minute step")]
    TooShort { duration: u32, step: u32 },

    #[error("overlaps slot {slot_id}")]
    Overlap { slot_id: i64 },
}

impl PlacementError {
    /// Overlaps are resolvable by moving; everything else is a bad input.
    pub fn is_conflict(&self) -> bool {
        matches!(self, PlacementError::Overlap { .. })
    }
}

/// True iff both slots are on the same day and their intervals intersect.
pub fn overlaps(a: &WeeklySlot, b: &WeeklySlot) -> bool {
    a.day == b.day && a.start.max(b.start) < a.end.min(b.end)
}

/// Day changes dominate time shifts: one day apart is always further than
/// any shift within the same day.
pub fn distance(day_a: u8, minute_a: u32, day_b: u8, minute_b: u32) -> u32 {
    u32::from(day_a.abs_diff(day_b)) * MINUTES_PER_DAY + minute_a.abs_diff(minute_b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub day: u8,
    pub minute: u32,
    pub distance: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Clear,
    Conflict {
        conflicting: Vec<i64>,
        suggestions: Vec<Cell>,
    },
}

/// Operating hours and step size of the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub open: u32,
    pub close: u32,
    pub step: u32,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            open: 7 * 60,
            close: 23 * 60,
            step: 30,
        }
    }
}

impl Grid {
    pub fn new(open: u32, close: u32, step: u32) -> Self {
        Self { open, close, step }
    }

    /// Checks the candidate against the grid alone, ignoring other slots.
    pub fn validate(&self, day: u8, start: u32, duration: u32) -> Result<(), PlacementError> {
        if !(1..=DAYS_PER_WEEK).contains(&day) {
            return Err(PlacementError::InvalidDay(day));
        }
        if start < self.open {
            return Err(PlacementError::BeforeOpening {
                start,
                open: self.open,
            });
        }
        if self.step == 0 || start % self.step != 0 {
            return Err(PlacementError::Misaligned {
                start,
                step: self.step,
            });
        }
        if duration < self.step {
            return Err(PlacementError::TooShort {
                duration,
                step: self.step,
            });
        }
        if duration % self.step != 0 {
            return Err(PlacementError::Misaligned {
                start: start + duration,
                step: self.step,
            });
        }
        if start + duration > self.close {
            return Err(PlacementError::PastClosing {
                end: start + duration,
                close: self.close,
            });
        }
        Ok(())
    }

    pub fn can_place(
        &self,
        day: u8,
        start: u32,
        duration: u32,
        existing: &[WeeklySlot],
    ) -> Result<(), PlacementError> {
        self.validate(day, start, duration)?;

        let end = start + duration;
        let clash = existing
            .iter()
            .find(|s| s.day == day && start.max(s.start) < end.min(s.end));

        match clash {
            Some(slot) => Err(PlacementError::Overlap { slot_id: slot.id }),
            None => Ok(()),
        }
    }

    /// Every step-aligned start inside operating hours, Monday first.
    pub fn cells(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        let first = self.open.div_ceil(self.step.max(1)) * self.step.max(1);
        (1..=DAYS_PER_WEEK).flat_map(move |day| {
            (first..self.close)
                .step_by(self.step.max(1) as usize)
                .map(move |minute| (day, minute))
        })
    }

    /// Scans the whole week for cells where `duration` fits and returns the
    /// `limit` closest to the target. Equal distances keep grid order.
    pub fn find_nearest_empty_cells(
        &self,
        target_day: u8,
        target_minute: u32,
        duration: u32,
        existing: &[WeeklySlot],
        limit: usize,
    ) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self
            .cells()
            .filter(|&(day, minute)| self.can_place(day, minute, duration, existing).is_ok())
            .map(|(day, minute)| Cell {
                day,
                minute,
                distance: distance(day, minute, target_day, target_minute),
            })
            .collect();

        cells.sort_by_key(|c| (c.distance, c.day, c.minute));
        cells.truncate(limit);
        cells
    }

    /// Validates `candidate` against the other slots of its learner.
    ///
    /// A slot never conflicts with itself, so anything sharing the
    /// candidate's id is dropped from the occupied set first.
    pub fn resolve(
        &self,
        candidate: &WeeklySlot,
        existing: &[WeeklySlot],
        limit: usize,
    ) -> Result<Resolution, PlacementError> {
        let duration = candidate.duration();
        self.validate(candidate.day, candidate.start, duration)?;

        let others: Vec<WeeklySlot> = existing
            .iter()
            .filter(|s| s.id != candidate.id)
            .cloned()
            .collect();

        let conflicting: Vec<i64> = others
            .iter()
            .filter(|s| overlaps(s, candidate))
            .map(|s| s.id)
            .collect();

        if conflicting.is_empty() {
            return Ok(Resolution::Clear);
        }

        let suggestions = self.find_nearest_empty_cells(
            candidate.day,
            candidate.start,
            duration,
            &others,
            limit,
        );

        Ok(Resolution::Conflict {
            conflicting,
            suggestions,
        })
    }
}
