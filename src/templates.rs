//! Predefined weekly layouts that can be stamped onto a learner's grid.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::history::HistoryAction;
use crate::models::{Subject, WeeklySlot};
use crate::schedule::ScheduleEditor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateSlot {
    pub day: u8,
    pub start: u32,
    pub end: u32,
    /// Index into the template's `subjects`
    pub subject: usize,
}

const fn at(day: u8, start: u32, end: u32, subject: usize) -> TemplateSlot {
    TemplateSlot {
        day,
        start,
        end,
        subject,
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Template {
    pub key: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub difficulty: &'static str,
    pub subjects: &'static [&'static str],
    pub slots: &'static [TemplateSlot],
}

impl Template {
    pub fn weekly_minutes(&self) -> u32 {
        self.slots.iter().map(|s| s.end - s.start).sum()
    }
}

pub const TEMPLATES: &[Template] = &[
    Template {
        key: "exam-sprint",
        name: "Exam Sprint",
        category: "exam",
        difficulty: "hard",
        subjects: &["Mathematics", "Physics", "Chemistry"],
        slots: &[
            at(1, 8 * 60, 10 * 60, 0),
            at(1, 14 * 60, 15 * 60 + 30, 2),
            at(2, 8 * 60, 10 * 60, 1),
            at(2, 14 * 60, 15 * 60 + 30, 0),
            at(3, 8 * 60, 10 * 60, 0),
            at(3, 14 * 60, 15 * 60 + 30, 1),
            at(4, 8 * 60, 10 * 60, 1),
            at(4, 14 * 60, 15 * 60 + 30, 2),
            at(5, 8 * 60, 10 * 60, 0),
            at(6, 9 * 60, 12 * 60, 2),
        ],
    },
    Template {
        key: "balanced-week",
        name: "Balanced Week",
        category: "general",
        difficulty: "medium",
        subjects: &["Mathematics", "Languages", "Science"],
        slots: &[
            at(1, 17 * 60, 18 * 60 + 30, 0),
            at(2, 17 * 60, 18 * 60, 1),
            at(3, 17 * 60, 18 * 60 + 30, 0),
            at(4, 17 * 60, 18 * 60, 1),
            at(5, 17 * 60, 18 * 60 + 30, 2),
            at(6, 10 * 60, 12 * 60, 2),
        ],
    },
    Template {
        key: "light-review",
        name: "Light Review",
        category: "review",
        difficulty: "easy",
        subjects: &["Review"],
        slots: &[
            at(1, 19 * 60, 19 * 60 + 30, 0),
            at(2, 19 * 60, 19 * 60 + 30, 0),
            at(3, 19 * 60, 19 * 60 + 30, 0),
            at(4, 19 * 60, 19 * 60 + 30, 0),
            at(5, 19 * 60, 19 * 60 + 30, 0),
            at(6, 9 * 60, 10 * 60, 0),
            at(7, 9 * 60, 10 * 60, 0),
        ],
    },
];

pub fn find_template(key: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.key.eq_ignore_ascii_case(key))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Keep existing slots; template slots that do not fit are skipped
    Append,
    /// Clear the learner's slots first. Only reachable with confirmation.
    ReplaceConfirmed,
}

impl ApplyMode {
    pub fn from_flags(replace: bool, confirmed: bool) -> Result<Self> {
        match (replace, confirmed) {
            (false, _) => Ok(ApplyMode::Append),
            (true, true) => Ok(ApplyMode::ReplaceConfirmed),
            (true, false) => Err(Error::Unconfirmed(
                "replacing clears every existing slot; pass --yes to confirm".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSlot {
    pub slot: TemplateSlot,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub template: &'static str,
    pub created_subjects: Vec<Subject>,
    pub created_slots: Vec<WeeklySlot>,
    pub skipped: Vec<SkippedSlot>,
}

/// Materializes `template` for the editor's learner: missing subjects are
/// created (matched by name), then the slots are written in one replace and
/// recorded as a single history entry.
pub async fn apply_template(
    editor: &mut ScheduleEditor,
    template: &'static Template,
    mode: ApplyMode,
) -> Result<ApplyReport> {
    let store = editor.store().clone();

    let mut subjects = store.load_subjects().await?;
    let mut next_id = subjects.iter().map(|s| s.id).max().unwrap_or(0) + 1;
    let mut created_subjects = Vec::new();
    let mut subject_ids = Vec::with_capacity(template.subjects.len());

    for name in template.subjects {
        match subjects.iter().find(|s| s.name.eq_ignore_ascii_case(name)) {
            Some(existing) => subject_ids.push(existing.id),
            None => {
                let subject = Subject {
                    id: next_id,
                    name: name.to_string(),
                    category: Some(template.category.to_string()),
                };
                next_id += 1;
                subject_ids.push(subject.id);
                created_subjects.push(subject.clone());
                subjects.push(subject);
            }
        }
    }
    if !created_subjects.is_empty() {
        store.save_subjects(subjects).await?;
    }

    let existing = store.load_slots().await?;
    let mut grid_slots = match mode {
        ApplyMode::Append => existing.clone(),
        ApplyMode::ReplaceConfirmed => {
            log::warn!(
                "templates: clearing {} slots for learner {}",
                existing.len(),
                store.learner_id()
            );
            Vec::new()
        }
    };

    let grid = editor.grid();
    let mut skipped = Vec::new();
    for ts in template.slots {
        let Some(&subject_id) = subject_ids.get(ts.subject) else {
            skipped.push(SkippedSlot {
                slot: *ts,
                reason: format!("no subject at index {}", ts.subject),
            });
            continue;
        };
        match grid.can_place(ts.day, ts.start, ts.end.saturating_sub(ts.start), &grid_slots) {
            Ok(()) => grid_slots.push(WeeklySlot {
                id: 0,
                learner_id: store.learner_id(),
                day: ts.day,
                start: ts.start,
                end: ts.end,
                subject_id,
            }),
            Err(e) => {
                if !e.is_conflict() {
                    log::warn!(
                        "templates: {} slot on day {} does not fit the grid: {}",
                        template.key,
                        ts.day,
                        e
                    );
                }
                skipped.push(SkippedSlot {
                    slot: *ts,
                    reason: e.to_string(),
                });
            }
        }
    }

    let kept_ids: Vec<i64> = grid_slots.iter().map(|s| s.id).filter(|id| *id != 0).collect();
    let stored = editor.replace_all(grid_slots, HistoryAction::Template).await?;
    let created_slots: Vec<WeeklySlot> = stored
        .into_iter()
        .filter(|s| !kept_ids.contains(&s.id))
        .collect();

    log::info!(
        "templates: applied {} ({} slots, {} skipped)",
        template.key,
        created_slots.len(),
        skipped.len()
    );

    Ok(ApplyReport {
        template: template.key,
        created_subjects,
        created_slots,
        skipped,
    })
}
