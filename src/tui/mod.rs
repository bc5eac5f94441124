mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::runtime::Runtime;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::conflict::Cell;
use crate::error::{Error, Result};
use crate::models::{
    day_label, format_minute, week_start_for, PlannedEntry, Subject, Topic, TopicProgress,
    WeeklySlot,
};
use crate::planner::{self, PlanInput};
use crate::progress;
use crate::schedule::{EditOutcome, ScheduleEditor};
use crate::store::{ChangeEvent, CollectionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Week,
    Plan,
    Reviews,
    History,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Week => View::Plan,
            View::Plan => View::Reviews,
            View::Reviews => View::History,
            View::History => View::Week,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Week => View::History,
            View::Plan => View::Week,
            View::Reviews => View::Plan,
            View::History => View::Reviews,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i >= self.items.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) => {
                if i == 0 {
                    self.items.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }

    /// Replaces the items, keeping the selection on the first item matching
    /// `keep` when there is one.
    fn replace(&mut self, items: Vec<T>, keep: impl Fn(&T) -> bool) {
        let previous = self.selected;
        self.items = items;
        self.selected = match self.items.iter().position(keep) {
            Some(i) => Some(i),
            None if self.items.is_empty() => None,
            None => Some(previous.unwrap_or(0).min(self.items.len() - 1)),
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

pub struct Status {
    pub text: String,
    pub level: StatusLevel,
}

// Nearest free position offered after a conflicting move
#[derive(Debug, Clone, Copy)]
pub struct Suggestion {
    pub slot_id: i64,
    pub cell: Cell,
}

pub struct App<'a> {
    rt: &'a Runtime,
    editor: ScheduleEditor,
    events: Vec<broadcast::Receiver<ChangeEvent>>,
    pub view: View,
    pub today: NaiveDate,
    pub week_start: NaiveDate,
    pub horizon_days: i64,
    pub subjects: Vec<Subject>,
    pub topics: Vec<Topic>,
    pub slots: StatefulList<WeeklySlot>,
    pub plan: StatefulList<PlannedEntry>,
    pub due: StatefulList<TopicProgress>,
    pub upcoming: Vec<TopicProgress>,
    pub status: Option<Status>,
    pub suggestion: Option<Suggestion>,
    pub should_quit: bool,
}

impl<'a> App<'a> {
    pub fn new(rt: &'a Runtime, mut editor: ScheduleEditor, horizon_days: i64) -> Result<Self> {
        let store = editor.store().clone();
        rt.block_on(async {
            store.refresh_all().await?;
            store.ensure_progress().await?;
            editor.load().await
        })?;

        let events = [
            CollectionKind::Subjects,
            CollectionKind::Topics,
            CollectionKind::Slots,
            CollectionKind::Progress,
        ]
        .into_iter()
        .map(|kind| store.subscribe(kind))
        .collect();

        let today = Local::now().date_naive();
        let mut app = Self {
            rt,
            editor,
            events,
            view: View::Week,
            today,
            week_start: week_start_for(today),
            horizon_days,
            subjects: Vec::new(),
            topics: Vec::new(),
            slots: StatefulList::with_items(Vec::new()),
            plan: StatefulList::with_items(Vec::new()),
            due: StatefulList::with_items(Vec::new()),
            upcoming: Vec::new(),
            status: None,
            suggestion: None,
            should_quit: false,
        };
        app.refresh();
        Ok(app)
    }

    /// Rebuilds every view from the store's cached collections. Stale
    /// collections are served as-is and revalidated in the background.
    pub fn refresh(&mut self) {
        let store = self.editor.store();
        self.subjects = store.subjects();
        self.topics = store.topics();
        let progress = store.progress();

        let mut slots = store.slots();
        slots.sort_by_key(|s| (s.day, s.start, s.id));
        let selected_id = self.slots.selected_item().map(|s| s.id);
        self.slots.replace(slots, |s| Some(s.id) == selected_id);

        let plan = planner::plan_week_smart(&PlanInput {
            week_start: self.week_start,
            slots: &self.slots.items,
            topics: &self.topics,
            progress: &progress,
        });
        self.plan.replace(plan, |_| false);

        let due: Vec<TopicProgress> = progress::due_for_review(&progress, self.today)
            .into_iter()
            .cloned()
            .collect();
        let selected_topic = self.due.selected_item().map(|p| p.topic_id);
        self.due.replace(due, |p| Some(p.topic_id) == selected_topic);
        self.upcoming = progress::upcoming_reviews(&progress, self.today, self.horizon_days)
            .into_iter()
            .cloned()
            .collect();
    }

    /// Drives pending background refreshes and drains change notifications.
    /// Returns true when anything changed.
    fn poll_changes(&mut self) -> bool {
        self.rt.block_on(tokio::task::yield_now());

        let mut changed = false;
        for rx in &mut self.events {
            loop {
                match rx.try_recv() {
                    Ok(_) | Err(TryRecvError::Lagged(_)) => changed = true,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
        }
        if changed {
            self.refresh();
        }
        changed
    }

    pub fn subject_name(&self, id: i64) -> String {
        self.subjects
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| format!("#{}", id))
    }

    pub fn topic_name(&self, id: i64) -> String {
        self.topics
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("#{}", id))
    }

    pub fn editor(&self) -> &ScheduleEditor {
        &self.editor
    }

    fn set_status(&mut self, level: StatusLevel, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            level,
        });
    }

    fn report_error(&mut self, context: &str, e: Error) {
        let text = if e.is_retryable() {
            format!("{}{}; r to reload and retry", context, e)
        } else {
            format!("{}{}", context, e)
        };
        self.set_status(StatusLevel::Error, text);
    }

    fn finish_edit(&mut self, slot_id: i64, verb: &str, result: Result<EditOutcome>) {
        self.suggestion = None;
        match result {
            Ok(EditOutcome::Applied { slot }) => {
                self.set_status(
                    StatusLevel::Info,
                    format!(
                        "{} slot {}: {} {}",
                        verb,
                        slot.id,
                        day_label(slot.day),
                        slot.time_label()
                    ),
                );
            }
            Ok(EditOutcome::Conflict {
                conflicting,
                suggestions,
            }) => {
                let ids: Vec<String> = conflicting.iter().map(|id| format!("#{}", id)).collect();
                let mut text = format!("Conflicts with {}", ids.join(", "));
                if let Some(cell) = suggestions.first().copied() {
                    text.push_str(&format!(
                        "; y: move to {} {}",
                        day_label(cell.day),
                        format_minute(cell.minute)
                    ));
                    self.suggestion = Some(Suggestion { slot_id, cell });
                }
                self.set_status(StatusLevel::Warn, text);
            }
            Err(e) => self.report_error("", e),
        }
        self.refresh();
    }

    fn move_selected(&mut self, day_delta: i32, minute_delta: i64) {
        let Some(slot) = self.slots.selected_item().cloned() else {
            return;
        };
        let day = (i32::from(slot.day) + day_delta).clamp(1, 7) as u8;
        let start = (i64::from(slot.start) + minute_delta).max(0) as u32;
        if day == slot.day && start == slot.start {
            return;
        }
        let result = self.rt.block_on(self.editor.move_slot(slot.id, day, start));
        self.finish_edit(slot.id, "Moved", result);
    }

    fn resize_selected(&mut self, minute_delta: i64) {
        let Some(slot) = self.slots.selected_item().cloned() else {
            return;
        };
        let end = (i64::from(slot.end) + minute_delta).max(0) as u32;
        let result = self.rt.block_on(self.editor.resize_slot(slot.id, end));
        self.finish_edit(slot.id, "Resized", result);
    }

    fn remove_selected(&mut self) {
        let Some(slot) = self.slots.selected_item().cloned() else {
            return;
        };
        match self.rt.block_on(self.editor.remove_slot(slot.id)) {
            Ok(removed) => self.set_status(
                StatusLevel::Info,
                format!(
                    "Removed slot {} ({} {})",
                    removed.id,
                    day_label(removed.day),
                    removed.time_label()
                ),
            ),
            Err(e) => self.report_error("", e),
        }
        self.suggestion = None;
        self.refresh();
    }

    fn apply_suggestion(&mut self) {
        let Some(Suggestion { slot_id, cell }) = self.suggestion else {
            return;
        };
        let result = self
            .rt
            .block_on(self.editor.move_slot(slot_id, cell.day, cell.minute));
        self.finish_edit(slot_id, "Moved", result);
    }

    fn undo(&mut self) {
        if !self.editor.can_undo() {
            self.set_status(StatusLevel::Info, "Nothing to undo");
            return;
        }
        match self.rt.block_on(self.editor.undo()) {
            Ok(slots) => self.set_status(
                StatusLevel::Info,
                format!("Undone ({} slots)", slots.len()),
            ),
            Err(e) => self.report_error("Undo failed: ", e),
        }
        self.suggestion = None;
        self.refresh();
    }

    fn redo(&mut self) {
        if !self.editor.can_redo() {
            self.set_status(StatusLevel::Info, "Nothing to redo");
            return;
        }
        match self.rt.block_on(self.editor.redo()) {
            Ok(slots) => self.set_status(
                StatusLevel::Info,
                format!("Redone ({} slots)", slots.len()),
            ),
            Err(e) => self.report_error("Redo failed: ", e),
        }
        self.suggestion = None;
        self.refresh();
    }

    fn commit_plan(&mut self) {
        if self.plan.items.is_empty() {
            self.set_status(StatusLevel::Info, "Nothing planned this week");
            return;
        }
        let store = self.editor.store().clone();
        match self.rt.block_on(store.commit_plan(&self.plan.items)) {
            Ok(updates) => {
                let finished = updates.iter().filter(|(_, u)| u.newly_completed).count();
                self.set_status(
                    StatusLevel::Info,
                    format!(
                        "Committed {} entries, {} topics completed",
                        updates.len(),
                        finished
                    ),
                );
            }
            Err(e) => self.report_error("", e),
        }
        self.refresh();
    }

    fn complete_selected_review(&mut self) {
        let Some(topic_id) = self.due.selected_item().map(|p| p.topic_id) else {
            return;
        };
        let store = self.editor.store().clone();
        match self.rt.block_on(store.complete_review(topic_id, self.today)) {
            Ok(Some(next)) => self.set_status(
                StatusLevel::Info,
                format!("Reviewed {}; next on {}", self.topic_name(topic_id), next),
            ),
            Ok(None) => self.set_status(StatusLevel::Warn, "Topic is not completed yet"),
            Err(e) => self.report_error("", e),
        }
        self.refresh();
    }

    fn reload(&mut self) {
        let store = self.editor.store().clone();
        match self.rt.block_on(store.refresh_all()) {
            Ok(()) => self.set_status(StatusLevel::Info, "Reloaded"),
            Err(e) => self.report_error("", e),
        }
        self.refresh();
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        let step = i64::from(self.editor.grid().step);

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            // Redo: Ctrl+r or U (vim)
            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => self.redo(),
            KeyCode::Char('U') => self.redo(),
            KeyCode::Char('u') => self.undo(),
            KeyCode::Char('r') => self.reload(),

            KeyCode::Esc => {
                self.status = None;
                self.suggestion = None;
            }

            // Views: Tab / h / l
            KeyCode::Tab => {
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.view = self.view.prev();
                } else {
                    self.view = self.view.next();
                }
            }
            KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => self.view = self.view.prev(),
            KeyCode::Char('l') | KeyCode::Right => self.view = self.view.next(),

            KeyCode::Char('j') | KeyCode::Down => match self.view {
                View::Week => self.slots.next(),
                View::Plan => self.plan.next(),
                View::Reviews => self.due.next(),
                View::History => {}
            },
            KeyCode::Char('k') | KeyCode::Up => match self.view {
                View::Week => self.slots.previous(),
                View::Plan => self.plan.previous(),
                View::Reviews => self.due.previous(),
                View::History => {}
            },
            KeyCode::Char('g') => match self.view {
                View::Week => self.slots.first(),
                View::Plan => self.plan.first(),
                View::Reviews => self.due.first(),
                View::History => {}
            },
            KeyCode::Char('G') => match self.view {
                View::Week => self.slots.last(),
                View::Plan => self.plan.last(),
                View::Reviews => self.due.last(),
                View::History => {}
            },

            // Slot editing, Week view only
            KeyCode::Char('H') if self.view == View::Week => self.move_selected(-1, 0),
            KeyCode::Char('L') if self.view == View::Week => self.move_selected(1, 0),
            KeyCode::Char('J') if self.view == View::Week => self.move_selected(0, step),
            KeyCode::Char('K') if self.view == View::Week => self.move_selected(0, -step),
            KeyCode::Char('+') if self.view == View::Week => self.resize_selected(step),
            KeyCode::Char('-') if self.view == View::Week => self.resize_selected(-step),
            KeyCode::Char('x') if self.view == View::Week => self.remove_selected(),
            KeyCode::Char('y') if self.view == View::Week => self.apply_suggestion(),

            KeyCode::Char('c') if self.view == View::Plan => self.commit_plan(),
            KeyCode::Enter if self.view == View::Reviews => self.complete_selected_review(),

            _ => {}
        }
    }
}

pub fn run(
    rt: &Runtime,
    editor: ScheduleEditor,
    horizon_days: i64,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Background refreshes spawn onto this runtime
    let _guard = rt.enter();

    // Create app state before touching the terminal so load errors print normally
    let mut app = App::new(rt, editor, horizon_days)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<'_>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut dirty = true;
    loop {
        if dirty {
            terminal.draw(|f| ui::draw(f, app))?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => {
                    app.handle_key(key.code, key.modifiers);
                    dirty = true;
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }

        if app.poll_changes() {
            dirty = true;
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
