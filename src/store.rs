//! Per-learner stale-while-revalidate cache over a [`Backend`].
//!
//! Each collection lives in its own [`Collection`] cell with a typed change
//! channel. Synchronous reads never block: they hand back whatever the cell
//! holds and kick off a background refresh when it is unpopulated or stale.
//! Writes go through [`optimistic`], which applies the edit locally, awaits
//! the backend and restores the previous contents if the backend refuses.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::models::{PlannedEntry, SlotPatch, Subject, Topic, TopicProgress, WeeklySlot};
use crate::planner::{self, PlanInput};
use crate::progress::{self, ProgressUpdate};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Unpopulated,
    Stale,
    Fresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Subjects,
    Topics,
    Slots,
    Progress,
}

impl CollectionKind {
    pub fn event_name(&self) -> &'static str {
        match self {
            CollectionKind::Subjects => "subjects-changed",
            CollectionKind::Topics => "topics-changed",
            CollectionKind::Slots => "slots-changed",
            CollectionKind::Progress => "progress-changed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: CollectionKind,
    pub version: u64,
}

struct Cell<T> {
    items: Vec<T>,
    freshness: Freshness,
    // Bumped on every mutation, lets a refresh detect it was overtaken
    version: u64,
    refreshing: bool,
}

pub struct Collection<T> {
    kind: CollectionKind,
    cell: Mutex<Cell<T>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl<T: Clone> Collection<T> {
    pub fn new(kind: CollectionKind) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            kind,
            cell: Mutex::new(Cell {
                items: Vec::new(),
                freshness: Freshness::Unpopulated,
                version: 0,
                refreshing: false,
            }),
            events,
        }
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn freshness(&self) -> Freshness {
        self.lock().freshness
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Keeps the contents but marks them for revalidation on the next read.
    pub fn invalidate(&self) {
        let mut cell = self.lock();
        if cell.freshness == Freshness::Fresh {
            cell.freshness = Freshness::Stale;
        }
    }

    /// Claims the right to refresh. `None` when a refresh is already running.
    pub fn begin_refresh(&self) -> Option<u64> {
        let mut cell = self.lock();
        if cell.refreshing {
            return None;
        }
        cell.refreshing = true;
        Some(cell.version)
    }

    /// Installs fetched contents unless a local mutation happened since
    /// `started_at`. Returns whether the contents were installed.
    pub fn finish_refresh(&self, started_at: u64, fetched: Result<Vec<T>>) -> bool {
        let event = {
            let mut cell = self.lock();
            cell.refreshing = false;
            match fetched {
                Ok(items) if cell.version == started_at => {
                    cell.items = items;
                    cell.freshness = Freshness::Fresh;
                    cell.version += 1;
                    Some(cell.version)
                }
                Ok(_) => {
                    log::debug!(
                        "store: dropping {} refresh overtaken by a local write",
                        self.kind.event_name()
                    );
                    None
                }
                Err(e) => {
                    log::warn!("store: refresh for {} failed: {}", self.kind.event_name(), e);
                    None
                }
            }
        };

        match event {
            Some(version) => {
                self.notify(version);
                true
            }
            None => false,
        }
    }

    /// Applies `edit` in place and returns the contents from before it.
    pub fn apply(&self, edit: impl FnOnce(&mut Vec<T>)) -> Vec<T> {
        let (previous, version) = {
            let mut cell = self.lock();
            let previous = cell.items.clone();
            edit(&mut cell.items);
            cell.freshness = Freshness::Fresh;
            cell.version += 1;
            (previous, cell.version)
        };
        self.notify(version);
        previous
    }

    pub fn restore(&self, previous: Vec<T>) {
        self.apply(|items| *items = previous);
    }

    fn notify(&self, version: u64) {
        // No subscribers is fine
        let _ = self.events.send(ChangeEvent {
            kind: self.kind,
            version,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Cell<T>> {
        self.cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Apply locally, await the backend, then either reconcile the cache with
/// the backend's answer or roll it back.
pub async fn optimistic<T, R, Fut>(
    collection: &Collection<T>,
    edit: impl FnOnce(&mut Vec<T>),
    remote: Fut,
    settle: impl FnOnce(&mut Vec<T>, &R),
) -> Result<R>
where
    T: Clone,
    Fut: Future<Output = Result<R>>,
{
    let previous = collection.apply(edit);
    match remote.await {
        Ok(value) => {
            collection.apply(|items| settle(items, &value));
            Ok(value)
        }
        Err(e) => {
            log::warn!(
                "store: {} write failed, rolling back: {}",
                collection.kind().event_name(),
                e
            );
            collection.restore(previous);
            Err(e)
        }
    }
}

fn revalidate<T, Fut>(collection: &Arc<Collection<T>>, fetch: impl FnOnce() -> Fut)
where
    T: Clone + Send + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    let Ok(handle) = Handle::try_current() else {
        log::debug!(
            "store: no runtime, skipping revalidation of {}",
            collection.kind().event_name()
        );
        return;
    };
    let Some(started_at) = collection.begin_refresh() else {
        return;
    };

    let collection = Arc::clone(collection);
    let fetch = fetch();
    handle.spawn(async move {
        let fetched = fetch.await;
        collection.finish_refresh(started_at, fetched);
    });
}

async fn load<T, Fut>(collection: &Collection<T>, fetch: Fut) -> Result<Vec<T>>
where
    T: Clone,
    Fut: Future<Output = Result<Vec<T>>>,
{
    if collection.freshness() == Freshness::Fresh {
        return Ok(collection.snapshot());
    }
    let started_at = collection.lock().version;
    let items = fetch.await?;
    // A local write during the fetch wins; it is already what the backend holds
    collection.finish_refresh(started_at, Ok(items));
    Ok(collection.snapshot())
}

pub struct Store {
    backend: Arc<dyn Backend>,
    learner_id: i64,
    subjects: Arc<Collection<Subject>>,
    topics: Arc<Collection<Topic>>,
    slots: Arc<Collection<WeeklySlot>>,
    progress: Arc<Collection<TopicProgress>>,
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>, learner_id: i64) -> Self {
        Self {
            backend,
            learner_id,
            subjects: Arc::new(Collection::new(CollectionKind::Subjects)),
            topics: Arc::new(Collection::new(CollectionKind::Topics)),
            slots: Arc::new(Collection::new(CollectionKind::Slots)),
            progress: Arc::new(Collection::new(CollectionKind::Progress)),
        }
    }

    pub fn learner_id(&self) -> i64 {
        self.learner_id
    }

    pub fn subscribe(&self, kind: CollectionKind) -> broadcast::Receiver<ChangeEvent> {
        match kind {
            CollectionKind::Subjects => self.subjects.subscribe(),
            CollectionKind::Topics => self.topics.subscribe(),
            CollectionKind::Slots => self.slots.subscribe(),
            CollectionKind::Progress => self.progress.subscribe(),
        }
    }

    pub fn freshness(&self, kind: CollectionKind) -> Freshness {
        match kind {
            CollectionKind::Subjects => self.subjects.freshness(),
            CollectionKind::Topics => self.topics.freshness(),
            CollectionKind::Slots => self.slots.freshness(),
            CollectionKind::Progress => self.progress.freshness(),
        }
    }

    pub fn invalidate(&self, kind: CollectionKind) {
        match kind {
            CollectionKind::Subjects => self.subjects.invalidate(),
            CollectionKind::Topics => self.topics.invalidate(),
            CollectionKind::Slots => self.slots.invalidate(),
            CollectionKind::Progress => self.progress.invalidate(),
        }
    }

    pub fn invalidate_all(&self) {
        for kind in [
            CollectionKind::Subjects,
            CollectionKind::Topics,
            CollectionKind::Slots,
            CollectionKind::Progress,
        ] {
            self.invalidate(kind);
        }
    }

    // Non-blocking reads

    pub fn subjects(&self) -> Vec<Subject> {
        if self.subjects.freshness() != Freshness::Fresh {
            let backend = Arc::clone(&self.backend);
            revalidate(&self.subjects, move || async move { backend.list_subjects().await });
        }
        self.subjects.snapshot()
    }

    pub fn topics(&self) -> Vec<Topic> {
        if self.topics.freshness() != Freshness::Fresh {
            let backend = Arc::clone(&self.backend);
            revalidate(&self.topics, move || async move { backend.list_topics().await });
        }
        self.topics.snapshot()
    }

    pub fn slots(&self) -> Vec<WeeklySlot> {
        if self.slots.freshness() != Freshness::Fresh {
            let backend = Arc::clone(&self.backend);
            let learner_id = self.learner_id;
            revalidate(&self.slots, move || async move {
                backend.list_slots(learner_id).await
            });
        }
        self.slots.snapshot()
    }

    pub fn progress(&self) -> Vec<TopicProgress> {
        if self.progress.freshness() != Freshness::Fresh {
            let backend = Arc::clone(&self.backend);
            let learner_id = self.learner_id;
            revalidate(&self.progress, move || async move {
                backend.list_progress(learner_id).await
            });
        }
        self.progress.snapshot()
    }

    // Awaited reads, fetching only when the cell is not fresh

    pub async fn load_subjects(&self) -> Result<Vec<Subject>> {
        load(&self.subjects, self.backend.list_subjects()).await
    }

    pub async fn load_topics(&self) -> Result<Vec<Topic>> {
        load(&self.topics, self.backend.list_topics()).await
    }

    pub async fn load_slots(&self) -> Result<Vec<WeeklySlot>> {
        load(&self.slots, self.backend.list_slots(self.learner_id)).await
    }

    pub async fn load_progress(&self) -> Result<Vec<TopicProgress>> {
        load(&self.progress, self.backend.list_progress(self.learner_id)).await
    }

    pub async fn refresh_all(&self) -> Result<()> {
        self.invalidate_all();
        self.load_subjects().await?;
        self.load_topics().await?;
        self.load_slots().await?;
        self.load_progress().await?;
        Ok(())
    }

    // Catalog writes

    pub async fn save_subjects(&self, subjects: Vec<Subject>) -> Result<()> {
        self.load_subjects().await?;
        let local = subjects.clone();
        optimistic(
            &self.subjects,
            |items| *items = local,
            self.backend.replace_subjects(subjects),
            |_, _| {},
        )
        .await?;
        // Subject removal cascades to topics in the backend
        self.topics.invalidate();
        Ok(())
    }

    pub async fn save_topics(&self, topics: Vec<Topic>) -> Result<()> {
        self.load_topics().await?;
        let local = topics.clone();
        optimistic(
            &self.topics,
            |items| *items = local,
            self.backend.replace_topics(topics),
            |_, _| {},
        )
        .await?;
        self.progress.invalidate();
        self.rebase_progress().await
    }

    // Slot writes

    pub async fn create_slot(&self, slot: WeeklySlot) -> Result<WeeklySlot> {
        self.load_slots().await?;
        let slot = WeeklySlot {
            learner_id: self.learner_id,
            ..slot
        };
        // Placeholder until the backend assigns the real id
        let placeholder_id = if slot.id == 0 { -1 } else { slot.id };
        let local = WeeklySlot {
            id: placeholder_id,
            ..slot.clone()
        };

        optimistic(
            &self.slots,
            |items| items.push(local),
            self.backend.create_slot(slot),
            |items, created| {
                if let Some(s) = items.iter_mut().find(|s| s.id == placeholder_id) {
                    *s = created.clone();
                }
            },
        )
        .await
    }

    pub async fn update_slot(&self, id: i64, patch: SlotPatch) -> Result<WeeklySlot> {
        let slots = self.load_slots().await?;
        if !slots.iter().any(|s| s.id == id) {
            return Err(Error::SlotNotFound(id));
        }
        let local = patch.clone();

        optimistic(
            &self.slots,
            |items| {
                if let Some(s) = items.iter_mut().find(|s| s.id == id) {
                    local.apply(s);
                }
            },
            self.backend.update_slot(id, patch),
            |items, updated| {
                if let Some(s) = items.iter_mut().find(|s| s.id == id) {
                    *s = updated.clone();
                }
            },
        )
        .await
    }

    pub async fn delete_slot(&self, id: i64) -> Result<()> {
        let slots = self.load_slots().await?;
        if !slots.iter().any(|s| s.id == id) {
            return Err(Error::SlotNotFound(id));
        }

        optimistic(
            &self.slots,
            |items| items.retain(|s| s.id != id),
            self.backend.delete_slot(id),
            |_, _| {},
        )
        .await
    }

    /// Swaps the learner's whole grid, used to commit history snapshots.
    pub async fn replace_slots(&self, slots: Vec<WeeklySlot>) -> Result<Vec<WeeklySlot>> {
        self.load_slots().await?;
        let local = slots.clone();

        optimistic(
            &self.slots,
            |items| *items = local,
            self.backend.replace_slots(self.learner_id, slots),
            |items, stored| *items = stored.clone(),
        )
        .await
    }

    // Progress tracker

    async fn save_progress(&self, progress: Vec<TopicProgress>) -> Result<()> {
        let local = progress.clone();
        optimistic(
            &self.progress,
            |items| *items = local,
            self.backend.replace_progress(self.learner_id, progress),
            |_, _| {},
        )
        .await
    }

    // Keeps completed + remaining equal to each topic's current effort
    async fn rebase_progress(&self) -> Result<()> {
        let topics = self.load_topics().await?;
        let mut rows = self.load_progress().await?;
        let mut changed = 0;
        for row in rows.iter_mut() {
            if let Some(topic) = topics.iter().find(|t| t.id == row.topic_id) {
                if progress::rebase_effort(row, topic) {
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            log::info!("store: re-based {} progress rows on edited effort", changed);
            self.save_progress(rows).await?;
        }
        Ok(())
    }

    /// Seeds a progress row for every topic the learner has none for.
    pub async fn ensure_progress(&self) -> Result<usize> {
        let topics = self.load_topics().await?;
        let mut rows = self.load_progress().await?;
        let created = progress::ensure_progress(self.learner_id, &topics, &mut rows);
        if created > 0 {
            log::info!(
                "store: seeded {} progress rows for learner {}",
                created,
                self.learner_id
            );
            self.save_progress(rows).await?;
        }
        Ok(created)
    }

    async fn edit_progress<R>(
        &self,
        topic_id: i64,
        edit: impl FnOnce(&mut TopicProgress, &Topic) -> R,
    ) -> Result<R> {
        let topics = self.load_topics().await?;
        let topic = topics
            .iter()
            .find(|t| t.id == topic_id)
            .ok_or(Error::TopicNotFound(topic_id))?;

        let mut rows = self.load_progress().await?;
        if !rows.iter().any(|p| p.topic_id == topic_id) {
            rows.push(TopicProgress::fresh(self.learner_id, topic));
        }
        let entry =
            progress::find_mut(&mut rows, topic_id).ok_or(Error::TopicNotFound(topic_id))?;
        let result = edit(entry, topic);

        self.save_progress(rows).await?;
        Ok(result)
    }

    pub async fn update_progress(
        &self,
        topic_id: i64,
        minutes: u32,
        today: NaiveDate,
    ) -> Result<ProgressUpdate> {
        let update = self
            .edit_progress(topic_id, |entry, topic| {
                progress::update_progress(entry, topic, minutes, today)
            })
            .await?;
        if update.newly_completed {
            log::info!(
                "store: topic {} completed, first review on {:?}",
                topic_id,
                update.next_review_date
            );
        }
        Ok(update)
    }

    pub async fn reset_progress(&self, topic_id: i64) -> Result<()> {
        self.edit_progress(topic_id, progress::reset_progress).await
    }

    pub async fn complete_review(
        &self,
        topic_id: i64,
        today: NaiveDate,
    ) -> Result<Option<NaiveDate>> {
        self.edit_progress(topic_id, |entry, _| progress::complete_review(entry, today))
            .await
    }

    pub async fn due_for_review(&self, today: NaiveDate) -> Result<Vec<TopicProgress>> {
        let rows = self.load_progress().await?;
        Ok(progress::due_for_review(&rows, today)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn upcoming_reviews(
        &self,
        today: NaiveDate,
        horizon_days: i64,
    ) -> Result<Vec<TopicProgress>> {
        let rows = self.load_progress().await?;
        Ok(progress::upcoming_reviews(&rows, today, horizon_days)
            .into_iter()
            .cloned()
            .collect())
    }

    // Planning

    pub async fn plan_week(&self, week_start: NaiveDate) -> Result<Vec<PlannedEntry>> {
        let (slots, topics, rows) = self.plan_snapshot().await?;
        Ok(planner::plan_week(&PlanInput {
            week_start,
            slots: &slots,
            topics: &topics,
            progress: &rows,
        }))
    }

    pub async fn plan_week_smart(&self, week_start: NaiveDate) -> Result<Vec<PlannedEntry>> {
        let (slots, topics, rows) = self.plan_snapshot().await?;
        Ok(planner::plan_week_smart(&PlanInput {
            week_start,
            slots: &slots,
            topics: &topics,
            progress: &rows,
        }))
    }

    async fn plan_snapshot(&self) -> Result<(Vec<WeeklySlot>, Vec<Topic>, Vec<TopicProgress>)> {
        Ok((
            self.load_slots().await?,
            self.load_topics().await?,
            self.load_progress().await?,
        ))
    }

    /// Records every planned chunk as studied on its own date, in one write.
    pub async fn commit_plan(
        &self,
        entries: &[PlannedEntry],
    ) -> Result<Vec<(i64, ProgressUpdate)>> {
        let topics = self.load_topics().await?;
        let mut rows = self.load_progress().await?;
        let mut updates = Vec::with_capacity(entries.len());

        for entry in entries {
            let topic = topics
                .iter()
                .find(|t| t.id == entry.topic_id)
                .ok_or(Error::TopicNotFound(entry.topic_id))?;
            if !rows.iter().any(|p| p.topic_id == topic.id) {
                rows.push(TopicProgress::fresh(self.learner_id, topic));
            }
            if let Some(row) = progress::find_mut(&mut rows, topic.id) {
                let update = progress::update_progress(row, topic, entry.minutes, entry.date);
                updates.push((topic.id, update));
            }
        }

        if !updates.is_empty() {
            self.save_progress(rows).await?;
            log::info!("store: committed {} planned entries", updates.len());
        }
        Ok(updates)
    }
}
