//! Read/write contract of the persistence collaborator.
//!
//! The store only talks to a [`Backend`]; [`SqliteBackend`] is the production
//! implementation over the local database.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::db::{Database, Stats};
use crate::error::{Error, Result};
use crate::models::{SlotPatch, Subject, Topic, TopicProgress, WeeklySlot};

/// Every write is atomic: it is either fully applied or rejected.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_subjects(&self) -> Result<Vec<Subject>>;
    async fn list_topics(&self) -> Result<Vec<Topic>>;
    async fn list_slots(&self, learner_id: i64) -> Result<Vec<WeeklySlot>>;
    async fn list_progress(&self, learner_id: i64) -> Result<Vec<TopicProgress>>;

    async fn create_slot(&self, slot: WeeklySlot) -> Result<WeeklySlot>;
    async fn update_slot(&self, id: i64, patch: SlotPatch) -> Result<WeeklySlot>;
    async fn delete_slot(&self, id: i64) -> Result<()>;
    async fn replace_slots(
        &self,
        learner_id: i64,
        slots: Vec<WeeklySlot>,
    ) -> Result<Vec<WeeklySlot>>;
    async fn replace_subjects(&self, subjects: Vec<Subject>) -> Result<()>;
    async fn replace_topics(&self, topics: Vec<Topic>) -> Result<()>;
    async fn replace_progress(&self, learner_id: i64, progress: Vec<TopicProgress>) -> Result<()>;
}

pub struct SqliteBackend {
    db: Mutex<Database>,
}

impl SqliteBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::open(path)?;
        db.init()?;
        Ok(Self { db: Mutex::new(db) })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    pub fn stats(&self, learner_id: i64) -> Result<Stats> {
        Ok(self.conn().get_stats(learner_id)?)
    }

    fn conn(&self) -> MutexGuard<'_, Database> {
        // A panic mid-query leaves SQLite itself consistent
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn list_subjects(&self) -> Result<Vec<Subject>> {
        Ok(self.conn().list_subjects()?)
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        Ok(self.conn().list_topics()?)
    }

    async fn list_slots(&self, learner_id: i64) -> Result<Vec<WeeklySlot>> {
        Ok(self.conn().list_slots(learner_id)?)
    }

    async fn list_progress(&self, learner_id: i64) -> Result<Vec<TopicProgress>> {
        Ok(self.conn().list_progress(learner_id)?)
    }

    async fn create_slot(&self, slot: WeeklySlot) -> Result<WeeklySlot> {
        let created = self.conn().create_slot(&slot)?;
        log::debug!("sqlite: created slot {}", created.id);
        Ok(created)
    }

    async fn update_slot(&self, id: i64, patch: SlotPatch) -> Result<WeeklySlot> {
        self.conn()
            .update_slot(id, &patch)?
            .ok_or(Error::SlotNotFound(id))
    }

    async fn delete_slot(&self, id: i64) -> Result<()> {
        if self.conn().delete_slot(id)? {
            Ok(())
        } else {
            Err(Error::SlotNotFound(id))
        }
    }

    async fn replace_slots(
        &self,
        learner_id: i64,
        slots: Vec<WeeklySlot>,
    ) -> Result<Vec<WeeklySlot>> {
        let stored = self.conn().replace_slots(learner_id, &slots)?;
        log::debug!("sqlite: replaced slots for learner {} ({} rows)", learner_id, stored.len());
        Ok(stored)
    }

    async fn replace_subjects(&self, subjects: Vec<Subject>) -> Result<()> {
        Ok(self.conn().replace_subjects(&subjects)?)
    }

    async fn replace_topics(&self, topics: Vec<Topic>) -> Result<()> {
        Ok(self.conn().replace_topics(&topics)?)
    }

    async fn replace_progress(&self, learner_id: i64, progress: Vec<TopicProgress>) -> Result<()> {
        Ok(self.conn().replace_progress(learner_id, &progress)?)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn subject(id: i64) -> Subject {
        Subject {
            id,
            name: format!("Subject {}", id),
            category: None,
        }
    }

    fn slot(day: u8, start: u32, end: u32) -> WeeklySlot {
        WeeklySlot {
            id: 0,
            learner_id: 1,
            day,
            start,
            end,
            subject_id: 1,
        }
    }

    #[tokio::test]
    async fn missing_slot_maps_to_not_found() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert!(matches!(
            backend.update_slot(9, SlotPatch::default()).await,
            Err(Error::SlotNotFound(9))
        ));
        assert!(matches!(
            backend.delete_slot(9).await,
            Err(Error::SlotNotFound(9))
        ));
    }

    #[tokio::test]
    async fn slot_writes_round_trip() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.replace_subjects(vec![subject(1)]).await.unwrap();
        let created = backend.create_slot(slot(1, 600, 660)).await.unwrap();
        let moved = backend
            .update_slot(
                created.id,
                SlotPatch {
                    day: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.day, 2);
        assert_eq!(backend.list_slots(1).await.unwrap(), vec![moved]);
        assert_eq!(backend.stats(1).unwrap().weekly_minutes, 60);
    }

    #[tokio::test]
    async fn constraint_violation_is_a_database_error() {
        let backend = SqliteBackend::in_memory().unwrap();
        // No subject 1 yet
        let err = backend.create_slot(slot(1, 600, 660)).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn flaky_backend_rejects_writes_on_demand() {
        let backend = testing::FlakyBackend::new();
        backend.replace_subjects(vec![subject(1)]).await.unwrap();
        backend.set_failing(true);
        assert!(matches!(
            backend.create_slot(slot(1, 600, 660)).await,
            Err(Error::Rejected(_))
        ));
        backend.set_failing(false);
        assert!(backend.list_slots(1).await.unwrap().is_empty());
        assert_eq!(backend.reads(), 1);
    }
}
