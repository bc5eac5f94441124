use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::collections::HashSet;
use std::path::Path;

use crate::models::{EnergyLevel, SlotPatch, Subject, Topic, TopicProgress, WeeklySlot};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS subjects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT
            );

            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY,
                subject_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                avg_minutes INTEGER NOT NULL CHECK(avg_minutes > 0),
                sort_order INTEGER,
                difficulty_score INTEGER NOT NULL DEFAULT 0,
                priority INTEGER NOT NULL DEFAULT 0,
                deadline TEXT,
                prerequisites TEXT NOT NULL DEFAULT '[]',
                energy_level TEXT CHECK(energy_level IN ('high', 'medium', 'low')),
                FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE CASCADE
            );

            -- Slots block subject removal: no cascade
            CREATE TABLE IF NOT EXISTS slots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                day INTEGER NOT NULL CHECK(day BETWEEN 1 AND 7),
                start_minute INTEGER NOT NULL,
                end_minute INTEGER NOT NULL,
                subject_id INTEGER NOT NULL,
                FOREIGN KEY (subject_id) REFERENCES subjects(id)
            );

            CREATE TABLE IF NOT EXISTS progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                topic_id INTEGER NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                remaining INTEGER NOT NULL,
                completed_flag INTEGER NOT NULL DEFAULT 0,
                last_studied TEXT,
                review_count INTEGER NOT NULL DEFAULT 0,
                next_review_date TEXT,
                UNIQUE (learner_id, topic_id),
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_topics_subject ON topics(subject_id);
            CREATE INDEX IF NOT EXISTS idx_slots_learner ON slots(learner_id, day, start_minute);
            CREATE INDEX IF NOT EXISTS idx_progress_next_review ON progress(learner_id, next_review_date);
            "#,
        )?;

        Ok(())
    }

    // Subject operations
    pub fn list_subjects(&self) -> Result<Vec<Subject>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, category FROM subjects ORDER BY id")?;

        let rows = stmt.query_map([], |row| {
            Ok(Subject {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    /// Upserts every subject in `subjects` and deletes the rest. A subject
    /// still referenced by a slot cannot be deleted, which rejects the whole
    /// replacement.
    pub fn replace_subjects(&self, subjects: &[Subject]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for s in subjects {
            tx.execute(
                r#"
                INSERT INTO subjects (id, name, category) VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET name = excluded.name, category = excluded.category
                "#,
                params![s.id, s.name, s.category],
            )?;
        }

        let keep: HashSet<i64> = subjects.iter().map(|s| s.id).collect();
        for id in existing_ids(&tx, "SELECT id FROM subjects", [])? {
            if !keep.contains(&id) {
                tx.execute("DELETE FROM subjects WHERE id = ?1", params![id])?;
            }
        }
        tx.commit()
    }

    // Topic operations
    pub fn list_topics(&self) -> Result<Vec<Topic>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, subject_id, name, avg_minutes, sort_order, difficulty_score,
                   priority, deadline, prerequisites, energy_level
            FROM topics
            ORDER BY subject_id, COALESCE(sort_order, 2147483647), name, id
            "#,
        )?;

        let rows = stmt.query_map([], topic_from_row)?;
        rows.collect()
    }

    pub fn replace_topics(&self, topics: &[Topic]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for t in topics {
            let prerequisites = serde_json::to_string(&t.prerequisites)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            tx.execute(
                r#"
                INSERT INTO topics (id, subject_id, name, avg_minutes, sort_order,
                                    difficulty_score, priority, deadline, prerequisites, energy_level)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    subject_id = excluded.subject_id,
                    name = excluded.name,
                    avg_minutes = excluded.avg_minutes,
                    sort_order = excluded.sort_order,
                    difficulty_score = excluded.difficulty_score,
                    priority = excluded.priority,
                    deadline = excluded.deadline,
                    prerequisites = excluded.prerequisites,
                    energy_level = excluded.energy_level
                "#,
                params![
                    t.id,
                    t.subject_id,
                    t.name,
                    t.avg_minutes,
                    t.order,
                    t.difficulty_score,
                    t.priority,
                    t.deadline.map(date_to_sql),
                    prerequisites,
                    t.energy_level.map(|e| e.as_str()),
                ],
            )?;
        }

        let keep: HashSet<i64> = topics.iter().map(|t| t.id).collect();
        for id in existing_ids(&tx, "SELECT id FROM topics", [])? {
            if !keep.contains(&id) {
                tx.execute("DELETE FROM topics WHERE id = ?1", params![id])?;
            }
        }
        tx.commit()
    }

    // Slot operations
    pub fn list_slots(&self, learner_id: i64) -> Result<Vec<WeeklySlot>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, learner_id, day, start_minute, end_minute, subject_id
            FROM slots
            WHERE learner_id = ?1
            ORDER BY day, start_minute, id
            "#,
        )?;

        let rows = stmt.query_map(params![learner_id], slot_from_row)?;
        rows.collect()
    }

    pub fn get_slot(&self, id: i64) -> Result<Option<WeeklySlot>> {
        self.conn
            .query_row(
                r#"
                SELECT id, learner_id, day, start_minute, end_minute, subject_id
                FROM slots WHERE id = ?1
                "#,
                params![id],
                slot_from_row,
            )
            .optional()
    }

    /// Inserts a slot. A non-zero `slot.id` is kept, zero lets SQLite
    /// allocate one. Returns the stored slot.
    pub fn create_slot(&self, slot: &WeeklySlot) -> Result<WeeklySlot> {
        self.conn.execute(
            r#"
            INSERT INTO slots (id, learner_id, day, start_minute, end_minute, subject_id)
            VALUES (NULLIF(?1, 0), ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                slot.id,
                slot.learner_id,
                slot.day,
                slot.start,
                slot.end,
                slot.subject_id
            ],
        )?;

        Ok(WeeklySlot {
            id: self.conn.last_insert_rowid(),
            ..slot.clone()
        })
    }

    pub fn update_slot(&self, id: i64, patch: &SlotPatch) -> Result<Option<WeeklySlot>> {
        let tx = self.conn.unchecked_transaction()?;
        let Some(mut slot) = tx
            .query_row(
                r#"
                SELECT id, learner_id, day, start_minute, end_minute, subject_id
                FROM slots WHERE id = ?1
                "#,
                params![id],
                slot_from_row,
            )
            .optional()?
        else {
            return Ok(None);
        };

        patch.apply(&mut slot);
        tx.execute(
            r#"
            UPDATE slots
            SET day = ?1, start_minute = ?2, end_minute = ?3, subject_id = ?4
            WHERE id = ?5
            "#,
            params![slot.day, slot.start, slot.end, slot.subject_id, id],
        )?;
        tx.commit()?;

        Ok(Some(slot))
    }

    pub fn delete_slot(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM slots WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Swaps the learner's whole slot grid for `slots` in one transaction.
    pub fn replace_slots(&self, learner_id: i64, slots: &[WeeklySlot]) -> Result<Vec<WeeklySlot>> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM slots WHERE learner_id = ?1", params![learner_id])?;

        let mut stored = Vec::with_capacity(slots.len());
        for slot in slots {
            tx.execute(
                r#"
                INSERT INTO slots (id, learner_id, day, start_minute, end_minute, subject_id)
                VALUES (NULLIF(?1, 0), ?2, ?3, ?4, ?5, ?6)
                "#,
                params![slot.id, learner_id, slot.day, slot.start, slot.end, slot.subject_id],
            )?;
            stored.push(WeeklySlot {
                id: tx.last_insert_rowid(),
                learner_id,
                ..slot.clone()
            });
        }
        tx.commit()?;

        Ok(stored)
    }

    // Progress operations
    pub fn list_progress(&self, learner_id: i64) -> Result<Vec<TopicProgress>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT learner_id, topic_id, completed, remaining, completed_flag,
                   last_studied, review_count, next_review_date
            FROM progress
            WHERE learner_id = ?1
            ORDER BY topic_id
            "#,
        )?;

        let rows = stmt.query_map(params![learner_id], progress_from_row)?;
        rows.collect()
    }

    /// Upserts the learner's rows and drops the learner's rows that are not
    /// in `progress`.
    pub fn replace_progress(&self, learner_id: i64, progress: &[TopicProgress]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for p in progress {
            tx.execute(
                r#"
                INSERT INTO progress (learner_id, topic_id, completed, remaining, completed_flag,
                                      last_studied, review_count, next_review_date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(learner_id, topic_id) DO UPDATE SET
                    completed = excluded.completed,
                    remaining = excluded.remaining,
                    completed_flag = excluded.completed_flag,
                    last_studied = excluded.last_studied,
                    review_count = excluded.review_count,
                    next_review_date = excluded.next_review_date
                "#,
                params![
                    learner_id,
                    p.topic_id,
                    p.completed,
                    p.remaining,
                    p.completed_flag,
                    p.last_studied.map(date_to_sql),
                    p.review_count,
                    p.next_review_date.map(date_to_sql),
                ],
            )?;
        }

        let keep: HashSet<i64> = progress.iter().map(|p| p.topic_id).collect();
        for topic_id in existing_ids(
            &tx,
            "SELECT topic_id FROM progress WHERE learner_id = ?1",
            params![learner_id],
        )? {
            if !keep.contains(&topic_id) {
                tx.execute(
                    "DELETE FROM progress WHERE learner_id = ?1 AND topic_id = ?2",
                    params![learner_id, topic_id],
                )?;
            }
        }
        tx.commit()
    }

    pub fn get_stats(&self, learner_id: i64) -> Result<Stats> {
        let subjects: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM subjects", [], |row| row.get(0))?;

        let topics: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM topics", [], |row| row.get(0))?;

        let weekly_minutes: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(end_minute - start_minute), 0) FROM slots WHERE learner_id = ?1",
            params![learner_id],
            |row| row.get(0),
        )?;

        let completed: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM progress WHERE learner_id = ?1 AND completed_flag = 1",
            params![learner_id],
            |row| row.get(0),
        )?;

        Ok(Stats {
            subjects,
            topics,
            weekly_minutes,
            completed,
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub subjects: i64,
    pub topics: i64,
    pub weekly_minutes: i64,
    pub completed: i64,
}

fn existing_ids<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| row.get(0))?;
    rows.collect()
}

fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn date_from_sql(row: &Row<'_>, idx: usize) -> Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn topic_from_row(row: &Row<'_>) -> Result<Topic> {
    let prerequisites: String = row.get(8)?;
    let prerequisites: Vec<i64> = serde_json::from_str(&prerequisites)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
    let energy_level: Option<String> = row.get(9)?;

    Ok(Topic {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        name: row.get(2)?,
        avg_minutes: row.get(3)?,
        order: row.get(4)?,
        difficulty_score: row.get(5)?,
        priority: row.get(6)?,
        deadline: date_from_sql(row, 7)?,
        prerequisites,
        energy_level: energy_level.as_deref().and_then(EnergyLevel::from_str),
    })
}

fn slot_from_row(row: &Row<'_>) -> Result<WeeklySlot> {
    Ok(WeeklySlot {
        id: row.get(0)?,
        learner_id: row.get(1)?,
        day: row.get(2)?,
        start: row.get(3)?,
        end: row.get(4)?,
        subject_id: row.get(5)?,
    })
}

fn progress_from_row(row: &Row<'_>) -> Result<TopicProgress> {
    Ok(TopicProgress {
        learner_id: row.get(0)?,
        topic_id: row.get(1)?,
        completed: row.get(2)?,
        remaining: row.get(3)?,
        completed_flag: row.get(4)?,
        last_studied: date_from_sql(row, 5)?,
        review_count: row.get(6)?,
        next_review_date: date_from_sql(row, 7)?,
    })
}
