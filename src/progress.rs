//! Effort bookkeeping and the fixed spaced-repetition curve.
//!
//! These functions operate on one learner's progress rows in memory; the
//! store wraps them with persistence. `today` is always passed in so the
//! review dates are reproducible.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::{Topic, TopicProgress};

/// Longest review look-ahead accepted from the command line or config
pub const MAX_HORIZON_DAYS: i64 = 3650;

// Days until the next review, indexed by review count before the increment
pub fn review_interval_days(review_count: u32) -> i64 {
    match review_count {
        0 => 1,
        1 => 3,
        2 => 7,
        3 => 14,
        4 => 30,
        _ => 60,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub remaining: u32,
    /// True only on the call that flipped the topic to completed
    pub newly_completed: bool,
    pub next_review_date: Option<NaiveDate>,
}

/// Seeds a progress row for every topic that lacks one. Returns how many
/// rows were created.
pub fn ensure_progress(
    learner_id: i64,
    topics: &[Topic],
    progress: &mut Vec<TopicProgress>,
) -> usize {
    let mut created = 0;
    for topic in topics {
        if !progress.iter().any(|p| p.topic_id == topic.id) {
            progress.push(TopicProgress::fresh(learner_id, topic));
            created += 1;
        }
    }
    created
}

pub fn find_mut(progress: &mut [TopicProgress], topic_id: i64) -> Option<&mut TopicProgress> {
    progress.iter_mut().find(|p| p.topic_id == topic_id)
}

/// Records `minutes` of study against a topic.
///
/// `completed` is capped at the topic's effort so `completed + remaining`
/// always equals `avg_minutes`. The completed flag is sticky; only the
/// transition schedules a review.
pub fn update_progress(
    entry: &mut TopicProgress,
    topic: &Topic,
    minutes: u32,
    today: NaiveDate,
) -> ProgressUpdate {
    entry.completed = entry.completed.saturating_add(minutes).min(topic.avg_minutes);
    entry.remaining = topic.avg_minutes - entry.completed;
    entry.last_studied = Some(today);

    let newly_completed = entry.remaining == 0 && !entry.completed_flag;
    if newly_completed {
        entry.completed_flag = true;
        schedule_next_review(entry, today);
    }

    ProgressUpdate {
        remaining: entry.remaining,
        newly_completed,
        next_review_date: entry.next_review_date,
    }
}

/// Marks a review of already-completed material as done and pushes the next
/// review further out. Returns `None` for topics that are not completed yet.
pub fn complete_review(entry: &mut TopicProgress, today: NaiveDate) -> Option<NaiveDate> {
    if !entry.completed_flag {
        return None;
    }
    entry.last_studied = Some(today);
    schedule_next_review(entry, today);
    entry.next_review_date
}

fn schedule_next_review(entry: &mut TopicProgress, today: NaiveDate) {
    let days = review_interval_days(entry.review_count);
    entry.review_count += 1;
    entry.next_review_date = Some(today + Duration::days(days));
}

/// Re-bases a row on the topic's current effort after `avg_minutes` was
/// edited. Returns true when the row changed.
pub fn rebase_effort(entry: &mut TopicProgress, topic: &Topic) -> bool {
    let completed = entry.completed.min(topic.avg_minutes);
    let remaining = topic.avg_minutes - completed;
    let completed_flag = entry.completed_flag || remaining == 0;
    if (completed, remaining, completed_flag)
        == (entry.completed, entry.remaining, entry.completed_flag)
    {
        return false;
    }
    entry.completed = completed;
    entry.remaining = remaining;
    entry.completed_flag = completed_flag;
    true
}

pub fn reset_progress(entry: &mut TopicProgress, topic: &Topic) {
    entry.completed = 0;
    entry.remaining = topic.avg_minutes;
    entry.completed_flag = false;
    entry.review_count = 0;
    entry.next_review_date = None;
}

/// Completed topics whose review date has arrived, oldest first.
pub fn due_for_review(progress: &[TopicProgress], today: NaiveDate) -> Vec<&TopicProgress> {
    let mut due: Vec<&TopicProgress> = progress
        .iter()
        .filter(|p| p.completed_flag)
        .filter(|p| p.next_review_date.is_some_and(|d| d <= today))
        .collect();
    due.sort_by_key(|p| (p.next_review_date, p.topic_id));
    due
}

/// Completed topics due strictly after today and within `horizon_days`.
pub fn upcoming_reviews(
    progress: &[TopicProgress],
    today: NaiveDate,
    horizon_days: i64,
) -> Vec<&TopicProgress> {
    let horizon = Duration::try_days(horizon_days)
        .and_then(|d| today.checked_add_signed(d))
        .unwrap_or(if horizon_days < 0 { NaiveDate::MIN } else { NaiveDate::MAX });
    let mut upcoming: Vec<&TopicProgress> = progress
        .iter()
        .filter(|p| p.completed_flag)
        .filter(|p| p.next_review_date.is_some_and(|d| d > today && d <= horizon))
        .collect();
    upcoming.sort_by_key(|p| (p.next_review_date, p.topic_id));
    upcoming
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_topic(id: i64, avg_minutes: u32) -> Topic {
        Topic {
            id,
            subject_id: 1,
            name: format!("Topic {}", id),
            avg_minutes,
            order: None,
            difficulty_score: 5,
            priority: 5,
            deadline: None,
            prerequisites: vec![],
            energy_level: None,
        }
    }

    mod interval_tests {
        use super::*;

        #[test]
        fn fixed_schedule() {
            assert_eq!(review_interval_days(0), 1);
            assert_eq!(review_interval_days(1), 3);
            assert_eq!(review_interval_days(2), 7);
            assert_eq!(review_interval_days(3), 14);
            assert_eq!(review_interval_days(4), 30);
            assert_eq!(review_interval_days(5), 60);
            assert_eq!(review_interval_days(99), 60);
        }
    }

    mod ensure_tests {
        use super::*;

        #[test]
        fn seeds_missing_rows_only() {
            let topics = vec![make_topic(1, 60), make_topic(2, 90)];
            let mut progress = vec![TopicProgress {
                completed: 30,
                remaining: 30,
                ..TopicProgress::fresh(7, &topics[0])
            }];

            let created = ensure_progress(7, &topics, &mut progress);
            assert_eq!(created, 1);
            assert_eq!(progress.len(), 2);
            assert_eq!(progress[0].completed, 30);
            assert_eq!(progress[1].topic_id, 2);
            assert_eq!(progress[1].remaining, 90);
            assert_eq!(progress[1].learner_id, 7);
        }

        #[test]
        fn is_idempotent() {
            let topics = vec![make_topic(1, 60)];
            let mut progress = Vec::new();
            ensure_progress(1, &topics, &mut progress);
            assert_eq!(ensure_progress(1, &topics, &mut progress), 0);
            assert_eq!(progress.len(), 1);
        }
    }

    mod update_tests {
        use super::*;

        #[test]
        fn partial_study_keeps_conservation() {
            let topic = make_topic(1, 120);
            let mut p = TopicProgress::fresh(1, &topic);
            let update = update_progress(&mut p, &topic, 45, date(2024, 3, 4));
            assert_eq!(p.completed, 45);
            assert_eq!(p.remaining, 75);
            assert_eq!(p.completed + p.remaining, 120);
            assert!(!update.newly_completed);
            assert_eq!(p.last_studied, Some(date(2024, 3, 4)));
            assert_eq!(p.next_review_date, None);
        }

        #[test]
        fn overshoot_is_capped() {
            let topic = make_topic(1, 60);
            let mut p = TopicProgress::fresh(1, &topic);
            update_progress(&mut p, &topic, 500, date(2024, 3, 4));
            assert_eq!(p.completed, 60);
            assert_eq!(p.remaining, 0);
        }

        #[test]
        fn first_completion_schedules_review_next_day() {
            let topic = make_topic(1, 60);
            let mut p = TopicProgress::fresh(1, &topic);
            let update = update_progress(&mut p, &topic, 60, date(2024, 3, 4));
            assert!(update.newly_completed);
            assert!(p.completed_flag);
            assert_eq!(p.review_count, 1);
            assert_eq!(p.next_review_date, Some(date(2024, 3, 5)));
        }

        #[test]
        fn completion_is_a_one_time_transition() {
            let topic = make_topic(1, 60);
            let mut p = TopicProgress::fresh(1, &topic);
            update_progress(&mut p, &topic, 60, date(2024, 3, 4));
            let again = update_progress(&mut p, &topic, 30, date(2024, 3, 6));
            assert!(!again.newly_completed);
            assert!(p.completed_flag);
            assert_eq!(p.review_count, 1);
            assert_eq!(p.next_review_date, Some(date(2024, 3, 5)));
        }

        #[test]
        fn review_count_never_decreases_without_reset() {
            let topic = make_topic(1, 60);
            let mut p = TopicProgress::fresh(1, &topic);
            let mut last = 0;
            for day in 1..=10 {
                update_progress(&mut p, &topic, 15, date(2024, 3, day));
                complete_review(&mut p, date(2024, 3, day));
                assert!(p.review_count >= last);
                last = p.review_count;
            }
        }
    }

    mod review_tests {
        use super::*;

        #[test]
        fn review_cycle_follows_curve() {
            let topic = make_topic(1, 60);
            let mut p = TopicProgress::fresh(1, &topic);

            // Completion: 0 -> 1, +1 day
            update_progress(&mut p, &topic, 60, date(2024, 3, 4));
            assert_eq!(p.next_review_date, Some(date(2024, 3, 5)));

            // First review: 1 -> 2, +3 days from that completion
            let next = complete_review(&mut p, date(2024, 3, 5));
            assert_eq!(next, Some(date(2024, 3, 8)));
            assert_eq!(p.review_count, 2);

            // 2 -> 3, +7 days
            assert_eq!(complete_review(&mut p, date(2024, 3, 8)), Some(date(2024, 3, 15)));
        }

        #[test]
        fn reviewing_unfinished_topic_is_ignored() {
            let topic = make_topic(1, 60);
            let mut p = TopicProgress::fresh(1, &topic);
            assert_eq!(complete_review(&mut p, date(2024, 3, 4)), None);
            assert_eq!(p.review_count, 0);
        }

        #[test]
        fn due_and_upcoming_split_on_today() {
            let today = date(2024, 3, 10);
            let topic = make_topic(1, 60);
            let mk = |topic_id: i64, next: Option<NaiveDate>, done: bool| TopicProgress {
                topic_id,
                completed_flag: done,
                next_review_date: next,
                ..TopicProgress::fresh(1, &topic)
            };
            let progress = vec![
                mk(1, Some(date(2024, 3, 8)), true),
                mk(2, Some(date(2024, 3, 10)), true),
                mk(3, Some(date(2024, 3, 13)), true),
                mk(4, Some(date(2024, 3, 11)), true),
                mk(5, Some(date(2024, 3, 25)), true),
                mk(6, Some(date(2024, 3, 9)), false),
                mk(7, None, true),
            ];

            let due: Vec<i64> = due_for_review(&progress, today)
                .iter()
                .map(|p| p.topic_id)
                .collect();
            assert_eq!(due, vec![1, 2]);

            let upcoming: Vec<i64> = upcoming_reviews(&progress, today, 7)
                .iter()
                .map(|p| p.topic_id)
                .collect();
            assert_eq!(upcoming, vec![4, 3]);
        }

        #[test]
        fn huge_horizon_saturates() {
            let today = date(2024, 3, 4);
            let topic = make_topic(1, 60);
            let progress = vec![TopicProgress {
                completed_flag: true,
                next_review_date: Some(date(2030, 1, 1)),
                ..TopicProgress::fresh(1, &topic)
            }];
            assert_eq!(upcoming_reviews(&progress, today, 10_000_000_000).len(), 1);
            assert_eq!(upcoming_reviews(&progress, today, i64::MAX).len(), 1);
            assert!(upcoming_reviews(&progress, today, i64::MIN).is_empty());
        }
    }

    mod rebase_tests {
        use super::*;

        #[test]
        fn shrinking_effort_caps_completed() {
            let topic = make_topic(1, 120);
            let mut p = TopicProgress::fresh(1, &topic);
            update_progress(&mut p, &topic, 30, date(2024, 3, 4));

            let shorter = make_topic(1, 60);
            assert!(rebase_effort(&mut p, &shorter));
            assert_eq!((p.completed, p.remaining), (30, 30));
            assert!(!p.completed_flag);

            let tiny = make_topic(1, 20);
            assert!(rebase_effort(&mut p, &tiny));
            assert_eq!((p.completed, p.remaining), (20, 0));
            assert!(p.completed_flag);
        }

        #[test]
        fn growing_effort_adds_remaining() {
            let topic = make_topic(1, 60);
            let mut p = TopicProgress::fresh(1, &topic);
            update_progress(&mut p, &topic, 45, date(2024, 3, 4));

            let longer = make_topic(1, 90);
            assert!(rebase_effort(&mut p, &longer));
            assert_eq!(p.completed + p.remaining, 90);
            assert_eq!(p.remaining, 45);
            assert!(!rebase_effort(&mut p, &longer));
        }
    }

    mod reset_tests {
        use super::*;

        #[test]
        fn reset_restores_full_effort() {
            let topic = make_topic(1, 60);
            let mut p = TopicProgress::fresh(1, &topic);
            update_progress(&mut p, &topic, 60, date(2024, 3, 4));
            complete_review(&mut p, date(2024, 3, 5));

            reset_progress(&mut p, &topic);
            assert_eq!(p.completed, 0);
            assert_eq!(p.remaining, 60);
            assert!(!p.completed_flag);
            assert_eq!(p.review_count, 0);
            assert_eq!(p.next_review_date, None);

            // Completing again starts the curve over
            update_progress(&mut p, &topic, 60, date(2024, 4, 1));
            assert_eq!(p.next_review_date, Some(date(2024, 4, 2)));
        }
    }
}
