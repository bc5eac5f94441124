use chrono::NaiveDate;

use super::{catalog_order, Ledger, TopicSelector};
use crate::models::{Topic, WeeklySlot};

/// Plain ordered consumption: the first open topic in `order`-then-name
/// sequence gets the time. No prerequisites, no energy matching.
pub struct FifoSelector;

impl TopicSelector for FifoSelector {
    fn select<'t>(
        &self,
        _slot: &WeeklySlot,
        _date: NaiveDate,
        candidates: &[&'t Topic],
        _ledger: &Ledger,
    ) -> Option<&'t Topic> {
        candidates.iter().copied().min_by(|a, b| catalog_order(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{plan_week, PlanInput};
    use super::*;
    use crate::models::EnergyLevel;

    #[test]
    fn explicit_order_beats_name() {
        let mut topics = vec![topic(1, 1, "Alpha", 60), topic(2, 1, "Beta", 60)];
        topics[1].order = Some(1);
        topics[0].order = Some(2);
        let slots = vec![slot(1, 1, 600, 660, 1)];
        let plan = plan_week(&PlanInput {
            week_start: monday(),
            slots: &slots,
            topics: &topics,
            progress: &[],
        });
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].topic_id, 2);
    }

    #[test]
    fn unordered_topics_come_last_by_name() {
        let mut topics = vec![
            topic(1, 1, "Zeta", 30),
            topic(2, 1, "Beta", 30),
            topic(3, 1, "Alpha", 30),
        ];
        topics[0].order = Some(5);
        let slots = vec![slot(1, 1, 600, 690, 1)];
        let plan = plan_week(&PlanInput {
            week_start: monday(),
            slots: &slots,
            topics: &topics,
            progress: &[],
        });
        let ids: Vec<i64> = plan.iter().map(|e| e.topic_id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn completed_and_exhausted_topics_are_skipped() {
        let topics = vec![
            topic(1, 1, "A", 60),
            topic(2, 1, "B", 60),
            topic(3, 1, "C", 60),
        ];
        let mut exhausted = crate::models::TopicProgress::fresh(1, &topics[1]);
        exhausted.remaining = 0;
        exhausted.completed = 60;
        let progress = vec![done(&topics[0]), exhausted];
        let slots = vec![slot(1, 1, 600, 720, 1)];
        let plan = plan_week(&PlanInput {
            week_start: monday(),
            slots: &slots,
            topics: &topics,
            progress: &progress,
        });
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].topic_id, 3);
        assert_eq!(plan[0].minutes, 60);
    }

    #[test]
    fn ignores_energy_and_prerequisites() {
        let mut topics = vec![topic(1, 1, "A", 60), topic(2, 1, "B", 60)];
        topics[0].prerequisites = vec![2];
        topics[0].energy_level = Some(EnergyLevel::High);
        // Late evening slot is low energy
        let slots = vec![slot(1, 1, 1260, 1320, 1)];
        let plan = plan_week(&PlanInput {
            week_start: monday(),
            slots: &slots,
            topics: &topics,
            progress: &[],
        });
        assert_eq!(plan[0].topic_id, 1);
    }
}
