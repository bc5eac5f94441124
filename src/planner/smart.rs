//! Priority and energy aware topic selection.
//!
//! A topic is eligible only once all of its prerequisites are completed in
//! the snapshot. Eligible topics are ranked by how well their demand fits the
//! slot's time-of-day energy, then by an urgency score built from deadline,
//! priority, difficulty and how much is left.

use chrono::NaiveDate;

use super::{catalog_order, Ledger, TopicSelector, TopicState};
use crate::models::{EnergyLevel, Topic, WeeklySlot};

pub struct SmartSelector;

/// Topic demand (row) against slot energy (column).
pub fn energy_match_score(topic: EnergyLevel, slot: EnergyLevel) -> u32 {
    use EnergyLevel::*;
    match (topic, slot) {
        (High, High) => 10,
        (High, Medium) => 6,
        (High, Low) => 0,
        (Medium, High) => 7,
        (Medium, Medium) => 10,
        (Medium, Low) => 5,
        (Low, High) => 3,
        (Low, Medium) => 6,
        (Low, Low) => 10,
    }
}

/// Deadline brackets are measured from `on`, the date being planned.
/// Missed deadlines land in the nearest bracket.
pub fn urgency_score(topic: &Topic, state: TopicState, on: NaiveDate) -> u32 {
    let mut score = 0;

    if let Some(deadline) = topic.deadline {
        let days = (deadline - on).num_days();
        score += if days <= 7 {
            50
        } else if days <= 14 {
            30
        } else if days <= 30 {
            10
        } else {
            0
        };
    }

    score += u32::from(topic.priority) * 10;
    score += u32::from(topic.difficulty_score) * 5;

    if state.remaining > 120 {
        score += 20;
    }
    if state.completed == 0 {
        score += 15;
    }

    score
}

fn prerequisites_met(topic: &Topic, ledger: &Ledger) -> bool {
    topic
        .prerequisites
        .iter()
        .all(|id| ledger.is_completed(*id))
}

impl TopicSelector for SmartSelector {
    fn select<'t>(
        &self,
        slot: &WeeklySlot,
        date: NaiveDate,
        candidates: &[&'t Topic],
        ledger: &Ledger,
    ) -> Option<&'t Topic> {
        let slot_energy = slot.energy_type();

        candidates
            .iter()
            .copied()
            .filter(|t| prerequisites_met(t, ledger))
            .map(|t| {
                let needed = t.energy_level.unwrap_or(EnergyLevel::Medium);
                let energy = energy_match_score(needed, slot_energy);
                let urgency = urgency_score(t, ledger.state(t), date);
                (energy, urgency, t)
            })
            .min_by(|a, b| {
                b.0.cmp(&a.0)
                    .then_with(|| b.1.cmp(&a.1))
                    .then_with(|| catalog_order(a.2, b.2))
            })
            .map(|(_, _, t)| t)
    }
}
