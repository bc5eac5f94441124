use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

// A catalog subject (exam track, course, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
}

// Energy tiers, used both for topics (how demanding) and slots (time of day)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    High,
    Medium,
    Low,
}

impl EnergyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyLevel::High => "high",
            EnergyLevel::Medium => "medium",
            EnergyLevel::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" | "h" => Some(EnergyLevel::High),
            "medium" | "med" | "m" => Some(EnergyLevel::Medium),
            "low" | "l" => Some(EnergyLevel::Low),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnergyLevel::High => "High",
            EnergyLevel::Medium => "Medium",
            EnergyLevel::Low => "Low",
        }
    }

    /// Energy window for a slot starting at `minute` past midnight.
    ///
    /// 08:00-11:59 is high, 14:00-17:59 is medium, everything else is low.
    pub fn for_minute(minute: u32) -> Self {
        match minute / 60 {
            8..=11 => EnergyLevel::High,
            14..=17 => EnergyLevel::Medium,
            _ => EnergyLevel::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub subject_id: i64,
    pub name: String,
    /// Total estimated effort in minutes, always > 0
    pub avg_minutes: u32,
    pub order: Option<i32>,
    pub difficulty_score: u8,
    pub priority: u8,
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub prerequisites: Vec<i64>,
    pub energy_level: Option<EnergyLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySlot {
    pub id: i64,
    pub learner_id: i64,
    /// 1 = Monday .. 7 = Sunday
    pub day: u8,
    /// Minutes past midnight
    pub start: u32,
    pub end: u32,
    pub subject_id: i64,
}

impl WeeklySlot {
    pub fn duration(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn energy_type(&self) -> EnergyLevel {
        EnergyLevel::for_minute(self.start)
    }

    pub fn date_in_week(&self, week_start: NaiveDate) -> NaiveDate {
        week_start + Duration::days(i64::from(self.day.saturating_sub(1)))
    }

    pub fn time_label(&self) -> String {
        format!("{}-{}", format_minute(self.start), format_minute(self.end))
    }
}

// Partial update for a slot; None fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPatch {
    pub day: Option<u8>,
    pub start: Option<u32>,
    pub end: Option<u32>,
    pub subject_id: Option<i64>,
}

impl SlotPatch {
    pub fn apply(&self, slot: &mut WeeklySlot) {
        if let Some(day) = self.day {
            slot.day = day;
        }
        if let Some(start) = self.start {
            slot.start = start;
        }
        if let Some(end) = self.end {
            slot.end = end;
        }
        if let Some(subject_id) = self.subject_id {
            slot.subject_id = subject_id;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.day.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.subject_id.is_none()
    }
}

// Per learner, per topic effort ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicProgress {
    pub learner_id: i64,
    pub topic_id: i64,
    pub completed: u32,
    pub remaining: u32,
    pub completed_flag: bool,
    pub last_studied: Option<NaiveDate>,
    pub review_count: u32,
    pub next_review_date: Option<NaiveDate>,
}

impl TopicProgress {
    pub fn fresh(learner_id: i64, topic: &Topic) -> Self {
        Self {
            learner_id,
            topic_id: topic.id,
            completed: 0,
            remaining: topic.avg_minutes,
            completed_flag: false,
            last_studied: None,
            review_count: 0,
            next_review_date: None,
        }
    }

    pub fn percent_complete(&self) -> f64 {
        let total = self.completed + self.remaining;
        if total == 0 {
            0.0
        } else {
            (self.completed as f64 / total as f64) * 100.0
        }
    }
}

// One allocated study chunk. Planner output only, never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedEntry {
    pub date: NaiveDate,
    pub start: u32,
    pub end: u32,
    pub subject_id: i64,
    pub topic_id: i64,
    pub minutes: u32,
    pub remaining_after: u32,
}

pub fn format_minute(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

pub fn parse_minute(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 24 || m >= 60 || (h == 24 && m != 0) {
        return None;
    }
    Some(h * 60 + m)
}

pub fn day_label(day: u8) -> &'static str {
    match day {
        1 => "Mon",
        2 => "Tue",
        3 => "Wed",
        4 => "Thu",
        5 => "Fri",
        6 => "Sat",
        7 => "Sun",
        _ => "???",
    }
}

pub fn parse_day(s: &str) -> Option<u8> {
    match s.to_lowercase().as_str() {
        "1" | "mon" | "monday" => Some(1),
        "2" | "tue" | "tuesday" => Some(2),
        "3" | "wed" | "wednesday" => Some(3),
        "4" | "thu" | "thursday" => Some(4),
        "5" | "fri" | "friday" => Some(5),
        "6" | "sat" | "saturday" => Some(6),
        "7" | "sun" | "sunday" => Some(7),
        _ => None,
    }
}

/// Monday of the ISO week containing `date`.
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_slot(day: u8, start: u32, end: u32) -> WeeklySlot {
        WeeklySlot {
            id: 1,
            learner_id: 1,
            day,
            start,
            end,
            subject_id: 1,
        }
    }

    mod energy_level_tests {
        use super::*;

        #[test]
        fn morning_is_high() {
            assert_eq!(EnergyLevel::for_minute(8 * 60), EnergyLevel::High);
            assert_eq!(EnergyLevel::for_minute(11 * 60 + 59), EnergyLevel::High);
        }

        #[test]
        fn afternoon_is_medium() {
            assert_eq!(EnergyLevel::for_minute(14 * 60), EnergyLevel::Medium);
            assert_eq!(EnergyLevel::for_minute(17 * 60 + 30), EnergyLevel::Medium);
        }

        #[test]
        fn lunch_and_evening_are_low() {
            assert_eq!(EnergyLevel::for_minute(12 * 60), EnergyLevel::Low);
            assert_eq!(EnergyLevel::for_minute(13 * 60 + 30), EnergyLevel::Low);
            assert_eq!(EnergyLevel::for_minute(18 * 60), EnergyLevel::Low);
            assert_eq!(EnergyLevel::for_minute(7 * 60 + 30), EnergyLevel::Low);
        }

        #[test]
        fn from_str_variants() {
            assert_eq!(EnergyLevel::from_str("HIGH"), Some(EnergyLevel::High));
            assert_eq!(EnergyLevel::from_str("m"), Some(EnergyLevel::Medium));
            assert_eq!(EnergyLevel::from_str("low"), Some(EnergyLevel::Low));
            assert_eq!(EnergyLevel::from_str("extreme"), None);
        }

        #[test]
        fn serializes_lowercase() {
            let json = serde_json::to_string(&EnergyLevel::Medium).unwrap();
            assert_eq!(json, "\"medium\"");
        }
    }

    mod slot_tests {
        use super::*;

        #[test]
        fn duration_and_energy() {
            let slot = make_slot(1, 17 * 60, 18 * 60 + 30);
            assert_eq!(slot.duration(), 90);
            assert_eq!(slot.energy_type(), EnergyLevel::Medium);
            assert_eq!(slot.time_label(), "17:00-18:30");
        }

        #[test]
        fn date_in_week_offsets_from_monday() {
            let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
            let slot = make_slot(3, 600, 660);
            assert_eq!(
                slot.date_in_week(monday),
                NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()
            );
        }

        #[test]
        fn patch_applies_only_set_fields() {
            let mut slot = make_slot(1, 600, 660);
            let patch = SlotPatch {
                day: Some(2),
                end: Some(690),
                ..Default::default()
            };
            patch.apply(&mut slot);
            assert_eq!(slot.day, 2);
            assert_eq!(slot.start, 600);
            assert_eq!(slot.end, 690);
            assert!(!patch.is_empty());
            assert!(SlotPatch::default().is_empty());
        }
    }

    mod time_tests {
        use super::*;

        #[test]
        fn format_and_parse() {
            assert_eq!(format_minute(0), "00:00");
            assert_eq!(format_minute(17 * 60 + 30), "17:30");
            assert_eq!(parse_minute("17:30"), Some(1050));
            assert_eq!(parse_minute(" 08:00 "), Some(480));
            assert_eq!(parse_minute("24:00"), Some(1440));
        }

        #[test]
        fn parse_rejects_garbage() {
            assert_eq!(parse_minute("17"), None);
            assert_eq!(parse_minute("17:60"), None);
            assert_eq!(parse_minute("25:00"), None);
            assert_eq!(parse_minute("ab:cd"), None);
        }

        #[test]
        fn days() {
            assert_eq!(parse_day("Monday"), Some(1));
            assert_eq!(parse_day("sun"), Some(7));
            assert_eq!(parse_day("8"), None);
            assert_eq!(day_label(4), "Thu");
            assert_eq!(day_label(0), "???");
        }

        #[test]
        fn week_start_is_monday() {
            // 2024-03-07 is a Thursday
            let thursday = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
            assert_eq!(
                week_start_for(thursday),
                NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
            );
            let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
            assert_eq!(week_start_for(monday), monday);
        }
    }

    mod progress_tests {
        use super::*;

        #[test]
        fn fresh_progress_starts_untouched() {
            let topic = Topic {
                id: 9,
                subject_id: 1,
                name: "Limits".to_string(),
                avg_minutes: 120,
                order: None,
                difficulty_score: 5,
                priority: 5,
                deadline: None,
                prerequisites: vec![],
                energy_level: None,
            };
            let p = TopicProgress::fresh(3, &topic);
            assert_eq!(p.learner_id, 3);
            assert_eq!(p.topic_id, 9);
            assert_eq!(p.remaining, 120);
            assert_eq!(p.completed, 0);
            assert!(!p.completed_flag);
            assert_eq!(p.percent_complete(), 0.0);
        }
    }

    mod json_output_tests {
        use super::*;

        #[test]
        fn serializes_ok_correctly() {
            let output = JsonOutput::ok("test");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":true"));
            assert!(json.contains("\"data\":\"test\""));
            assert!(json.contains("\"error\":null"));
        }

        #[test]
        fn serializes_err_correctly() {
            let output = JsonOutput::<()>::err("error");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":false"));
            assert!(json.contains("\"data\":null"));
            assert!(json.contains("\"error\":\"error\""));
        }
    }
}
