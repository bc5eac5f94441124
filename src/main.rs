mod backend;
mod config;
mod conflict;
mod db;
mod error;
mod history;
mod models;
mod planner;
mod progress;
mod schedule;
mod store;
mod templates;
mod tui;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;

use backend::SqliteBackend;
use config::{Settings, DB_ENV};
use models::{
    day_label, format_minute, parse_day, parse_minute, week_start_for, EnergyLevel, JsonOutput,
    PlannedEntry, Subject, Topic,
};
use schedule::{EditOutcome, ScheduleEditor};
use store::Store;
use templates::{apply_template, find_template, ApplyMode, TEMPLATES};

#[derive(Parser)]
#[command(name = "studyplan")]
#[command(about = "Weekly study slots, effort allocation and spaced review")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Show catalog and schedule statistics
    Stats,

    /// Manage subjects
    #[command(subcommand)]
    Subject(SubjectCommands),

    /// Manage topics
    #[command(subcommand)]
    Topic(TopicCommands),

    /// Edit the weekly slot grid
    #[command(subcommand)]
    Slot(SlotCommands),

    /// Allocate topics to this week's slots
    Plan {
        /// Rank topics by energy, urgency, priority and difficulty
        #[arg(long)]
        smart: bool,

        /// Any date in the week to plan (YYYY-MM-DD), defaults to today
        #[arg(long, short, value_parser = parse_date_arg)]
        week: Option<NaiveDate>,

        /// Record every planned chunk as studied
        #[arg(long)]
        commit: bool,
    },

    /// Record study effort and reviews
    #[command(subcommand)]
    Progress(ProgressCommands),

    /// List reviews that are due or coming up
    Reviews {
        /// Days ahead to include
        #[arg(
            long,
            value_parser = clap::value_parser!(i64).range(0..=progress::MAX_HORIZON_DAYS)
        )]
        horizon: Option<i64>,
    },

    /// Weekly templates
    #[command(subcommand)]
    Template(TemplateCommands),

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum SubjectCommands {
    /// List all subjects
    List,

    /// Add a new subject
    Add {
        /// Subject name
        name: String,

        /// Category label
        #[arg(long, short)]
        category: Option<String>,
    },

    /// Rename a subject
    Rename {
        /// Subject ID
        id: i64,

        /// New name
        name: String,
    },
}

#[derive(Subcommand)]
enum TopicCommands {
    /// List topics in study order
    List {
        /// Only topics of this subject
        #[arg(long, short)]
        subject: Option<i64>,
    },

    /// Add a new topic
    Add {
        /// Subject ID
        subject: i64,

        /// Topic name
        name: String,

        /// Estimated effort in minutes
        #[arg(long, short)]
        minutes: u32,

        /// Position in the subject's study order
        #[arg(long, short)]
        order: Option<i32>,

        /// Difficulty 0-10
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=10))]
        difficulty: u8,

        /// Priority 0-10
        #[arg(
            long,
            short,
            default_value_t = 0,
            value_parser = clap::value_parser!(u8).range(0..=10)
        )]
        priority: u8,

        /// Deadline (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        deadline: Option<NaiveDate>,

        /// Comma-separated prerequisite topic IDs
        #[arg(long)]
        requires: Option<String>,

        /// Energy needed: high/medium/low
        #[arg(long, short, value_parser = parse_energy_arg)]
        energy: Option<EnergyLevel>,
    },

    /// Show topic details and progress
    Show {
        /// Topic ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum SlotCommands {
    /// List the weekly slots
    List,

    /// Add a slot, e.g. `slot add mon 17:00 18:30 --subject 2`
    Add {
        #[arg(value_parser = parse_day_arg)]
        day: u8,

        #[arg(value_parser = parse_time_arg)]
        start: u32,

        #[arg(value_parser = parse_time_arg)]
        end: u32,

        /// Subject ID
        #[arg(long, short)]
        subject: i64,

        /// On conflict, take the nearest free position instead
        #[arg(long)]
        apply_suggestion: bool,
    },

    /// Move a slot, keeping its duration
    Move {
        /// Slot ID
        id: i64,

        #[arg(value_parser = parse_day_arg)]
        day: u8,

        #[arg(value_parser = parse_time_arg)]
        start: u32,

        /// On conflict, take the nearest free position instead
        #[arg(long)]
        apply_suggestion: bool,
    },

    /// Change a slot's end time
    Resize {
        /// Slot ID
        id: i64,

        #[arg(value_parser = parse_time_arg)]
        end: u32,
    },

    /// Remove a slot
    Remove {
        /// Slot ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum ProgressCommands {
    /// Log minutes studied on a topic
    Study {
        /// Topic ID
        topic: i64,

        /// Minutes studied
        minutes: u32,
    },

    /// Start a topic over
    Reset {
        /// Topic ID
        topic: i64,
    },

    /// Mark a due review as done
    Review {
        /// Topic ID
        topic: i64,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List built-in templates
    List,

    /// Apply a template to the weekly grid
    Apply {
        /// Template key
        key: String,

        /// Clear existing slots first
        #[arg(long)]
        replace: bool,

        /// Confirm --replace
        #[arg(long, short)]
        yes: bool,
    },
}

fn parse_day_arg(s: &str) -> Result<u8, String> {
    parse_day(s).ok_or_else(|| format!("invalid day '{}', use mon..sun or 1..7", s))
}

fn parse_time_arg(s: &str) -> Result<u32, String> {
    parse_minute(s).ok_or_else(|| format!("invalid time '{}', use HH:MM", s))
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}', use YYYY-MM-DD", s))
}

fn parse_energy_arg(s: &str) -> Result<EnergyLevel, String> {
    EnergyLevel::from_str(s).ok_or_else(|| format!("invalid energy '{}', use high/medium/low", s))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    let db_path = settings.db_path(std::env::var_os(DB_ENV).map(PathBuf::from));
    let backend = Arc::new(SqliteBackend::open(&db_path)?);
    log::debug!("sqlite: using {}", db_path.display());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let store = Arc::new(Store::new(backend.clone(), settings.learner_id));
    let editor = ScheduleEditor::new(store.clone(), settings.grid()?, settings.history.capacity)
        .with_suggestion_limit(settings.grid.suggestions);
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Init => {
            if cli.json {
                print_json(())?;
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Stats => {
            let stats = backend.stats(settings.learner_id)?;
            let due = rt.block_on(store.due_for_review(today))?.len();
            if cli.json {
                print_json(serde_json::json!({
                    "subjects": stats.subjects,
                    "topics": stats.topics,
                    "weekly_minutes": stats.weekly_minutes,
                    "completed": stats.completed,
                    "due_reviews": due
                }))?;
            } else {
                println!("=== Study Statistics ===");
                println!("Subjects: {}", stats.subjects);
                println!("Topics: {}", stats.topics);
                println!(
                    "Weekly slot time: {}h {:02}m",
                    stats.weekly_minutes / 60,
                    stats.weekly_minutes % 60
                );
                println!("Completed topics: {}", stats.completed);
                println!("Reviews due: {}", due);
            }
        }

        Commands::Tui => {
            tui::run(&rt, editor, settings.reviews.horizon_days)?;
        }

        command => {
            rt.block_on(execute(command, cli.json, editor, &settings, today))?;
        }
    }

    Ok(())
}

async fn execute(
    command: Commands,
    json: bool,
    mut editor: ScheduleEditor,
    settings: &Settings,
    today: NaiveDate,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = editor.store().clone();

    match command {
        Commands::Subject(cmd) => match cmd {
            SubjectCommands::List => {
                let subjects = store.load_subjects().await?;
                if json {
                    print_json(&subjects)?;
                } else if subjects.is_empty() {
                    println!("No subjects found.");
                } else {
                    println!("{:<5} {:<30} CATEGORY", "ID", "NAME");
                    println!("{}", "-".repeat(50));
                    for s in subjects {
                        println!(
                            "{:<5} {:<30} {}",
                            s.id,
                            truncate(&s.name, 28),
                            s.category.as_deref().unwrap_or("-")
                        );
                    }
                }
            }

            SubjectCommands::Add { name, category } => {
                let mut subjects = store.load_subjects().await?;
                let id = subjects.iter().map(|s| s.id).max().unwrap_or(0) + 1;
                subjects.push(Subject {
                    id,
                    name: name.clone(),
                    category,
                });
                store.save_subjects(subjects).await?;

                if json {
                    print_json(serde_json::json!({ "id": id, "name": name }))?;
                } else {
                    println!("Added subject '{}' with ID: {}", name, id);
                }
            }

            SubjectCommands::Rename { id, name } => {
                let mut subjects = store.load_subjects().await?;
                let subject = subjects
                    .iter_mut()
                    .find(|s| s.id == id)
                    .ok_or(error::Error::SubjectNotFound(id))?;
                subject.name = name.clone();
                store.save_subjects(subjects).await?;

                if json {
                    print_json(())?;
                } else {
                    println!("Subject {} renamed to '{}'.", id, name);
                }
            }
        },

        Commands::Topic(cmd) => match cmd {
            TopicCommands::List { subject } => {
                let topics: Vec<Topic> = store
                    .load_topics()
                    .await?
                    .into_iter()
                    .filter(|t| subject.map_or(true, |id| t.subject_id == id))
                    .collect();
                if json {
                    print_json(&topics)?;
                } else if topics.is_empty() {
                    println!("No topics found.");
                } else {
                    let progress = store.load_progress().await?;
                    println!(
                        "{:<5} {:<8} {:<32} {:>6} {:>6}",
                        "ID", "SUBJECT", "NAME", "MIN", "DONE"
                    );
                    println!("{}", "-".repeat(62));
                    for t in topics {
                        let done = progress
                            .iter()
                            .find(|p| p.topic_id == t.id)
                            .map(|p| format!("{:.0}%", p.percent_complete()))
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{:<5} {:<8} {:<32} {:>6} {:>6}",
                            t.id,
                            t.subject_id,
                            truncate(&t.name, 30),
                            t.avg_minutes,
                            done
                        );
                    }
                }
            }

            TopicCommands::Add {
                subject,
                name,
                minutes,
                order,
                difficulty,
                priority,
                deadline,
                requires,
                energy,
            } => {
                if minutes == 0 {
                    return Err("--minutes must be greater than zero".into());
                }
                let subjects = store.load_subjects().await?;
                if !subjects.iter().any(|s| s.id == subject) {
                    return Err(error::Error::SubjectNotFound(subject).into());
                }

                let prerequisites = match requires {
                    Some(list) => list
                        .split(',')
                        .map(|s| s.trim().parse::<i64>())
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|_| format!("invalid prerequisite list '{}'", list))?,
                    None => Vec::new(),
                };

                let mut topics = store.load_topics().await?;
                let id = topics.iter().map(|t| t.id).max().unwrap_or(0) + 1;
                topics.push(Topic {
                    id,
                    subject_id: subject,
                    name: name.clone(),
                    avg_minutes: minutes,
                    order,
                    difficulty_score: difficulty,
                    priority,
                    deadline,
                    prerequisites,
                    energy_level: energy,
                });
                store.save_topics(topics).await?;
                store.ensure_progress().await?;

                if json {
                    print_json(serde_json::json!({ "id": id, "name": name }))?;
                } else {
                    println!("Added topic '{}' with ID: {}", name, id);
                }
            }

            TopicCommands::Show { id } => {
                let topics = store.load_topics().await?;
                let Some(topic) = topics.into_iter().find(|t| t.id == id) else {
                    if json {
                        println!(
                            "{}",
                            serde_json::to_string(&JsonOutput::<()>::err("Topic not found"))?
                        );
                    } else {
                        println!("Topic not found.");
                    }
                    return Ok(());
                };
                let progress = store
                    .load_progress()
                    .await?
                    .into_iter()
                    .find(|p| p.topic_id == id);

                if json {
                    print_json(serde_json::json!({
                        "topic": topic,
                        "progress": progress
                    }))?;
                } else {
                    println!("Topic: {}", topic.name);
                    println!("ID: {} (subject {})", topic.id, topic.subject_id);
                    println!("Effort: {} min", topic.avg_minutes);
                    if let Some(order) = topic.order {
                        println!("Order: {}", order);
                    }
                    println!(
                        "Difficulty: {}  Priority: {}",
                        topic.difficulty_score, topic.priority
                    );
                    if let Some(deadline) = topic.deadline {
                        println!("Deadline: {}", deadline);
                    }
                    if let Some(energy) = topic.energy_level {
                        println!("Energy: {}", energy.label());
                    }
                    if !topic.prerequisites.is_empty() {
                        let ids: Vec<String> =
                            topic.prerequisites.iter().map(|p| p.to_string()).collect();
                        println!("Requires: {}", ids.join(", "));
                    }

                    if let Some(p) = progress {
                        println!();
                        println!("--- Progress ---");
                        println!(
                            "Studied: {} min, {} min left ({:.0}%)",
                            p.completed,
                            p.remaining,
                            p.percent_complete()
                        );
                        if let Some(last) = p.last_studied {
                            println!("Last studied: {}", last);
                        }
                        if p.completed_flag {
                            println!("Reviews done: {}", p.review_count);
                            if let Some(next) = p.next_review_date {
                                println!("Next review: {}", next);
                            }
                        }
                    }
                }
            }
        },

        Commands::Slot(cmd) => {
            editor.load().await?;
            match cmd {
                SlotCommands::List => {
                    let slots = store.load_slots().await?;
                    if json {
                        print_json(&slots)?;
                    } else if slots.is_empty() {
                        println!("No slots found.");
                    } else {
                        let names = subject_names(&store.load_subjects().await?);
                        let mut slots = slots;
                        slots.sort_by_key(|s| (s.day, s.start));
                        println!("{:<5} {:<4} {:<12} SUBJECT", "ID", "DAY", "TIME");
                        println!("{}", "-".repeat(45));
                        for s in slots {
                            println!(
                                "{:<5} {:<4} {:<12} {}",
                                s.id,
                                day_label(s.day),
                                s.time_label(),
                                subject_name(&names, s.subject_id)
                            );
                        }
                    }
                }

                SlotCommands::Add {
                    day,
                    start,
                    end,
                    subject,
                    apply_suggestion,
                } => {
                    let mut outcome = editor.add_slot(day, start, end, subject).await?;
                    if apply_suggestion {
                        if let Some(cell) = outcome.top_suggestion() {
                            let duration = end.saturating_sub(start);
                            outcome = editor
                                .add_slot(cell.day, cell.minute, cell.minute + duration, subject)
                                .await?;
                        }
                    }
                    report_outcome(json, &outcome)?;
                }

                SlotCommands::Move {
                    id,
                    day,
                    start,
                    apply_suggestion,
                } => {
                    let mut outcome = editor.move_slot(id, day, start).await?;
                    if apply_suggestion {
                        if let Some(cell) = outcome.top_suggestion() {
                            outcome = editor.move_slot(id, cell.day, cell.minute).await?;
                        }
                    }
                    report_outcome(json, &outcome)?;
                }

                SlotCommands::Resize { id, end } => {
                    let outcome = editor.resize_slot(id, end).await?;
                    report_outcome(json, &outcome)?;
                }

                SlotCommands::Remove { id } => {
                    let removed = editor.remove_slot(id).await?;
                    if json {
                        print_json(&removed)?;
                    } else {
                        println!(
                            "Slot {} ({} {}) removed.",
                            removed.id,
                            day_label(removed.day),
                            removed.time_label()
                        );
                    }
                }
            }
        }

        Commands::Plan { smart, week, commit } => {
            let week_start = week_start_for(week.unwrap_or(today));
            store.ensure_progress().await?;
            let entries = if smart {
                store.plan_week_smart(week_start).await?
            } else {
                store.plan_week(week_start).await?
            };

            let committed = if commit {
                Some(store.commit_plan(&entries).await?)
            } else {
                None
            };

            if json {
                print_json(serde_json::json!({
                    "week_start": week_start,
                    "entries": entries,
                    "committed": committed.as_ref().map(|c| c.len())
                }))?;
            } else if entries.is_empty() {
                println!("Nothing to plan for the week of {}.", week_start);
            } else {
                let subjects = subject_names(&store.load_subjects().await?);
                let topics = store.load_topics().await?;
                print_plan(week_start, &entries, &subjects, &topics);
                if let Some(updates) = committed {
                    let finished = updates.iter().filter(|(_, u)| u.newly_completed).count();
                    println!();
                    println!(
                        "Committed {} entries, {} topics completed.",
                        updates.len(),
                        finished
                    );
                }
            }
        }

        Commands::Progress(cmd) => match cmd {
            ProgressCommands::Study { topic, minutes } => {
                let update = store.update_progress(topic, minutes, today).await?;
                if json {
                    print_json(&update)?;
                } else {
                    println!("Logged {} min on topic {}.", minutes, topic);
                    println!("Remaining: {} min", update.remaining);
                    if update.newly_completed {
                        if let Some(next) = update.next_review_date {
                            println!("Topic completed. First review on {}.", next);
                        }
                    }
                }
            }

            ProgressCommands::Reset { topic } => {
                store.reset_progress(topic).await?;
                if json {
                    print_json(())?;
                } else {
                    println!("Progress for topic {} reset.", topic);
                }
            }

            ProgressCommands::Review { topic } => {
                let next = store.complete_review(topic, today).await?;
                if json {
                    print_json(serde_json::json!({ "next_review_date": next }))?;
                } else {
                    match next {
                        Some(date) => println!("Review recorded. Next review on {}.", date),
                        None => {
                            println!("Topic {} is not completed yet; nothing to review.", topic)
                        }
                    }
                }
            }
        },

        Commands::Reviews { horizon } => {
            let horizon = horizon.unwrap_or(settings.reviews.horizon_days);
            let due = store.due_for_review(today).await?;
            let upcoming = store.upcoming_reviews(today, horizon).await?;

            if json {
                print_json(serde_json::json!({ "due": due, "upcoming": upcoming }))?;
            } else {
                let topics = store.load_topics().await?;
                let name = |id: i64| {
                    topics
                        .iter()
                        .find(|t| t.id == id)
                        .map(|t| t.name.clone())
                        .unwrap_or_else(|| format!("#{}", id))
                };

                println!("=== Due ({}) ===", due.len());
                for p in &due {
                    let date = p.next_review_date.map(|d| d.to_string()).unwrap_or_default();
                    println!("{:<5} {:<32} {}", p.topic_id, truncate(&name(p.topic_id), 30), date);
                }
                println!();
                println!("=== Next {} days ({}) ===", horizon, upcoming.len());
                for p in &upcoming {
                    let date = p.next_review_date.map(|d| d.to_string()).unwrap_or_default();
                    println!("{:<5} {:<32} {}", p.topic_id, truncate(&name(p.topic_id), 30), date);
                }
            }
        }

        Commands::Template(cmd) => match cmd {
            TemplateCommands::List => {
                if json {
                    let list: Vec<_> = TEMPLATES
                        .iter()
                        .map(|t| {
                            serde_json::json!({
                                "key": t.key,
                                "name": t.name,
                                "category": t.category,
                                "difficulty": t.difficulty,
                                "subjects": t.subjects,
                                "weekly_minutes": t.weekly_minutes()
                            })
                        })
                        .collect();
                    print_json(list)?;
                } else {
                    println!("{:<16} {:<24} {:<10} HOURS", "KEY", "NAME", "LEVEL");
                    println!("{}", "-".repeat(60));
                    for t in TEMPLATES {
                        println!(
                            "{:<16} {:<24} {:<10} {:.1}",
                            t.key,
                            t.name,
                            t.difficulty,
                            f64::from(t.weekly_minutes()) / 60.0
                        );
                    }
                }
            }

            TemplateCommands::Apply { key, replace, yes } => {
                let template =
                    find_template(&key).ok_or_else(|| format!("Unknown template '{}'", key))?;
                let mode = ApplyMode::from_flags(replace, yes)?;
                editor.load().await?;
                let report = apply_template(&mut editor, template, mode).await?;

                if json {
                    print_json(&report)?;
                } else {
                    println!(
                        "Applied '{}': {} slots added, {} subjects created.",
                        template.name,
                        report.created_slots.len(),
                        report.created_subjects.len()
                    );
                    for skipped in &report.skipped {
                        println!(
                            "  skipped {} {}-{}: {}",
                            day_label(skipped.slot.day),
                            format_minute(skipped.slot.start),
                            format_minute(skipped.slot.end),
                            skipped.reason
                        );
                    }
                }
            }
        },

        Commands::Init | Commands::Stats | Commands::Tui => {}
    }

    Ok(())
}

fn print_json<T: Serialize>(data: T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn report_outcome(json: bool, outcome: &EditOutcome) -> Result<(), serde_json::Error> {
    if json {
        return print_json(outcome);
    }
    match outcome {
        EditOutcome::Applied { slot } => {
            println!(
                "Slot {}: {} {} (subject {})",
                slot.id,
                day_label(slot.day),
                slot.time_label(),
                slot.subject_id
            );
        }
        EditOutcome::Conflict {
            conflicting,
            suggestions,
        } => {
            let ids: Vec<String> = conflicting.iter().map(|id| id.to_string()).collect();
            println!("Conflicts with slot(s) {}.", ids.join(", "));
            if suggestions.is_empty() {
                println!("No free position of that length this week.");
            } else {
                println!("Nearest free positions:");
                for cell in suggestions {
                    println!("  {} {}", day_label(cell.day), format_minute(cell.minute));
                }
                println!("Re-run with --apply-suggestion to take the first one.");
            }
        }
    }
    Ok(())
}

fn subject_names(subjects: &[Subject]) -> HashMap<i64, String> {
    subjects.iter().map(|s| (s.id, s.name.clone())).collect()
}

fn subject_name(names: &HashMap<i64, String>, id: i64) -> String {
    names
        .get(&id)
        .cloned()
        .unwrap_or_else(|| format!("#{}", id))
}

fn print_plan(
    week_start: NaiveDate,
    entries: &[PlannedEntry],
    subjects: &HashMap<i64, String>,
    topics: &[Topic],
) {
    println!("=== Week of {} ===", week_start);
    let mut current: Option<NaiveDate> = None;
    for e in entries {
        if current != Some(e.date) {
            println!();
            println!("{}", e.date.format("%a %d %b"));
            current = Some(e.date);
        }
        let topic = topics
            .iter()
            .find(|t| t.id == e.topic_id)
            .map(|t| t.name.as_str())
            .unwrap_or("?");
        println!(
            "  {}-{}  {:<16} {:<30} {:>4}m  ({}m left)",
            format_minute(e.start),
            format_minute(e.end),
            truncate(&subject_name(subjects, e.subject_id), 14),
            truncate(topic, 28),
            e.minutes,
            e.remaining_after
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    mod truncate_tests {
        use super::*;

        #[test]
        fn truncate_short_string() {
            assert_eq!(truncate("hello", 10), "hello");
        }

        #[test]
        fn truncate_exact_length() {
            assert_eq!(truncate("hello", 5), "hello");
        }

        #[test]
        fn truncate_long_string() {
            assert_eq!(truncate("hello world", 8), "hello...");
        }

        #[test]
        fn truncate_counts_chars_not_bytes() {
            assert_eq!(truncate("Ökonomie und Recht", 8), "Ökono...");
        }
    }

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn parse_init_with_json() {
            let cli = Cli::try_parse_from(["studyplan", "--json", "init"]).unwrap();
            assert!(cli.json);
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_json_flag_after_subcommand() {
            let cli = Cli::try_parse_from(["studyplan", "stats", "--json"]).unwrap();
            assert!(cli.json);
        }

        #[test]
        fn parse_subject_add_with_category() {
            let cli =
                Cli::try_parse_from(["studyplan", "subject", "add", "Physics", "-c", "science"])
                    .unwrap();
            match cli.command {
                Commands::Subject(SubjectCommands::Add { name, category }) => {
                    assert_eq!(name, "Physics");
                    assert_eq!(category, Some("science".to_string()));
                }
                _ => panic!("Expected Subject Add command"),
            }
        }

        #[test]
        fn parse_topic_add_full() {
            let cli = Cli::try_parse_from([
                "studyplan",
                "topic",
                "add",
                "2",
                "Kinematics",
                "--minutes",
                "120",
                "--priority",
                "4",
                "--deadline",
                "2024-06-01",
                "--requires",
                "3, 5",
                "--energy",
                "high",
            ])
            .unwrap();
            match cli.command {
                Commands::Topic(TopicCommands::Add {
                    subject,
                    name,
                    minutes,
                    priority,
                    difficulty,
                    deadline,
                    requires,
                    energy,
                    order,
                }) => {
                    assert_eq!(subject, 2);
                    assert_eq!(name, "Kinematics");
                    assert_eq!(minutes, 120);
                    assert_eq!(priority, 4);
                    assert_eq!(difficulty, 0);
                    assert_eq!(deadline, NaiveDate::from_ymd_opt(2024, 6, 1));
                    assert_eq!(requires.as_deref(), Some("3, 5"));
                    assert_eq!(energy, Some(EnergyLevel::High));
                    assert!(order.is_none());
                }
                _ => panic!("Expected Topic Add command"),
            }
        }

        #[test]
        fn parse_topic_add_rejects_out_of_range_priority() {
            let result = Cli::try_parse_from([
                "studyplan", "topic", "add", "2", "Kinematics", "-m", "60", "-p", "11",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn parse_reviews_rejects_out_of_range_horizon() {
            let huge = Cli::try_parse_from(["studyplan", "reviews", "--horizon", "10000000000"]);
            assert!(huge.is_err());
            let negative = Cli::try_parse_from(["studyplan", "reviews", "--horizon", "-1"]);
            assert!(negative.is_err());
        }

        #[test]
        fn parse_topic_add_requires_minutes() {
            let result = Cli::try_parse_from(["studyplan", "topic", "add", "2", "Kinematics"]);
            assert!(result.is_err());
        }

        #[test]
        fn parse_slot_add() {
            let cli = Cli::try_parse_from([
                "studyplan", "slot", "add", "mon", "17:00", "18:30", "--subject", "2",
            ])
            .unwrap();
            match cli.command {
                Commands::Slot(SlotCommands::Add {
                    day,
                    start,
                    end,
                    subject,
                    apply_suggestion,
                }) => {
                    assert_eq!(day, 1);
                    assert_eq!(start, 1020);
                    assert_eq!(end, 1110);
                    assert_eq!(subject, 2);
                    assert!(!apply_suggestion);
                }
                _ => panic!("Expected Slot Add command"),
            }
        }

        #[test]
        fn parse_slot_move_with_suggestion() {
            let cli = Cli::try_parse_from([
                "studyplan",
                "slot",
                "move",
                "7",
                "fri",
                "09:30",
                "--apply-suggestion",
            ])
            .unwrap();
            match cli.command {
                Commands::Slot(SlotCommands::Move {
                    id,
                    day,
                    start,
                    apply_suggestion,
                }) => {
                    assert_eq!(id, 7);
                    assert_eq!(day, 5);
                    assert_eq!(start, 570);
                    assert!(apply_suggestion);
                }
                _ => panic!("Expected Slot Move command"),
            }
        }

        #[test]
        fn parse_slot_rejects_bad_day_and_time() {
            assert!(Cli::try_parse_from([
                "studyplan", "slot", "add", "funday", "17:00", "18:00", "-s", "1"
            ])
            .is_err());
            assert!(Cli::try_parse_from([
                "studyplan", "slot", "add", "mon", "25:00", "26:00", "-s", "1"
            ])
            .is_err());
        }

        #[test]
        fn parse_plan_flags() {
            let cli = Cli::try_parse_from([
                "studyplan",
                "plan",
                "--smart",
                "--week",
                "2024-03-06",
                "--commit",
            ])
            .unwrap();
            match cli.command {
                Commands::Plan { smart, week, commit } => {
                    assert!(smart);
                    assert!(commit);
                    assert_eq!(week, NaiveDate::from_ymd_opt(2024, 3, 6));
                }
                _ => panic!("Expected Plan command"),
            }
        }

        #[test]
        fn parse_plan_rejects_bad_week() {
            assert!(Cli::try_parse_from(["studyplan", "plan", "--week", "06/03/2024"]).is_err());
        }

        #[test]
        fn parse_progress_study() {
            let cli = Cli::try_parse_from(["studyplan", "progress", "study", "4", "45"]).unwrap();
            match cli.command {
                Commands::Progress(ProgressCommands::Study { topic, minutes }) => {
                    assert_eq!(topic, 4);
                    assert_eq!(minutes, 45);
                }
                _ => panic!("Expected Progress Study command"),
            }
        }

        #[test]
        fn parse_reviews_horizon() {
            let cli = Cli::try_parse_from(["studyplan", "reviews", "--horizon", "14"]).unwrap();
            match cli.command {
                Commands::Reviews { horizon } => assert_eq!(horizon, Some(14)),
                _ => panic!("Expected Reviews command"),
            }
        }

        #[test]
        fn parse_template_apply_replace() {
            let cli = Cli::try_parse_from([
                "studyplan",
                "template",
                "apply",
                "exam-sprint",
                "--replace",
                "-y",
            ])
            .unwrap();
            match cli.command {
                Commands::Template(TemplateCommands::Apply { key, replace, yes }) => {
                    assert_eq!(key, "exam-sprint");
                    assert!(replace);
                    assert!(yes);
                }
                _ => panic!("Expected Template Apply command"),
            }
        }

        #[test]
        fn parse_invalid_command_fails() {
            assert!(Cli::try_parse_from(["studyplan", "invalid"]).is_err());
        }
    }
}
