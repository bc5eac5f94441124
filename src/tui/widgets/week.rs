use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::conflict::DAYS_PER_WEEK;
use crate::models::{day_label, format_minute, EnergyLevel};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Day totals
            Constraint::Min(0),    // Slot list
        ])
        .split(area);

    draw_totals(f, app, chunks[0]);
    draw_slots(f, app, chunks[1]);
}

fn draw_totals(f: &mut Frame, app: &App, area: Rect) {
    let mut days = Vec::new();
    let mut hours = Vec::new();
    for day in 1..=DAYS_PER_WEEK {
        let minutes: u32 = app
            .slots
            .items
            .iter()
            .filter(|s| s.day == day)
            .map(|s| s.duration())
            .sum();
        let color = if minutes == 0 {
            Color::DarkGray
        } else {
            Color::White
        };
        days.push(Span::styled(
            format!("{:<8}", day_label(day)),
            Style::default().fg(Color::Gray),
        ));
        hours.push(Span::styled(
            format!("{:<8}", format!("{}h{:02}", minutes / 60, minutes % 60)),
            Style::default().fg(color),
        ));
    }

    let grid = app.editor().grid();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(
            " Week of {}  ({}-{}, {}m steps) ",
            app.week_start.format("%d %b"),
            format_minute(grid.open),
            format_minute(grid.close),
            grid.step
        ))
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(
        Paragraph::new(vec![Line::from(days), Line::from(hours)]).block(block),
        area,
    );
}

fn draw_slots(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .slots
        .items
        .iter()
        .map(|slot| {
            let highlighted = app
                .suggestion
                .map(|s| s.slot_id == slot.id)
                .unwrap_or(false);
            let name_color = if highlighted { Color::Yellow } else { Color::White };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<5}", day_label(slot.day)),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:<13}", slot.time_label()),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<28}", truncate(&app.subject_name(slot.subject_id), 26)),
                    Style::default().fg(name_color),
                ),
                Span::styled(
                    format!("{:>4}m  ", slot.duration()),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(
                    slot.energy_type().label(),
                    Style::default().fg(energy_color(slot.energy_type())),
                ),
            ]))
        })
        .collect();

    let title = if app.slots.items.is_empty() {
        " Slots (empty: add some with `studyplan slot add`) ".to_string()
    } else {
        format!(" Slots ({}) ", app.slots.items.len())
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.slots.selected);

    f.render_stateful_widget(list, area, &mut state);
}

pub(crate) fn energy_color(level: EnergyLevel) -> Color {
    match level {
        EnergyLevel::High => Color::Green,
        EnergyLevel::Medium => Color::Yellow,
        EnergyLevel::Low => Color::Blue,
    }
}

pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
