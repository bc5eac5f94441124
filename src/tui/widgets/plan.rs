use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::models::format_minute;
use crate::tui::App;

use super::week::truncate;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let total: u32 = app.plan.items.iter().map(|e| e.minutes).sum();

    let items: Vec<ListItem> = app
        .plan
        .items
        .iter()
        .map(|entry| {
            let finishes = entry.remaining_after == 0;
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<11}", entry.date.format("%a %d %b")),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!(
                        "{}-{}  ",
                        format_minute(entry.start),
                        format_minute(entry.end)
                    ),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<18}", truncate(&app.subject_name(entry.subject_id), 16)),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(
                    format!("{:<30}", truncate(&app.topic_name(entry.topic_id), 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:>4}m ", entry.minutes),
                    Style::default().fg(Color::Yellow),
                ),
                if finishes {
                    Span::styled("done", Style::default().fg(Color::Green))
                } else {
                    Span::styled(
                        format!("{}m left", entry.remaining_after),
                        Style::default().fg(Color::DarkGray),
                    )
                },
            ]))
        })
        .collect();

    let title = if app.plan.items.is_empty() {
        " Plan (nothing to allocate) ".to_string()
    } else {
        format!(
            " Smart plan: {} chunks, {}h{:02} ",
            app.plan.items.len(),
            total / 60,
            total % 60
        )
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
    state.select(app.plan.selected);

    f.render_stateful_widget(list, area, &mut state);
}
