use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let editor = app.editor();
    let log = editor.history_log();

    let items: Vec<ListItem> = log
        .iter()
        .map(|(current, entry)| {
            let marker = if *current { "● " } else { "  " };
            let style = if *current {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Yellow)),
                Span::styled(
                    format!(
                        "{:<10}",
                        entry.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S")
                    ),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format!("{:<18}", entry.action.label()), style),
                Span::styled(
                    format!("{} slots", entry.slots.len()),
                    Style::default().fg(Color::Gray),
                ),
            ]))
        })
        .collect();

    let mut flags = Vec::new();
    if editor.can_undo() {
        flags.push("undo");
    }
    if editor.can_redo() {
        flags.push("redo");
    }
    let title = if flags.is_empty() {
        format!(" History ({}) ", log.len())
    } else {
        format!(" History ({}, can {}) ", log.len(), flags.join("/"))
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(list, area);
}
