use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::models::TopicProgress;
use crate::tui::App;

use super::week::truncate;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    draw_due(f, app, chunks[0]);
    draw_upcoming(f, app, chunks[1]);
}

fn review_line<'a>(app: &App, p: &TopicProgress, color: Color) -> Line<'a> {
    let date = p
        .next_review_date
        .map(|d| d.format("%b %d").to_string())
        .unwrap_or_default();
    Line::from(vec![
        Span::styled(
            format!("{:<28}", truncate(&app.topic_name(p.topic_id), 26)),
            Style::default().fg(Color::White),
        ),
        Span::styled(format!("{:<8}", date), Style::default().fg(color)),
        Span::styled(
            format!("#{}", p.review_count + 1),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn draw_due(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .due
        .items
        .iter()
        .map(|p| {
            let overdue = p.next_review_date.map(|d| d < app.today).unwrap_or(false);
            let color = if overdue { Color::Red } else { Color::Yellow };
            ListItem::new(review_line(app, p, color))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Due ({}) ", app.due.items.len()))
                .title_style(Style::default().fg(Color::Yellow)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.due.selected);

    f.render_stateful_widget(list, area, &mut state);
}

fn draw_upcoming(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .upcoming
        .iter()
        .map(|p| ListItem::new(review_line(app, p, Color::Cyan)))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Next {} days ", app.horizon_days))
            .title_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(list, area);
}
