use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{history, plan, reviews, week};
use super::{App, StatusLevel, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status line
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_status(f, app, chunks[2]);
    draw_help_bar(f, app, chunks[3]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let tab_titles = vec!["Week", "Plan", "Reviews", "History"];
    let selected = match app.view {
        View::Week => 0,
        View::Plan => 1,
        View::Reviews => 2,
        View::History => 3,
    };

    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title(" Studyplan "))
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Week => week::draw(f, app, area),
        View::Plan => plan::draw(f, app, area),
        View::Reviews => reviews::draw(f, app, area),
        View::History => history::draw(f, app, area),
    }
}

fn draw_status(f: &mut Frame, app: &App, area: Rect) {
    let Some(status) = &app.status else {
        return;
    };
    let color = match status.level {
        StatusLevel::Info => Color::Green,
        StatusLevel::Warn => Color::Yellow,
        StatusLevel::Error => Color::Red,
    };
    f.render_widget(
        Paragraph::new(Span::styled(status.text.as_str(), Style::default().fg(color))),
        area,
    );
}

fn key(k: &str) -> Span<'_> {
    Span::styled(k, Style::default().fg(Color::Cyan))
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![key("h/l"), Span::raw(" Views  ")];

    match app.view {
        View::Week => {
            spans.extend(vec![
                key("j/k"),
                Span::raw(" Nav  "),
                key("H/L"),
                Span::raw(" Day  "),
                key("J/K"),
                Span::raw(" Time  "),
                key("+/-"),
                Span::raw(" Resize  "),
                key("x"),
                Span::raw(" Delete  "),
            ]);
            if app.suggestion.is_some() {
                spans.extend(vec![key("y"), Span::raw(" Take suggestion  ")]);
            }
        }
        View::Plan => {
            spans.extend(vec![
                key("j/k"),
                Span::raw(" Nav  "),
                key("c"),
                Span::raw(" Commit  "),
            ]);
        }
        View::Reviews => {
            spans.extend(vec![
                key("j/k"),
                Span::raw(" Nav  "),
                key("<CR>"),
                Span::raw(" Reviewed  "),
            ]);
        }
        View::History => {}
    }

    spans.extend(vec![
        key("u"),
        Span::raw(" Undo  "),
        key("U/^r"),
        Span::raw(" Redo  "),
        key("r"),
        Span::raw(" Reload  "),
        key("q"),
        Span::raw(" Quit"),
    ]);

    let help = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));

    f.render_widget(help, area);
}
