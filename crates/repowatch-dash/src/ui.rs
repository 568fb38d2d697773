use crate::state::{App, InputFocus};
use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};

pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(4),
        ])
        .split(f.size());

    render_header(f, app, chunks[0]);
    render_rows(f, app, chunks[1]);
    render_footer(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let (label, tone) = if app.connected {
        ("connected", Color::Green)
    } else {
        ("disconnected", Color::Red)
    };
    let line = Line::from(vec![
        Span::styled("repowatch", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  watcher: "),
        Span::styled(label, tone),
        Span::raw(format!("  subscriptions: {}", app.subscriptions.len())),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn render_rows(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Stargazers");

    if app.view.is_empty() {
        let inner = block.inner(area);
        f.render_widget(block, area);
        let text = vec![
            Line::from(Span::styled("No repositories watched", Color::Yellow)),
            Line::from(""),
            Line::from("Type a repository and an interval below, then press Enter."),
        ];
        f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
        return;
    }

    let now = Utc::now();
    let rows: Vec<Row> = app
        .view
        .rows()
        .iter()
        .map(|row| {
            let style = if row.pulsing() {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let age_secs = (now - row.updated_at).num_seconds().max(0);
            Row::new(vec![
                Cell::from(row.repository.clone()),
                Cell::from(row.star_count.to_string()),
                Cell::from(format!("{age_secs}s ago")),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(24),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(
        Row::new(vec!["repository", "stars", "updated"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(block)
    .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
    .highlight_symbol("> ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Subscribe");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let field = |label: &str, value: &str, focused: bool| -> Vec<Span<'static>> {
        let style = if focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default()
        };
        vec![
            Span::raw(format!("{label}: ")),
            Span::styled(format!("{value}_"), style),
        ]
    };

    let mut line = field(
        "repository",
        &app.repo_input,
        app.focus == InputFocus::Repository,
    );
    line.push(Span::raw("   "));
    line.extend(field(
        "interval",
        &app.interval_input,
        app.focus == InputFocus::Interval,
    ));
    line.push(Span::raw(
        "   Enter subscribe | Tab switch | Del unsubscribe | Esc quit",
    ));

    let mut text = vec![Line::from(line)];
    if let Some(note) = &app.status_note {
        text.push(Line::from(Span::styled(note.clone(), Color::Yellow)));
    }
    f.render_widget(Paragraph::new(text), inner);
}
