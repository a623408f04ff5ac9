//! Rendering for the watch view.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};

use super::app::App;
use crate::models::ticker::Change;

/// Renders the market table and the status bar.
pub fn render(frame: &mut Frame, app: &App) {
    let [table_area, status_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());

    render_table(frame, table_area, app);
    render_status(frame, status_area, app);
}

fn render_table(frame: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(vec![
        Cell::from("Market"),
        Cell::from("Price"),
        Cell::from("24h"),
        Cell::from(format!("RSI({})", app.period)),
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = app.markets.iter().map(|market| {
        let color = match app.change(market) {
            Some(Change::Rise) => Color::Red,
            Some(Change::Fall) => Color::Blue,
            Some(Change::Even) | None => Color::Gray,
        };
        Row::new(vec![
            Cell::from(market.as_str()),
            Cell::from(app.price_label(market)).style(Style::default().fg(color)),
            Cell::from(app.change_label(market)).style(Style::default().fg(color)),
            Cell::from(app.rsi_label(market)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(16),
            Constraint::Length(9),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" coinpulse "));

    frame.render_widget(table, area);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let (label, color) = if app.is_live() {
        (" live ", Color::Green)
    } else {
        (" offline ", Color::Red)
    };

    let spans = vec![
        Span::styled(label, Style::default().fg(color)),
        Span::raw("│"),
        Span::raw(format!(" {} ", app.connection.as_str())),
        Span::raw("│"),
        Span::styled(
            format!(
                " frames {} / dropped {} ",
                app.frames.received,
                app.frames.dropped_malformed + app.frames.dropped_unknown
            ),
            Style::default().fg(Color::White),
        ),
        Span::raw("│"),
        Span::styled(" r reconnect  q quit ", Style::default().fg(Color::Gray)),
    ];

    let para = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(para, area);
}
