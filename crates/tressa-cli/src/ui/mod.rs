//! TUI rendering: orchestrates all panes.

pub mod client_detail;
pub mod client_list;

use chrono::{DateTime, Local, Utc};
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, Screen};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw<A>(f: &mut Frame, app: &App<A>) {
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Length(3), // stats
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(f.area());

  draw_header(f, rows[0]);
  draw_stats(f, rows[1], app);
  draw_body(f, rows[2], app);
  draw_status(f, rows[3], app);
}

/// Local-time rendering used across panes.
pub fn format_time(t: DateTime<Utc>) -> String {
  t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect) {
  let date = Local::now().format("%Y-%m-%d").to_string();

  let left = Span::styled(
    " tressa  [/] search  [r] refresh  [q] quit",
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );
  let right = Span::styled(format!("{date} "), Style::default().fg(Color::DarkGray));

  let pad = area
    .width
    .saturating_sub(left.content.len() as u16)
    .saturating_sub(right.content.len() as u16);

  let line = Line::from(vec![left, Span::raw(" ".repeat(pad as usize)), right]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Stats ────────────────────────────────────────────────────────────────────

fn draw_stats<A>(f: &mut Frame, area: Rect, app: &App<A>) {
  let label = Style::default().fg(Color::DarkGray);
  let value = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
  let num = |n: Option<u64>| n.map_or_else(|| "…".to_string(), |n| n.to_string());

  let stats = app.view.stats.data;
  let counts = app.view.counts.data;
  let line = Line::from(vec![
    Span::styled(" clients ", label),
    Span::styled(num(stats.map(|s| s.clients_count)), value),
    Span::styled("   updates ", label),
    Span::styled(num(stats.map(|s| s.updates_count)), value),
    Span::styled("   posts ", label),
    Span::styled(num(stats.map(|s| s.posts_count)), value),
    Span::styled("   with appointment ", label),
    Span::styled(num(counts.map(|c| c.with_appointment)), value),
    Span::styled("   without ", label),
    Span::styled(num(counts.map(|c| c.without_appointment)), value),
  ]);

  let fetching = app.view.stats.is_fetching || app.view.counts.is_fetching;
  let title = if fetching { " Dashboard ⟳ " } else { " Dashboard " };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body<A>(f: &mut Frame, area: Rect, app: &App<A>) {
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
    .split(area);

  client_list::draw(f, cols[0], app);

  if app.selected.is_some() {
    client_detail::draw(f, cols[1], app);
  } else {
    draw_empty_detail(f, cols[1]);
  }
}

fn draw_empty_detail(f: &mut Frame, area: Rect) {
  let block = Block::default()
    .title(" Updates ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(
    Paragraph::new("Select a client and press Enter.").style(Style::default().fg(Color::DarkGray)),
    inner,
  );
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status<A>(f: &mut Frame, area: Rect, app: &App<A>) {
  let (mode_label, hints) = match &app.screen {
    _ if app.confirm_delete.is_some() => ("CONFIRM", ""),
    Screen::Dashboard if app.filter_active => ("SEARCH", "Type to filter  Esc cancel  Enter select"),
    Screen::Dashboard => (
      "NORMAL",
      "↑↓/jk navigate  / search  Enter updates  d delete  r refresh  q quit",
    ),
    Screen::Detail => ("UPDATES", "↑↓/jk scroll  Esc back  d delete  r refresh  q quit"),
  };

  let status = if app.status_msg.is_empty() {
    hints.to_string()
  } else {
    app.status_msg.clone()
  };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(format!("  {status}"), Style::default().fg(Color::DarkGray));

  f.render_widget(
    Paragraph::new(Line::from(vec![mode_span, hint_span])).style(Style::default().bg(Color::Black)),
    area,
  );
}
