//! Client detail pane: right panel, newest updates first.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};
use tressa_core::update::{AttachmentKind, ClientUpdate};

use crate::{app::App, ui::format_time};

/// Render the detail pane into `area`.
pub fn draw<A>(f: &mut Frame, area: Rect, app: &App<A>) {
  let name = app.selected.as_ref().map_or("(unknown)", |c| c.name.as_str());
  let updates = app.view.updates.as_ref();

  let title = match updates.and_then(|u| u.data.as_ref()) {
    Some(page) => format!(" {name} — {}/{} updates ", page.updates.len(), page.count),
    None => format!(" {name} "),
  };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let inner = block.inner(area);
  f.render_widget(block, area);

  let dim = Style::default().fg(Color::DarkGray);
  let Some(state) = updates else {
    f.render_widget(Paragraph::new("Press Enter to view a client.").style(dim), inner);
    return;
  };
  let Some(page) = &state.data else {
    let msg = match &state.error {
      Some(e) => format!("Error: {e}"),
      None => "Loading…".to_string(),
    };
    f.render_widget(Paragraph::new(msg).style(dim), inner);
    return;
  };
  if page.updates.is_empty() {
    f.render_widget(Paragraph::new("No updates yet.").style(dim), inner);
    return;
  }

  let mut lines: Vec<Line> = Vec::new();
  for (i, update) in page.updates.iter().enumerate() {
    if i > 0 {
      lines.push(Line::from(""));
    }
    lines.extend(update_lines(update));
  }

  let para = Paragraph::new(lines)
    .wrap(Wrap { trim: false })
    .scroll((app.detail_scroll as u16, 0));
  f.render_widget(para, inner);
}

fn update_lines(update: &ClientUpdate) -> Vec<Line<'static>> {
  let mut header = vec![
    Span::styled(
      format!("{:<16}", update.category.to_string()),
      Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD),
    ),
    Span::styled(format_time(update.created_at), Style::default().fg(Color::DarkGray)),
  ];
  if update.is_read() {
    header.push(Span::styled("  read", Style::default().fg(Color::Green)));
  }
  if update.liked {
    header.push(Span::styled("  ♥", Style::default().fg(Color::Red)));
  }
  if !update.reactions.is_empty() {
    header.push(Span::raw(format!("  {}", update.reactions.join(" "))));
  }

  let mut lines = vec![Line::from(header)];
  lines.extend(update.content.lines().map(|l| Line::from(l.to_string())));
  for a in &update.attachments {
    let icon = match a.kind {
      AttachmentKind::Image => "🖼 ",
      AttachmentKind::Document => "📄 ",
    };
    lines.push(Line::from(Span::styled(
      format!("{icon}{} ({} KiB)", a.file_name, a.size_bytes.div_ceil(1024)),
      Style::default().fg(Color::DarkGray),
    )));
  }
  lines
}
