//! Client list pane: left panel.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::{app::App, ui::format_time};

/// Render the recent-clients list into `area`.
pub fn draw<A>(f: &mut Frame, area: Rect, app: &App<A>) {
  let filtered = app.filtered_clients();
  let total = app.view.recent.data.as_ref().map_or(0, Vec::len);

  let title = if app.filter_active || !app.filter.is_empty() {
    format!(" Clients ({}/{}) ", filtered.len(), total)
  } else {
    format!(" Clients ({total}) ")
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let mut inner_area = block.inner(area);
  f.render_widget(block, area);

  if app.view.recent.is_loading() {
    f.render_widget(
      Paragraph::new("Loading…").style(Style::default().fg(Color::DarkGray)),
      inner_area,
    );
    return;
  }
  if let Some(e) = &app.view.recent.error
    && app.view.recent.data.is_none()
  {
    f.render_widget(
      Paragraph::new(format!("Error: {e}")).style(Style::default().fg(Color::Red)),
      inner_area,
    );
    return;
  }

  let items: Vec<ListItem> = filtered
    .iter()
    .map(|client| {
      let last = client
        .last_update
        .map_or_else(|| "no updates".to_string(), format_time);
      ListItem::new(Line::from(vec![
        Span::raw(client.name.clone()),
        Span::styled(format!("  {last}"), Style::default().fg(Color::DarkGray)),
      ]))
    })
    .collect();

  if (app.filter_active || !app.filter.is_empty()) && inner_area.height > 2 {
    let filter_area = Rect {
      x:      inner_area.x,
      y:      inner_area.y + inner_area.height - 1,
      width:  inner_area.width,
      height: 1,
    };
    inner_area.height = inner_area.height.saturating_sub(1);

    let filter_text = if app.filter_active {
      format!("/{}_", app.filter)
    } else {
      format!("/{}", app.filter)
    };
    f.render_widget(
      Paragraph::new(filter_text).style(Style::default().fg(Color::Yellow)),
      filter_area,
    );
  }

  let mut state = ListState::default();
  state.select(if filtered.is_empty() {
    None
  } else {
    Some(app.list_cursor)
  });

  f.render_stateful_widget(
    List::new(items).highlight_style(
      Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD),
    ),
    inner_area,
    &mut state,
  );
}
