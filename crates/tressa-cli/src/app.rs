//! Application state machine and event dispatcher.
//!
//! Every pane reads through the shared query cache once per frame, so the
//! dashboard shows cached data immediately and picks up background refetches
//! and optimistic patches on the next draw.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use tokio::sync::mpsc;
use tracing::debug;
use tressa_core::views::{AdminStats, ClientStatusCounts, RecentClient, UpdatesPage};
use tressa_sync::{AdminHooks, PortalApi, Query, QueryState, keys};
use uuid::Uuid;

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
  /// Focus on the client list.
  Dashboard,
  /// Focus on the selected client's updates.
  Detail,
}

/// What the panes draw this frame.
#[derive(Default)]
pub struct View {
  pub stats:   QueryState<AdminStats>,
  pub counts:  QueryState<ClientStatusCounts>,
  pub recent:  QueryState<Vec<RecentClient>>,
  pub updates: Option<QueryState<UpdatesPage>>,
}

/// Result of a mutation running in the background.
enum Done {
  Deleted(String),
  DeleteFailed(String, String),
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App<A> {
  pub screen: Screen,

  hooks:   AdminHooks<A>,
  stats:   Query<AdminStats>,
  counts:  Query<ClientStatusCounts>,
  recent:  Query<Vec<RecentClient>>,
  updates: Option<Query<UpdatesPage>>,

  /// Cache state as of the last [`App::sync_view`].
  pub view: View,

  /// Client whose updates are shown in the detail pane.
  pub selected: Option<RecentClient>,

  /// Current fuzzy-filter string (only active when `filter_active`).
  pub filter: String,

  /// Whether the user is typing a filter query.
  pub filter_active: bool,

  /// Cursor position within the *filtered* client list.
  pub list_cursor: usize,

  /// Scroll offset within the detail pane.
  pub detail_scroll: usize,

  /// Client awaiting a `y` to confirm deletion.
  pub confirm_delete: Option<RecentClient>,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  updates_limit: usize,
  done_tx:       mpsc::UnboundedSender<Done>,
  done_rx:       mpsc::UnboundedReceiver<Done>,
}

impl<A> App<A> {
  /// Clients that match the current filter query.
  pub fn filtered_clients(&self) -> Vec<&RecentClient> {
    let Some(list) = &self.view.recent.data else {
      return Vec::new();
    };
    if self.filter.is_empty() {
      return list.iter().collect();
    }
    let matcher = SkimMatcherV2::default();
    list
      .iter()
      .filter(|c| matcher.fuzzy_match(&c.name, &self.filter).is_some())
      .collect()
  }

  /// The client under the list cursor in the filtered view, if any.
  pub fn cursor_client(&self) -> Option<&RecentClient> {
    self.filtered_clients().get(self.list_cursor).copied()
  }

  pub fn selected_id(&self) -> Option<Uuid> { self.selected.as_ref().map(|c| c.id) }
}

impl<A: PortalApi> App<A> {
  pub fn new(hooks: AdminHooks<A>, recent_limit: usize, updates_limit: usize) -> Self {
    let (done_tx, done_rx) = mpsc::unbounded_channel();
    Self {
      screen: Screen::Dashboard,
      stats: hooks.stats(),
      counts: hooks.client_stats(),
      recent: hooks.recent_clients(recent_limit),
      updates: None,
      hooks,
      view: View::default(),
      selected: None,
      filter: String::new(),
      filter_active: false,
      list_cursor: 0,
      detail_scroll: 0,
      confirm_delete: None,
      status_msg: String::new(),
      updates_limit,
      done_tx,
      done_rx,
    }
  }

  // ── Data ──────────────────────────────────────────────────────────────────

  /// Wait for the first dashboard load so startup errors are reported
  /// before the terminal is taken over.
  pub async fn load(&mut self) -> anyhow::Result<()> {
    self.stats.fetch().await?;
    self.counts.fetch().await?;
    self.recent.fetch().await?;
    self.sync_view();
    Ok(())
  }

  /// Read every visible query. Stale entries start a background refetch.
  pub fn sync_view(&mut self) {
    self.view.stats = self.stats.read().unwrap_or_default();
    self.view.counts = self.counts.read().unwrap_or_default();
    self.view.recent = self.recent.read().unwrap_or_default();
    self.view.updates = self.updates.as_ref().map(|q| q.read().unwrap_or_default());

    // The selected client may have been deleted from under us.
    if let (Some(sel), Some(list)) = (&self.selected, &self.view.recent.data)
      && !list.iter().any(|c| c.id == sel.id)
    {
      self.close_detail();
    }
    let len = self.filtered_clients().len();
    if self.list_cursor >= len {
      self.list_cursor = len.saturating_sub(1);
    }
  }

  /// Pick up results of background mutations.
  pub fn poll_background(&mut self) {
    while let Ok(done) = self.done_rx.try_recv() {
      self.status_msg = match done {
        Done::Deleted(name) => format!("Deleted {name}"),
        Done::DeleteFailed(name, e) => format!("Could not delete {name}: {e}"),
      };
    }
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return Ok(false);
    }

    if let Some(client) = self.confirm_delete.take() {
      if key.code == KeyCode::Char('y') {
        self.delete(client);
      } else {
        self.status_msg = "Delete cancelled".into();
      }
      return Ok(true);
    }

    if self.filter_active {
      self.handle_filter_key(key);
      return Ok(true);
    }

    match self.screen {
      Screen::Dashboard => Ok(self.handle_list_key(key)),
      Screen::Detail => Ok(self.handle_detail_key(key)),
    }
  }

  fn handle_filter_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.filter_active = false;
        self.filter.clear();
        self.list_cursor = 0;
      }
      KeyCode::Enter => {
        self.filter_active = false;
        self.list_cursor = 0;
        // Open the client straight away if there's exactly one match.
        let only = match self.filtered_clients().as_slice() {
          [only] => Some((*only).clone()),
          _ => None,
        };
        if let Some(client) = only {
          self.open_detail(client);
        }
      }
      KeyCode::Backspace => {
        self.filter.pop();
        self.list_cursor = 0;
      }
      KeyCode::Char(c) => {
        self.filter.push(c);
        self.list_cursor = 0;
      }
      _ => {}
    }
  }

  fn handle_list_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('q') => return false,

      KeyCode::Down | KeyCode::Char('j') => {
        if self.list_cursor + 1 < self.filtered_clients().len() {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.list_cursor = self.list_cursor.saturating_sub(1);
      }

      KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
        if let Some(client) = self.cursor_client().cloned() {
          self.open_detail(client);
        }
      }

      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
        self.list_cursor = 0;
      }

      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('d') => self.ask_delete(),

      _ => {}
    }
    true
  }

  fn handle_detail_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('q') => return false,

      KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => self.close_detail(),

      KeyCode::Down | KeyCode::Char('j') => self.detail_scroll += 1,
      KeyCode::Up | KeyCode::Char('k') => {
        self.detail_scroll = self.detail_scroll.saturating_sub(1);
      }

      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('d') => self.ask_delete(),

      _ => {}
    }
    true
  }

  // ── Actions ───────────────────────────────────────────────────────────────

  fn open_detail(&mut self, client: RecentClient) {
    self.updates = Some(self.hooks.client_updates(client.id, self.updates_limit));
    self.selected = Some(client);
    self.detail_scroll = 0;
    self.screen = Screen::Detail;
    self.sync_view();
  }

  fn close_detail(&mut self) {
    self.screen = Screen::Dashboard;
    self.selected = None;
    self.updates = None;
    self.view.updates = None;
  }

  /// Mark the dashboard (and the open client, if any) stale; refetches run
  /// in the background.
  fn refresh(&mut self) {
    let cache = self.hooks.cache();
    let mut n = cache.invalidate(&keys::admin::all());
    if let Some(sel) = &self.selected {
      n += cache.invalidate(&keys::client::all(sel.id));
    }
    self.status_msg = format!("Refreshing {n} queries…");
  }

  fn ask_delete(&mut self) {
    let target = match self.screen {
      Screen::Detail => self.selected.clone(),
      Screen::Dashboard => self.cursor_client().cloned(),
    };
    if let Some(client) = target {
      self.status_msg = format!("Delete {} and all their updates? [y/N]", client.name);
      self.confirm_delete = Some(client);
    }
  }

  /// Delete in the background. The row disappears on the next frame and
  /// comes back if the server refuses.
  fn delete(&mut self, client: RecentClient) {
    let hooks = self.hooks.clone();
    let tx = self.done_tx.clone();
    self.status_msg = format!("Deleting {}…", client.name);
    tokio::spawn(async move {
      let id = client.id;
      let done = match hooks.delete_client(id).await {
        Ok(()) => Done::Deleted(client.name),
        Err(e) => Done::DeleteFailed(client.name, e.to_string()),
      };
      if tx.send(done).is_err() {
        debug!(client_id = %id, "dashboard closed, delete outcome discarded");
      }
    });
  }
}
