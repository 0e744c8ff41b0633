//! Behavioural tests for the cache, hooks, and mutations against an
//! in-memory fake of the portal API. Time is paused so staleness windows can
//! be crossed with `tokio::time::advance`.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex},
  time::Duration,
};

use chrono::Utc;
use tokio::{sync::Semaphore, time::advance};
use tressa_core::{
  client::{Credentials, NewClient},
  update::{ClientUpdate, UpdateCategory},
  views::{
    AdminStats, ClientStatusCounts, PostSummary, ProfileSummary, RecentClient, UpdatesPage,
  },
};
use uuid::Uuid;

use crate::{
  AdminHooks, CacheEventKind, ClientHooks, OptimisticTx, PortalApi, QueryCache, StaleTimes,
  SyncError, TxState, error::Result, keys,
};

// ─── Fake API ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Server {
  stats:        AdminStats,
  recent:       Vec<RecentClient>,
  client_stats: ClientStatusCounts,
  page:         UpdatesPage,
  posts:        Vec<PostSummary>,
}

/// Records every call; methods named in `gated` wait for a permit, methods
/// named in `failing` answer with `Rejected`.
struct FakeApi {
  server:  Mutex<Server>,
  calls:   Mutex<Vec<&'static str>>,
  gated:   Mutex<HashSet<&'static str>>,
  failing: Mutex<HashSet<&'static str>>,
  gate:    Semaphore,
}

impl FakeApi {
  fn new(server: Server) -> Arc<Self> {
    Arc::new(Self {
      server:  Mutex::new(server),
      calls:   Mutex::default(),
      gated:   Mutex::default(),
      failing: Mutex::default(),
      gate:    Semaphore::new(0),
    })
  }

  fn calls(&self, name: &str) -> usize {
    self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
  }

  fn gate(&self, name: &'static str) { self.gated.lock().unwrap().insert(name); }

  fn release(&self, n: usize) { self.gate.add_permits(n); }

  fn fail(&self, name: &'static str) { self.failing.lock().unwrap().insert(name); }

  fn recover(&self, name: &'static str) { self.failing.lock().unwrap().remove(name); }

  fn with<R>(&self, f: impl FnOnce(&mut Server) -> R) -> R { f(&mut self.server.lock().unwrap()) }

  async fn enter(&self, name: &'static str) -> Result<()> {
    self.calls.lock().unwrap().push(name);
    let gated = self.gated.lock().unwrap().contains(name);
    if gated {
      self.gate.acquire().await.unwrap().forget();
    }
    let failing = self.failing.lock().unwrap().contains(name);
    if failing {
      return Err(SyncError::Rejected(format!("{name} refused")));
    }
    Ok(())
  }

  fn edit_update(&self, id: Uuid, f: impl FnOnce(&mut ClientUpdate)) -> Result<ClientUpdate> {
    self.with(|s| {
      let update = s
        .page
        .updates
        .iter_mut()
        .find(|u| u.id == id)
        .ok_or_else(|| SyncError::Rejected("update not found".into()))?;
      f(update);
      Ok(update.clone())
    })
  }
}

impl PortalApi for FakeApi {
  async fn admin_stats(&self) -> Result<AdminStats> {
    self.enter("admin_stats").await?;
    Ok(self.with(|s| s.stats))
  }

  async fn recent_clients(&self, limit: usize) -> Result<Vec<RecentClient>> {
    self.enter("recent_clients").await?;
    Ok(self.with(|s| s.recent.iter().take(limit).cloned().collect()))
  }

  async fn client_stats(&self) -> Result<ClientStatusCounts> {
    self.enter("client_stats").await?;
    Ok(self.with(|s| s.client_stats))
  }

  async fn client_updates(&self, _client_id: Uuid, limit: usize) -> Result<UpdatesPage> {
    self.enter("client_updates").await?;
    Ok(self.with(|s| UpdatesPage {
      updates: s.page.updates.iter().take(limit).cloned().collect(),
      count:   s.page.count,
    }))
  }

  async fn create_client(&self, input: NewClient) -> Result<Credentials> {
    self.enter("create_client").await?;
    self.with(|s| {
      s.stats.clients_count += 1;
      s.client_stats.total += 1;
    });
    Ok(Credentials {
      email:    input.email,
      password: "generated".into(),
    })
  }

  async fn delete_client(&self, id: Uuid) -> Result<()> {
    self.enter("delete_client").await?;
    self.with(|s| {
      s.recent.retain(|c| c.id != id);
      s.stats.clients_count -= 1;
      s.client_stats.total -= 1;
      s.client_stats.without_appointment -= 1;
    });
    Ok(())
  }

  async fn profile(&self) -> Result<ProfileSummary> {
    self.enter("profile").await?;
    Ok(ProfileSummary {
      id:         Uuid::nil(),
      name:       "Ana".into(),
      avatar_url: None,
    })
  }

  async fn my_updates(&self, limit: usize) -> Result<UpdatesPage> {
    self.enter("my_updates").await?;
    Ok(self.with(|s| UpdatesPage {
      updates: s.page.updates.iter().take(limit).cloned().collect(),
      count:   s.page.count,
    }))
  }

  async fn mark_read(&self, update_id: Uuid) -> Result<ClientUpdate> {
    self.enter("mark_read").await?;
    self.edit_update(update_id, |u| {
      u.read_at.get_or_insert_with(Utc::now);
    })
  }

  async fn set_liked(&self, update_id: Uuid, liked: bool) -> Result<ClientUpdate> {
    self.enter("set_liked").await?;
    self.edit_update(update_id, |u| u.liked = liked)
  }

  async fn add_reaction(&self, update_id: Uuid, emoji: String) -> Result<ClientUpdate> {
    self.enter("add_reaction").await?;
    self.edit_update(update_id, |u| u.reactions.push(emoji))
  }

  async fn posts(&self, limit: usize) -> Result<Vec<PostSummary>> {
    self.enter("posts").await?;
    Ok(self.with(|s| s.posts.iter().take(limit).cloned().collect()))
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

/// Let spawned fetch tasks run to their next await point.
async fn settle() {
  for _ in 0..16 {
    tokio::task::yield_now().await;
  }
}

fn c42() -> Uuid { Uuid::from_u128(42) }

fn recent(id: Uuid, name: &str) -> RecentClient {
  RecentClient {
    id,
    name: name.into(),
    avatar_url: None,
    last_update: None,
  }
}

fn dashboard() -> Server {
  Server {
    stats: AdminStats {
      clients_count: 17,
      posts_count:   3,
      updates_count: 40,
    },
    recent: vec![
      recent(c42(), "Ana"),
      recent(Uuid::from_u128(7), "Beatriz"),
      recent(Uuid::from_u128(9), "Carla"),
    ],
    client_stats: ClientStatusCounts {
      total:               17,
      with_appointment:    5,
      without_appointment: 12,
    },
    ..Default::default()
  }
}

fn update(client_id: Uuid, n: u128) -> ClientUpdate {
  ClientUpdate {
    id: Uuid::from_u128(1000 + n),
    client_id,
    category: UpdateCategory::Evolution,
    content: format!("update {n}"),
    created_at: Utc::now(),
    attachments: Vec::new(),
    read_at: None,
    liked: false,
    reactions: Vec::new(),
  }
}

fn feed(client_id: Uuid) -> Server {
  Server {
    page: UpdatesPage {
      updates: (1..=3).map(|n| update(client_id, n)).collect(),
      count:   3,
    },
    ..Default::default()
  }
}

fn admin(api: &Arc<FakeApi>) -> AdminHooks<FakeApi> {
  AdminHooks::new(QueryCache::new(), Arc::clone(api), StaleTimes::default())
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn initial_data_is_served_without_fetching() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);
  let stats = hooks.stats().with_initial_data(AdminStats {
    clients_count: 17,
    ..Default::default()
  });

  let state = stats.read().unwrap();
  assert_eq!(state.data.map(|s| s.clients_count), Some(17));
  assert!(!state.is_fetching);

  settle().await;
  assert_eq!(stats.fetch().await.unwrap().clients_count, 17);
  assert_eq!(api.calls("admin_stats"), 0);
}

#[tokio::test(start_paused = true)]
async fn initial_data_does_not_overwrite_cached_value() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);
  hooks.cache().set(keys::admin::stats(), AdminStats {
    clients_count: 5,
    ..Default::default()
  });

  let stats = hooks.stats().with_initial_data(AdminStats::default());
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 5);
}

#[tokio::test(start_paused = true)]
async fn staleness_window_boundary() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);
  let window = StaleTimes::default().admin_stats;
  let stats = hooks.stats().with_initial_data(AdminStats::default());

  advance(window).await;
  assert!(!stats.read().unwrap().is_fetching);

  advance(Duration::from_millis(1)).await;
  let state = stats.read().unwrap();
  assert!(state.is_fetching);
  // The stale value stays visible while the refetch runs.
  assert!(state.data.is_some());

  settle().await;
  assert_eq!(api.calls("admin_stats"), 1);
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 17);
}

#[tokio::test(start_paused = true)]
async fn stale_reads_share_one_fetch() {
  let api = FakeApi::new(dashboard());
  api.with(|s| s.stats.clients_count = 18);
  api.gate("admin_stats");
  let hooks = admin(&api);
  let stats = hooks.stats().with_initial_data(AdminStats {
    clients_count: 17,
    ..Default::default()
  });

  advance(StaleTimes::default().admin_stats + Duration::from_secs(1)).await;

  assert!(stats.read().unwrap().is_fetching);
  assert!(stats.read().unwrap().is_fetching);
  let fetch = tokio::spawn({
    let q = stats.clone();
    async move { q.fetch().await }
  });
  let refetch = tokio::spawn({
    let q = stats.clone();
    async move { q.refetch().await }
  });
  settle().await;
  assert_eq!(api.calls("admin_stats"), 1);

  api.release(1);
  assert_eq!(fetch.await.unwrap().unwrap().clients_count, 18);
  assert_eq!(refetch.await.unwrap().unwrap().clients_count, 18);
  assert_eq!(api.calls("admin_stats"), 1);

  let state = stats.read().unwrap();
  assert!(!state.is_fetching);
  assert_eq!(state.data.unwrap().clients_count, 18);
}

#[tokio::test(start_paused = true)]
async fn empty_entry_is_loading_until_first_fetch() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);
  let recent = hooks.recent_clients(2);

  assert!(recent.read().unwrap().is_loading());
  settle().await;

  let state = recent.read().unwrap();
  assert!(!state.is_loading());
  assert_eq!(state.data.unwrap().len(), 2);
  assert_eq!(api.calls("recent_clients"), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_keeps_last_good_value() {
  let api = FakeApi::new(dashboard());
  api.fail("admin_stats");
  let hooks = admin(&api);
  let stats = hooks.stats().with_initial_data(AdminStats {
    clients_count: 11,
    ..Default::default()
  });

  let err = stats.refetch().await.unwrap_err();
  assert!(matches!(err, SyncError::Rejected(_)));

  let state = stats.read().unwrap();
  assert_eq!(state.data.unwrap().clients_count, 11);
  assert!(matches!(state.error, Some(SyncError::Rejected(_))));

  api.recover("admin_stats");
  stats.refetch().await.unwrap();
  assert!(stats.read().unwrap().error.is_none());
}

#[tokio::test(start_paused = true)]
async fn different_limits_are_separate_entries() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);

  assert_eq!(hooks.recent_clients(1).fetch().await.unwrap().len(), 1);
  assert_eq!(hooks.recent_clients(5).fetch().await.unwrap().len(), 3);
  assert_eq!(api.calls("recent_clients"), 2);
  assert_eq!(hooks.cache().keys(&keys::admin::recent_clients_all()).len(), 2);
}

// ─── Cache primitives ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancelled_fetch_result_is_dropped() {
  let api = FakeApi::new(dashboard());
  api.gate("admin_stats");
  let hooks = admin(&api);
  let stats = hooks.stats();

  let waiter = tokio::spawn({
    let q = stats.clone();
    async move { q.refetch().await }
  });
  settle().await;
  assert!(stats.read().unwrap().is_fetching);

  assert_eq!(hooks.cache().cancel(&keys::admin::all()), 1);
  hooks.cache().set(keys::admin::stats(), AdminStats {
    clients_count: 99,
    ..Default::default()
  });
  api.release(1);
  settle().await;

  assert!(matches!(waiter.await.unwrap(), Err(SyncError::Cancelled)));
  let state = stats.read().unwrap();
  assert_eq!(state.data.unwrap().clients_count, 99);
  assert!(!state.is_fetching);
}

#[tokio::test(start_paused = true)]
async fn invalidate_refetches_registered_entries() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);
  let cache = hooks.cache().clone();
  let stats = hooks.stats().with_initial_data(AdminStats::default());
  let orphan = keys::admin::all().with("orphan");
  cache.set(orphan.clone(), 1u32);
  cache.set(keys::posts::list(5), Vec::<PostSummary>::new());

  let mut events = cache.subscribe(keys::admin::all());
  assert_eq!(cache.invalidate(&keys::admin::all()), 2);
  settle().await;

  assert_eq!(api.calls("admin_stats"), 1);
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 17);
  assert_eq!(cache.get::<u32>(&orphan).unwrap(), Some(1));

  let mut seen = Vec::new();
  while let Some(ev) = events.try_recv() {
    seen.push((ev.key, ev.kind));
  }
  assert!(seen.contains(&(orphan.clone(), CacheEventKind::Invalidated)));
  assert!(seen.contains(&(keys::admin::stats(), CacheEventKind::Invalidated)));
  assert!(seen.contains(&(keys::admin::stats(), CacheEventKind::Updated)));
  assert!(seen.iter().all(|(k, _)| k.starts_with(&keys::admin::all())));
}

#[tokio::test(start_paused = true)]
async fn invalidating_during_a_fetch_refetches_after_it() {
  let api = FakeApi::new(dashboard());
  api.gate("admin_stats");
  let hooks = admin(&api);
  let stats = hooks.stats();

  stats.read().unwrap();
  settle().await;
  hooks.cache().invalidate(&keys::admin::stats());
  api.with(|s| s.stats.clients_count = 20);
  api.release(2);
  settle().await;

  assert_eq!(api.calls("admin_stats"), 2);
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 20);
}

#[tokio::test]
async fn get_with_wrong_type_is_an_error() {
  let cache = QueryCache::new();
  cache.set(keys::admin::stats(), 5u32);

  let err = cache.get::<String>(&keys::admin::stats()).unwrap_err();
  assert!(matches!(err, SyncError::TypeMismatch(k) if k == keys::admin::stats()));
  assert_eq!(cache.get::<u32>(&keys::admin::stats()).unwrap(), Some(5));
}

#[tokio::test]
async fn remove_drops_only_the_prefix() {
  let cache = QueryCache::new();
  let a = Uuid::new_v4();
  let b = Uuid::new_v4();
  cache.set(keys::client::profile(a), 1u8);
  cache.set(keys::client::updates(a, 5), 2u8);
  cache.set(keys::client::profile(b), 3u8);

  assert_eq!(cache.remove(&keys::client::all(a)), 2);
  assert!(cache.keys(&keys::client::all(a)).is_empty());
  assert_eq!(cache.get::<u8>(&keys::client::profile(b)).unwrap(), Some(3));
}

// ─── Optimistic transactions ─────────────────────────────────────────────────

#[test]
fn dropping_a_patched_transaction_rolls_back() {
  let cache = QueryCache::new();
  cache.set(keys::admin::stats(), AdminStats {
    clients_count: 3,
    ..Default::default()
  });

  {
    let mut tx = OptimisticTx::begin(&cache, [keys::admin::all()]);
    assert_eq!(tx.state(), TxState::Idle);
    let n = tx.patch(&keys::admin::stats(), |s: &mut AdminStats| s.clients_count = 0);
    assert_eq!(n, 1);
    assert_eq!(tx.state(), TxState::Patched);
    let patched = cache.get::<AdminStats>(&keys::admin::stats()).unwrap();
    assert_eq!(patched.unwrap().clients_count, 0);
  }

  let restored = cache.get::<AdminStats>(&keys::admin::stats()).unwrap();
  assert_eq!(restored.unwrap().clients_count, 3);
}

#[test]
fn patch_only_touches_snapshotted_entries_of_its_type() {
  let cache = QueryCache::new();
  cache.set(keys::admin::recent_clients(5), vec![recent(c42(), "Ana")]);
  cache.set(keys::admin::stats(), AdminStats::default());

  let mut tx = OptimisticTx::begin(&cache, [keys::admin::all()]);
  cache.set(keys::admin::recent_clients(10), vec![recent(c42(), "Ana")]);

  let n = tx.patch(&keys::admin::all(), |list: &mut Vec<RecentClient>| list.clear());
  assert_eq!(n, 1);
  let late = cache.get::<Vec<RecentClient>>(&keys::admin::recent_clients(10));
  assert_eq!(late.unwrap().unwrap().len(), 1);
  tx.rollback();
}

#[tokio::test(start_paused = true)]
async fn optimistic_delete_applies_at_once_then_reconciles() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);
  let server = dashboard();
  let stats = hooks.stats().with_initial_data(server.stats);
  let recent5 = hooks.recent_clients(5).with_initial_data(server.recent.clone());
  let recent10 = hooks.recent_clients(10).with_initial_data(server.recent.clone());
  let counts = hooks.client_stats().with_initial_data(server.client_stats);
  let profile = keys::client::profile(c42());
  hooks.cache().set(profile.clone(), ProfileSummary {
    id:         c42(),
    name:       "Ana".into(),
    avatar_url: None,
  });

  api.gate("delete_client");
  let task = tokio::spawn({
    let hooks = hooks.clone();
    async move { hooks.delete_client(c42()).await }
  });
  settle().await;

  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 16);
  for list in [&recent5, &recent10] {
    let rows = list.read().unwrap().data.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|c| c.id != c42()));
  }
  let guessed = counts.read().unwrap().data.unwrap();
  assert_eq!(guessed.total, 16);
  assert_eq!((guessed.with_appointment, guessed.without_appointment), (5, 12));
  assert_eq!(api.calls("admin_stats"), 0);

  api.release(1);
  task.await.unwrap().unwrap();
  settle().await;

  // Commit refetched the dashboard; the server agrees with the guess.
  assert_eq!(api.calls("admin_stats"), 1);
  assert_eq!(api.calls("recent_clients"), 2);
  assert_eq!(api.calls("client_stats"), 1);
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 16);
  assert_eq!(recent5.read().unwrap().data.unwrap().len(), 2);
  let counts = counts.read().unwrap().data.unwrap();
  assert_eq!(counts.total, 16);
  assert_eq!(counts.without_appointment, 11);
  assert!(hooks.cache().keys(&keys::client::all(c42())).is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_optimistic_delete_restores_exact_snapshot() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);
  let server = dashboard();
  let stats = hooks.stats().with_initial_data(server.stats);
  let recent5 = hooks.recent_clients(5).with_initial_data(server.recent.clone());
  let counts = hooks.client_stats().with_initial_data(server.client_stats);
  let before_stats = stats.read().unwrap();
  let before_recent = recent5.read().unwrap();

  api.gate("delete_client");
  api.fail("delete_client");
  let task = tokio::spawn({
    let hooks = hooks.clone();
    async move { hooks.delete_client(c42()).await }
  });
  settle().await;
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 16);

  advance(Duration::from_secs(5)).await;
  api.release(1);
  let err = task.await.unwrap().unwrap_err();
  assert!(matches!(err, SyncError::Rejected(_)));

  let after_stats = stats.read().unwrap();
  assert_eq!(after_stats.data, before_stats.data);
  assert_eq!(after_stats.updated_at, before_stats.updated_at);
  let after_recent = recent5.read().unwrap();
  assert_eq!(after_recent.data, before_recent.data);
  assert_eq!(after_recent.updated_at, before_recent.updated_at);
  assert_eq!(counts.read().unwrap().data.unwrap().total, 17);

  settle().await;
  assert_eq!(api.calls("admin_stats"), 0);
  assert_eq!(api.calls("recent_clients"), 0);
}

#[test]
fn rollback_leaves_other_keys_alone() {
  let cache = QueryCache::new();
  cache.set(keys::admin::stats(), AdminStats {
    clients_count: 3,
    ..Default::default()
  });
  cache.set(keys::posts::list(5), 1u32);

  let mut stats_tx = OptimisticTx::begin(&cache, [keys::admin::stats()]);
  let mut posts_tx = OptimisticTx::begin(&cache, [keys::posts::all()]);
  stats_tx.patch(&keys::admin::stats(), |s: &mut AdminStats| s.clients_count = 0);
  posts_tx.patch(&keys::posts::all(), |n: &mut u32| *n += 1);

  stats_tx.rollback();
  assert_eq!(cache.get::<AdminStats>(&keys::admin::stats()).unwrap().unwrap().clients_count, 3);
  assert_eq!(cache.get::<u32>(&keys::posts::list(5)).unwrap(), Some(2));

  posts_tx.rollback();
  assert_eq!(cache.get::<u32>(&keys::posts::list(5)).unwrap(), Some(1));
}

#[test]
fn rollback_keeps_a_value_written_after_the_patch() {
  let cache = QueryCache::new();
  cache.set(keys::admin::stats(), AdminStats {
    clients_count: 3,
    ..Default::default()
  });

  let mut tx = OptimisticTx::begin(&cache, [keys::admin::stats()]);
  tx.patch(&keys::admin::stats(), |s: &mut AdminStats| s.clients_count = 2);
  cache.set(keys::admin::stats(), AdminStats {
    clients_count: 5,
    ..Default::default()
  });
  tx.rollback();

  let stats = cache.get::<AdminStats>(&keys::admin::stats()).unwrap();
  assert_eq!(stats.unwrap().clients_count, 5);
}

#[tokio::test(start_paused = true)]
async fn overlapping_failed_deletes_leave_no_ghost_rows() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);
  let server = dashboard();
  let stats = hooks.stats().with_initial_data(server.stats);
  let recent5 = hooks.recent_clients(5).with_initial_data(server.recent.clone());
  let counts = hooks.client_stats().with_initial_data(server.client_stats);
  let beatriz = Uuid::from_u128(7);

  api.gate("delete_client");
  api.fail("delete_client");
  let first = tokio::spawn({
    let hooks = hooks.clone();
    async move { hooks.delete_client(c42()).await }
  });
  settle().await;
  let second = tokio::spawn({
    let hooks = hooks.clone();
    async move { hooks.delete_client(beatriz).await }
  });
  settle().await;
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 15);
  assert_eq!(recent5.read().unwrap().data.unwrap().len(), 1);

  api.release(1);
  assert!(first.await.unwrap().is_err());
  settle().await;

  // The second delete is still pending: its guess stays and nothing refetches.
  let rows = recent5.read().unwrap().data.unwrap();
  assert!(rows.iter().all(|c| c.id != beatriz));
  assert_eq!(api.calls("recent_clients"), 0);

  api.release(1);
  assert!(second.await.unwrap().is_err());
  settle().await;

  let names: Vec<_> = recent5
    .read()
    .unwrap()
    .data
    .unwrap()
    .into_iter()
    .map(|c| c.name)
    .collect();
  assert_eq!(names, ["Ana", "Beatriz", "Carla"]);
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 17);
  assert_eq!(counts.read().unwrap().data.unwrap().total, 17);
  assert_eq!(api.calls("admin_stats"), 1);
  assert_eq!(api.calls("recent_clients"), 1);
}

#[tokio::test(start_paused = true)]
async fn invalidation_during_a_pending_delete_survives_its_rollback() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);
  let server = dashboard();
  let stats = hooks.stats().with_initial_data(server.stats);
  let counts = hooks.client_stats().with_initial_data(server.client_stats);

  api.gate("delete_client");
  api.fail("delete_client");
  let delete = tokio::spawn({
    let hooks = hooks.clone();
    async move { hooks.delete_client(c42()).await }
  });
  settle().await;

  hooks
    .create_client(NewClient {
      name:  "Dora".into(),
      email: "dora@example.com".into(),
      phone: None,
    })
    .await
    .unwrap();
  settle().await;
  // Held by the pending delete.
  assert_eq!(api.calls("admin_stats"), 0);
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 16);

  api.release(1);
  assert!(delete.await.unwrap().is_err());
  settle().await;

  assert_eq!(api.calls("admin_stats"), 1);
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 18);
  assert_eq!(counts.read().unwrap().data.unwrap().total, 18);
}

// ─── Simple mutations ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn create_client_invalidates_dashboard_only_on_success() {
  let api = FakeApi::new(dashboard());
  let hooks = admin(&api);
  let stats = hooks.stats().with_initial_data(dashboard().stats);
  let input = NewClient {
    name:  "Dora".into(),
    email: "dora@example.com".into(),
    phone: None,
  };

  api.fail("create_client");
  let err = hooks.create_client(input.clone()).await.unwrap_err();
  assert!(matches!(err, SyncError::Rejected(_)));
  settle().await;
  assert_eq!(api.calls("admin_stats"), 0);
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 17);

  api.recover("create_client");
  let creds = hooks.create_client(input).await.unwrap();
  assert_eq!(creds.email, "dora@example.com");
  settle().await;
  assert_eq!(api.calls("admin_stats"), 1);
  assert_eq!(stats.read().unwrap().data.unwrap().clients_count, 18);
}

// ─── Client session ──────────────────────────────────────────────────────────

fn session(api: &Arc<FakeApi>, client_id: Uuid) -> ClientHooks<FakeApi> {
  ClientHooks::new(QueryCache::new(), Arc::clone(api), StaleTimes::default(), client_id)
}

#[tokio::test(start_paused = true)]
async fn mark_read_patches_every_cached_page() {
  let me = Uuid::new_v4();
  let api = FakeApi::new(feed(me));
  let hooks = session(&api, me);
  let page = api.with(|s| s.page.clone());
  let target = page.updates[1].id;
  let first = hooks.updates(2).with_initial_data(UpdatesPage {
    updates: page.updates[..2].to_vec(),
    count:   3,
  });
  let all = hooks.updates(5).with_initial_data(page);

  api.gate("mark_read");
  let task = tokio::spawn({
    let hooks = hooks.clone();
    async move { hooks.mark_read(target).await }
  });
  settle().await;

  for query in [&first, &all] {
    let updates = query.read().unwrap().data.unwrap().updates;
    assert!(updates.iter().find(|u| u.id == target).unwrap().is_read());
    assert!(!updates[0].is_read());
  }

  api.release(1);
  assert!(task.await.unwrap().unwrap().is_read());
  settle().await;
  assert_eq!(api.calls("my_updates"), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_like_is_rolled_back() {
  let me = Uuid::new_v4();
  let api = FakeApi::new(feed(me));
  let hooks = session(&api, me);
  let page = api.with(|s| s.page.clone());
  let target = page.updates[0].id;
  let feed = hooks.updates(5).with_initial_data(page);

  api.gate("set_liked");
  api.fail("set_liked");
  let task = tokio::spawn({
    let hooks = hooks.clone();
    async move { hooks.set_liked(target, true).await }
  });
  settle().await;
  assert!(feed.read().unwrap().data.unwrap().updates[0].liked);

  api.release(1);
  assert!(task.await.unwrap().is_err());
  assert!(!feed.read().unwrap().data.unwrap().updates[0].liked);
}

#[tokio::test(start_paused = true)]
async fn reaction_refetches_feed() {
  let me = Uuid::new_v4();
  let api = FakeApi::new(feed(me));
  let hooks = session(&api, me);
  let page = api.with(|s| s.page.clone());
  let target = page.updates[2].id;
  let feed = hooks.updates(5).with_initial_data(page);

  hooks.add_reaction(target, "✨".into()).await.unwrap();
  settle().await;

  assert_eq!(api.calls("my_updates"), 1);
  assert_eq!(feed.read().unwrap().data.unwrap().updates[2].reactions, vec!["✨"]);
}

#[tokio::test(start_paused = true)]
async fn sessions_share_the_posts_entry() {
  let api = FakeApi::new(Server {
    posts: vec![PostSummary {
      id:         Uuid::new_v4(),
      title:      "Scalp care".into(),
      content:    "…".into(),
      image_url:  None,
      created_at: Utc::now(),
    }],
    ..Default::default()
  });
  let cache = QueryCache::new();
  let admin = AdminHooks::new(cache.clone(), Arc::clone(&api), StaleTimes::default());
  let client = ClientHooks::new(cache, Arc::clone(&api), StaleTimes::default(), Uuid::new_v4());

  assert_eq!(admin.posts(10).fetch().await.unwrap().len(), 1);
  assert_eq!(client.posts(10).fetch().await.unwrap().len(), 1);
  assert_eq!(api.calls("posts"), 1);
  assert_eq!(client.profile().fetch().await.unwrap().name, "Ana");
}
