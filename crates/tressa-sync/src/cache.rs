//! [`QueryCache`]: the shared, keyed store behind every read and mutation
//! hook.
//!
//! # Concurrency
//!
//! - `state`: one `std::sync::Mutex`. Every map operation takes it once and
//!   releases it before any `.await`, so `get`, `set`, `invalidate`, and
//!   friends are atomic with respect to each other.
//! - Fetches run as spawned tokio tasks. Each entry carries at most one
//!   in-flight fetch; later callers clone its `watch` receiver and wait for
//!   the same outcome instead of issuing a second request.
//! - A fetch commits only while it is still the entry's current in-flight
//!   fetch. `cancel` and `remove` abort the task and clear the marker, so a
//!   late result from a cancelled fetch is dropped.
//! - Every write to an entry's value bumps its `version`. A rollback only
//!   restores entries still at the version its transaction left them at;
//!   anything written since by another transaction or fetch is marked
//!   invalidated instead and refetched once no hold covers it.

use std::{
  any::Any,
  collections::HashMap,
  future::Future,
  mem,
  pin::Pin,
  sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use tokio::{
  runtime::Handle,
  sync::{
    broadcast::{self, error::RecvError, error::TryRecvError},
    watch,
  },
  task::AbortHandle,
  time::Instant,
};
use tracing::{debug, warn};

use crate::{
  error::{Result, SyncError},
  keys::QueryKey,
};

/// A type-erased cached value.
pub(crate) type Value = Arc<dyn Any + Send + Sync>;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A type-erased fetcher registered on a cache entry.
pub type Fetcher = Arc<dyn Fn() -> BoxFuture<Result<Value>> + Send + Sync>;

/// Erase a typed async fetch function into a [`Fetcher`].
pub fn fetcher<T, F, Fut>(f: F) -> Fetcher
where
  T: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T>> + Send + 'static,
{
  Arc::new(move || {
    let fut = f();
    Box::pin(async move { fut.await.map(|v| Arc::new(v) as Value) })
  })
}

const EVENT_BUFFER: usize = 256;

// ─── Entries ─────────────────────────────────────────────────────────────────

/// `None` until the fetch settles; the sender is dropped unsent if the fetch
/// is aborted or superseded.
type Outcome = Option<Result<()>>;

struct InFlight {
  id:    u64,
  abort: AbortHandle,
  done:  watch::Receiver<Outcome>,
}

#[derive(Default)]
struct Entry {
  value:          Option<Value>,
  updated_at:     Option<Instant>,
  error:          Option<SyncError>,
  invalidated:    bool,
  /// Invalidated while a fetch was running; fetch again once it settles.
  refetch_queued: bool,
  version:        u64,
  fetcher:        Option<Fetcher>,
  in_flight:      Option<InFlight>,
}

impl Entry {
  fn is_stale(&self, now: Instant, stale_time: Duration) -> bool {
    self.invalidated
      || self.value.is_none()
      || self
        .updated_at
        .is_none_or(|at| now.duration_since(at) > stale_time)
  }

  fn typed<T: Clone + 'static>(&self, key: &QueryKey) -> Result<Option<T>> {
    match &self.value {
      None => Ok(None),
      Some(v) => v
        .downcast_ref::<T>()
        .cloned()
        .map(Some)
        .ok_or_else(|| SyncError::TypeMismatch(key.clone())),
    }
  }

  fn state<T: Clone + 'static>(&self, key: &QueryKey) -> Result<QueryState<T>> {
    Ok(QueryState {
      data:        self.typed(key)?,
      error:       self.error.clone(),
      is_fetching: self.in_flight.is_some(),
      updated_at:  self.updated_at,
    })
  }

  fn abort_in_flight(&mut self) -> bool {
    self.refetch_queued = false;
    match self.in_flight.take() {
      Some(f) => {
        f.abort.abort();
        true
      }
      None => false,
    }
  }
}

#[derive(Default)]
struct State {
  entries: HashMap<QueryKey, Entry>,
  /// Prefixes whose background refetches are paused, keyed by hold id.
  holds:   HashMap<u64, Vec<QueryKey>>,
}

impl State {
  fn held_prefixes(&self) -> Vec<QueryKey> { self.holds.values().flatten().cloned().collect() }
}

fn is_held(held: &[QueryKey], key: &QueryKey) -> bool { held.iter().any(|p| key.starts_with(p)) }

/// Saved copy of one entry, restored by a rollback.
///
/// `version` is the entry version this transaction expects to find at
/// rollback: the version at `begin`, advanced by each of its own patches.
pub(crate) struct Snapshot {
  key:         QueryKey,
  value:       Option<Value>,
  updated_at:  Option<Instant>,
  error:       Option<SyncError>,
  invalidated: bool,
  version:     u64,
}

// ─── Public types ────────────────────────────────────────────────────────────

/// Point-in-time view of one entry, as seen by a read hook.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
  /// Last committed or optimistically patched value.
  pub data:        Option<T>,
  /// Error from the most recent failed fetch, cleared on the next success.
  pub error:       Option<SyncError>,
  pub is_fetching: bool,
  pub updated_at:  Option<Instant>,
}

impl<T> Default for QueryState<T> {
  fn default() -> Self {
    Self {
      data:        None,
      error:       None,
      is_fetching: false,
      updated_at:  None,
    }
  }
}

impl<T> QueryState<T> {
  /// Nothing to show yet, but a fetch is on its way.
  pub fn is_loading(&self) -> bool { self.data.is_none() && self.is_fetching }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
  Updated,
  Invalidated,
  Removed,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
  pub key:  QueryKey,
  pub kind: CacheEventKind,
}

/// Stream of [`CacheEvent`]s for keys under one prefix.
pub struct Subscription {
  prefix: QueryKey,
  rx:     broadcast::Receiver<CacheEvent>,
}

impl Subscription {
  /// Wait for the next matching event. `None` once the cache is gone.
  pub async fn recv(&mut self) -> Option<CacheEvent> {
    loop {
      match self.rx.recv().await {
        Ok(ev) if ev.key.starts_with(&self.prefix) => return Some(ev),
        Ok(_) => {}
        Err(RecvError::Lagged(n)) => warn!(prefix = %self.prefix, skipped = n, "subscriber lagged"),
        Err(RecvError::Closed) => return None,
      }
    }
  }

  /// Next matching event if one is already queued.
  pub fn try_recv(&mut self) -> Option<CacheEvent> {
    loop {
      match self.rx.try_recv() {
        Ok(ev) if ev.key.starts_with(&self.prefix) => return Some(ev),
        Ok(_) => {}
        Err(TryRecvError::Lagged(n)) => {
          warn!(prefix = %self.prefix, skipped = n, "subscriber lagged")
        }
        Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
      }
    }
  }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

struct Inner {
  state:   Mutex<State>,
  events:  broadcast::Sender<CacheEvent>,
  next_id: AtomicU64,
}

/// Process-wide query cache. Cheap to clone; clones share one store.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<Inner>,
}

impl Default for QueryCache {
  fn default() -> Self { Self::new() }
}

impl QueryCache {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    Self {
      inner: Arc::new(Inner {
        state: Mutex::new(State::default()),
        events,
        next_id: AtomicU64::new(1),
      }),
    }
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn next_id(&self) -> u64 { self.inner.next_id.fetch_add(1, Ordering::Relaxed) }

  fn emit(&self, events: Vec<CacheEvent>) {
    for ev in events {
      debug!(key = %ev.key, kind = ?ev.kind, "cache event");
      // No subscribers is fine.
      let _ = self.inner.events.send(ev);
    }
  }

  // ── Plain access ──────────────────────────────────────────────────────────

  /// Current value under `key`, if any.
  pub fn get<T: Clone + 'static>(&self, key: &QueryKey) -> Result<Option<T>> {
    let state = self.lock();
    match state.entries.get(key) {
      Some(entry) => entry.typed(key),
      None => Ok(None),
    }
  }

  /// Snapshot of the entry under `key` without scheduling anything.
  pub fn state<T: Clone + 'static>(&self, key: &QueryKey) -> Result<QueryState<T>> {
    let state = self.lock();
    match state.entries.get(key) {
      Some(entry) => entry.state(key),
      None => Ok(QueryState::default()),
    }
  }

  /// Write `value` as freshly fetched data.
  pub fn set<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
    {
      let mut state = self.lock();
      let entry = state.entries.entry(key.clone()).or_default();
      entry.value = Some(Arc::new(value));
      entry.updated_at = Some(Instant::now());
      entry.error = None;
      entry.invalidated = false;
      entry.version += 1;
    }
    self.emit(vec![CacheEvent { key, kind: CacheEventKind::Updated }]);
  }

  /// Write `value` only if the entry holds nothing yet. Returns whether it
  /// was written.
  pub fn seed<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) -> bool {
    {
      let mut state = self.lock();
      let entry = state.entries.entry(key.clone()).or_default();
      if entry.value.is_some() {
        return false;
      }
      entry.value = Some(Arc::new(value));
      entry.updated_at = Some(Instant::now());
      entry.version += 1;
    }
    self.emit(vec![CacheEvent {
      key:  key.clone(),
      kind: CacheEventKind::Updated,
    }]);
    true
  }

  /// Keys currently cached under `prefix`, sorted.
  pub fn keys(&self, prefix: &QueryKey) -> Vec<QueryKey> {
    let state = self.lock();
    let mut keys: Vec<_> = state
      .entries
      .keys()
      .filter(|k| k.starts_with(prefix))
      .cloned()
      .collect();
    keys.sort();
    keys
  }

  pub fn subscribe(&self, prefix: QueryKey) -> Subscription {
    Subscription {
      prefix,
      rx: self.inner.events.subscribe(),
    }
  }

  // ── Invalidation ──────────────────────────────────────────────────────────

  /// Mark every entry under `prefix` stale and refetch the ones that have a
  /// fetcher. Returns the number of entries marked.
  pub fn invalidate(&self, prefix: &QueryKey) -> usize {
    let mut events = Vec::new();
    {
      let mut guard = self.lock();
      let held = guard.held_prefixes();
      for (key, entry) in guard.entries.iter_mut() {
        if !key.starts_with(prefix) {
          continue;
        }
        entry.invalidated = true;
        events.push(CacheEvent {
          key:  key.clone(),
          kind: CacheEventKind::Invalidated,
        });
        if is_held(&held, key) {
          continue;
        }
        if entry.in_flight.is_some() {
          entry.refetch_queued = true;
        } else if let Some(fetcher) = entry.fetcher.clone() {
          self.spawn_fetch(key, entry, fetcher);
        }
      }
    }
    let n = events.len();
    self.emit(events);
    n
  }

  /// Drop every entry under `prefix`, aborting their fetches.
  pub fn remove(&self, prefix: &QueryKey) -> usize {
    let removed: Vec<QueryKey> = {
      let mut state = self.lock();
      let keys: Vec<_> = state
        .entries
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect();
      for key in &keys {
        if let Some(mut entry) = state.entries.remove(key) {
          entry.abort_in_flight();
        }
      }
      keys
    };
    let n = removed.len();
    self.emit(
      removed
        .into_iter()
        .map(|key| CacheEvent { key, kind: CacheEventKind::Removed })
        .collect(),
    );
    n
  }

  /// Abort in-flight fetches under `prefix`, keeping the entries. Callers
  /// attached to those fetches see [`SyncError::Cancelled`].
  pub fn cancel(&self, prefix: &QueryKey) -> usize {
    let mut state = self.lock();
    let mut n = 0;
    for (key, entry) in state.entries.iter_mut() {
      if key.starts_with(prefix) && entry.abort_in_flight() {
        debug!(%key, "fetch cancelled");
        n += 1;
      }
    }
    n
  }

  // ── Fetching ──────────────────────────────────────────────────────────────

  pub(crate) fn register(&self, key: &QueryKey, fetcher: Fetcher) {
    let mut state = self.lock();
    state.entries.entry(key.clone()).or_default().fetcher = Some(fetcher);
  }

  /// Snapshot `key` and, if it is stale and idle, start one background
  /// fetch.
  pub(crate) fn read<T: Clone + 'static>(
    &self,
    key: &QueryKey,
    stale_time: Duration,
    fetcher: &Fetcher,
  ) -> Result<QueryState<T>> {
    let mut guard = self.lock();
    let held = is_held(&guard.held_prefixes(), key);
    let entry = guard.entries.entry(key.clone()).or_default();
    entry.fetcher = Some(Arc::clone(fetcher));
    if entry.in_flight.is_none() && !held && entry.is_stale(Instant::now(), stale_time) {
      self.spawn_fetch(key, entry, Arc::clone(fetcher));
    }
    entry.state(key)
  }

  /// Return the cached value if it is fresh, otherwise wait for a fetch.
  pub async fn ensure<T: Clone + 'static>(
    &self,
    key: &QueryKey,
    stale_time: Duration,
    fetcher: Fetcher,
  ) -> Result<T> {
    let done = {
      let mut state = self.lock();
      let entry = state.entries.entry(key.clone()).or_default();
      entry.fetcher = Some(Arc::clone(&fetcher));
      if !entry.is_stale(Instant::now(), stale_time) {
        if let Some(value) = entry.typed(key)? {
          return Ok(value);
        }
      }
      self.join_or_spawn(key, entry, fetcher)?
    };
    self.settle(key, done).await
  }

  /// Fetch `key` now, joining a fetch that is already running.
  pub async fn fetch<T: Clone + 'static>(&self, key: &QueryKey, fetcher: Fetcher) -> Result<T> {
    let done = {
      let mut state = self.lock();
      let entry = state.entries.entry(key.clone()).or_default();
      entry.fetcher = Some(Arc::clone(&fetcher));
      self.join_or_spawn(key, entry, fetcher)?
    };
    self.settle(key, done).await
  }

  fn join_or_spawn(
    &self,
    key: &QueryKey,
    entry: &mut Entry,
    fetcher: Fetcher,
  ) -> Result<watch::Receiver<Outcome>> {
    match &entry.in_flight {
      Some(f) => Ok(f.done.clone()),
      None => self
        .spawn_fetch(key, entry, fetcher)
        .ok_or(SyncError::Cancelled),
    }
  }

  async fn settle<T: Clone + 'static>(
    &self,
    key: &QueryKey,
    mut done: watch::Receiver<Outcome>,
  ) -> Result<T> {
    let outcome = match done.wait_for(Option::is_some).await {
      Ok(outcome) => outcome.clone().unwrap_or(Err(SyncError::Cancelled)),
      Err(_) => Err(SyncError::Cancelled),
    };
    outcome?;
    self.get(key)?.ok_or(SyncError::Cancelled)
  }

  /// Start a fetch task for `entry`. Must be called with the state lock
  /// held; the task itself only takes the lock after the fetch resolves.
  fn spawn_fetch(
    &self,
    key: &QueryKey,
    entry: &mut Entry,
    fetcher: Fetcher,
  ) -> Option<watch::Receiver<Outcome>> {
    let Ok(runtime) = Handle::try_current() else {
      warn!(%key, "no tokio runtime, fetch not started");
      return None;
    };
    let id = self.next_id();
    let (tx, rx) = watch::channel(None);
    let cache = self.clone();
    let task_key = key.clone();
    let task = runtime.spawn(async move {
      let result = fetcher().await;
      cache.commit(&task_key, id, result, tx);
    });
    debug!(%key, fetch_id = id, "fetch started");
    entry.in_flight = Some(InFlight {
      id,
      abort: task.abort_handle(),
      done: rx.clone(),
    });
    Some(rx)
  }

  fn commit(&self, key: &QueryKey, id: u64, result: Result<Value>, tx: watch::Sender<Outcome>) {
    let kind = {
      let mut state = self.lock();
      let Some(entry) = state.entries.get_mut(key) else {
        debug!(%key, fetch_id = id, "entry removed, fetch result dropped");
        return;
      };
      if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
        debug!(%key, fetch_id = id, "superseded fetch result dropped");
        return;
      }
      entry.in_flight = None;

      let kind = match &result {
        Ok(value) => {
          entry.value = Some(Arc::clone(value));
          entry.updated_at = Some(Instant::now());
          entry.error = None;
          entry.invalidated = entry.refetch_queued;
          entry.version += 1;
          CacheEventKind::Updated
        }
        Err(e) => {
          warn!(%key, error = %e, "fetch failed");
          entry.error = Some(e.clone());
          CacheEventKind::Failed
        }
      };

      if mem::take(&mut entry.refetch_queued) {
        if let Some(fetcher) = entry.fetcher.clone() {
          self.spawn_fetch(key, entry, fetcher);
        }
      }
      kind
    };

    tx.send_replace(Some(result.map(|_| ())));
    self.emit(vec![CacheEvent { key: key.clone(), kind }]);
  }

  // ── Optimistic support ────────────────────────────────────────────────────

  /// Pause background refetches under `prefixes` until [`Self::release`].
  pub(crate) fn hold(&self, prefixes: Vec<QueryKey>) -> u64 {
    let id = self.next_id();
    self.lock().holds.insert(id, prefixes);
    id
  }

  /// Lift a hold and refetch the entries it covered that were invalidated
  /// meanwhile and are not covered by another hold.
  pub(crate) fn release(&self, hold: u64) {
    let mut guard = self.lock();
    let Some(released) = guard.holds.remove(&hold) else {
      return;
    };
    let held = guard.held_prefixes();
    for (key, entry) in guard.entries.iter_mut() {
      if !entry.invalidated
        || entry.in_flight.is_some()
        || !is_held(&released, key)
        || is_held(&held, key)
      {
        continue;
      }
      if let Some(fetcher) = entry.fetcher.clone() {
        debug!(%key, "refetching after hold released");
        self.spawn_fetch(key, entry, fetcher);
      }
    }
  }

  pub(crate) fn snapshot(&self, prefixes: &[QueryKey]) -> Vec<Snapshot> {
    let state = self.lock();
    state
      .entries
      .iter()
      .filter(|(k, _)| prefixes.iter().any(|p| k.starts_with(p)))
      .map(|(key, e)| Snapshot {
        key:         key.clone(),
        value:       e.value.clone(),
        updated_at:  e.updated_at,
        error:       e.error.clone(),
        invalidated: e.invalidated,
        version:     e.version,
      })
      .collect()
  }

  /// Put back every snapshotted entry that is still at the version its
  /// transaction left it at. Entries written since are marked invalidated
  /// instead; entries removed since stay removed. An invalidation that
  /// arrived during the transaction survives the restore.
  pub(crate) fn restore(&self, snapshots: Vec<Snapshot>) {
    let mut events = Vec::with_capacity(snapshots.len());
    {
      let mut state = self.lock();
      for snap in snapshots {
        let Some(entry) = state.entries.get_mut(&snap.key) else {
          continue;
        };
        if entry.version != snap.version {
          debug!(key = %snap.key, "entry changed since snapshot, invalidating");
          entry.invalidated = true;
          events.push(CacheEvent {
            key:  snap.key,
            kind: CacheEventKind::Invalidated,
          });
          continue;
        }
        entry.value = snap.value;
        entry.updated_at = snap.updated_at;
        entry.error = snap.error;
        entry.invalidated |= snap.invalidated;
        entry.version += 1;
        events.push(CacheEvent {
          key:  snap.key,
          kind: CacheEventKind::Updated,
        });
      }
    }
    self.emit(events);
  }

  /// Edit in place every snapshotted `T` value under `prefix`. Entries
  /// holding another type are left alone. A snapshot only tracks the edit if
  /// nothing else wrote the entry since it was taken.
  pub(crate) fn patch<T, F>(&self, prefix: &QueryKey, snapshots: &mut [Snapshot], mut f: F) -> usize
  where
    T: Clone + Send + Sync + 'static,
    F: FnMut(&mut T),
  {
    let mut events = Vec::new();
    {
      let mut state = self.lock();
      for snap in snapshots.iter_mut().filter(|s| s.key.starts_with(prefix)) {
        let Some(entry) = state.entries.get_mut(&snap.key) else {
          continue;
        };
        let Some(current) = entry.value.as_ref().and_then(|v| v.downcast_ref::<T>()) else {
          continue;
        };
        let mut next = current.clone();
        f(&mut next);
        entry.value = Some(Arc::new(next));
        if entry.version == snap.version {
          snap.version += 1;
        }
        entry.version += 1;
        events.push(CacheEvent {
          key:  snap.key.clone(),
          kind: CacheEventKind::Updated,
        });
      }
    }
    let n = events.len();
    self.emit(events);
    n
  }
}
