//! Write hooks.
//!
//! [`SimpleMutation`] invalidates after the server confirms.
//! [`OptimisticTx`] edits the cache first and either confirms or undoes the
//! edit once the server answers.

use std::{future::Future, mem};

use tracing::{debug, warn};

use crate::{
  cache::{QueryCache, Snapshot},
  error::Result,
  keys::QueryKey,
};

// ─── Simple ──────────────────────────────────────────────────────────────────

/// Run an action, then invalidate its namespaces on success.
pub struct SimpleMutation {
  cache:       QueryCache,
  invalidates: Vec<QueryKey>,
}

impl SimpleMutation {
  pub fn new(cache: &QueryCache, invalidates: impl IntoIterator<Item = QueryKey>) -> Self {
    Self {
      cache:       cache.clone(),
      invalidates: invalidates.into_iter().collect(),
    }
  }

  /// Await `action`. The cache is only touched if it succeeds.
  pub async fn run<R>(&self, action: impl Future<Output = Result<R>>) -> Result<R> {
    let out = action.await?;
    for prefix in &self.invalidates {
      self.cache.invalidate(prefix);
    }
    Ok(out)
  }
}

// ─── Optimistic ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
  Idle,
  Patched,
  Committed,
  RolledBack,
}

/// An optimistic edit over every cache entry under a set of prefixes.
///
/// `begin` pauses background refetches under the prefixes, cancels fetches
/// already running there, and snapshots the entries. `patch` edits them in
/// place. `commit` invalidates the prefixes so the server's view replaces
/// the guess; `rollback` restores the snapshot exactly. Dropping a patched
/// transaction without settling it rolls back.
///
/// Transactions over the same keys may overlap. A rollback leaves alone any
/// entry another transaction has patched since this one did, marking it
/// invalidated so it is refetched once the last hold on it is released.
pub struct OptimisticTx {
  cache:    QueryCache,
  prefixes: Vec<QueryKey>,
  snapshot: Vec<Snapshot>,
  hold:     Option<u64>,
  state:    TxState,
}

impl OptimisticTx {
  pub fn begin(cache: &QueryCache, prefixes: impl IntoIterator<Item = QueryKey>) -> Self {
    let prefixes: Vec<_> = prefixes.into_iter().collect();
    let hold = cache.hold(prefixes.clone());
    for prefix in &prefixes {
      cache.cancel(prefix);
    }
    let snapshot = cache.snapshot(&prefixes);
    debug!(entries = snapshot.len(), "optimistic transaction started");
    Self {
      cache: cache.clone(),
      prefixes,
      snapshot,
      hold: Some(hold),
      state: TxState::Idle,
    }
  }

  pub fn state(&self) -> TxState { self.state }

  /// Apply `f` to every `T` entry under `prefix` that was snapshotted at
  /// `begin`. Returns the number of entries changed.
  pub fn patch<T>(&mut self, prefix: &QueryKey, f: impl FnMut(&mut T)) -> usize
  where
    T: Clone + Send + Sync + 'static,
  {
    let n = self.cache.patch(prefix, &mut self.snapshot, f);
    if n > 0 {
      self.state = TxState::Patched;
    }
    n
  }

  /// Accept the edit and refetch the affected entries from the server.
  pub fn commit(mut self) {
    self.state = TxState::Committed;
    for prefix in &self.prefixes {
      self.cache.invalidate(prefix);
    }
    self.release();
  }

  /// Undo the edit.
  pub fn rollback(mut self) { self.undo(); }

  /// Await `action`, committing on success and rolling back on failure.
  pub async fn run<R>(self, action: impl Future<Output = Result<R>>) -> Result<R> {
    match action.await {
      Ok(out) => {
        self.commit();
        Ok(out)
      }
      Err(e) => {
        warn!(error = %e, "mutation failed, rolling back");
        self.rollback();
        Err(e)
      }
    }
  }

  fn release(&mut self) {
    if let Some(hold) = self.hold.take() {
      self.cache.release(hold);
    }
  }

  fn undo(&mut self) {
    self.cache.restore(mem::take(&mut self.snapshot));
    self.release();
    self.state = TxState::RolledBack;
  }
}

impl Drop for OptimisticTx {
  fn drop(&mut self) {
    if self.state == TxState::Patched {
      warn!("optimistic transaction dropped unsettled, rolling back");
      self.undo();
    }
    self.release();
  }
}
