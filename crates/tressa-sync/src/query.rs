//! Read hooks: a key, a fetcher, and a staleness window bound together.

use std::{future::Future, marker::PhantomData, time::Duration};

use crate::{
  cache::{Fetcher, QueryCache, QueryState, fetcher},
  error::Result,
  keys::QueryKey,
};

/// A typed view over one cache entry.
///
/// Constructing a `Query` registers its fetcher on the entry, so later
/// invalidations of the key refetch it even if nobody is reading.
pub struct Query<T> {
  cache:      QueryCache,
  key:        QueryKey,
  stale_time: Duration,
  fetcher:    Fetcher,
  _value:     PhantomData<fn() -> T>,
}

impl<T> Clone for Query<T> {
  fn clone(&self) -> Self {
    Self {
      cache:      self.cache.clone(),
      key:        self.key.clone(),
      stale_time: self.stale_time,
      fetcher:    self.fetcher.clone(),
      _value:     PhantomData,
    }
  }
}

impl<T> Query<T>
where
  T: Clone + Send + Sync + 'static,
{
  pub fn new<F, Fut>(cache: &QueryCache, key: QueryKey, stale_time: Duration, fetch: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let fetcher = fetcher(fetch);
    cache.register(&key, fetcher.clone());
    Self {
      cache: cache.clone(),
      key,
      stale_time,
      fetcher,
      _value: PhantomData,
    }
  }

  /// Seed the entry with `value` if it is empty. Never touches the network;
  /// the seeded value counts as fresh for one staleness window.
  pub fn with_initial_data(self, value: T) -> Self {
    self.cache.seed(&self.key, value);
    self
  }

  /// Like [`Self::with_initial_data`], for callers whose initial value may
  /// be absent.
  pub fn with_initial(self, value: Option<T>) -> Self {
    match value {
      Some(v) => self.with_initial_data(v),
      None => self,
    }
  }

  pub fn key(&self) -> &QueryKey { &self.key }

  pub fn stale_time(&self) -> Duration { self.stale_time }

  /// The current state, returned immediately. Schedules one background
  /// fetch if the entry is missing, invalidated, or older than the
  /// staleness window and nothing is already in flight.
  pub fn read(&self) -> Result<QueryState<T>> {
    self.cache.read(&self.key, self.stale_time, &self.fetcher)
  }

  /// Fresh-enough data, waiting for a fetch only when needed.
  pub async fn fetch(&self) -> Result<T> {
    self
      .cache
      .ensure(&self.key, self.stale_time, self.fetcher.clone())
      .await
  }

  /// Fetch regardless of staleness. Joins a fetch that is already running.
  pub async fn refetch(&self) -> Result<T> {
    self.cache.fetch(&self.key, self.fetcher.clone()).await
  }
}
