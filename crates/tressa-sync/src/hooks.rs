//! Domain hooks for the two portal sessions: the admin dashboard and a
//! signed-in client.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use tressa_core::{
  client::{Credentials, NewClient},
  update::ClientUpdate,
  views::{AdminStats, ClientStatusCounts, PostSummary, ProfileSummary, RecentClient, UpdatesPage},
};

use crate::{
  api::PortalApi,
  cache::QueryCache,
  config::StaleTimes,
  error::Result,
  keys,
  mutation::{OptimisticTx, SimpleMutation},
  query::Query,
};

/// Build a [`Query`] whose fetcher calls one `PortalApi` method.
macro_rules! api_query {
  ($cache:expr, $api:expr, $key:expr, $stale:expr, |$a:ident| $call:expr) => {{
    let api = Arc::clone($api);
    Query::new($cache, $key, $stale, move || {
      let $a = Arc::clone(&api);
      async move { $call.await }
    })
  }};
}

fn posts_query<A: PortalApi>(
  cache: &QueryCache,
  api: &Arc<A>,
  stale: &StaleTimes,
  limit: usize,
) -> Query<Vec<PostSummary>> {
  api_query!(cache, api, keys::posts::list(limit), stale.posts, |a| a.posts(limit))
}

// ─── Admin ───────────────────────────────────────────────────────────────────

pub struct AdminHooks<A> {
  cache: QueryCache,
  api:   Arc<A>,
  stale: StaleTimes,
}

impl<A> Clone for AdminHooks<A> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      api:   Arc::clone(&self.api),
      stale: self.stale,
    }
  }
}

impl<A: PortalApi> AdminHooks<A> {
  pub fn new(cache: QueryCache, api: Arc<A>, stale: StaleTimes) -> Self { Self { cache, api, stale } }

  pub fn cache(&self) -> &QueryCache { &self.cache }

  pub fn stats(&self) -> Query<AdminStats> {
    api_query!(&self.cache, &self.api, keys::admin::stats(), self.stale.admin_stats, |a| {
      a.admin_stats()
    })
  }

  pub fn recent_clients(&self, limit: usize) -> Query<Vec<RecentClient>> {
    api_query!(
      &self.cache,
      &self.api,
      keys::admin::recent_clients(limit),
      self.stale.recent_clients,
      |a| a.recent_clients(limit)
    )
  }

  pub fn client_stats(&self) -> Query<ClientStatusCounts> {
    api_query!(&self.cache, &self.api, keys::admin::client_stats(), self.stale.client_stats, |a| {
      a.client_stats()
    })
  }

  pub fn client_updates(&self, client_id: Uuid, limit: usize) -> Query<UpdatesPage> {
    api_query!(
      &self.cache,
      &self.api,
      keys::client::updates(client_id, limit),
      self.stale.updates,
      |a| a.client_updates(client_id, limit)
    )
  }

  pub fn posts(&self, limit: usize) -> Query<Vec<PostSummary>> {
    posts_query(&self.cache, &self.api, &self.stale, limit)
  }

  /// Provision a client and refresh everything on the dashboard.
  pub async fn create_client(&self, input: NewClient) -> Result<Credentials> {
    let email = input.email.clone();
    let credentials = SimpleMutation::new(&self.cache, [keys::admin::all()])
      .run(self.api.create_client(input))
      .await?;
    info!(%email, "client provisioned");
    Ok(credentials)
  }

  /// Delete a client, removing it from the dashboard before the server
  /// confirms.
  ///
  /// The admin stats lose one client, every cached recent-clients list
  /// drops the row, and the status breakdown loses one from its total. The
  /// `with_appointment`/`without_appointment` buckets are left as they are
  /// until the refetch on commit, since no cached entry records which one
  /// the client was in; until then `total` runs one below their sum.
  ///
  /// On failure the snapshot is put back; on success the client's own
  /// entries are dropped and the dashboard refetched.
  pub async fn delete_client(&self, id: Uuid) -> Result<()> {
    let mut tx = OptimisticTx::begin(&self.cache, [
      keys::admin::stats(),
      keys::admin::recent_clients_all(),
      keys::admin::client_stats(),
      keys::client::all(id),
    ]);
    tx.patch(&keys::admin::stats(), |s: &mut AdminStats| {
      s.clients_count = s.clients_count.saturating_sub(1);
    });
    tx.patch(&keys::admin::recent_clients_all(), |list: &mut Vec<RecentClient>| {
      list.retain(|c| c.id != id);
    });
    tx.patch(&keys::admin::client_stats(), |s: &mut ClientStatusCounts| {
      s.total = s.total.saturating_sub(1);
    });

    match self.api.delete_client(id).await {
      Ok(()) => {
        self.cache.remove(&keys::client::all(id));
        tx.commit();
        info!(client_id = %id, "client deleted");
        Ok(())
      }
      Err(e) => {
        warn!(client_id = %id, error = %e, "client delete failed, restoring dashboard");
        tx.rollback();
        Err(e)
      }
    }
  }
}

// ─── Client session ──────────────────────────────────────────────────────────

/// Hooks for one signed-in client.
pub struct ClientHooks<A> {
  cache:     QueryCache,
  api:       Arc<A>,
  stale:     StaleTimes,
  client_id: Uuid,
}

impl<A> Clone for ClientHooks<A> {
  fn clone(&self) -> Self {
    Self {
      cache:     self.cache.clone(),
      api:       Arc::clone(&self.api),
      stale:     self.stale,
      client_id: self.client_id,
    }
  }
}

impl<A: PortalApi> ClientHooks<A> {
  pub fn new(cache: QueryCache, api: Arc<A>, stale: StaleTimes, client_id: Uuid) -> Self {
    Self {
      cache,
      api,
      stale,
      client_id,
    }
  }

  pub fn client_id(&self) -> Uuid { self.client_id }

  pub fn profile(&self) -> Query<ProfileSummary> {
    api_query!(
      &self.cache,
      &self.api,
      keys::client::profile(self.client_id),
      self.stale.profile,
      |a| a.profile()
    )
  }

  pub fn updates(&self, limit: usize) -> Query<UpdatesPage> {
    api_query!(
      &self.cache,
      &self.api,
      keys::client::updates(self.client_id, limit),
      self.stale.updates,
      |a| a.my_updates(limit)
    )
  }

  pub fn posts(&self, limit: usize) -> Query<Vec<PostSummary>> {
    posts_query(&self.cache, &self.api, &self.stale, limit)
  }

  /// Mark an update read in every cached page before the server confirms.
  pub async fn mark_read(&self, update_id: Uuid) -> Result<ClientUpdate> {
    let now = Utc::now();
    self
      .patch_update(update_id, move |u| {
        u.read_at.get_or_insert(now);
      })
      .run(self.api.mark_read(update_id))
      .await
  }

  /// Like or unlike an update in every cached page before the server
  /// confirms.
  pub async fn set_liked(&self, update_id: Uuid, liked: bool) -> Result<ClientUpdate> {
    self
      .patch_update(update_id, move |u| u.liked = liked)
      .run(self.api.set_liked(update_id, liked))
      .await
  }

  pub async fn add_reaction(&self, update_id: Uuid, emoji: String) -> Result<ClientUpdate> {
    SimpleMutation::new(&self.cache, [keys::client::updates_all(self.client_id)])
      .run(self.api.add_reaction(update_id, emoji))
      .await
  }

  fn patch_update(&self, update_id: Uuid, mut f: impl FnMut(&mut ClientUpdate)) -> OptimisticTx {
    let prefix = keys::client::updates_all(self.client_id);
    let mut tx = OptimisticTx::begin(&self.cache, [prefix.clone()]);
    tx.patch(&prefix, |page: &mut UpdatesPage| {
      page
        .updates
        .iter_mut()
        .filter(|u| u.id == update_id)
        .for_each(&mut f);
    });
    tx
  }
}
