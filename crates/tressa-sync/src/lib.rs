//! Client-side state synchronization for the Tressa portal.
//!
//! Every screen reads through a [`QueryCache`] shared by the whole process.
//! Reads are served from the cache at once and refreshed in the background
//! when stale; writes either invalidate after the server confirms
//! ([`SimpleMutation`]) or patch the cache first and roll back on failure
//! ([`OptimisticTx`]). [`AdminHooks`] and [`ClientHooks`] wire those pieces
//! to the portal's endpoints through a [`PortalApi`].

// Native `async fn` in traits; `PortalApi` spells out `Send` futures.
#![allow(async_fn_in_trait)]

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod hooks;
pub mod keys;
pub mod mutation;
pub mod query;

pub use api::{ApiConfig, HttpPortalApi, PortalApi};
pub use cache::{CacheEvent, CacheEventKind, QueryCache, QueryState, Subscription};
pub use config::StaleTimes;
pub use error::{Result, SyncError};
pub use hooks::{AdminHooks, ClientHooks};
pub use keys::QueryKey;
pub use mutation::{OptimisticTx, SimpleMutation, TxState};
pub use query::Query;

#[cfg(test)]
mod tests;
