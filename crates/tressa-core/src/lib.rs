//! Core types and trait definitions for the Tressa client portal.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! store, API, and sync crates all build on it.

// Native `async fn` in traits; the store trait spells out `Send` futures.
#![allow(async_fn_in_trait)]

pub mod appointment;
pub mod client;
pub mod error;
pub mod post;
pub mod store;
pub mod update;
pub mod views;

pub use error::{Classify, Error, ErrorKind, Result};
