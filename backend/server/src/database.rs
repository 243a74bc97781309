//! # Store
//!
//! Document collection behind the API.
//!
//! Core purpose is to hold every uploaded note and its counters. The service never caches documents between
//! requests, so every read goes through here.
//!
//! ## Requirements
//!
//! - Sorted listing by creation time, either every note or approved notes only
//! - Single document lookups by id
//! - Atomic read-modify-write per document, two concurrent view increments on the same id must both land
//! - `updatedAt` strictly increases on every mutation
//!
//! ## Backends
//!
//! - [`RedisStore`](crate::redis_store::RedisStore): production, one hash per note plus two sorted set indexes
//! - [`MemoryStore`](crate::memory::MemoryStore): single node runs and tests
use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Counter, ListScope, NoteDocument, NoteEdit};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt note {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Every mutation takes the caller's clock reading; the store derives the stored `updatedAt` from it.
pub trait NoteStore: Send + Sync + 'static {
    fn insert(&self, note: &NoteDocument) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Newest first.
    fn list(&self, scope: ListScope) -> impl Future<Output = Result<Vec<NoteDocument>, StoreError>> + Send;

    fn get(&self, id: &str) -> impl Future<Output = Result<Option<NoteDocument>, StoreError>> + Send;

    fn approve(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<NoteDocument>, StoreError>> + Send;

    fn update(
        &self,
        id: &str,
        edit: &NoteEdit,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<NoteDocument>, StoreError>> + Send;

    /// Returns the removed note, `None` when nothing was stored under `id`.
    fn delete(&self, id: &str) -> impl Future<Output = Result<Option<NoteDocument>, StoreError>> + Send;

    /// Returns the counter value after the increment.
    fn increment(
        &self,
        id: &str,
        counter: Counter,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<u64>, StoreError>> + Send;
}
