//! Persistence seams for the lockout service
//!
//! - [`LockoutGateway`] is the minimal capability the service consumes: save an
//!   entity whose lockout fields were just evaluated and return the stored copy.
//! - [`LockoutStore`] adds key-addressed lookup for backends that own
//!   [`LockoutRecord`]s themselves, such as [`InMemoryLockoutStore`] or the SQLite
//!   backend.

pub mod memory;

pub use memory::InMemoryLockoutStore;

use async_trait::async_trait;

use crate::{Error, record::LockoutRecord, state::LockoutFields};

/// Durable storage for entities carrying lockout state.
///
/// # Concurrency
///
/// Evaluating a snapshot and saving it is a read-modify-write cycle. Two
/// failure reports for the same entity that race through
/// `read → evaluate → save` can lose a count or arm a lock twice. Callers that
/// hand snapshots to the gateway must guarantee at most one cycle in flight per
/// entity (a single writer, a per-entity mutex, or optimistic versioning in
/// `save` that fails with [`StorageError::Conflict`](crate::error::StorageError::Conflict)).
/// [`LockoutService::record_failed_attempt_for_key`](crate::LockoutService::record_failed_attempt_for_key)
/// provides the per-entity mutex for [`LockoutStore`]s within one process.
///
/// # Errors
///
/// Errors are returned verbatim to the caller of the service. A failed save
/// means the evaluated state did not take durable effect.
#[async_trait]
pub trait LockoutGateway: Send + Sync + 'static {
    /// The persisted entity type
    type Entity: LockoutFields + Clone + Send + Sync + 'static;

    /// Durably store `entity` and return the refreshed representation.
    async fn save(&self, entity: Self::Entity) -> Result<Self::Entity, Error>;
}

/// A gateway that owns [`LockoutRecord`]s addressed by key.
#[async_trait]
pub trait LockoutStore: LockoutGateway<Entity = LockoutRecord> {
    /// Find the record for `key`.
    async fn find(&self, key: &str) -> Result<Option<LockoutRecord>, Error>;

    /// Delete the record for `key`, returning whether one existed.
    async fn delete(&self, key: &str) -> Result<bool, Error>;
}
