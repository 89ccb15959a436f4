//! In-memory lockout store.
//!
//! Useful for tests and single-process deployments where losing counters on
//! restart is acceptable.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    Error,
    clock::{Clock, SystemClock},
    error::StorageError,
    record::LockoutRecord,
    repositories::{LockoutGateway, LockoutStore},
};

/// A [`LockoutStore`] backed by a concurrent hash map keyed by record key.
///
/// `updated_at` is stamped from the store's [`Clock`]; share the service's
/// clock with [`with_clock`](Self::with_clock) when driving time manually.
pub struct InMemoryLockoutStore {
    records: DashMap<String, LockoutRecord>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryLockoutStore {
    fn default() -> Self {
        Self {
            records: DashMap::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for InMemoryLockoutStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryLockoutStore")
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl InMemoryLockoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl LockoutGateway for InMemoryLockoutStore {
    type Entity = LockoutRecord;

    async fn save(&self, mut entity: LockoutRecord) -> Result<LockoutRecord, Error> {
        entity.updated_at = self.clock.now();

        match self.records.entry(entity.key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().id != entity.id {
                    return Err(StorageError::Constraint(format!(
                        "key {} already belongs to record {}",
                        entity.key,
                        occupied.get().id
                    ))
                    .into());
                }
                occupied.insert(entity.clone());
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entity.clone());
            }
        }

        Ok(entity)
    }
}

#[async_trait]
impl LockoutStore for InMemoryLockoutStore {
    async fn find(&self, key: &str) -> Result<Option<LockoutRecord>, Error> {
        Ok(self.records.get(key).map(|record| record.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        Ok(self.records.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{DateTime, Duration, Utc};

    #[tokio::test]
    async fn test_save_and_find() {
        let store = InMemoryLockoutStore::new();
        assert!(store.find("a@example.com").await.unwrap().is_none());

        let mut record = LockoutRecord::new("a@example.com", Utc::now());
        record.attempts = 2;
        let saved = store.save(record.clone()).await.unwrap();
        assert_eq!(saved.id, record.id);
        assert!(saved.updated_at >= record.updated_at);

        let found = store.find("a@example.com").await.unwrap().unwrap();
        assert_eq!(found.attempts, 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_overwrites_same_record() {
        let store = InMemoryLockoutStore::new();
        let mut record = store
            .save(LockoutRecord::new("a@example.com", Utc::now()))
            .await
            .unwrap();

        record.attempts = 3;
        record.lock_until = Some(Utc::now() + Duration::hours(1));
        store.save(record.clone()).await.unwrap();

        let found = store.find("a@example.com").await.unwrap().unwrap();
        assert_eq!(found.attempts, 3);
        assert_eq!(found.lock_until, record.lock_until);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_rejects_second_record_for_key() {
        let store = InMemoryLockoutStore::new();
        store
            .save(LockoutRecord::new("a@example.com", Utc::now()))
            .await
            .unwrap();

        let result = store
            .save(LockoutRecord::new("a@example.com", Utc::now()))
            .await;
        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Constraint(_)))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryLockoutStore::new();
        store
            .save(LockoutRecord::new("a@example.com", Utc::now()))
            .await
            .unwrap();

        assert!(store.delete("a@example.com").await.unwrap());
        assert!(!store.delete("a@example.com").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_updated_at_follows_clock() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let store = InMemoryLockoutStore::new().with_clock(clock.clone());

        let record = store
            .save(LockoutRecord::new("a@example.com", start))
            .await
            .unwrap();
        assert_eq!(record.updated_at, start);

        clock.advance(Duration::minutes(5));
        let record = store.save(record).await.unwrap();
        assert_eq!(record.created_at, start);
        assert_eq!(record.updated_at, start + Duration::minutes(5));
    }
}
