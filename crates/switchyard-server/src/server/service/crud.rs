//! In-memory record store behind the CRUD service.
//!
//! A single reader/writer lock guards both the records and the identifier
//! generator. Identifiers are drawn while the write lock is held, so a record
//! becomes visible under its identifier atomically and identifiers are issued
//! in insertion order.

use std::collections::HashMap;
use switchyard_core::{
    Error, Result,
    types::{IdGenStatus, RecordIdGenerator, encode},
};
use tokio::sync::RwLock;

/// One stored entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<String, String>,
    ids: RecordIdGenerator,
}

#[derive(Debug, Default)]
pub struct RecordStore {
    records: RwLock<Records>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `name` under a new identifier and returns that identifier.
    ///
    /// Empty names are accepted.
    pub async fn create(&self, name: String) -> Result<String> {
        let mut records = self.records.write().await;
        let id = loop {
            match records.ids.try_next_id()? {
                IdGenStatus::Ready { id } => break encode(&id),
                // Millisecond exhausted; let the clock tick.
                IdGenStatus::Pending { .. } => tokio::task::yield_now().await,
            }
        };
        records.by_id.insert(id.clone(), name);
        Ok(id)
    }

    pub async fn read(&self, id: &str) -> Result<Record> {
        let records = self.records.read().await;
        records
            .by_id
            .get(id)
            .map(|name| Record {
                id: id.to_string(),
                name: name.clone(),
            })
            .ok_or_else(|| not_found(id))
    }

    /// Replaces the name stored under `id`. Unknown identifiers are not
    /// created.
    pub async fn update(&self, id: &str, name: String) -> Result<Record> {
        self.replace_with(id, move |_| name).await
    }

    /// Replaces the name stored under `id` with `rename(current)`.
    ///
    /// `rename` runs under the write lock and the slot is only written once it
    /// returns, so a panic inside it leaves the record untouched.
    pub(crate) async fn replace_with<F>(&self, id: &str, rename: F) -> Result<Record>
    where
        F: FnOnce(&str) -> String,
    {
        let mut records = self.records.write().await;
        let slot = records.by_id.get_mut(id).ok_or_else(|| not_found(id))?;
        let name = rename(slot.as_str());
        slot.clone_from(&name);
        Ok(Record {
            id: id.to_string(),
            name,
        })
    }

    pub async fn delete(&self, id: &str) -> Result<String> {
        let mut records = self.records.write().await;
        records
            .by_id
            .remove(id)
            .map(|_| id.to_string())
            .ok_or_else(|| not_found(id))
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.records.read().await.by_id.len()
    }
}

fn not_found(id: &str) -> Error {
    Error::NotFound { id: id.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use switchyard_core::types::RECORD_ID_LEN;

    #[tokio::test]
    async fn create_then_read_returns_the_name() {
        let store = RecordStore::new();
        let id = store.create("alice".into()).await.unwrap();

        assert_eq!(id.len(), RECORD_ID_LEN);
        assert_eq!(
            store.read(&id).await.unwrap(),
            Record {
                id: id.clone(),
                name: "alice".into()
            }
        );
    }

    #[tokio::test]
    async fn update_replaces_the_name() {
        let store = RecordStore::new();
        let id = store.create("alice".into()).await.unwrap();

        let updated = store.update(&id, "bob".into()).await.unwrap();
        assert_eq!(updated.name, "bob");
        assert_eq!(store.read(&id).await.unwrap().name, "bob");
    }

    #[tokio::test]
    async fn delete_removes_the_record_once() {
        let store = RecordStore::new();
        let id = store.create("alice".into()).await.unwrap();

        assert_eq!(store.delete(&id).await.unwrap(), id);
        assert_eq!(store.read(&id).await, Err(not_found(&id)));
        assert_eq!(store.delete(&id).await, Err(not_found(&id)));
    }

    #[tokio::test]
    async fn unknown_identifiers_are_not_found_and_never_created() {
        let store = RecordStore::new();

        assert_eq!(store.read("does-not-exist").await, Err(not_found("does-not-exist")));
        assert_eq!(store.read("").await, Err(not_found("")));
        assert_eq!(
            store.update("ghost", "x".into()).await,
            Err(not_found("ghost"))
        );
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn replace_with_sees_the_current_name() {
        let store = RecordStore::new();
        let id = store.create("alice".into()).await.unwrap();

        let record = store
            .replace_with(&id, |current| format!("{current}-2"))
            .await
            .unwrap();
        assert_eq!(record.name, "alice-2");
        assert_eq!(store.read(&id).await.unwrap().name, "alice-2");
    }

    #[tokio::test]
    async fn empty_name_is_stored() {
        let store = RecordStore::new();
        let id = store.create(String::new()).await.unwrap();
        assert_eq!(store.read(&id).await.unwrap().name, "");
    }

    #[tokio::test]
    async fn identifiers_increase_and_are_never_reused() {
        let store = RecordStore::new();
        let mut issued = Vec::new();
        for i in 0..64 {
            let id = store.create(format!("r{i}")).await.unwrap();
            if i % 2 == 0 {
                store.delete(&id).await.unwrap();
            }
            issued.push(id);
        }

        assert!(issued.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(store.count().await, 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_get_distinct_ids() {
        let store = Arc::new(RecordStore::new());
        let tasks: Vec<_> = (0..200)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.create(format!("name-{i}")).await.unwrap() })
            })
            .collect();

        let mut ids = HashSet::new();
        for task in tasks {
            assert!(ids.insert(task.await.unwrap()));
        }
        assert_eq!(store.count().await, 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reads_and_updates_stay_consistent() {
        let store = Arc::new(RecordStore::new());
        let id = store.create("v0".into()).await.unwrap();

        let writer = {
            let store = Arc::clone(&store);
            let id = id.clone();
            tokio::spawn(async move {
                for i in 1..=100 {
                    store.update(&id, format!("v{i}")).await.unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        let record = store.read(&id).await.unwrap();
                        assert!(record.name.starts_with('v'));
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(store.read(&id).await.unwrap().name, "v100");
    }
}
