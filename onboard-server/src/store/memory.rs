//! In-process document store
//!
//! A single mutex guards every collection, so each operation is atomic.
//! Unique fields are enforced like the SurrealDB indexes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{Collection, Document, DocumentStore, Filter, StoreError, StoreResult, Update};

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Vec<(String, Document)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: Collection) -> usize {
        self.collections
            .lock()
            .get(&collection)
            .map_or(0, Vec::len)
    }
}

fn check_unique(
    collection: Collection,
    existing: &[(String, Document)],
    document: &Document,
    skip_key: Option<&str>,
) -> StoreResult<()> {
    for field in collection.unique_fields() {
        let Some(value) = document.get(*field).filter(|v| !v.is_null()) else {
            continue;
        };
        let taken = existing
            .iter()
            .filter(|(key, _)| Some(key.as_str()) != skip_key)
            .any(|(_, other)| other.get(*field) == Some(value));
        if taken {
            return Err(StoreError::Duplicate {
                collection,
                field: (*field).to_string(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: Collection, document: Document) -> StoreResult<String> {
        let mut collections = self.collections.lock();
        let documents = collections.entry(collection).or_default();
        check_unique(collection, documents, &document, None)?;

        let key = uuid::Uuid::new_v4().simple().to_string();
        documents.push((key.clone(), document));
        Ok(key)
    }

    async fn read(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>> {
        let collections = self.collections.lock();
        Ok(collections.get(&collection).and_then(|documents| {
            documents
                .iter()
                .find(|(_, document)| filter.matches(document))
                .map(|(_, document)| document.clone())
        }))
    }

    async fn read_all(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Vec<Document>> {
        let collections = self.collections.lock();
        Ok(collections
            .get(&collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|(_, document)| filter.matches(document))
                    .map(|(_, document)| document.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64> {
        let mut collections = self.collections.lock();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let Some(index) = documents
            .iter()
            .position(|(_, document)| filter.matches(document))
        else {
            return Ok(0);
        };

        let mut updated = documents[index].1.clone();
        update.apply(&mut updated);
        check_unique(collection, documents, &updated, Some(&documents[index].0))?;
        documents[index].1 = updated;
        Ok(1)
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut collections = self.collections.lock();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|(_, document)| !filter.matches(document));
        Ok((before - documents.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let store = MemoryStore::new();
        let key = store
            .create(
                Collection::OnboardingRequests,
                doc(json!({"request_id": "R1", "email": "a@acme.com"})),
            )
            .await
            .unwrap();
        assert!(!key.is_empty());

        let found = store
            .read(
                Collection::OnboardingRequests,
                &Filter::new().eq("request_id", "R1"),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["email"], "a@acme.com");

        let other = store
            .read(
                Collection::OnboardedTenants,
                &Filter::new().eq("request_id", "R1"),
            )
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_unique_fields_enforced_per_collection() {
        let store = MemoryStore::new();
        store
            .create(
                Collection::OnboardingRequests,
                doc(json!({"request_id": "R1", "email": "a@acme.com"})),
            )
            .await
            .unwrap();

        let err = store
            .create(
                Collection::OnboardingRequests,
                doc(json!({"request_id": "R2", "email": "a@acme.com"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field, .. } if field == "email"));

        // email is not unique in the activated collection
        store
            .create(
                Collection::OnboardedTenants,
                doc(json!({"request_id": "R1", "email": "a@acme.com"})),
            )
            .await
            .unwrap();
        let err = store
            .create(
                Collection::OnboardedTenants,
                doc(json!({"request_id": "R1"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field, .. } if field == "request_id"));
    }

    #[tokio::test]
    async fn test_update_one_is_conditional() {
        let store = MemoryStore::new();
        store
            .create(
                Collection::OnboardingRequests,
                doc(json!({"request_id": "R1", "status": "pending"})),
            )
            .await
            .unwrap();

        let filter = Filter::new()
            .eq("request_id", "R1")
            .eq("status", "pending");
        let update = Update::new().set("status", "approval_in_progress");

        let first = store
            .update_one(Collection::OnboardingRequests, &filter, &update)
            .await
            .unwrap();
        let second = store
            .update_one(Collection::OnboardingRequests, &filter, &update)
            .await
            .unwrap();
        assert_eq!((first, second), (1, 0));
    }

    #[tokio::test]
    async fn test_update_one_touches_a_single_document() {
        let store = MemoryStore::new();
        for id in ["R1", "R2"] {
            store
                .create(
                    Collection::OnboardingRequests,
                    doc(json!({"request_id": id, "status": "pending"})),
                )
                .await
                .unwrap();
        }

        let modified = store
            .update_one(
                Collection::OnboardingRequests,
                &Filter::new().eq("status", "pending"),
                &Update::new().set("status", "failed"),
            )
            .await
            .unwrap();
        assert_eq!(modified, 1);

        let pending = store
            .read_all(
                Collection::OnboardingRequests,
                &Filter::new().eq("status", "pending"),
            )
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_counts() {
        let store = MemoryStore::new();
        store
            .create(
                Collection::OnboardingRequests,
                doc(json!({"request_id": "R1"})),
            )
            .await
            .unwrap();

        let filter = Filter::new().eq("request_id", "R1");
        assert_eq!(
            store
                .delete(Collection::OnboardingRequests, &filter)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .delete(Collection::OnboardingRequests, &filter)
                .await
                .unwrap(),
            0
        );
        assert_eq!(store.count(Collection::OnboardingRequests), 0);
    }
}
