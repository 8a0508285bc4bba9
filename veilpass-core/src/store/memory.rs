//! In-memory document store.
//!
//! Reference [`DocumentStore`] used by tests, demos, and development
//! setups that do not want a network backend. Documents are kept per
//! record type in insertion order with uuid v4 ids, mirroring the
//! server-assigned-id contract of a real backend.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{Document, DocumentStore, Fields, Filter};
use crate::{Result, VaultError};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(doc: &Document, filters: &[Filter]) -> bool {
        filters
            .iter()
            .all(|f| doc.fields.get(&f.field) == Some(&f.value))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, record_type: &str, fields: Fields) -> Result<Document> {
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            record_type: record_type.to_string(),
            fields,
        };
        self.collections
            .write()
            .entry(record_type.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn get(&self, record_type: &str, id: &str) -> Result<Document> {
        self.collections
            .read()
            .get(record_type)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned()
            .ok_or_else(|| VaultError::NotFound(format!("{} {}", record_type, id)))
    }

    async fn list(&self, record_type: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        Ok(self
            .collections
            .read()
            .get(record_type)
            .map(|docs| {
                docs.iter()
                    .filter(|d| Self::matches(d, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, record_type: &str, id: &str, fields: Fields) -> Result<Document> {
        let mut collections = self.collections.write();
        let doc = collections
            .get_mut(record_type)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| VaultError::NotFound(format!("{} {}", record_type, id)))?;
        for (name, value) in fields {
            doc.fields.insert(name, value);
        }
        Ok(doc.clone())
    }

    async fn delete(&self, record_type: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write();
        let docs = collections
            .get_mut(record_type)
            .ok_or_else(|| VaultError::NotFound(format!("{} {}", record_type, id)))?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(VaultError::NotFound(format!("{} {}", record_type, id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let store = MemoryStore::new();
        let a = store.create("credential", Fields::new()).await.unwrap();
        let b = store.create("credential", Fields::new()).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        let result = store.get("credential", "nope").await;
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = MemoryStore::new();
        for name in ["first", "second", "third"] {
            store
                .create("credential", fields(&[("name", json!(name))]))
                .await
                .unwrap();
        }
        let docs = store.list("credential", &[]).await.unwrap();
        let names: Vec<_> = docs.iter().filter_map(|d| d.get_str("name")).collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let store = MemoryStore::new();
        store
            .create("credential", fields(&[("user_id", json!("u1"))]))
            .await
            .unwrap();
        store
            .create("credential", fields(&[("user_id", json!("u2"))]))
            .await
            .unwrap();
        let docs = store
            .list("credential", &[Filter::eq("user_id", "u1")])
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("user_id"), Some("u1"));
    }

    #[tokio::test]
    async fn test_update_patches_fields() {
        let store = MemoryStore::new();
        let doc = store
            .create(
                "credential",
                fields(&[("name", json!("github")), ("folder", json!("work"))]),
            )
            .await
            .unwrap();
        let updated = store
            .update("credential", &doc.id, fields(&[("name", json!("gitlab"))]))
            .await
            .unwrap();
        assert_eq!(updated.get_str("name"), Some("gitlab"));
        // Untouched fields survive the patch.
        assert_eq!(updated.get_str("folder"), Some("work"));
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let store = MemoryStore::new();
        let doc = store.create("credential", Fields::new()).await.unwrap();
        store.delete("credential", &doc.id).await.unwrap();
        assert!(matches!(
            store.get("credential", &doc.id).await,
            Err(VaultError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("credential", &doc.id).await,
            Err(VaultError::NotFound(_))
        ));
    }
}
