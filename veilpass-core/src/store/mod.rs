//! Document storage and the field-encryption proxy.
//!
//! The backing service is treated as an opaque, schemaless CRUD store:
//! documents are JSON field maps grouped by record type, addressed by
//! server-assigned ids, and listable with equality filters. The store
//! itself never sees plaintext for sensitive fields; the
//! [`SecureStorageProxy`] seals them on the way in and opens them on
//! the way out.

pub mod memory;
pub mod proxy;
pub mod schema;


pub use memory::MemoryStore;
pub use proxy::{BulkWriteFailure, BulkWriteReport, SecureStorageProxy, DECRYPTION_FAILED_SENTINEL};
pub use schema::{record_types, schema_for, SensitiveRecordSchema};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// A document's field map.
pub type Fields = serde_json::Map<String, Value>;

/// A stored document: server-assigned id plus its fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub record_type: String,
    pub fields: Fields,
}

impl Document {
    /// Convenience accessor for a string field.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Equality filter for list queries.
///
/// Filters compare stored values verbatim, so they are only meaningful
/// on plaintext fields; an encrypted field never matches because every
/// envelope is unique.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Opaque document store.
///
/// Implementations report backend failures as
/// [`crate::VaultError::Store`] and missing documents as
/// [`crate::VaultError::NotFound`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document and return it with its assigned id.
    async fn create(&self, record_type: &str, fields: Fields) -> Result<Document>;

    /// Fetch a single document by id.
    async fn get(&self, record_type: &str, id: &str) -> Result<Document>;

    /// List documents of a record type, newest-insertion-last, matching
    /// all given filters.
    async fn list(&self, record_type: &str, filters: &[Filter]) -> Result<Vec<Document>>;

    /// Patch a document: provided fields overwrite, absent fields are
    /// left alone. Returns the updated document.
    async fn update(&self, record_type: &str, id: &str, fields: Fields) -> Result<Document>;

    /// Delete a document by id.
    async fn delete(&self, record_type: &str, id: &str) -> Result<()>;
}
