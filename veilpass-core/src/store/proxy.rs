//! Transparent field encryption over a document store.
//!
//! The proxy sits between callers and a [`DocumentStore`] and applies
//! the sensitive-field schema on every operation:
//!
//! - **Writes** seal each sensitive field into a `vp1:` envelope before
//!   it leaves the process. Writing a sensitive field requires the
//!   vault to be unlocked; an empty value is stored as `null`, never as
//!   an envelope of nothing.
//! - **Reads** open envelopes back into plaintext. A locked vault is
//!   not an error on the read path: documents come back with their
//!   envelopes intact so callers can still render titles and folders.
//!   A field that fails to decrypt is replaced by a sentinel marker and
//!   never aborts the surrounding document or list.
//!
//! Values that are not envelopes - legacy plaintext, `null`, absent
//! fields - pass through unchanged in both directions.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::schema::schema_for;
use super::{Document, DocumentStore, Fields, Filter};
use crate::crypto::cipher::{decrypt_to_string, encrypt_string, is_envelope};
use crate::vault::VaultKeyManager;
use crate::{Result, VaultError};

/// Marker substituted for a sensitive field that failed to decrypt.
pub const DECRYPTION_FAILED_SENTINEL: &str = "[decryption failed]";

/// Outcome of a bulk write: which items landed, which did not.
#[derive(Debug, Default)]
pub struct BulkWriteReport {
    pub created: Vec<Document>,
    pub failures: Vec<BulkWriteFailure>,
}

impl BulkWriteReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A single failed item in a bulk write, by input position.
#[derive(Debug)]
pub struct BulkWriteFailure {
    pub index: usize,
    pub error: VaultError,
}

/// Encrypting proxy over a document store.
pub struct SecureStorageProxy<S> {
    store: Arc<S>,
    keys: Arc<VaultKeyManager>,
}

impl<S: DocumentStore> SecureStorageProxy<S> {
    pub fn new(store: Arc<S>, keys: Arc<VaultKeyManager>) -> Self {
        Self { store, keys }
    }

    /// Create a document, sealing sensitive fields first. Returns the
    /// stored document with sensitive fields decrypted again for the
    /// caller.
    pub async fn create(&self, record_type: &str, mut fields: Fields) -> Result<Document> {
        self.encrypt_fields(record_type, &mut fields)?;
        let doc = self.store.create(record_type, fields).await?;
        debug!(record_type, id = %doc.id, "Document created");
        Ok(self.decrypt_document(doc))
    }

    /// Fetch one document, opening its sensitive fields.
    pub async fn get(&self, record_type: &str, id: &str) -> Result<Document> {
        let doc = self.store.get(record_type, id).await?;
        Ok(self.decrypt_document(doc))
    }

    /// List documents, opening sensitive fields per document. Order and
    /// count always match the underlying store; a document that fails
    /// to decrypt still appears, carrying sentinel markers.
    pub async fn list(&self, record_type: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        let docs = self.store.list(record_type, filters).await?;
        Ok(docs
            .into_iter()
            .map(|doc| self.decrypt_document(doc))
            .collect())
    }

    /// Patch a document, sealing any sensitive fields in the patch.
    pub async fn update(&self, record_type: &str, id: &str, mut fields: Fields) -> Result<Document> {
        self.encrypt_fields(record_type, &mut fields)?;
        let doc = self.store.update(record_type, id, fields).await?;
        debug!(record_type, id = %doc.id, "Document updated");
        Ok(self.decrypt_document(doc))
    }

    /// Delete a document. No cryptography involved.
    pub async fn delete(&self, record_type: &str, id: &str) -> Result<()> {
        self.store.delete(record_type, id).await
    }

    /// Create many documents, one at a time in input order. A failed
    /// item is recorded and skipped; it never aborts the remainder.
    pub async fn create_many(&self, record_type: &str, items: Vec<Fields>) -> BulkWriteReport {
        let mut report = BulkWriteReport::default();
        for (index, fields) in items.into_iter().enumerate() {
            match self.create(record_type, fields).await {
                Ok(doc) => report.created.push(doc),
                Err(error) => {
                    warn!(record_type, index, error = %error, "Bulk write item failed");
                    report.failures.push(BulkWriteFailure { index, error });
                }
            }
        }
        report
    }

    /// Seal sensitive fields in place.
    ///
    /// Values that are already envelopes are left alone, so a document
    /// read while locked can be written back without double-wrapping
    /// the fields that were never opened.
    fn encrypt_fields(&self, record_type: &str, fields: &mut Fields) -> Result<()> {
        let schema = match schema_for(record_type) {
            Some(schema) => schema,
            None => return Ok(()),
        };

        let mut to_encrypt = Vec::new();
        for name in schema.sensitive_fields {
            let is_empty = matches!(fields.get(*name), Some(Value::String(s)) if s.is_empty());
            if is_empty {
                fields.insert((*name).to_string(), Value::Null);
                continue;
            }
            let needs_seal = matches!(fields.get(*name), Some(Value::String(s)) if !is_envelope(s));
            if needs_seal {
                to_encrypt.push(*name);
            }
        }

        if to_encrypt.is_empty() {
            return Ok(());
        }

        let key = self.keys.current_key()?;
        for name in to_encrypt {
            if let Some(Value::String(plaintext)) = fields.get(name) {
                let envelope = encrypt_string(&key, plaintext)?;
                fields.insert(name.to_string(), Value::String(envelope));
            }
        }
        self.keys.touch_activity();
        Ok(())
    }

    /// Open sensitive fields in place. Never fails: a locked vault
    /// passes envelopes through and a bad envelope becomes a sentinel.
    fn decrypt_document(&self, mut doc: Document) -> Document {
        let schema = match schema_for(&doc.record_type) {
            Some(schema) => schema,
            None => return doc,
        };

        let key = match self.keys.current_key() {
            Ok(key) => key,
            Err(_) => {
                debug!(record_type = %doc.record_type, id = %doc.id, "Vault locked, returning sealed fields");
                return doc;
            }
        };

        for name in schema.sensitive_fields {
            let envelope = match doc.fields.get(*name) {
                Some(Value::String(s)) if is_envelope(s) => s.clone(),
                _ => continue,
            };
            match decrypt_to_string(&key, &envelope) {
                Ok(plaintext) => {
                    doc.fields
                        .insert((*name).to_string(), Value::String(plaintext));
                }
                Err(error) => {
                    warn!(
                        record_type = %doc.record_type,
                        id = %doc.id,
                        field = *name,
                        error = %error,
                        "Sensitive field failed to decrypt"
                    );
                    doc.fields.insert(
                        (*name).to_string(),
                        Value::String(DECRYPTION_FAILED_SENTINEL.to_string()),
                    );
                }
            }
        }
        self.keys.touch_activity();
        doc
    }
}
