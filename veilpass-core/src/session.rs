//! Password-path session lifecycle.
//!
//! Ties key derivation, the check value, and the key manager together:
//! `setup` seals a known constant under the freshly derived key and
//! stores it with the account metadata; `unlock` re-derives a candidate
//! key and proves it against that stored check value *before* the
//! candidate is installed. Derivation alone cannot reject a wrong
//! password, so this is the only place wrongness becomes observable -
//! and a failed attempt never replaces a live key.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::crypto::{kdf, CryptoError};
use crate::store::{record_types, Document, DocumentStore, Fields, Filter};
use crate::vault::check::{create_check_value, verify_check_value};
use crate::vault::VaultKeyManager;
use crate::{Result, VaultError};

/// Minimum master password length enforced at setup.
pub const MIN_MASTER_PASSWORD_LEN: usize = 8;

/// Session façade over the key manager and the document store.
pub struct VaultSession<S> {
    store: Arc<S>,
    keys: Arc<VaultKeyManager>,
}

impl<S: DocumentStore> VaultSession<S> {
    pub fn new(store: Arc<S>, keys: Arc<VaultKeyManager>) -> Self {
        Self { store, keys }
    }

    /// First-time initialization: derive the vault key, store the check
    /// value, and leave the vault unlocked.
    pub async fn setup(&self, master_password: &str, user_id: &str) -> Result<()> {
        if master_password.chars().count() < MIN_MASTER_PASSWORD_LEN {
            return Err(VaultError::InvalidInput(format!(
                "master password must be at least {} characters",
                MIN_MASTER_PASSWORD_LEN
            )));
        }
        if self.meta_document(user_id).await?.is_some() {
            return Err(VaultError::InvalidInput(format!(
                "vault already set up for {}",
                user_id
            )));
        }

        let key = kdf::derive_vault_key(master_password, user_id)?;
        let check_value = create_check_value(&key)?;

        let mut fields = Fields::new();
        fields.insert("user_id".to_string(), Value::String(user_id.to_string()));
        fields.insert("check_value".to_string(), Value::String(check_value));
        self.store.create(record_types::VAULT_META, fields).await?;

        self.keys.import_key(key.as_bytes())?;
        info!("Vault initialized");
        Ok(())
    }

    /// Unlock with the master password, verified against the stored
    /// check value.
    ///
    /// The candidate key is proven first and installed second: a wrong
    /// password reports [`VaultError::InvalidPassword`], the candidate
    /// is discarded, and whatever key was live before stays live.
    pub async fn unlock(&self, master_password: &str, user_id: &str) -> Result<()> {
        let doc = self
            .meta_document(user_id)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("no vault set up for {}", user_id)))?;
        let check_value = doc
            .get_str("check_value")
            .ok_or_else(|| VaultError::Store("vault metadata has no check value".to_string()))?;

        let candidate = kdf::derive_vault_key(master_password, user_id)?;
        verify_check_value(&candidate, check_value).map_err(|e| match e {
            CryptoError::AuthenticationFailed => VaultError::InvalidPassword,
            other => VaultError::Crypto(other),
        })?;

        self.keys.import_key(candidate.as_bytes())?;
        Ok(())
    }

    pub fn lock(&self) {
        self.keys.lock();
    }

    pub fn is_unlocked(&self) -> bool {
        self.keys.is_unlocked()
    }

    /// Whether setup has run for this user.
    pub async fn is_set_up(&self, user_id: &str) -> Result<bool> {
        Ok(self.meta_document(user_id).await?.is_some())
    }

    pub fn keys(&self) -> &Arc<VaultKeyManager> {
        &self.keys
    }

    async fn meta_document(&self, user_id: &str) -> Result<Option<Document>> {
        let docs = self
            .store
            .list(
                record_types::VAULT_META,
                &[Filter::eq("user_id", user_id)],
            )
            .await?;
        Ok(docs.into_iter().last())
    }
}
