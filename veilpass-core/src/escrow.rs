//! Authenticator-gated key escrow.
//!
//! Escrow lets a user unlock without retyping the master password: the
//! vault key is wrapped under a second 256-bit key released by an
//! authenticator ceremony (a passkey with key-derivation support, or a
//! platform biometric), and the wrapped blob is stored server-side.
//! The wrapping key itself is never stored anywhere - the authenticator
//! re-derives it on every ceremony - so the blob is useless without a
//! fresh ceremony, and the server never holds enough to open a vault.
//!
//! Failure at any step leaves the vault lock state and any previously
//! stored blob unchanged: enabling never locks an unlocked vault, and a
//! failed recovery never unlocks a locked one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::crypto::cipher::{decrypt_bytes, encrypt_bytes};
use crate::crypto::kdf::IV_LEN;
use crate::crypto::key::{VaultKey, WrappingKey};
use crate::store::{record_types, DocumentStore, Filter};
use crate::vault::VaultKeyManager;
use crate::{Result, VaultError};

/// A registered authenticator credential and the wrapping key its
/// enrollment ceremony released.
pub struct Enrollment {
    pub credential_id: String,
    pub wrapping_key: WrappingKey,
}

/// The authenticator ceremony, injected so escrow logic stays testable
/// and platform-free.
///
/// Both ceremonies involve user presence; implementations surface
/// cancellation and platform errors as [`VaultError::Escrow`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Run the enrollment ceremony: create a credential and release its
    /// wrapping key.
    async fn register(&self) -> Result<Enrollment>;

    /// Run an assertion ceremony against a known credential, releasing
    /// the same wrapping key enrollment did.
    async fn authenticate(&self, credential_id: &str) -> Result<WrappingKey>;

    /// Clean up a credential after escrow is disabled. Best-effort by
    /// default.
    async fn revoke(&self, _credential_id: &str) -> Result<()> {
        Ok(())
    }
}

/// The vault key wrapped under an authenticator-held key.
///
/// `ciphertext` carries the GCM tag; both parts are base64 in storage
/// and on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEscrowBlob {
    #[serde(with = "b64")]
    pub iv: Vec<u8>,
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Wrap the vault key under a ceremony-released wrapping key.
pub fn wrap_vault_key(
    wrapping_key: &WrappingKey,
    vault_key: &VaultKey,
) -> crate::crypto::Result<KeyEscrowBlob> {
    let payload = encrypt_bytes(wrapping_key.as_bytes(), vault_key.as_bytes())?;
    Ok(KeyEscrowBlob {
        iv: payload[..IV_LEN].to_vec(),
        ciphertext: payload[IV_LEN..].to_vec(),
    })
}

/// Unwrap an escrowed vault key. The returned bytes are zeroized on
/// drop; feed them to [`VaultKeyManager::import_key`] promptly.
pub fn unwrap_vault_key(
    wrapping_key: &WrappingKey,
    blob: &KeyEscrowBlob,
) -> crate::crypto::Result<Zeroizing<Vec<u8>>> {
    let mut payload = Vec::with_capacity(blob.iv.len() + blob.ciphertext.len());
    payload.extend_from_slice(&blob.iv);
    payload.extend_from_slice(&blob.ciphertext);
    decrypt_bytes(wrapping_key.as_bytes(), &payload).map(Zeroizing::new)
}

/// Escrow lifecycle over a document store and the vault key manager.
pub struct EscrowService<S, A> {
    store: Arc<S>,
    keys: Arc<VaultKeyManager>,
    authenticator: A,
}

impl<S: DocumentStore, A: Authenticator> EscrowService<S, A> {
    pub fn new(store: Arc<S>, keys: Arc<VaultKeyManager>, authenticator: A) -> Self {
        Self {
            store,
            keys,
            authenticator,
        }
    }

    /// Enroll an authenticator and store the wrapped vault key,
    /// replacing any previous enrollment for this user.
    ///
    /// Requires an unlocked vault. The new blob is stored before old
    /// ones are removed, so a failure part-way never leaves the user
    /// without a working enrollment.
    pub async fn enable(&self, user_id: &str) -> Result<()> {
        let vault_key = self.keys.current_key()?;
        let enrollment = self.authenticator.register().await?;
        let blob = wrap_vault_key(&enrollment.wrapping_key, &vault_key)?;

        let previous = self.existing_enrollments(user_id).await?;

        let mut fields = match serde_json::to_value(&blob)
            .map_err(|e| VaultError::Serialization(e.to_string()))?
        {
            Value::Object(map) => map,
            _ => {
                return Err(VaultError::Serialization(
                    "escrow blob did not serialize to an object".to_string(),
                ))
            }
        };
        fields.insert("user_id".to_string(), Value::String(user_id.to_string()));
        fields.insert(
            "credential_id".to_string(),
            Value::String(enrollment.credential_id.clone()),
        );
        self.store
            .create(record_types::KEY_ESCROW, fields)
            .await?;

        for doc in previous {
            self.store
                .delete(record_types::KEY_ESCROW, &doc.id)
                .await?;
        }

        info!(credential_id = %enrollment.credential_id, "Key escrow enabled");
        Ok(())
    }

    /// Run the assertion ceremony, unwrap the stored blob, and unlock
    /// the vault with the recovered key.
    ///
    /// Nothing is installed until the unwrap authenticates, so a wrong
    /// authenticator or a tampered blob leaves the vault exactly as it
    /// was.
    pub async fn recover(&self, user_id: &str) -> Result<()> {
        let docs = self.existing_enrollments(user_id).await?;
        let doc = docs
            .last()
            .ok_or_else(|| VaultError::NotFound(format!("no key escrow enrolled for {}", user_id)))?;

        let credential_id = doc
            .get_str("credential_id")
            .ok_or_else(|| VaultError::Escrow("stored enrollment has no credential id".to_string()))?;
        let blob: KeyEscrowBlob = serde_json::from_value(Value::Object(doc.fields.clone()))
            .map_err(|e| VaultError::Serialization(e.to_string()))?;

        let wrapping_key = self.authenticator.authenticate(credential_id).await?;
        let raw = unwrap_vault_key(&wrapping_key, &blob)?;
        self.keys.import_key(&raw)?;

        info!("Vault unlocked via key escrow");
        Ok(())
    }

    /// Remove this user's enrollment. The vault lock state is not
    /// touched; credential revocation at the authenticator is
    /// best-effort.
    pub async fn disable(&self, user_id: &str) -> Result<()> {
        let docs = self.existing_enrollments(user_id).await?;
        for doc in docs {
            let credential_id = doc.get_str("credential_id").map(str::to_string);
            self.store
                .delete(record_types::KEY_ESCROW, &doc.id)
                .await?;
            if let Some(credential_id) = credential_id {
                if let Err(error) = self.authenticator.revoke(&credential_id).await {
                    warn!(%credential_id, %error, "Credential revocation failed");
                }
            }
        }
        info!("Key escrow disabled");
        Ok(())
    }

    /// Whether this user has a stored enrollment.
    pub async fn is_enabled(&self, user_id: &str) -> Result<bool> {
        Ok(!self.existing_enrollments(user_id).await?.is_empty())
    }

    async fn existing_enrollments(&self, user_id: &str) -> Result<Vec<crate::store::Document>> {
        self.store
            .list(
                record_types::KEY_ESCROW,
                &[Filter::eq("user_id", user_id)],
            )
            .await
    }
}
