//! Per-user vault settings.
//!
//! Settings are plaintext configuration, not secrets: they live in an
//! ordinary document per user and never pass through the field cipher.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::store::{record_types, DocumentStore, Filter};
use crate::vault::autolock::{
    AutoLockPolicy, DEFAULT_TIMEOUT_MINUTES, MAX_TIMEOUT_MINUTES, MIN_TIMEOUT_MINUTES,
};
use crate::vault::VaultKeyManager;
use crate::{Result, VaultError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Inactivity auto-lock timeout in minutes, clamped to 1-120.
    #[serde(default = "default_minutes")]
    pub auto_lock_minutes: u32,
}

fn default_minutes() -> u32 {
    DEFAULT_TIMEOUT_MINUTES
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            auto_lock_minutes: DEFAULT_TIMEOUT_MINUTES,
        }
    }
}

impl VaultSettings {
    /// Settings with out-of-range values pulled back into bounds.
    pub fn clamped(self) -> Self {
        Self {
            auto_lock_minutes: self
                .auto_lock_minutes
                .clamp(MIN_TIMEOUT_MINUTES, MAX_TIMEOUT_MINUTES),
        }
    }

    /// The auto-lock policy these settings describe.
    pub fn policy(&self) -> AutoLockPolicy {
        AutoLockPolicy::from_minutes(self.auto_lock_minutes)
    }

    /// Load this user's settings, falling back to defaults when none
    /// are stored. Stored values outside the valid range are clamped.
    pub async fn load<S: DocumentStore>(store: &S, user_id: &str) -> Result<Self> {
        let docs = store
            .list(record_types::SETTINGS, &[Filter::eq("user_id", user_id)])
            .await?;
        match docs.into_iter().last() {
            None => Ok(Self::default()),
            Some(doc) => {
                let settings: VaultSettings = serde_json::from_value(Value::Object(doc.fields))
                    .map_err(|e| VaultError::Serialization(e.to_string()))?;
                Ok(settings.clamped())
            }
        }
    }

    /// Persist these settings for the user, replacing any stored ones.
    pub async fn save<S: DocumentStore>(&self, store: &S, user_id: &str) -> Result<()> {
        let settings = self.clamped();
        let mut fields = match serde_json::to_value(settings)
            .map_err(|e| VaultError::Serialization(e.to_string()))?
        {
            Value::Object(map) => map,
            _ => {
                return Err(VaultError::Serialization(
                    "settings did not serialize to an object".to_string(),
                ))
            }
        };
        fields.insert("user_id".to_string(), Value::String(user_id.to_string()));

        let existing = store
            .list(record_types::SETTINGS, &[Filter::eq("user_id", user_id)])
            .await?;
        match existing.into_iter().last() {
            Some(doc) => {
                store
                    .update(record_types::SETTINGS, &doc.id, fields)
                    .await?;
            }
            None => {
                store.create(record_types::SETTINGS, fields).await?;
            }
        }
        debug!(auto_lock_minutes = settings.auto_lock_minutes, "Settings saved");
        Ok(())
    }

    /// Load this user's settings and point the key manager's auto-lock
    /// policy at them. Takes effect from the next expiry evaluation.
    pub async fn apply<S: DocumentStore>(
        store: &S,
        user_id: &str,
        keys: &VaultKeyManager,
    ) -> Result<Self> {
        let settings = Self::load(store, user_id).await?;
        keys.set_policy(settings.policy());
        Ok(settings)
    }
}
