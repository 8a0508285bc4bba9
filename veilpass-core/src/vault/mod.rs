//! Vault key manager - the single custodian of the in-memory vault key.
//!
//! The manager is a two-state machine:
//! - **Locked**: no key material exists in memory. Every key access
//!   fails with [`VaultError::Locked`].
//! - **Unlocked**: one vault key is held behind an [`Arc`], plus the
//!   last-activity timestamp that drives inactivity auto-lock.
//!
//! Unlocking while already unlocked atomically replaces the key: there
//! is never a moment with two current keys or none. Operations capture
//! the key as an `Arc` handle up front, so work already in flight
//! finishes with the key it started with even if another thread locks
//! or re-keys the vault; the old key is zeroized once the last handle
//! drops.
//!
//! Expiry is lazy: there is no background timer. Every access checks
//! the last-activity timestamp against the policy and transitions to
//! Locked on the spot when the vault has idled past the timeout.

pub mod autolock;
pub mod check;
pub mod session;

pub use autolock::AutoLockPolicy;
pub use check::{create_check_value, verify_check_value};
pub use session::{ActivityStore, MemoryActivityStore};

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::crypto::key::{VaultKey, VAULT_KEY_LEN};
use crate::crypto::{kdf, CryptoError};
use crate::{Result, VaultError};

enum VaultState {
    Locked,
    Unlocked {
        key: Arc<VaultKey>,
        last_activity: i64,
    },
}

/// Owns the vault key and the lock/unlock lifecycle.
pub struct VaultKeyManager {
    state: RwLock<VaultState>,
    policy: RwLock<AutoLockPolicy>,
    activity: Option<Arc<dyn ActivityStore>>,
}

impl VaultKeyManager {
    /// Manager with in-memory activity tracking only.
    pub fn new(policy: AutoLockPolicy) -> Self {
        Self {
            state: RwLock::new(VaultState::Locked),
            policy: RwLock::new(policy),
            activity: None,
        }
    }

    /// Manager backed by an external activity store. The store is then
    /// authoritative: a missing or stale marker means locked, whatever
    /// the in-memory timestamp says.
    pub fn with_activity_store(policy: AutoLockPolicy, store: Arc<dyn ActivityStore>) -> Self {
        Self {
            state: RwLock::new(VaultState::Locked),
            policy: RwLock::new(policy),
            activity: Some(store),
        }
    }

    /// Derive the vault key from the master password and install it.
    ///
    /// Derivation alone cannot detect a wrong password; callers that
    /// need verification decrypt a stored check value first (see
    /// [`crate::session::VaultSession::unlock`]). If the vault was
    /// already unlocked the key is replaced atomically.
    pub fn unlock(&self, master_password: &str, user_id: &str) -> Result<()> {
        debug!("Deriving vault key from master password");
        let key = kdf::derive_vault_key(master_password, user_id)?;
        self.install(key);
        Ok(())
    }

    /// Install raw key bytes recovered outside the password path, e.g.
    /// unwrapped from key escrow. Transitions to unlocked exactly as
    /// [`VaultKeyManager::unlock`] does.
    pub fn import_key(&self, raw: &[u8]) -> Result<()> {
        if raw.len() != VAULT_KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: VAULT_KEY_LEN,
                got: raw.len(),
            }
            .into());
        }
        let mut bytes = [0u8; VAULT_KEY_LEN];
        bytes.copy_from_slice(raw);
        let key = VaultKey::from_bytes(bytes);
        bytes.zeroize();
        self.install(key);
        Ok(())
    }

    /// Drop the key and clear the activity marker. Idempotent.
    pub fn lock(&self) {
        {
            let mut state = self.state.write();
            if matches!(&*state, VaultState::Locked) {
                return;
            }
            *state = VaultState::Locked;
        }
        if let Some(store) = &self.activity {
            store.clear();
        }
        info!("Vault locked");
    }

    /// Whether the vault is currently unlocked. Checks expiry first, so
    /// an idled-out vault reports locked on the access that notices.
    pub fn is_unlocked(&self) -> bool {
        self.expire_if_idle();
        matches!(&*self.state.read(), VaultState::Unlocked { .. })
    }

    /// Capture a handle to the current vault key.
    ///
    /// The handle stays valid for the operation that captured it even
    /// if the vault locks concurrently; new operations fail until the
    /// next unlock.
    pub fn current_key(&self) -> Result<Arc<VaultKey>> {
        self.expire_if_idle();
        match &*self.state.read() {
            VaultState::Unlocked { key, .. } => Ok(Arc::clone(key)),
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    /// Refresh the activity timestamp. No-op while locked or already
    /// idled out; activity never resurrects an expired session.
    pub fn touch_activity(&self) {
        if !self.is_unlocked() {
            return;
        }
        let now = Utc::now().timestamp_millis();
        {
            let mut state = self.state.write();
            match &mut *state {
                VaultState::Unlocked { last_activity, .. } => *last_activity = now,
                VaultState::Locked => return,
            }
        }
        if let Some(store) = &self.activity {
            store.store(now);
        }
    }

    /// Replace the auto-lock policy, effective from the next expiry check.
    pub fn set_policy(&self, policy: AutoLockPolicy) {
        *self.policy.write() = policy;
        debug!(timeout_secs = policy.timeout().as_secs(), "Auto-lock policy updated");
    }

    pub fn policy(&self) -> AutoLockPolicy {
        *self.policy.read()
    }

    fn install(&self, key: VaultKey) {
        let now = Utc::now().timestamp_millis();
        let replaced;
        {
            let mut state = self.state.write();
            replaced = matches!(&*state, VaultState::Unlocked { .. });
            *state = VaultState::Unlocked {
                key: Arc::new(key),
                last_activity: now,
            };
        }
        if let Some(store) = &self.activity {
            store.store(now);
        }
        if replaced {
            info!("Vault key replaced");
        } else {
            info!("Vault unlocked");
        }
    }

    /// Authoritative last-activity timestamp for an unlocked vault, or
    /// `None` when the external marker is missing.
    fn last_activity(state: &VaultState, activity: &Option<Arc<dyn ActivityStore>>) -> Option<i64> {
        match state {
            VaultState::Locked => None,
            VaultState::Unlocked { last_activity, .. } => match activity {
                Some(store) => store.load(),
                None => Some(*last_activity),
            },
        }
    }

    fn expire_if_idle(&self) {
        let now = Utc::now().timestamp_millis();
        let policy = *self.policy.read();

        {
            let state = self.state.read();
            if matches!(&*state, VaultState::Locked) {
                return;
            }
            if let Some(last) = Self::last_activity(&state, &self.activity) {
                if !policy.is_expired(last, now) {
                    return;
                }
            }
            // Marker missing or stale: fall through and lock.
        }

        {
            let mut state = self.state.write();
            // Re-check under the write lock; another thread may have
            // touched or locked in the meantime.
            if matches!(&*state, VaultState::Locked) {
                return;
            }
            if let Some(last) = Self::last_activity(&state, &self.activity) {
                if !policy.is_expired(last, now) {
                    return;
                }
            }
            *state = VaultState::Locked;
        }
        if let Some(store) = &self.activity {
            store.clear();
        }
        info!("Vault auto-locked after inactivity");
    }
}
