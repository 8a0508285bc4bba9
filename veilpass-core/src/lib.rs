//! Client-side vault encryption core.
//!
//! Everything sensitive is sealed before it leaves the process and the
//! backing store only ever sees ciphertext. The crate provides:
//!
//! - **Key derivation**: Argon2id from the master password, with a
//!   deterministic per-user salt so no salt storage or sync is needed
//! - **Key custody**: a locked/unlocked state machine holding the one
//!   in-memory vault key, with inactivity auto-lock
//! - **Field envelopes**: AES-256-GCM, self-describing `vp1:` strings
//! - **Storage proxy**: transparent seal-on-write / open-on-read over
//!   an opaque document store, driven by per-type schemas
//! - **Key escrow**: the vault key wrapped under an authenticator-held
//!   key, for passkey- or biometric-style unlock without the password
//!
//! The top-level flow lives in [`session::VaultSession`]: set up once,
//! then unlock, work through [`store::SecureStorageProxy`], and lock.

pub mod crypto;
pub mod escrow;
pub mod session;
pub mod settings;
pub mod store;
pub mod vault;

pub use crypto::{CryptoError, FieldCipher, VaultKey, WrappingKey};
pub use escrow::{Authenticator, Enrollment, EscrowService, KeyEscrowBlob};
pub use session::VaultSession;
pub use settings::VaultSettings;
pub use store::{
    Document, DocumentStore, Fields, Filter, MemoryStore, SecureStorageProxy,
};
pub use vault::{ActivityStore, AutoLockPolicy, MemoryActivityStore, VaultKeyManager};

use thiserror::Error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors surfaced by vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Vault is locked")]
    Locked,

    #[error("Invalid master password")]
    InvalidPassword,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Escrow error: {0}")]
    Escrow(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;
