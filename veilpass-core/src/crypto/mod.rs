//! Cryptographic primitives for the vault core.
//!
//! This module provides:
//! - Argon2id vault-key derivation with a deterministic per-user salt
//! - AES-256-GCM field envelopes
//! - Checked access to the OS secure random source
//! - Zeroize-on-drop key custody

pub mod cipher;
pub mod kdf;
pub mod key;

pub use cipher::{
    decrypt_bytes, decrypt_to_string, encrypt_bytes, encrypt_string, is_envelope, FieldCipher,
    ENVELOPE_PREFIX,
};
pub use kdf::{derive_user_salt, derive_vault_key, generate_random_bytes};
pub use key::{VaultKey, WrappingKey, VAULT_KEY_LEN};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KdfFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Value is not an encrypted field envelope: {0}")]
    NotAnEnvelope(String),

    #[error("Authentication failed - data may have been tampered with")]
    AuthenticationFailed,

    #[error("Random number generation failed: {0}")]
    RandomFailed(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
