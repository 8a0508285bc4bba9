//! Argon2id key derivation and checked randomness.
//!
//! The vault key is derived from the master password with Argon2id using
//! an interactive-client cost profile:
//! - Memory cost: 19 MiB (19,456 KiB)
//! - Time cost: 2 iterations
//! - Parallelism: 1 lane
//! - Output length: 32 bytes (256 bits)
//!
//! The 16-byte salt is never stored: it is the truncated SHA-256 of the
//! user id, so the same user and password always re-derive the same key
//! while two users who picked identical passwords still end up with
//! different vault keys.
//!
//! Derivation is deliberately unable to tell a wrong password from a
//! right one - it always succeeds and yields *some* key. Password
//! correctness is confirmed out of band by decrypting a known check
//! value (see [`crate::vault::check`]).

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::key::{VaultKey, VAULT_KEY_LEN};
use super::{CryptoError, Result};

/// Argon2id memory cost in KiB (19 MiB)
pub const KDF_MEMORY_KIB: u32 = 19_456;

/// Argon2id time cost (iterations)
pub const KDF_ITERATIONS: u32 = 2;

/// Argon2id parallelism (lanes)
pub const KDF_PARALLELISM: u32 = 1;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// IV length for AES-GCM in bytes
pub const IV_LEN: usize = 12;

/// Derive the deterministic per-user salt.
///
/// SHA-256 of the user id, truncated to 16 bytes. Deterministic on
/// purpose: the salt must be recomputable on any device from the user
/// id alone, without a round trip to the server.
pub fn derive_user_salt(user_id: &str) -> [u8; SALT_LEN] {
    let digest = Sha256::digest(user_id.as_bytes());
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&digest[..SALT_LEN]);
    salt
}

/// Derive the 256-bit vault key from a master password and user id.
///
/// # Arguments
/// * `master_password` - The user's master password (must be non-empty)
/// * `user_id` - The account identifier the salt is derived from
///
/// # Security
/// The derived key never leaves the process. Callers that are done with
/// it should let it drop so the key material is zeroized.
pub fn derive_vault_key(master_password: &str, user_id: &str) -> Result<VaultKey> {
    if master_password.is_empty() {
        return Err(CryptoError::KdfFailed(
            "master password must not be empty".to_string(),
        ));
    }
    if user_id.is_empty() {
        return Err(CryptoError::KdfFailed(
            "user id must not be empty".to_string(),
        ));
    }

    let salt = derive_user_salt(user_id);
    let params = Params::new(
        KDF_MEMORY_KIB,
        KDF_ITERATIONS,
        KDF_PARALLELISM,
        Some(VAULT_KEY_LEN),
    )
    .map_err(|e| CryptoError::KdfFailed(format!("Invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key_bytes = [0u8; VAULT_KEY_LEN];
    argon2
        .hash_password_into(master_password.as_bytes(), &salt, &mut key_bytes)
        .map_err(|e| CryptoError::KdfFailed(format!("Argon2 hashing failed: {}", e)))?;

    Ok(VaultKey::from_bytes(key_bytes))
}

/// Fill a buffer from the OS secure random source.
///
/// Fails loudly when the source is unavailable. There is no fallback
/// generator: keys and IVs come from the OS CSPRNG or not at all.
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::RandomFailed(e.to_string()))
}

/// Generate `len` bytes from the OS secure random source.
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    fill_random(&mut bytes)?;
    Ok(bytes)
}

/// Generate a fresh 96-bit AES-GCM IV.
pub fn generate_iv() -> Result<[u8; IV_LEN]> {
    let mut iv = [0u8; IV_LEN];
    fill_random(&mut iv)?;
    Ok(iv)
}

/// Generate 32 bytes of fresh key material.
pub fn generate_key_bytes() -> Result<[u8; VAULT_KEY_LEN]> {
    let mut key = [0u8; VAULT_KEY_LEN];
    fill_random(&mut key)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_is_deterministic() {
        let a = derive_user_salt("user-123");
        let b = derive_user_salt("user-123");
        assert_eq!(a, b);
        assert_eq!(a.len(), SALT_LEN);
    }

    #[test]
    fn test_salt_differs_per_user() {
        let a = derive_user_salt("user-123");
        let b = derive_user_salt("user-456");
        assert_ne!(a, b);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_vault_key("correct horse battery staple", "user-123").unwrap();
        let b = derive_vault_key("correct horse battery staple", "user-123").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_same_password_different_users() {
        let a = derive_vault_key("correct horse battery staple", "user-123").unwrap();
        let b = derive_vault_key("correct horse battery staple", "user-456").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_different_passwords_differ() {
        let a = derive_vault_key("password-one!", "user-123").unwrap();
        let b = derive_vault_key("password-two!", "user-123").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_empty_password_rejected() {
        let result = derive_vault_key("", "user-123");
        assert!(matches!(result, Err(CryptoError::KdfFailed(_))));
    }

    #[test]
    fn test_empty_user_id_rejected() {
        let result = derive_vault_key("some password", "");
        assert!(matches!(result, Err(CryptoError::KdfFailed(_))));
    }

    #[test]
    fn test_random_bytes_length_and_variety() {
        let a = generate_random_bytes(32).unwrap();
        let b = generate_random_bytes(32).unwrap();
        assert_eq!(a.len(), 32);
        assert_eq!(b.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_iv_length() {
        let iv = generate_iv().unwrap();
        assert_eq!(iv.len(), IV_LEN);
    }
}
