//! In-memory key custody.
//!
//! Key material lives only in volatile memory and is zeroized when the
//! owning value drops. Neither type serializes, logs, or otherwise
//! exports its bytes; callers that need the raw key borrow it through
//! [`VaultKey::as_bytes`] for the duration of a cryptographic operation.

use zeroize::ZeroizeOnDrop;

use super::{kdf, Result};

/// Vault key length in bytes (AES-256)
pub const VAULT_KEY_LEN: usize = 32;

/// The 256-bit symmetric key protecting all sensitive vault fields.
///
/// Derived from the master password or recovered through key escrow.
/// Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; VAULT_KEY_LEN],
}

impl VaultKey {
    /// Wrap raw key bytes. Takes ownership so the caller's copy is moved,
    /// not duplicated.
    pub fn from_bytes(key: [u8; VAULT_KEY_LEN]) -> Self {
        Self { key }
    }

    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        Ok(Self::from_bytes(kdf::generate_key_bytes()?))
    }

    /// Borrow the raw key bytes for a cryptographic operation.
    pub fn as_bytes(&self) -> &[u8; VAULT_KEY_LEN] {
        &self.key
    }
}

/// A 256-bit key-wrapping key released by an authenticator ceremony.
///
/// Used only to wrap and unwrap the vault key for escrow. Never stored;
/// the authenticator re-derives it on every ceremony. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct WrappingKey {
    key: [u8; VAULT_KEY_LEN],
}

impl WrappingKey {
    pub fn from_bytes(key: [u8; VAULT_KEY_LEN]) -> Self {
        Self { key }
    }

    /// Generate a fresh random wrapping key from the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        Ok(Self::from_bytes(kdf::generate_key_bytes()?))
    }

    pub fn as_bytes(&self) -> &[u8; VAULT_KEY_LEN] {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_round_trip() {
        let bytes = [7u8; VAULT_KEY_LEN];
        let key = VaultKey::from_bytes(bytes);
        assert_eq!(key.as_bytes(), &bytes);
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = VaultKey::generate().unwrap();
        let b = VaultKey::generate().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_wrapping_keys_differ() {
        let a = WrappingKey::generate().unwrap();
        let b = WrappingKey::generate().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }
}
