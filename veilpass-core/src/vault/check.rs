//! Master-password check value.
//!
//! Argon2id derivation cannot tell a wrong password from a right one -
//! it always yields *some* key. Correctness is confirmed by decrypting
//! a small known ciphertext created at setup time: the wrong key fails
//! GCM authentication, the right key yields the constant.

use subtle::ConstantTimeEq;

use crate::crypto::cipher::{decrypt_to_string, encrypt_string};
use crate::crypto::key::VaultKey;
use crate::crypto::{CryptoError, Result};

/// The constant sealed into every check value.
pub const CHECK_PLAINTEXT: &str = "check";

/// Seal the check constant under a freshly derived key. Stored alongside
/// the user's account metadata at setup time.
pub fn create_check_value(key: &VaultKey) -> Result<String> {
    encrypt_string(key, CHECK_PLAINTEXT)
}

/// Verify a candidate key against a stored check value.
///
/// `Ok(())` confirms the candidate is the vault key. Any failure -
/// tampered envelope, wrong key, altered plaintext - reports
/// [`CryptoError::AuthenticationFailed`] so callers discard the
/// candidate without installing it.
pub fn verify_check_value(key: &VaultKey, check_value: &str) -> Result<()> {
    let decrypted = decrypt_to_string(key, check_value)?;

    if bool::from(decrypted.as_bytes().ct_eq(CHECK_PLAINTEXT.as_bytes())) {
        Ok(())
    } else {
        Err(CryptoError::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_key_verifies() {
        let key = VaultKey::generate().unwrap();
        let check = create_check_value(&key).unwrap();
        assert!(verify_check_value(&key, &check).is_ok());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let key = VaultKey::generate().unwrap();
        let other = VaultKey::generate().unwrap();
        let check = create_check_value(&key).unwrap();
        let result = verify_check_value(&other, &check);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_garbage_check_value_is_rejected() {
        let key = VaultKey::generate().unwrap();
        assert!(verify_check_value(&key, "not an envelope").is_err());
    }

    #[test]
    fn test_check_values_are_unique_per_creation() {
        let key = VaultKey::generate().unwrap();
        let a = create_check_value(&key).unwrap();
        let b = create_check_value(&key).unwrap();
        // Fresh IV every time; both still verify
        assert_ne!(a, b);
        assert!(verify_check_value(&key, &a).is_ok());
        assert!(verify_check_value(&key, &b).is_ok());
    }
}
