//! AES-256-GCM field envelopes.
//!
//! Every sensitive field value is stored as a self-describing string:
//! the `vp1:` prefix followed by base64 of `iv || ciphertext || tag`,
//! where the IV is 12 bytes, the tag 16 bytes, and the GCM tag is
//! appended to the ciphertext. The prefix lets the storage layer tell
//! envelopes apart from plaintext or corrupt values without attempting
//! decryption, and versions the format for future migration.
//!
//! A fresh IV is drawn from the OS CSPRNG for every encryption, so
//! encrypting the same value twice never yields the same envelope.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::kdf::{generate_iv, IV_LEN};
use super::key::{VaultKey, VAULT_KEY_LEN};
use super::{CryptoError, Result};
use crate::vault::VaultKeyManager;

/// Prefix marking a string as an encrypted field envelope
pub const ENVELOPE_PREFIX: &str = "vp1:";

/// AES-GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Smallest valid binary payload: IV + one ciphertext byte + tag
const MIN_PAYLOAD_LEN: usize = IV_LEN + 1 + TAG_LEN;

/// Encrypt raw bytes, returning `iv || ciphertext || tag`.
///
/// Empty plaintext is rejected: an empty sensitive value is represented
/// by omitting the field, never by an envelope of nothing.
pub fn encrypt_bytes(key: &[u8; VAULT_KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    if plaintext.is_empty() {
        return Err(CryptoError::EncryptionFailed(
            "Cannot encrypt empty plaintext".to_string(),
        ));
    }

    let iv = generate_iv()?;
    let cipher = Aes256Gcm::new(key.into());
    let ciphertext = cipher
        .encrypt(&Nonce::from(iv), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut payload = Vec::with_capacity(IV_LEN + ciphertext.len());
    payload.extend_from_slice(&iv);
    payload.extend_from_slice(&ciphertext);
    Ok(payload)
}

/// Decrypt a `iv || ciphertext || tag` payload produced by [`encrypt_bytes`].
pub fn decrypt_bytes(key: &[u8; VAULT_KEY_LEN], payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() < MIN_PAYLOAD_LEN {
        return Err(CryptoError::DecryptionFailed(format!(
            "Payload too short: {} bytes, need at least {}",
            payload.len(),
            MIN_PAYLOAD_LEN
        )));
    }

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&payload[..IV_LEN]);

    let cipher = Aes256Gcm::new(key.into());
    cipher
        .decrypt(&Nonce::from(iv), &payload[IV_LEN..])
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Encrypt a field value into a `vp1:` envelope string.
pub fn encrypt_string(key: &VaultKey, plaintext: &str) -> Result<String> {
    let payload = encrypt_bytes(key.as_bytes(), plaintext.as_bytes())?;
    Ok(format!("{}{}", ENVELOPE_PREFIX, BASE64.encode(payload)))
}

/// Decrypt a `vp1:` envelope string back to the field value.
pub fn decrypt_to_string(key: &VaultKey, envelope: &str) -> Result<String> {
    let encoded = envelope
        .strip_prefix(ENVELOPE_PREFIX)
        .ok_or_else(|| CryptoError::NotAnEnvelope("missing version prefix".to_string()))?;

    let payload = BASE64
        .decode(encoded)
        .map_err(|e| CryptoError::NotAnEnvelope(format!("invalid base64: {}", e)))?;

    let plaintext = decrypt_bytes(key.as_bytes(), &payload)?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::DecryptionFailed("Decrypted data is not valid UTF-8".to_string()))
}

/// Check whether a string looks like an encrypted field envelope.
///
/// True only for the `vp1:` prefix followed by valid base64 of a payload
/// long enough to hold an IV, a tag, and at least one ciphertext byte.
/// This never attempts decryption.
pub fn is_envelope(value: &str) -> bool {
    match value.strip_prefix(ENVELOPE_PREFIX) {
        Some(encoded) => match BASE64.decode(encoded) {
            Ok(payload) => payload.len() >= MIN_PAYLOAD_LEN,
            Err(_) => false,
        },
        None => false,
    }
}

/// Lock-aware field encryption bound to the vault key manager.
///
/// Every operation captures the current key up front, so an encryption
/// or decryption already in flight finishes with the key it started
/// with even if the vault is locked or re-keyed concurrently.
pub struct FieldCipher {
    keys: Arc<VaultKeyManager>,
}

impl FieldCipher {
    pub fn new(keys: Arc<VaultKeyManager>) -> Self {
        Self { keys }
    }

    /// Encrypt a field value. Fails with [`crate::VaultError::Locked`]
    /// when the vault is locked.
    pub fn encrypt_field(&self, plaintext: &str) -> crate::Result<String> {
        let key = self.keys.current_key()?;
        self.keys.touch_activity();
        Ok(encrypt_string(&key, plaintext)?)
    }

    /// Decrypt a field envelope. Fails with [`crate::VaultError::Locked`]
    /// when the vault is locked.
    pub fn decrypt_field(&self, envelope: &str) -> crate::Result<String> {
        let key = self.keys.current_key()?;
        self.keys.touch_activity();
        Ok(decrypt_to_string(&key, envelope)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf;
    use crate::vault::AutoLockPolicy;
    use crate::VaultError;
    use std::collections::HashSet;

    fn test_key() -> VaultKey {
        VaultKey::generate().unwrap()
    }

    #[test]
    fn test_round_trip() {
        let key = test_key();
        let envelope = encrypt_string(&key, "hunter2").unwrap();
        assert!(envelope.starts_with(ENVELOPE_PREFIX));
        let plaintext = decrypt_to_string(&key, &envelope).unwrap();
        assert_eq!(plaintext, "hunter2");
    }

    #[test]
    fn test_round_trip_unicode() {
        let key = test_key();
        let original = "contraseña 🔑 пароль";
        let envelope = encrypt_string(&key, original).unwrap();
        assert_eq!(decrypt_to_string(&key, &envelope).unwrap(), original);
    }

    #[test]
    fn test_envelope_is_fresh_every_time() {
        let key = test_key();
        let mut envelopes = HashSet::new();
        let mut ivs = HashSet::new();
        for _ in 0..100 {
            let envelope = encrypt_string(&key, "same plaintext").unwrap();
            let payload = BASE64
                .decode(envelope.strip_prefix(ENVELOPE_PREFIX).unwrap())
                .unwrap();
            ivs.insert(payload[..IV_LEN].to_vec());
            envelopes.insert(envelope);
        }
        assert_eq!(envelopes.len(), 100);
        assert_eq!(ivs.len(), 100);
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let envelope = encrypt_string(&test_key(), "secret").unwrap();
        let result = decrypt_to_string(&test_key(), &envelope);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_any_bit_flip_fails_authentication() {
        let key = test_key();
        let envelope = encrypt_string(&key, "integrity matters").unwrap();
        let payload = BASE64
            .decode(envelope.strip_prefix(ENVELOPE_PREFIX).unwrap())
            .unwrap();

        for i in 0..payload.len() {
            let mut tampered = payload.clone();
            tampered[i] ^= 0x01;
            let tampered_envelope = format!("{}{}", ENVELOPE_PREFIX, BASE64.encode(&tampered));
            let result = decrypt_to_string(&key, &tampered_envelope);
            assert!(
                matches!(result, Err(CryptoError::AuthenticationFailed)),
                "flip at byte {} was not rejected",
                i
            );
        }
    }

    #[test]
    fn test_empty_plaintext_rejected() {
        let key = test_key();
        let result = encrypt_string(&key, "");
        assert!(matches!(result, Err(CryptoError::EncryptionFailed(_))));
    }

    #[test]
    fn test_missing_prefix_rejected() {
        let key = test_key();
        let result = decrypt_to_string(&key, "bm90IGFuIGVudmVsb3Bl");
        assert!(matches!(result, Err(CryptoError::NotAnEnvelope(_))));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let key = test_key();
        let result = decrypt_to_string(&key, "vp1:!!!not-base64!!!");
        assert!(matches!(result, Err(CryptoError::NotAnEnvelope(_))));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let key = test_key();
        let short = format!("{}{}", ENVELOPE_PREFIX, BASE64.encode([0u8; MIN_PAYLOAD_LEN - 1]));
        let result = decrypt_to_string(&key, &short);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_non_utf8_plaintext_surfaces_as_decryption_error() {
        let key = test_key();
        let payload = encrypt_bytes(key.as_bytes(), &[0xff, 0xfe, 0xfd]).unwrap();
        let envelope = format!("{}{}", ENVELOPE_PREFIX, BASE64.encode(payload));
        let result = decrypt_to_string(&key, &envelope);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_is_envelope() {
        let key = test_key();
        let envelope = encrypt_string(&key, "value").unwrap();
        assert!(is_envelope(&envelope));
        assert!(!is_envelope("plain old text"));
        assert!(!is_envelope("vp1:"));
        assert!(!is_envelope("vp1:not base64 at all!"));
        // Valid base64 but too short to hold IV + tag + ciphertext
        assert!(!is_envelope(&format!("vp1:{}", BASE64.encode([0u8; 8]))));
        assert!(!is_envelope(""));
    }

    #[test]
    fn test_bytes_round_trip() {
        let key = test_key();
        let payload = encrypt_bytes(key.as_bytes(), b"raw key material").unwrap();
        assert_eq!(payload.len(), IV_LEN + b"raw key material".len() + TAG_LEN);
        let plaintext = decrypt_bytes(key.as_bytes(), &payload).unwrap();
        assert_eq!(plaintext, b"raw key material");
    }

    #[test]
    fn test_field_cipher_requires_unlocked_vault() {
        let manager = Arc::new(VaultKeyManager::new(AutoLockPolicy::default()));
        let cipher = FieldCipher::new(Arc::clone(&manager));

        let result = cipher.encrypt_field("secret");
        assert!(matches!(result, Err(VaultError::Locked)));

        let key_bytes = kdf::generate_key_bytes().unwrap();
        manager.import_key(&key_bytes).unwrap();

        let envelope = cipher.encrypt_field("secret").unwrap();
        assert_eq!(cipher.decrypt_field(&envelope).unwrap(), "secret");

        manager.lock();
        let result = cipher.decrypt_field(&envelope);
        assert!(matches!(result, Err(VaultError::Locked)));
    }
}
