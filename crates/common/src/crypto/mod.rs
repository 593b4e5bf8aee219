//! Authenticated encryption for tenant credentials at rest
//!
//! AES-256-GCM with a 96-bit IV and 128-bit authentication tag. The wire
//! format is three base64 fields joined by `:` (IV, tag, ciphertext), so a
//! sealed value is printable and column-safe.
//!
//! Decryption failures are deliberately opaque: malformed input, wrong IV or
//! tag length, and tag verification failure all surface as the same error.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use std::sync::OnceLock;
use thiserror::Error;

/// Key size in bytes (256 bits)
pub const KEY_SIZE: usize = 32;
/// IV size in bytes (96 bits); never reuse with the same key
pub const IV_SIZE: usize = 12;
/// Authentication tag size in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

const FIELD_SEPARATOR: char = ':';

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid key: expected {KEY_SIZE} bytes, base64 encoded")]
    InvalidKey,

    #[error("Encryption failed")]
    EncryptionFailed,

    /// Covers malformed wire format, bad field sizes, and failed tag
    /// verification alike.
    #[error("Decryption failed")]
    DecryptionFailed,
}

pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Process-wide secret box, initialized once from configuration.
pub struct SecretBox {
    cipher: Aes256Gcm,
}

static GLOBAL_BOX: OnceLock<SecretBox> = OnceLock::new();

impl SecretBox {
    /// Build a box from a base64-encoded 256-bit key.
    pub fn from_base64_key(key_b64: &str) -> CryptoResult<Self> {
        let key_bytes = BASE64.decode(key_b64).map_err(|_| CryptoError::InvalidKey)?;
        if key_bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { cipher })
    }

    /// Get (initializing on first use) the process-wide box.
    pub fn global(key_b64: &str) -> CryptoResult<&'static SecretBox> {
        if let Some(sealed) = GLOBAL_BOX.get() {
            return Ok(sealed);
        }
        let sealed = Self::from_base64_key(key_b64)?;
        Ok(GLOBAL_BOX.get_or_init(|| sealed))
    }

    /// Seal a plaintext into the `iv:tag:ciphertext` wire format.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<String> {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        let nonce = Nonce::from_slice(&iv);

        // aes-gcm appends the tag to the ciphertext; the wire format keeps
        // them as separate fields.
        let mut sealed = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        let tag = sealed.split_off(sealed.len() - TAG_SIZE);

        Ok(format!(
            "{}{sep}{}{sep}{}",
            BASE64.encode(iv),
            BASE64.encode(tag),
            BASE64.encode(sealed),
            sep = FIELD_SEPARATOR,
        ))
    }

    /// Open a sealed value. Any malformed or tampered input yields
    /// `CryptoError::DecryptionFailed`.
    pub fn decrypt(&self, sealed: &str) -> CryptoResult<Vec<u8>> {
        let mut fields = sealed.split(FIELD_SEPARATOR);
        let (iv_b64, tag_b64, ct_b64) = match (fields.next(), fields.next(), fields.next(), fields.next())
        {
            (Some(iv), Some(tag), Some(ct), None) => (iv, tag, ct),
            _ => return Err(CryptoError::DecryptionFailed),
        };

        let iv = BASE64.decode(iv_b64).map_err(|_| CryptoError::DecryptionFailed)?;
        let tag = BASE64.decode(tag_b64).map_err(|_| CryptoError::DecryptionFailed)?;
        let ciphertext = BASE64.decode(ct_b64).map_err(|_| CryptoError::DecryptionFailed)?;

        if iv.len() != IV_SIZE || tag.len() != TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }

        let mut combined = ciphertext;
        combined.extend_from_slice(&tag);

        self.cipher
            .decrypt(Nonce::from_slice(&iv), combined.as_ref())
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_box() -> SecretBox {
        let key = BASE64.encode([7u8; KEY_SIZE]);
        SecretBox::from_base64_key(&key).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let sealed_box = test_box();
        let sealed = sealed_box.encrypt(b"wa-token-12345").unwrap();
        assert_eq!(sealed.matches(':').count(), 2);
        let opened = sealed_box.decrypt(&sealed).unwrap();
        assert_eq!(opened, b"wa-token-12345");
    }

    #[test]
    fn test_unique_ivs() {
        let sealed_box = test_box();
        let a = sealed_box.encrypt(b"same input").unwrap();
        let b = sealed_box.encrypt(b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let sealed_box = test_box();
        for input in ["", "abc", "a:b", "a:b:c:d", "!!:!!:!!"] {
            assert!(matches!(
                sealed_box.decrypt(input),
                Err(CryptoError::DecryptionFailed)
            ));
        }
    }

    #[test]
    fn test_rejects_wrong_field_sizes() {
        let sealed_box = test_box();
        // 8-byte IV, 16-byte tag
        let short_iv = format!(
            "{}:{}:{}",
            BASE64.encode([0u8; 8]),
            BASE64.encode([0u8; TAG_SIZE]),
            BASE64.encode(b"ct")
        );
        assert!(sealed_box.decrypt(&short_iv).is_err());

        // 12-byte IV, 8-byte tag
        let short_tag = format!(
            "{}:{}:{}",
            BASE64.encode([0u8; IV_SIZE]),
            BASE64.encode([0u8; 8]),
            BASE64.encode(b"ct")
        );
        assert!(sealed_box.decrypt(&short_tag).is_err());
    }

    #[test]
    fn test_rejects_tampered_ciphertext() {
        let sealed_box = test_box();
        let sealed = sealed_box.encrypt(b"credential").unwrap();
        let mut parts: Vec<String> = sealed.split(':').map(String::from).collect();
        let mut ct = BASE64.decode(&parts[2]).unwrap();
        ct[0] ^= 0xFF;
        parts[2] = BASE64.encode(ct);
        let tampered = parts.join(":");
        assert!(matches!(
            sealed_box.decrypt(&tampered),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_rejects_bad_key() {
        assert!(SecretBox::from_base64_key("not-base64!").is_err());
        assert!(SecretBox::from_base64_key(&BASE64.encode([0u8; 16])).is_err());
    }
}
