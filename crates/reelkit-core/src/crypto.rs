//! Symmetric encryption envelope for stored credentials.
//!
//! Wire format: base64url(nonce(12) || ciphertext || tag(16)). A fresh
//! nonce is generated per encryption, so equal plaintexts produce distinct
//! ciphertexts.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{CoreError, CoreResult};

/// Nonce size for AES-GCM.
const NONCE_LEN: usize = 12;

/// Minimum ciphertext length: nonce + GCM tag.
const MIN_CIPHERTEXT_LEN: usize = NONCE_LEN + 16;

/// Encrypts and decrypts stored secrets with a process-wide 256-bit key.
pub struct SecretBox {
    cipher: Aes256Gcm,
}

impl SecretBox {
    /// Build from a url-safe base64 encoded 32-byte key.
    pub fn new(key_b64: &str) -> CoreResult<Self> {
        let key_bytes = URL_SAFE_NO_PAD
            .decode(key_b64.trim_end_matches('='))
            .map_err(|e| CoreError::InvalidKey(format!("not valid base64: {e}")))?;

        if key_bytes.len() != 32 {
            return Err(CoreError::InvalidKey(format!(
                "key must be 32 bytes (256 bits), got {}",
                key_bytes.len()
            )));
        }

        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Build from the `ENCRYPTION_KEY` environment variable.
    ///
    /// An absent or malformed key is a fatal configuration error; binaries
    /// exit on it at startup.
    pub fn from_env() -> CoreResult<Self> {
        let key = std::env::var("ENCRYPTION_KEY")
            .map_err(|_| CoreError::InvalidKey("ENCRYPTION_KEY not set".to_string()))?;
        Self::new(&key)
    }

    /// Encrypt a plaintext string. Empty input round-trips to empty without
    /// touching the cipher.
    pub fn encrypt(&self, plain: &str) -> CoreResult<String> {
        if plain.is_empty() {
            return Ok(String::new());
        }

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plain.as_bytes())
            .map_err(|_| CoreError::internal("AES-GCM encryption failed"))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(payload))
    }

    /// Decrypt a ciphertext produced by [`encrypt`](Self::encrypt).
    ///
    /// Payloads not produced by the current key fail with
    /// [`CoreError::BadSecret`].
    pub fn decrypt(&self, cipher_b64: &str) -> CoreResult<String> {
        if cipher_b64.is_empty() {
            return Ok(String::new());
        }

        let payload = URL_SAFE_NO_PAD
            .decode(cipher_b64.trim_end_matches('='))
            .map_err(|_| CoreError::BadSecret)?;

        if payload.len() < MIN_CIPHERTEXT_LEN {
            return Err(CoreError::BadSecret);
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CoreError::BadSecret)?;

        String::from_utf8(plaintext).map_err(|_| CoreError::BadSecret)
    }

    /// Null-tolerant encrypt.
    pub fn encrypt_opt(&self, plain: Option<&str>) -> CoreResult<Option<String>> {
        plain.map(|p| self.encrypt(p)).transpose()
    }

    /// Null-tolerant decrypt.
    pub fn decrypt_opt(&self, cipher: Option<&str>) -> CoreResult<Option<String>> {
        cipher.map(|c| self.decrypt(c)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> String {
        URL_SAFE_NO_PAD.encode([7u8; 32])
    }

    #[test]
    fn test_roundtrip() {
        let secrets = SecretBox::new(&test_key()).unwrap();
        for plain in ["", "token-123", "chave secreta αβγ 日本語", "a"] {
            let cipher = secrets.encrypt(plain).unwrap();
            assert_eq!(secrets.decrypt(&cipher).unwrap(), plain);
        }
    }

    #[test]
    fn test_empty_passthrough() {
        let secrets = SecretBox::new(&test_key()).unwrap();
        assert_eq!(secrets.encrypt("").unwrap(), "");
        assert_eq!(secrets.decrypt("").unwrap(), "");
    }

    #[test]
    fn test_distinct_ciphertexts() {
        let secrets = SecretBox::new(&test_key()).unwrap();
        let a = secrets.encrypt("same").unwrap();
        let b = secrets.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let a = SecretBox::new(&test_key()).unwrap();
        let b = SecretBox::new(&URL_SAFE_NO_PAD.encode([9u8; 32])).unwrap();

        let cipher = a.encrypt("secret").unwrap();
        assert!(matches!(b.decrypt(&cipher), Err(CoreError::BadSecret)));
    }

    #[test]
    fn test_corrupt_ciphertext_fails() {
        let secrets = SecretBox::new(&test_key()).unwrap();
        let cipher = secrets.encrypt("secret").unwrap();

        let mut bytes = URL_SAFE_NO_PAD.decode(&cipher).unwrap();
        bytes[NONCE_LEN] ^= 0xFF;
        let corrupted = URL_SAFE_NO_PAD.encode(bytes);

        assert!(matches!(
            secrets.decrypt(&corrupted),
            Err(CoreError::BadSecret)
        ));
        assert!(matches!(
            secrets.decrypt("not-base64!!"),
            Err(CoreError::BadSecret)
        ));
        assert!(matches!(secrets.decrypt("AAAA"), Err(CoreError::BadSecret)));
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(SecretBox::new("short").is_err());
        assert!(SecretBox::new(&URL_SAFE_NO_PAD.encode([1u8; 16])).is_err());
        assert!(SecretBox::new("@@@not base64@@@").is_err());
    }

    #[test]
    fn test_opt_variants() {
        let secrets = SecretBox::new(&test_key()).unwrap();
        assert_eq!(secrets.encrypt_opt(None).unwrap(), None);
        assert_eq!(secrets.decrypt_opt(None).unwrap(), None);

        let cipher = secrets.encrypt_opt(Some("v")).unwrap().unwrap();
        assert_eq!(secrets.decrypt_opt(Some(&cipher)).unwrap().unwrap(), "v");
    }
}
