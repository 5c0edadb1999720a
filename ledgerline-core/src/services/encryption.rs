//! Access-token encryption at rest
//!
//! AES-256-GCM with a fresh random nonce per call, so encrypting the same
//! token twice never produces the same ciphertext. Stored format is a
//! single hex string: `[ nonce (12 bytes) | ciphertext | auth tag (16 bytes) ]`.
//!
//! The key must never change after connections exist; rotating it makes
//! every stored token permanently unreadable.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

use crate::domain::result::{Error, Result};

/// Environment variable holding the 64-hex-character (256-bit) key
pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";

const NONCE_LEN: usize = 12;

/// Encrypts and decrypts provider access tokens
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Build a cipher from a 64-character hex key
    pub fn new(hex_key: &str) -> Result<Self> {
        let key_bytes = hex::decode(hex_key)
            .map_err(|_| Error::Encryption("encryption key is not valid hex".to_string()))?;
        if key_bytes.len() != 32 {
            return Err(Error::Encryption(
                "encryption key must be 64 hex characters (256 bits)".to_string(),
            ));
        }
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Build a cipher from the `ENCRYPTION_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(ENCRYPTION_KEY_ENV).map_err(|_| {
            Error::Config(format!("{ENCRYPTION_KEY_ENV} environment variable is not set"))
        })?;
        Self::new(&key)
    }

    /// Encrypt a plaintext token into a hex-packed string
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| Error::Encryption("encryption failed".to_string()))?;

        let mut packed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        packed.extend_from_slice(&nonce);
        packed.extend_from_slice(&ciphertext);
        Ok(hex::encode(packed))
    }

    /// Reverse of `encrypt`. Fails if the auth tag does not verify, which
    /// means tampered data or the wrong key.
    pub fn decrypt(&self, packed_hex: &str) -> Result<String> {
        let packed = hex::decode(packed_hex)
            .map_err(|_| Error::Encryption("stored token is not valid hex".to_string()))?;
        if packed.len() <= NONCE_LEN {
            return Err(Error::Encryption("stored token is too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = packed.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| Error::Encryption("decryption failed (wrong key or tampered data)".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| Error::Encryption("decrypted token is not valid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_roundtrip() {
        let cipher = TokenCipher::new(TEST_KEY).unwrap();
        let token = "access-sandbox-1234";
        let packed = cipher.encrypt(token).unwrap();
        assert_ne!(packed, token);
        assert_eq!(cipher.decrypt(&packed).unwrap(), token);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let cipher = TokenCipher::new(TEST_KEY).unwrap();
        let a = cipher.encrypt("same-token").unwrap();
        let b = cipher.encrypt("same-token").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_auth() {
        let cipher = TokenCipher::new(TEST_KEY).unwrap();
        let packed = cipher.encrypt("secret").unwrap();

        let other_key = "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";
        let other = TokenCipher::new(other_key).unwrap();
        assert!(matches!(other.decrypt(&packed), Err(Error::Encryption(_))));
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(TokenCipher::new("deadbeef").is_err());
        assert!(TokenCipher::new("not hex at all").is_err());
    }
}
