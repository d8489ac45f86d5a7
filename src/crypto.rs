//! Config Cryptor (C10): AES-256-GCM over a PBKDF2-HMAC-SHA256 derived key.
//!
//! A single concrete type, not a trait object — there is exactly one way to encrypt or
//! decrypt a config document.

use std::path::Path;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

use crate::error::PiclError;

const MAGIC: [u8; 4] = [0xE1, 0xEA, 0xE1, 0xA0];
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const PBKDF2_ROUNDS: u32 = 65_536;
const KEY_LEN: usize = 32;

/// Encrypts and decrypts cluster config documents.
///
/// Bound to one password; `encrypt` draws a fresh salt and nonce every call, and
/// `decrypt` always derives its key from the salt read back off the wire rather than
/// generating a new one, so a round trip with the correct password always succeeds.
pub struct Cryptor {
    password: String,
}

impl Cryptor {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    fn derive_key(&self, salt: &[u8; SALT_LEN]) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(self.password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
        key
    }

    /// Encrypts `plaintext`, producing `magic || salt || nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, PiclError> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let key = self.derive_key(&salt);
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| PiclError::CryptoError(e.to_string()))?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| PiclError::CryptoError(e.to_string()))?;

        let mut out = Vec::with_capacity(MAGIC.len() + SALT_LEN + NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts a buffer produced by [`Cryptor::encrypt`], rejecting wrong passwords and
    /// truncated/corrupted input.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, PiclError> {
        let header_len = MAGIC.len() + SALT_LEN + NONCE_LEN;
        if data.len() < header_len {
            return Err(PiclError::CryptoError("input too small to decrypt".to_string()));
        }
        if data[..MAGIC.len()] != MAGIC {
            return Err(PiclError::CryptoError("missing magic header".to_string()));
        }

        let salt: [u8; SALT_LEN] = data[MAGIC.len()..MAGIC.len() + SALT_LEN]
            .try_into()
            .expect("slice length matches SALT_LEN");
        let nonce_bytes = &data[MAGIC.len() + SALT_LEN..header_len];
        let ciphertext = &data[header_len..];

        let key = self.derive_key(&salt);
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| PiclError::CryptoError(e.to_string()))?;
        let nonce = Nonce::from_slice(nonce_bytes);
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| PiclError::CryptoError("decryption failed: wrong password or corrupt data".to_string()))
    }

    pub async fn encrypt_to_file(&self, plaintext: &[u8], path: impl AsRef<Path>) -> Result<(), PiclError> {
        let encrypted = self.encrypt(plaintext)?;
        tokio::fs::write(path, encrypted).await?;
        Ok(())
    }

    pub async fn decrypt_from_file(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, PiclError> {
        let data = tokio::fs::read(path).await?;
        self.decrypt(&data)
    }

    /// Checks only the 4-byte magic; never attempts to decrypt.
    pub fn is_encrypted(data: &[u8]) -> bool {
        data.len() >= MAGIC.len() && data[..MAGIC.len()] == MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_the_correct_password() {
        let cryptor = Cryptor::new("hunter2");
        let plaintext = b"{\"name\":\"default\"}";
        let encrypted = cryptor.encrypt(plaintext).unwrap();
        let decrypted = cryptor.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_password_fails_to_decrypt() {
        let encrypted = Cryptor::new("hunter2").encrypt(b"secret config").unwrap();
        let result = Cryptor::new("wrong password").decrypt(&encrypted);
        assert!(result.is_err());
    }

    #[test]
    fn is_encrypted_checks_only_the_magic_header() {
        let encrypted = Cryptor::new("hunter2").encrypt(b"payload").unwrap();
        assert!(Cryptor::is_encrypted(&encrypted));
        assert!(!Cryptor::is_encrypted(b"{\"name\":\"default\"}"));
        assert!(!Cryptor::is_encrypted(b"\xE1\xEA"));
    }

    #[test]
    fn each_encryption_uses_a_fresh_salt_and_nonce() {
        let cryptor = Cryptor::new("hunter2");
        let a = cryptor.encrypt(b"same plaintext").unwrap();
        let b = cryptor.encrypt(b"same plaintext").unwrap();
        assert_ne!(a, b);
    }
}
