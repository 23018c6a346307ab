// SPDX-License-Identifier: EUPL-1.2

//! Master-key management and AEAD encryption for vault values.
//!
//! A single ChaCha20-Poly1305 key is generated on first run, written to
//! `master.key` with owner-only permissions, and reused on every
//! subsequent start. Each encrypted value carries its own random nonce,
//! so the on-disk format is simply `nonce || ciphertext`.

use crate::error::ConfigError;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{AeadCore, ChaCha20Poly1305, Key, Nonce};
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

/// Length in bytes of a ChaCha20-Poly1305 nonce (96 bits).
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Holds the proxy's master key and performs encrypt/decrypt for the
/// vault. Cloning is cheap; the key itself never leaves this type.
pub struct CryptoCore {
    cipher: ChaCha20Poly1305,
}

impl CryptoCore {
    /// Load the master key from `path`, generating and persisting a fresh
    /// one (mode 0600) if the file does not exist yet. The parent
    /// directory is expected to already exist with mode 0700.
    pub fn load_or_create(path: &Path) -> Result<CryptoCore, ConfigError> {
        let mut key_bytes = if path.exists() {
            fs::read(path).map_err(|source| ConfigError::MasterKey {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            let key = ChaCha20Poly1305::generate_key(&mut OsRng);
            Self::persist(path, &key)?;
            key.to_vec()
        };

        if key_bytes.len() != KEY_LEN {
            key_bytes.zeroize();
            return Err(ConfigError::MasterKey {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("master key at {} is not {KEY_LEN} bytes", path.display()),
                ),
            });
        }

        let key = Key::clone_from_slice(&key_bytes);
        key_bytes.zeroize();
        Ok(CryptoCore {
            cipher: ChaCha20Poly1305::new(&key),
        })
    }

    fn persist(path: &Path, key: &Key) -> Result<(), ConfigError> {
        fs::write(path, key.as_slice()).map_err(|source| ConfigError::MasterKey {
            path: path.to_path_buf(),
            source,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).map_err(|source| ConfigError::MasterKey {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .expect("ChaCha20-Poly1305 encryption is infallible for in-memory buffers");
        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        blob
    }

    /// Decrypt a blob produced by [`CryptoCore::encrypt`]. Returns `None`
    /// on a malformed blob or authentication failure — callers treat this
    /// as "value unknown", never as a reason to drop the surrounding
    /// payload.
    pub fn decrypt(&self, blob: &[u8]) -> Option<Vec<u8>> {
        if blob.len() < NONCE_LEN {
            return None;
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher.decrypt(nonce, ciphertext).ok()
    }
}

/// Returns `<data_dir>/master.key`.
pub fn master_key_path(data_dir: &Path) -> PathBuf {
    data_dir.join("master.key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_plaintext() {
        let dir = TempDir::new().unwrap();
        let core = CryptoCore::load_or_create(&dir.path().join("master.key")).unwrap();
        let blob = core.encrypt(b"super secret value");
        assert_eq!(core.decrypt(&blob).unwrap(), b"super secret value");
    }

    #[test]
    fn reloading_the_same_path_reuses_the_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("master.key");
        let first = CryptoCore::load_or_create(&path).unwrap();
        let blob = first.encrypt(b"hello");

        let second = CryptoCore::load_or_create(&path).unwrap();
        assert_eq!(second.decrypt(&blob).unwrap(), b"hello");
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let dir = TempDir::new().unwrap();
        let core = CryptoCore::load_or_create(&dir.path().join("master.key")).unwrap();
        let mut blob = core.encrypt(b"hello");
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        assert!(core.decrypt(&blob).is_none());
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let dir = TempDir::new().unwrap();
        let core = CryptoCore::load_or_create(&dir.path().join("master.key")).unwrap();
        assert!(core.decrypt(&[0u8; 4]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn persisted_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("master.key");
        CryptoCore::load_or_create(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
