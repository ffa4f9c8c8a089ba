//! Encryption key file handling
//!
//! The key is 32 random bytes stored base64-encoded in a dedicated file. It
//! is loaded once per process and never derived from user input.

use std::fs;
use std::io::Write;
use std::path::Path;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::STANDARD, Engine};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{StashError, StashResult};
use crate::storage::file_io::ensure_parent;

/// Length of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// A 256-bit key, zeroed when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Load a key from a key file
    pub fn load(path: &Path) -> StashResult<Self> {
        let contents = Zeroizing::new(fs::read_to_string(path).map_err(|e| {
            StashError::Encryption(format!("Failed to read key file {}: {}", path.display(), e))
        })?);

        let decoded = Zeroizing::new(STANDARD.decode(contents.trim()).map_err(|e| {
            StashError::Encryption(format!("Invalid key file encoding: {}", e))
        })?);

        if decoded.len() != KEY_SIZE {
            return Err(StashError::Encryption(format!(
                "Invalid key length: expected {} bytes, got {}",
                KEY_SIZE,
                decoded.len()
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&decoded);
        Ok(Self { key })
    }

    /// Write this key to a new key file
    ///
    /// Refuses to overwrite an existing file. On unix the file is created
    /// readable by the owner only.
    pub fn save(&self, path: &Path) -> StashResult<()> {
        ensure_parent(path)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path).map_err(|e| {
            StashError::Encryption(format!("Failed to create key file {}: {}", path.display(), e))
        })?;

        let encoded = Zeroizing::new(STANDARD.encode(self.key));
        writeln!(file, "{}", encoded.as_str())
            .map_err(|e| StashError::Encryption(format!("Failed to write key file: {}", e)))?;

        Ok(())
    }

    /// Load the key file, generating one if it does not exist yet
    pub fn load_or_generate(path: &Path) -> StashResult<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let key = Self::generate();
        key.save(path)?;
        tracing::info!(path = %path.display(), "generated new encryption key");
        Ok(key)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}
