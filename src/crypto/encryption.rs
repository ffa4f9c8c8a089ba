//! AES-256-GCM file envelopes
//!
//! Every call to [`encrypt`] draws a fresh nonce. The resulting [`Envelope`]
//! is plain JSON and carries everything needed to decrypt it apart from the
//! key itself.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{StashError, StashResult};

use super::EncryptionKey;

/// Algorithm identifier written into every envelope
pub const ALGORITHM: &str = "aes-256-gcm";

/// Size of the AES-GCM nonce in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes
const TAG_SIZE: usize = 16;

/// Encrypted file contents with the metadata needed to decrypt them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Algorithm identifier
    pub algorithm: String,
    /// Nonce (base64)
    pub nonce: String,
    /// Authentication tag (base64)
    pub tag: String,
    /// Ciphertext without the tag (base64)
    pub ciphertext: String,
}

impl Envelope {
    fn new(nonce: &[u8], tag: &[u8], ciphertext: &[u8]) -> Self {
        Self {
            algorithm: ALGORITHM.to_string(),
            nonce: STANDARD.encode(nonce),
            tag: STANDARD.encode(tag),
            ciphertext: STANDARD.encode(ciphertext),
        }
    }

    /// Serialize for storage as a `.encrypted` file
    pub fn to_json(&self) -> StashResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StashError::Encryption(format!("Failed to serialize envelope: {}", e)))
    }

    /// Parse a stored envelope
    pub fn from_json(json: &str) -> StashResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| StashError::Encryption(format!("Malformed envelope: {}", e)))
    }

    fn decode(field: &str, value: &str) -> StashResult<Vec<u8>> {
        STANDARD
            .decode(value)
            .map_err(|e| StashError::Encryption(format!("Invalid {} encoding: {}", field, e)))
    }
}

/// Encrypt plaintext bytes into an envelope
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> StashResult<Envelope> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| StashError::Encryption(format!("Failed to create cipher: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(nonce, b"", &mut buffer)
        .map_err(|e| StashError::Encryption(format!("Encryption failed: {}", e)))?;

    Ok(Envelope::new(&nonce_bytes, tag.as_slice(), &buffer))
}

/// Decrypt an envelope back into plaintext bytes
///
/// Fails with [`StashError::UnsupportedAlgorithm`] for foreign envelopes and
/// [`StashError::Authentication`] when the tag does not verify.
pub fn decrypt(envelope: &Envelope, key: &EncryptionKey) -> StashResult<Vec<u8>> {
    if envelope.algorithm != ALGORITHM {
        return Err(StashError::UnsupportedAlgorithm(envelope.algorithm.clone()));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| StashError::Encryption(format!("Failed to create cipher: {}", e)))?;

    let nonce_bytes = Envelope::decode("nonce", &envelope.nonce)?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(StashError::Encryption(format!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        )));
    }

    let tag_bytes = Envelope::decode("tag", &envelope.tag)?;
    if tag_bytes.len() != TAG_SIZE {
        return Err(StashError::Authentication);
    }

    let mut buffer = Envelope::decode("ciphertext", &envelope.ciphertext)?;

    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&nonce_bytes),
            b"",
            &mut buffer,
            Tag::from_slice(&tag_bytes),
        )
        .map_err(|_| StashError::Authentication)?;

    Ok(buffer)
}
