//! Cryptographic functions for stash
//!
//! Provides AES-256-GCM envelopes for files marked for encryption, backed by
//! a process-wide key loaded from a key file.

pub mod encryption;
pub mod key;
pub mod secure_memory;

pub use encryption::{decrypt, encrypt, Envelope, ALGORITHM};
pub use key::EncryptionKey;
pub use secure_memory::SecureString;
