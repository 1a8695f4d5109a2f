//! Transitbox - Passphrase-based JSON payload encryption
//!
//! Derives an AES-256 key from a passphrase with PBKDF2-HMAC-SHA1,
//! encrypts the payload's canonical JSON text in CBC mode, and packs
//! salt, IV, and ciphertext into a single transportable text envelope.

#![forbid(unsafe_code)]

pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod passphrase;
pub mod payloadcrypt;
