//! Encryption/decryption of JSON payloads using PBKDF2 + AES-256-CBC
//!
//! This module implements passphrase-based encryption using:
//! - PBKDF2-HMAC-SHA1 for key derivation from passphrase (see [`crate::kdf`])
//! - AES-256 in CBC mode with PKCS#7 padding
//!
//! The payload is serialized to canonical JSON text before encryption and
//! parsed back after decryption. The output is a text envelope:
//! hex(salt) + hex(iv) + base64(ciphertext). The scheme provides
//! confidentiality only - there is no authentication tag, so a wrong
//! passphrase and tampered data are indistinguishable from each other.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde::de::DeserializeOwned;
use zeroize::Zeroizing;

use crate::envelope::{Envelope, IV_LEN, SALT_LEN};
use crate::error::{ErrorCategory, ErrorKind, Result, TransitboxError};
use crate::kdf::{self, KdfParams};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encrypt a payload with a passphrase using random salt and IV
///
/// Returns the text envelope: hex(salt) + hex(iv) + base64(ciphertext).
/// Each call draws a fresh salt and IV, so encrypting the same payload
/// twice yields different envelopes that decrypt to the same value.
pub fn encrypt<T: Serialize>(payload: &T, passphrase: &[u8], params: &KdfParams) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.try_fill_bytes(&mut salt).map_err(randomness_error)?;

    // Drawn independently of the salt.
    let mut iv = [0u8; IV_LEN];
    OsRng.try_fill_bytes(&mut iv).map_err(randomness_error)?;

    encrypt_deterministic(payload, passphrase, params, &salt, &iv)
}

/// Encrypt a payload with a passphrase using provided salt and IV
///
/// This function is ONLY for testing purposes to generate deterministic
/// output. NEVER use this in production - always use `encrypt()` which
/// generates random salt/IV.
pub fn encrypt_deterministic<T: Serialize>(
    payload: &T,
    passphrase: &[u8],
    params: &KdfParams,
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
) -> Result<String> {
    let plaintext = Zeroizing::new(serde_json::to_vec(payload).map_err(|e| {
        TransitboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Serialization,
            format!("payload serialization failed: {}", e),
            e,
        )
    })?);

    let key = kdf::derive_key(passphrase, salt, params);
    let ciphertext =
        Aes256CbcEnc::new((&*key).into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

    Ok(Envelope {
        salt: *salt,
        iv: *iv,
        ciphertext,
    }
    .encode())
}

/// Decrypt a text envelope with a passphrase
///
/// The KDF parameters must match the ones the envelope was produced with;
/// the envelope does not record them. Use [`KdfParams::legacy`] for
/// legacy envelopes.
pub fn decrypt<T: DeserializeOwned>(
    envelope: &str,
    passphrase: &[u8],
    params: &KdfParams,
) -> Result<T> {
    let envelope = Envelope::parse(envelope)?;

    let key = kdf::derive_key(passphrase, &envelope.salt, params);
    let plaintext = Zeroizing::new(
        Aes256CbcDec::new((&*key).into(), (&envelope.iv).into())
            .decrypt_padded_vec_mut::<Pkcs7>(&envelope.ciphertext)
            .map_err(|_| {
                TransitboxError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::DecryptionFailed,
                    "corrupt envelope, tampered-with data, or bad passphrase",
                )
            })?,
    );

    serde_json::from_slice(&plaintext).map_err(|e| {
        TransitboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Deserialization,
            format!(
                "decrypted data is not a valid payload (possibly a bad passphrase): {}",
                e
            ),
            e,
        )
    })
}

/// Generate a random 256-bit key as 64 lowercase hex chars
///
/// Suitable as a machine-generated passphrase for [`encrypt`], e.g. a
/// per-payload data encryption key that is itself stored encrypted.
pub fn random_key() -> Result<String> {
    let mut key = [0u8; 32];
    OsRng.try_fill_bytes(&mut key).map_err(randomness_error)?;
    Ok(hex::encode(key))
}

fn randomness_error(e: impl std::fmt::Display) -> TransitboxError {
    TransitboxError::with_kind(
        ErrorCategory::Internal,
        ErrorKind::RandomnessUnavailable,
        format!("failed to obtain secure random bytes: {}", e),
    )
}
