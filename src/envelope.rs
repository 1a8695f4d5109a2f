//! Text envelope codec for encrypted payloads
//!
//! A transit envelope is a single string built from three fields:
//! - salt: 32 lowercase hex chars (16 bytes)
//! - IV: 32 lowercase hex chars (16 bytes)
//! - ciphertext: standard base64 with padding, variable length
//!
//! The format carries no version marker and no authentication tag; it is
//! kept stable so that previously produced envelopes keep decrypting.

use crate::error::{ErrorCategory, ErrorKind, Result, TransitboxError};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of the CBC initialization vector in bytes
pub const IV_LEN: usize = 16;

/// Length of the hex-encoded salt + IV header in chars
const HEADER_LEN: usize = (SALT_LEN + IV_LEN) * 2;

/// Decoded form of a transit envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode to the transportable text form: hex(salt) + hex(iv) + base64(ciphertext)
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            hex::encode(self.salt),
            hex::encode(self.iv),
            BASE64_STANDARD.encode(&self.ciphertext)
        )
    }

    /// Parse the text form back into its fields
    ///
    /// Works on the byte representation throughout, so non-ASCII input is
    /// rejected by the field decoders rather than panicking on a char
    /// boundary.
    pub fn parse(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        if bytes.len() < HEADER_LEN {
            return Err(TransitboxError::with_kind(
                ErrorCategory::User,
                ErrorKind::MalformedEnvelope,
                "input shorter than the salt and IV header; likely truncated",
            ));
        }

        let mut salt = [0u8; SALT_LEN];
        hex::decode_to_slice(&bytes[..SALT_LEN * 2], &mut salt).map_err(|e| {
            TransitboxError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::MalformedEnvelope,
                format!("salt field is not valid hex: {}", e),
                e,
            )
        })?;

        let mut iv = [0u8; IV_LEN];
        hex::decode_to_slice(&bytes[SALT_LEN * 2..HEADER_LEN], &mut iv).map_err(|e| {
            TransitboxError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::MalformedEnvelope,
                format!("IV field is not valid hex: {}", e),
                e,
            )
        })?;

        let ciphertext = BASE64_STANDARD.decode(&bytes[HEADER_LEN..]).map_err(|e| {
            TransitboxError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::MalformedEnvelope,
                format!("ciphertext field is not valid base64: {}", e),
                e,
            )
        })?;

        Ok(Self { salt, iv, ciphertext })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let envelope = Envelope {
            salt: [0x01; SALT_LEN],
            iv: [0x02; IV_LEN],
            ciphertext: vec![0xAA; 48],
        };
        let text = envelope.encode();
        let parsed = Envelope::parse(&text).unwrap();
        assert_eq!(envelope, parsed);
    }

    #[test]
    fn test_exact_encoding() {
        let envelope = Envelope {
            salt: [0x00; SALT_LEN],
            iv: [0xFF; IV_LEN],
            ciphertext: b"hello".to_vec(),
        };
        assert_eq!(
            envelope.encode(),
            "00000000000000000000000000000000ffffffffffffffffffffffffffffffffaGVsbG8="
        );
    }

    #[test]
    fn test_header_is_lowercase_hex() {
        let envelope = Envelope {
            salt: [0xAB; SALT_LEN],
            iv: [0xCD; IV_LEN],
            ciphertext: vec![],
        };
        let text = envelope.encode();
        assert!(text[..HEADER_LEN].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(text[..HEADER_LEN], text[..HEADER_LEN].to_lowercase());
    }

    #[test]
    fn test_empty_ciphertext() {
        let envelope = Envelope {
            salt: [0x11; SALT_LEN],
            iv: [0x22; IV_LEN],
            ciphertext: vec![],
        };
        let text = envelope.encode();
        assert_eq!(text.len(), HEADER_LEN);
        let parsed = Envelope::parse(&text).unwrap();
        assert_eq!(parsed.ciphertext, Vec::<u8>::new());
    }

    #[test]
    fn test_truncated_input() {
        let result = Envelope::parse("deadbeef");
        let err = result.expect_err("expected truncated input error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedEnvelope));
    }

    #[test]
    fn test_bad_salt_hex() {
        let text = format!("zz{}{}", "00".repeat(15), "00".repeat(16));
        let err = Envelope::parse(&text).expect_err("expected hex decode error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedEnvelope));
    }

    #[test]
    fn test_bad_iv_hex() {
        let text = format!("{}g{}", "00".repeat(16), "0".repeat(31));
        let err = Envelope::parse(&text).expect_err("expected hex decode error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedEnvelope));
    }

    #[test]
    fn test_bad_base64() {
        let text = format!("{}bad$$", "00".repeat(32));
        let err = Envelope::parse(&text).expect_err("expected base64 decode error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedEnvelope));
    }

    #[test]
    fn test_multibyte_input_does_not_panic() {
        // 32 two-byte chars pass the length check but are not hex
        let text = "é".repeat(32);
        let err = Envelope::parse(&text).expect_err("expected hex decode error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedEnvelope));
    }
}
