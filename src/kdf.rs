//! Passphrase key stretching using PBKDF2-HMAC-SHA1
//!
//! The PRF is fixed to HMAC-SHA1 for compatibility with legacy envelopes;
//! the envelope format carries no algorithm identifier, so changing it
//! would silently break decryption.

use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::envelope::SALT_LEN;

/// Length of derived key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// Default iteration count for newly produced envelopes
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Historical iteration count. Far below current key-stretching
/// guidance; only for decrypting legacy envelopes.
pub const LEGACY_ITERATIONS: u32 = 100;

/// Key derivation parameters
///
/// Passed explicitly into encryption and decryption rather than living in
/// ambient module state, so legacy-compatible and hardened configurations
/// can coexist in one process. The iteration count is not recorded in the
/// envelope; both sides must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2 iteration count
    pub iterations: u32,
}

impl KdfParams {
    /// Hardened parameters for newly produced envelopes
    pub const fn hardened() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Compatibility parameters for legacy envelopes
    pub const fn legacy() -> Self {
        Self {
            iterations: LEGACY_ITERATIONS,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::hardened()
    }
}

/// Derive a 32-byte key from a passphrase and salt
///
/// Deterministic: the same (passphrase, salt, iterations) always yields the
/// same key, which is what lets the decrypting side reconstruct the key
/// from the envelope's salt. The fixed-size salt type makes a wrong salt
/// length unrepresentable.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha1>(passphrase, salt, params.iterations, &mut *key);
    key
}
