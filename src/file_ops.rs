//! File encryption/decryption operations
//!
//! High-level operations for encrypting JSON payload files into envelope
//! files and back. The payload file must contain a single JSON value; the
//! envelope file holds the transit envelope text.

use crate::error::{ErrorCategory, ErrorKind, Result, TransitboxError};
use crate::kdf::KdfParams;
use crate::passphrase::PassphraseReader;
use crate::payloadcrypt;
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Encrypt a JSON payload file with a passphrase
///
/// Reads a JSON value from `input_path`, encrypts it using a passphrase
/// from `passphrase_reader`, and writes the envelope to `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only)
/// on Unix systems.
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    params: &KdfParams,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let payload = read_payload(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let envelope = payloadcrypt::encrypt(&payload, &passphrase, params)
        .map_err(|e| e.with_context("encryption failed"))?;
    write_file_secure(output_path, envelope.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    Ok(())
}

/// Decrypt an envelope file with a passphrase
///
/// Reads an envelope from `input_path`, decrypts it using a passphrase
/// from `passphrase_reader`, and writes the payload as pretty-printed JSON
/// to `output_path`.
///
/// The output file is created with mode 0o600 (read/write for owner only)
/// on Unix systems.
pub fn decrypt_file(
    input_path: &Path,
    output_path: &Path,
    params: &KdfParams,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let envelope = read_envelope(input_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let payload: Value = payloadcrypt::decrypt(&envelope, &passphrase, params)
        .map_err(|e| e.with_context("failed to decrypt"))?;
    let mut text = serde_json::to_string_pretty(&payload).map_err(|e| {
        TransitboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Serialization,
            "failed to render decrypted payload",
            e,
        )
    })?;
    text.push('\n');
    write_file_secure(output_path, text.as_bytes())
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    Ok(())
}

/// Update an envelope file with a new payload using the same passphrase
///
/// This function:
/// 1. Decrypts the existing envelope at `crypt_path` to validate the passphrase
/// 2. Reads the new payload from `plain_path`
/// 3. Encrypts the new payload with the validated passphrase
/// 4. Atomically writes to `crypt_path` (tempfile + fsync + rename)
///
/// The atomic write ensures that either the old envelope or the new one
/// exists, never a partial file. The passphrase validation prevents
/// accidental passphrase changes.
pub fn update_file(
    plain_path: &Path,
    crypt_path: &Path,
    params: &KdfParams,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let envelope = read_envelope(crypt_path)?;
    let passphrase = passphrase_reader.read_passphrase()?;

    // Validate passphrase by decrypting the existing envelope (discard payload)
    let _: Value = payloadcrypt::decrypt(&envelope, &passphrase, params)
        .map_err(|e| e.with_context("failed to decrypt"))?;

    let new_payload = read_payload(plain_path)?;
    let new_envelope = payloadcrypt::encrypt(&new_payload, &passphrase, params)
        .map_err(|e| e.with_context("failed to encrypt"))?;

    // Great, let's re-write it (atomically).
    let crypt_dir = crypt_path.parent().ok_or_else(|| {
        TransitboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            "crypt_path has no parent directory",
        )
    })?;
    let mut temp_file = tempfile::NamedTempFile::new_in(crypt_dir).map_err(|e| {
        TransitboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    temp_file.write_all(new_envelope.as_bytes()).map_err(|e| {
        TransitboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        TransitboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        TransitboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    // Persist with restrictive permissions, then atomically rename over
    // the target.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| {
                TransitboxError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to get tempfile metadata",
                    e,
                )
            })?
            .permissions();
        perms.set_mode(0o600);
        temp_file.as_file().set_permissions(perms).map_err(|e| {
            TransitboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to set tempfile permissions",
                e,
            )
        })?;
    }
    temp_file.persist(crypt_path).map_err(|e| {
        TransitboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", crypt_path.display()),
            e,
        )
    })?;
    Ok(())
}

/// Read and parse a JSON payload file
fn read_payload(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|e| read_error(path, e))?;
    serde_json::from_str(&text).map_err(|e| {
        TransitboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Deserialization,
            format!("{} is not valid JSON: {}", path.display(), e),
            e,
        )
    })
}

/// Read an envelope file as text
fn read_envelope(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path).map_err(|e| read_error(path, e))?;
    // Editors commonly append a trailing newline; the envelope itself
    // never contains whitespace.
    Ok(text.trim_end().to_string())
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                TransitboxError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            TransitboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            TransitboxError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> TransitboxError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    TransitboxError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passphrase::ConstantPassphraseReader;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    const PARAMS: KdfParams = KdfParams::legacy();

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("payload.json");
        let crypt_path = temp_dir.path().join("payload.tbx");
        let decrypted_path = temp_dir.path().join("decrypted.json");

        let payload = json!({"user": "alice", "role": "admin"});
        fs::write(&plain_path, serde_json::to_string(&payload).unwrap()).unwrap();

        let mut reader = ConstantPassphraseReader::new(b"test password".to_vec());
        encrypt_file(&plain_path, &crypt_path, &PARAMS, &mut reader).unwrap();
        assert!(crypt_path.exists());

        let mut reader = ConstantPassphraseReader::new(b"test password".to_vec());
        decrypt_file(&crypt_path, &decrypted_path, &PARAMS, &mut reader).unwrap();
        assert_eq!(read_json(&decrypted_path), payload);
    }

    #[test]
    fn test_update_file() {
        let temp_dir = TempDir::new().unwrap();
        let plain1_path = temp_dir.path().join("plain1.json");
        let plain2_path = temp_dir.path().join("plain2.json");
        let crypt_path = temp_dir.path().join("payload.tbx");

        fs::write(&plain1_path, r#"{"version": 1}"#).unwrap();
        let mut reader = ConstantPassphraseReader::new(b"test password".to_vec());
        encrypt_file(&plain1_path, &crypt_path, &PARAMS, &mut reader).unwrap();

        fs::write(&plain2_path, r#"{"version": 2}"#).unwrap();
        let mut reader = ConstantPassphraseReader::new(b"test password".to_vec());
        update_file(&plain2_path, &crypt_path, &PARAMS, &mut reader).unwrap();

        let decrypted_path = temp_dir.path().join("decrypted.json");
        let mut reader = ConstantPassphraseReader::new(b"test password".to_vec());
        decrypt_file(&crypt_path, &decrypted_path, &PARAMS, &mut reader).unwrap();
        assert_eq!(read_json(&decrypted_path), json!({"version": 2}));
    }

    #[test]
    fn test_update_with_wrong_passphrase_fails() {
        let temp_dir = TempDir::new().unwrap();
        let plain1_path = temp_dir.path().join("plain1.json");
        let plain2_path = temp_dir.path().join("plain2.json");
        let crypt_path = temp_dir.path().join("payload.tbx");

        fs::write(&plain1_path, r#"{"version": 1}"#).unwrap();
        let mut reader = ConstantPassphraseReader::new(b"correct password".to_vec());
        encrypt_file(&plain1_path, &crypt_path, &PARAMS, &mut reader).unwrap();

        fs::write(&plain2_path, r#"{"version": 2}"#).unwrap();
        let mut reader = ConstantPassphraseReader::new(b"wrong password".to_vec());
        let result = update_file(&plain2_path, &crypt_path, &PARAMS, &mut reader);

        let err = result.expect_err("expected decryption failure");
        assert!(matches!(
            err.kind,
            Some(ErrorKind::DecryptionFailed) | Some(ErrorKind::Deserialization)
        ));
    }

    #[test]
    fn test_rejects_non_json_input() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("payload.json");
        let crypt_path = temp_dir.path().join("payload.tbx");

        fs::write(&plain_path, "not json at all").unwrap();

        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        let result = encrypt_file(&plain_path, &crypt_path, &PARAMS, &mut reader);

        let err = result.expect_err("expected JSON parse failure");
        assert_eq!(err.kind, Some(ErrorKind::Deserialization));
    }

    #[test]
    fn test_tolerates_trailing_newline_in_envelope() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("payload.json");
        let crypt_path = temp_dir.path().join("payload.tbx");
        let decrypted_path = temp_dir.path().join("decrypted.json");

        fs::write(&plain_path, r#"{"k": "v"}"#).unwrap();
        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        encrypt_file(&plain_path, &crypt_path, &PARAMS, &mut reader).unwrap();

        let mut envelope = fs::read_to_string(&crypt_path).unwrap();
        envelope.push('\n');
        fs::write(&crypt_path, envelope).unwrap();

        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        decrypt_file(&crypt_path, &decrypted_path, &PARAMS, &mut reader).unwrap();
        assert_eq!(read_json(&decrypted_path), json!({"k": "v"}));
    }

    #[test]
    #[cfg(unix)]
    fn test_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("payload.json");
        let crypt_path = temp_dir.path().join("payload.tbx");

        fs::write(&plain_path, r#"{"k": "v"}"#).unwrap();

        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        encrypt_file(&plain_path, &crypt_path, &PARAMS, &mut reader).unwrap();

        let metadata = fs::metadata(&crypt_path).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_missing_input_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.json");
        let crypt_path = temp_dir.path().join("payload.tbx");

        let mut reader = ConstantPassphraseReader::new(b"test".to_vec());
        let result = encrypt_file(&missing, &crypt_path, &PARAMS, &mut reader);

        let err = result.expect_err("expected read failure");
        assert_eq!(err.kind, Some(ErrorKind::Io));
        assert_eq!(err.category, ErrorCategory::User);
    }
}
