//! Durable replica identity.
//!
//! A replica's identity is an Ed25519 signing key stored as 32 raw bytes in
//! a single file. The [`ReplicaId`] every log entry carries is derived from
//! the corresponding public key, so reusing the key file across restarts is
//! what makes a directory keep appending to the same chain.
//!
//! [`ReplicaId`]: holm_types::ReplicaId

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use holm_crypto::SigningKey;
use tracing::info;

use crate::error::{DbError, DbResult};

/// Raw secret length on disk.
const KEY_LEN: usize = 32;

/// Load the signing key from `path`, generating and persisting a fresh one
/// if the file does not exist yet.
///
/// A file of the wrong length is refused rather than regenerated: silently
/// minting a new identity would orphan the replica's existing chain.
pub fn load_or_create(path: &Path) -> DbResult<SigningKey> {
    if path.exists() {
        let bytes = fs::read(path)?;
        let raw: [u8; KEY_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            DbError::Identity(format!(
                "key file {} holds {} bytes, expected {KEY_LEN}",
                path.display(),
                bytes.len()
            ))
        })?;
        return Ok(SigningKey::from_bytes(raw));
    }

    let key = SigningKey::generate();
    write_key_file(path, key.as_bytes())?;
    info!(path = %path.display(), "generated replica identity");
    Ok(key)
}

/// Create the key file with owner-only permissions applied at creation,
/// never tightened after the bytes land.
fn write_key_file(path: &Path, secret: &[u8; KEY_LEN]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(secret)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_key_on_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.key");

        let key = load_or_create(&path).unwrap();
        assert!(path.is_file());
        assert_eq!(fs::read(&path).unwrap().len(), KEY_LEN);
        assert_eq!(fs::read(&path).unwrap(), key.as_bytes());
    }

    #[test]
    fn reload_returns_the_same_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.key");

        let first = load_or_create(&path).unwrap();
        let second = load_or_create(&path).unwrap();
        assert_eq!(first.replica_id(), second.replica_id());
    }

    #[test]
    fn wrong_length_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.key");
        fs::write(&path, b"short").unwrap();

        let err = load_or_create(&path).unwrap_err();
        assert!(matches!(err, DbError::Identity(_)));
        // The bad file is left in place for the operator to inspect.
        assert_eq!(fs::read(&path).unwrap(), b"short");
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.key");
        load_or_create(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
