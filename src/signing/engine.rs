//! Detached signature creation and verification.

use crate::error::{Result, ResultExt as _, SealwatchError};
use crate::signing::keystore::{self, KeyStoreSpec};
use openssl::hash::MessageDigest;
use openssl::sign::{Signer, Verifier};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Write as _};
use std::path::{Path, PathBuf};

/// Suffix appended to a file name to form its signature file name.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// Chunk size used when streaming file bytes through the signer.
const CHUNK_SIZE: usize = 1024;

/// Signature algorithm: SHA-1 digest, RSA PKCS#1 v1.5.
///
/// Must stay fixed so previously written `.sig` files keep verifying.
pub const SIGNATURE_ALGORITHM: &str = "SHA1withRSA";

fn digest() -> MessageDigest {
    MessageDigest::sha1()
}

/// Path of the signature file that belongs to `file`.
pub fn signature_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(SIGNATURE_SUFFIX);
    PathBuf::from(name)
}

/// A signature written next to its file.
#[derive(Debug, Clone)]
pub struct SignatureArtifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Outcome of checking a file against its `.sig` file.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureVerification {
    pub passed: bool,
    pub message: String,
    pub file_path: String,
    pub signature_path: String,
}

impl SignatureVerification {
    pub fn format_cli(&self) -> String {
        if self.passed {
            format!(
                "✓ PASS: Signature verified\n  File: {}\n  Signature: {} ({SIGNATURE_ALGORITHM})",
                self.file_path, self.signature_path
            )
        } else {
            format!(
                "✗ FAIL: {}\n  File: {}\n  Signature: {}\n  File may have been modified or corrupted",
                self.message, self.file_path, self.signature_path
            )
        }
    }
}

/// Signs files with the identity held in a key store.
#[derive(Debug, Clone)]
pub struct SignatureEngine {
    keystore: KeyStoreSpec,
}

impl SignatureEngine {
    pub fn new(keystore: KeyStoreSpec) -> Self {
        Self { keystore }
    }

    /// Sign `file` and write the raw signature to `<file>.sig`.
    ///
    /// The signature is written to a temporary file first and renamed into
    /// place, so a failure never leaves a partial `.sig` behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be loaded, the file cannot be
    /// read, or the signature cannot be written.
    pub fn sign(&self, file: &Path) -> Result<SignatureArtifact> {
        let material = keystore::load(&self.keystore)?;

        let mut signer = Signer::new(digest(), &material.private_key)
            .map_err(|e| SealwatchError::Crypto(format!("Cannot initialize signer: {e}")))?;
        stream_file(file, |chunk| signer.update(chunk).map_err(SealwatchError::from))?;
        let bytes = signer
            .sign_to_vec()
            .map_err(|e| SealwatchError::Crypto(format!("Cannot finalize signature: {e}")))?;

        let path = signature_path(file);
        write_atomically(&path, &bytes)?;

        tracing::info!(
            file = %file.display(),
            signature = %path.display(),
            bytes = bytes.len(),
            "Signature written"
        );
        Ok(SignatureArtifact { path, bytes })
    }

    /// Check `file` against `<file>.sig` with the store's certificate.
    ///
    /// A signature that does not match is reported as `passed = false`;
    /// only infrastructure failures (key store, unreadable files) are errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the key store, the file, or the signature file
    /// cannot be read.
    pub fn verify(&self, file: &Path) -> Result<SignatureVerification> {
        let material = keystore::load(&self.keystore)?;
        let public_key = material.public_key()?;

        let sig_path = signature_path(file);
        let signature = std::fs::read(&sig_path)
            .with_context(|| format!("Failed to read signature file: {}", sig_path.display()))?;

        let mut verifier = Verifier::new(digest(), &public_key)
            .map_err(|e| SealwatchError::Crypto(format!("Cannot initialize verifier: {e}")))?;
        stream_file(file, |chunk| verifier.update(chunk).map_err(SealwatchError::from))?;

        // A malformed signature makes OpenSSL report an error instead of `false`.
        let passed = verifier.verify(&signature).unwrap_or(false);

        let result = SignatureVerification {
            passed,
            message: if passed {
                "Signature verified successfully".to_owned()
            } else {
                "Cannot verify signature".to_owned()
            },
            file_path: file.display().to_string(),
            signature_path: sig_path.display().to_string(),
        };

        if passed {
            tracing::info!(file = %file.display(), "Signature verified");
        } else {
            tracing::error!(file = %file.display(), "Cannot verify data integrity");
        }
        Ok(result)
    }
}

fn stream_file(path: &Path, mut update: impl FnMut(&[u8]) -> Result<()>) -> Result<()> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file for signing: {}", path.display()))?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        update(buffer.get(..bytes_read).unwrap_or_default())?;
    }
    Ok(())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary signature in {}", dir.display()))?;
    tmp.write_all(bytes)
        .context("Failed to write signature bytes")?;
    tmp.persist(path)
        .map_err(|e| SealwatchError::Io(e.error))
        .with_context(|| format!("Failed to store signature file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialProvider;
    use crate::signing::keystore::fixture_store;
    use std::fs;
    use tempfile::TempDir;

    fn engine() -> SignatureEngine {
        SignatureEngine::new(KeyStoreSpec {
            path: fixture_store("bench.p12"),
            alias: "dsig".to_owned(),
            provider: CredentialProvider::Test,
        })
    }

    #[test]
    fn test_signature_path() {
        assert_eq!(
            signature_path(Path::new("/data/report.dat")),
            PathBuf::from("/data/report.dat.sig")
        );
    }

    #[test]
    fn test_sign_then_verify() {
        let dir = TempDir::new().unwrap();
        let engine = engine();
        let file = dir.path().join("report.dat");
        fs::write(&file, b"[MESURES]\nT1=25\n").unwrap();

        let artifact = engine.sign(&file).unwrap();
        assert_eq!(artifact.path, dir.path().join("report.dat.sig"));
        assert_eq!(fs::read(&artifact.path).unwrap(), artifact.bytes);
        // 2048-bit RSA
        assert_eq!(artifact.bytes.len(), 256);

        let result = engine.verify(&file).unwrap();
        assert!(result.passed);
        assert!(result.format_cli().contains("✓ PASS"));
    }

    #[test]
    fn test_signature_spans_multiple_chunks() {
        let dir = TempDir::new().unwrap();
        let engine = engine();
        let file = dir.path().join("large.dat");
        fs::write(&file, vec![b'x'; CHUNK_SIZE * 3 + 17]).unwrap();

        engine.sign(&file).unwrap();
        assert!(engine.verify(&file).unwrap().passed);
    }

    #[test]
    fn test_flipped_byte_fails_verification() {
        let dir = TempDir::new().unwrap();
        let engine = engine();
        let file = dir.path().join("report.dat");
        fs::write(&file, b"[MESURES]\nT1=25\n").unwrap();
        engine.sign(&file).unwrap();

        let mut bytes = fs::read(&file).unwrap();
        bytes[3] ^= 0x01;
        fs::write(&file, bytes).unwrap();

        let result = engine.verify(&file).unwrap();
        assert!(!result.passed);
        assert!(result.format_cli().contains("✗ FAIL"));
    }

    #[test]
    fn test_truncated_signature_fails_verification() {
        let dir = TempDir::new().unwrap();
        let engine = engine();
        let file = dir.path().join("report.dat");
        fs::write(&file, b"payload").unwrap();
        let artifact = engine.sign(&file).unwrap();

        fs::write(&artifact.path, &artifact.bytes[..10]).unwrap();
        assert!(!engine.verify(&file).unwrap().passed);
    }

    #[test]
    fn test_sign_missing_file_leaves_no_signature() {
        let dir = TempDir::new().unwrap();
        let engine = engine();
        let file = dir.path().join("absent.dat");

        assert!(engine.sign(&file).is_err());
        assert!(!signature_path(&file).exists());
    }

    #[test]
    fn test_verify_without_signature_is_error() {
        let dir = TempDir::new().unwrap();
        let engine = engine();
        let file = dir.path().join("unsigned.dat");
        fs::write(&file, b"payload").unwrap();

        assert!(engine.verify(&file).is_err());
    }
}
