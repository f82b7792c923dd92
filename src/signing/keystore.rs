//! PKCS#12 key store access.
//!
//! The store is read from disk on every call; nothing is cached between
//! signing operations.
//!
//! The password buffer handed out by [`credential::with_password`] is wiped
//! after unlocking. `Pkcs12::parse2` copies the password into its own
//! `CString` for the OpenSSL call, and that copy is freed without being
//! zeroed; the `openssl` crate offers no byte-slice variant to avoid it.

use crate::credential::{self, CredentialProvider};
use crate::error::{Result, SealwatchError};
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private, Public};
use openssl::x509::X509;
use std::path::{Path, PathBuf};

/// Location of the signing identity.
#[derive(Debug, Clone)]
pub struct KeyStoreSpec {
    pub path: PathBuf,
    pub alias: String,
    pub provider: CredentialProvider,
}

/// Private key and certificate unlocked from the store.
pub struct KeyMaterial {
    pub private_key: PKey<Private>,
    pub certificate: X509,
}

impl KeyMaterial {
    /// Public key of the certificate.
    ///
    /// # Errors
    ///
    /// Returns [`SealwatchError::KeyStore`] if the certificate key is unreadable.
    pub fn public_key(&self) -> Result<PKey<Public>> {
        self.certificate
            .public_key()
            .map_err(|e| SealwatchError::KeyStore(format!("Certificate has no usable public key: {e}")))
    }
}

/// Open the store at `spec.path` and unlock the entry for `spec.alias`.
///
/// # Errors
///
/// Returns [`SealwatchError::Credential`] if the password cannot be
/// resolved and [`SealwatchError::KeyStore`] if the store cannot be read,
/// unlocked, or does not hold the alias.
pub fn load(spec: &KeyStoreSpec) -> Result<KeyMaterial> {
    let der = std::fs::read(&spec.path).map_err(|e| {
        SealwatchError::KeyStore(format!("Cannot read key store {}: {e}", spec.path.display()))
    })?;

    let parsed = credential::with_password(spec.provider, |password| {
        let password = std::str::from_utf8(password)
            .map_err(|_| SealwatchError::Credential("Password is not valid UTF-8".to_owned()))?;
        Pkcs12::from_der(&der)
            .and_then(|store| store.parse2(password))
            .map_err(|e| SealwatchError::KeyStore(format!("Cannot unlock key store: {e}")))
    })?;

    let certificate = parsed
        .cert
        .ok_or_else(|| missing(&spec.path, &spec.alias, "certificate"))?;
    check_alias(&certificate, &spec.alias, &spec.path)?;

    let private_key = parsed
        .pkey
        .ok_or_else(|| missing(&spec.path, &spec.alias, "private key"))?;

    tracing::debug!(keystore = %spec.path.display(), alias = %spec.alias, "Key store unlocked");

    Ok(KeyMaterial {
        private_key,
        certificate,
    })
}

/// Aliases are matched case-insensitively; an unnamed entry matches any alias.
fn check_alias(certificate: &X509, alias: &str, path: &Path) -> Result<()> {
    match certificate.alias() {
        Some(name) if !String::from_utf8_lossy(name).eq_ignore_ascii_case(alias) => {
            Err(missing(path, alias, "entry"))
        }
        _ => Ok(()),
    }
}

fn missing(path: &Path, alias: &str, what: &str) -> SealwatchError {
    SealwatchError::KeyStore(format!(
        "No {what} for alias '{alias}' in {}",
        path.display()
    ))
}

/// Bench key store shipped under `tests/fixtures`, alias `dsig`.
#[cfg(test)]
pub(crate) fn fixture_store(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(path: PathBuf, alias: &str) -> KeyStoreSpec {
        KeyStoreSpec {
            path,
            alias: alias.to_owned(),
            provider: CredentialProvider::Test,
        }
    }

    #[test]
    fn test_load_matching_alias() {
        let path = fixture_store("bench.p12");

        let material = load(&spec(path, "DSIG")).unwrap();
        assert!(material.public_key().is_ok());
    }

    #[test]
    fn test_wrong_alias_rejected() {
        let path = fixture_store("bench.p12");

        let err = load(&spec(path, "other")).err().unwrap();
        assert!(matches!(err, SealwatchError::KeyStore(_)));
    }

    #[test]
    fn test_wrong_password_rejected() {
        let path = fixture_store("bench-other-password.p12");

        let err = load(&spec(path, "dsig")).err().unwrap();
        assert!(matches!(err, SealwatchError::KeyStore(_)));
    }

    #[test]
    fn test_missing_store() {
        let err = load(&spec(PathBuf::from("/nonexistent/keystore.p12"), "dsig"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Cannot read key store"));
    }
}
