//! Key store password resolution.
//!
//! Passwords only ever live in a `Zeroizing` buffer inside
//! [`with_password`], so they are wiped as soon as the store is unlocked,
//! on success and on every error path.

use crate::error::{Result, SealwatchError};
use std::str::FromStr;
use zeroize::Zeroizing;

/// Environment variable read by the `ENV` provider.
pub const PASSWORD_ENV_VAR: &str = "SEALWATCH_KEYSTORE_PASSWORD";

/// Password of the built-in test provider, as raw bytes.
const TEST_PROVIDER_PASSWORD: [u8; 8] = [52, 50, 55, 49, 52, 49, 53, 57];

/// Where the key store password comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialProvider {
    /// Fixed password shared with the bench key stores
    Test,
    /// Password taken from [`PASSWORD_ENV_VAR`]
    Env,
}

impl CredentialProvider {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Test => "TEST_PROVIDER",
            Self::Env => "ENV",
        }
    }

    fn resolve(self) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            Self::Test => Ok(Zeroizing::new(TEST_PROVIDER_PASSWORD.to_vec())),
            Self::Env => {
                let value = std::env::var(PASSWORD_ENV_VAR).map_err(|e| {
                    SealwatchError::Credential(format!("{PASSWORD_ENV_VAR} is not usable: {e}"))
                })?;
                Ok(Zeroizing::new(value.into_bytes()))
            }
        }
    }
}

impl FromStr for CredentialProvider {
    type Err = SealwatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "TEST_PROVIDER" => Ok(Self::Test),
            "ENV" => Ok(Self::Env),
            other => Err(SealwatchError::Credential(format!(
                "Provider {other} is not registered"
            ))),
        }
    }
}

impl std::fmt::Display for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Run `f` with the resolved password; the buffer is zeroed on return.
///
/// # Errors
///
/// Returns [`SealwatchError::Credential`] when the password cannot be
/// resolved, or whatever `f` returns.
pub fn with_password<T>(
    provider: CredentialProvider,
    f: impl FnOnce(&[u8]) -> Result<T>,
) -> Result<T> {
    let password = provider.resolve()?;
    f(&password)
}
