//! Service configuration.
//!
//! Persisted as JSON, by default in `<config dir>/sealwatch/config.json`:
//!
//! ```json
//! {
//!   "watch_path": "/srv/node",
//!   "force_validation": true,
//!   "keystore_file": "/etc/sealwatch/keystore.p12",
//!   "cert_alias": "dsig",
//!   "node_type": "TESTNODE",
//!   "credential_provider": "ENV"
//! }
//! ```

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credential::CredentialProvider;
use crate::error::SealwatchError;
use crate::signing::KeyStoreSpec;
use crate::watcher::intake::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Root of the node directory; incoming files live in a subdirectory
    pub watch_path: PathBuf,
    /// Re-verify every signature right after writing it
    pub force_validation: bool,
    /// PKCS#12 key store holding the signing identity
    pub keystore_file: PathBuf,
    /// Alias of the signing entry in the key store
    pub cert_alias: String,
    /// Node type key, see [`crate::node::NodeRegistry`]
    pub node_type: String,
    /// Name of the key store password provider
    pub credential_provider: String,
    /// Refuse to sign files whose checksums do not all match
    pub gate_on_mismatch: bool,
    /// Upper bound for waiting on an unreadable file; unbounded when absent
    pub readiness_timeout_secs: Option<u64>,
    /// Attempts to copy a file out of the incoming area
    pub copy_attempts: u32,
    /// Pause between readiness polls and copy attempts
    pub retry_delay_ms: u64,
    /// Directory for rolling log files; platform data dir when absent
    pub log_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            watch_path: PathBuf::new(),
            force_validation: false,
            keystore_file: PathBuf::new(),
            cert_alias: String::new(),
            node_type: "TESTNODE".to_owned(),
            credential_provider: "TEST_PROVIDER".to_owned(),
            gate_on_mismatch: false,
            readiness_timeout_secs: None,
            copy_attempts: 5,
            retry_delay_ms: 500,
            log_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Platform default location of the config file.
    ///
    /// # Errors
    ///
    /// Returns error if the platform has no config directory.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("sealwatch").join("config.json"))
    }

    /// Load configuration from `path`; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Reject settings the service cannot start with.
    ///
    /// # Errors
    ///
    /// Returns [`SealwatchError::Config`] or [`SealwatchError::Credential`].
    pub fn validate(&self) -> std::result::Result<(), SealwatchError> {
        if self.watch_path.as_os_str().is_empty() {
            return Err(SealwatchError::Config(
                "Watch path has not been set".to_owned(),
            ));
        }
        if self.keystore_file.as_os_str().is_empty() {
            return Err(SealwatchError::Config(
                "Key store file has not been set".to_owned(),
            ));
        }
        if self.cert_alias.trim().is_empty() {
            return Err(SealwatchError::Config(
                "Certificate alias has not been set".to_owned(),
            ));
        }
        if self.copy_attempts == 0 {
            return Err(SealwatchError::Config(
                "copy_attempts must be at least 1".to_owned(),
            ));
        }
        self.credential_provider()?;
        Ok(())
    }

    /// Parsed credential provider.
    ///
    /// # Errors
    ///
    /// Returns [`SealwatchError::Credential`] for unregistered providers.
    pub fn credential_provider(&self) -> std::result::Result<CredentialProvider, SealwatchError> {
        self.credential_provider.parse()
    }

    /// Key store location for the signature engine.
    ///
    /// # Errors
    ///
    /// Returns [`SealwatchError::Credential`] for unregistered providers.
    pub fn keystore_spec(&self) -> std::result::Result<KeyStoreSpec, SealwatchError> {
        Ok(KeyStoreSpec {
            path: self.keystore_file.clone(),
            alias: self.cert_alias.clone(),
            provider: self.credential_provider()?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.copy_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
            readiness_timeout: self.readiness_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid() -> ServiceConfig {
        ServiceConfig {
            watch_path: PathBuf::from("/srv/node"),
            keystore_file: PathBuf::from("/etc/sealwatch/keystore.p12"),
            cert_alias: "dsig".to_owned(),
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = ServiceConfig::load(Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.copy_attempts, 5);
        assert_eq!(config.retry_delay_ms, 500);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ServiceConfig {
            force_validation: true,
            readiness_timeout_secs: Some(30),
            ..valid()
        };

        config.save(&path).unwrap();
        assert_eq!(ServiceConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "watch_path": "/srv/node", "force_validation": true }"#).unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert!(config.force_validation);
        assert_eq!(config.node_type, "TESTNODE");
    }

    #[test]
    fn test_blank_watch_path_rejected() {
        let config = ServiceConfig {
            watch_path: PathBuf::new(),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(SealwatchError::Config(_))));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = ServiceConfig {
            credential_provider: "HSM".to_owned(),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(SealwatchError::Credential(_))));
    }

    #[test]
    fn test_retry_policy() {
        let policy = ServiceConfig {
            readiness_timeout_secs: Some(2),
            ..valid()
        }
        .retry_policy();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.delay, Duration::from_millis(500));
        assert_eq!(policy.readiness_timeout, Some(Duration::from_secs(2)));
    }
}
