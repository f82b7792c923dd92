//! Node types.
//!
//! Each kind of field node drops its files into its own incoming
//! subdirectory, writes them in its own codepage and may use its own
//! payload layout. A [`NodeProfile`] captures those differences and the
//! [`NodeRegistry`] maps the configured type key to a profile.

use crate::error::{Result, SealwatchError};
use crate::integrity::{self, SectionNames, ValidationReport};
use encoding_rs::Encoding;
use std::collections::BTreeMap;
use std::path::Path;

/// Capabilities that differ between node types.
pub trait NodeProfile: Send + Sync {
    /// Type key used in configuration.
    fn key(&self) -> &'static str;

    /// Subdirectory of the watch path that receives fresh files.
    fn incoming_subdir(&self) -> &'static str;

    /// Codepage the node writes its payloads in.
    fn codepage(&self) -> &'static Encoding;

    /// Parse and validate the payload at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SealwatchError::Load`] if the payload cannot be read.
    fn validate(&self, path: &Path) -> Result<ValidationReport>;
}

/// Bench node with Greek-codepage `MESURES`/`CRC` payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestNode;

impl TestNode {
    pub const KEY: &'static str = "TESTNODE";

    fn boxed() -> Box<dyn NodeProfile> {
        Box::new(Self)
    }
}

impl NodeProfile for TestNode {
    fn key(&self) -> &'static str {
        Self::KEY
    }

    fn incoming_subdir(&self) -> &'static str {
        "testpath"
    }

    fn codepage(&self) -> &'static Encoding {
        encoding_rs::WINDOWS_1253
    }

    fn validate(&self, path: &Path) -> Result<ValidationReport> {
        tracing::info!(file = %path.display(), "Start validation");
        let set = integrity::load_file(path, self.codepage(), SectionNames::default())?;
        Ok(integrity::validate(&set, &path.display().to_string()))
    }
}

pub type ProfileFactory = fn() -> Box<dyn NodeProfile>;

/// Type key to profile factory.
pub struct NodeRegistry {
    factories: BTreeMap<&'static str, ProfileFactory>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(TestNode::KEY, TestNode::boxed);
        registry
    }
}

impl NodeRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, key: &'static str, factory: ProfileFactory) {
        self.factories.insert(key, factory);
    }

    /// Build the profile registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SealwatchError::Config`] for unknown type keys.
    pub fn create(&self, key: &str) -> Result<Box<dyn NodeProfile>> {
        self.factories
            .get(key.trim())
            .map(|factory| factory())
            .ok_or_else(|| {
                SealwatchError::Config(format!(
                    "Implementation for type {key} is not available (known: {})",
                    self.keys().collect::<Vec<_>>().join(", ")
                ))
            })
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}
