//! Detached file signatures.
//!
//! A validated measurement file is signed with the private key of a local
//! PKCS#12 key store. The raw signature bytes are written verbatim to a
//! sibling file named `<file>.sig`; anyone holding the certificate can later
//! prove the file is unaltered.
//!
//! ```no_run
//! use sealwatch::credential::CredentialProvider;
//! use sealwatch::signing::{KeyStoreSpec, SignatureEngine};
//! use std::path::{Path, PathBuf};
//!
//! # fn example() -> sealwatch::error::Result<()> {
//! let engine = SignatureEngine::new(KeyStoreSpec {
//!     path: PathBuf::from("/etc/sealwatch/keystore.p12"),
//!     alias: "dsig".to_owned(),
//!     provider: CredentialProvider::Env,
//! });
//!
//! engine.sign(Path::new("/srv/node/reading.dat"))?;
//! let result = engine.verify(Path::new("/srv/node/reading.dat"))?;
//! println!("{}", result.format_cli());
//! # Ok(())
//! # }
//! ```
//!
//! - [`keystore`]: key store loading and alias lookup
//! - [`engine`]: streaming sign/verify and artifact persistence

pub mod engine;
pub mod keystore;

pub use engine::{
    SIGNATURE_ALGORITHM, SIGNATURE_SUFFIX, SignatureArtifact, SignatureEngine,
    SignatureVerification, signature_path,
};
pub use keystore::{KeyMaterial, KeyStoreSpec};
