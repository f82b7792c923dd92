//! Shared fixtures for the integration tests.

use sealwatch::credential::CredentialProvider;
use sealwatch::signing::KeyStoreSpec;
use std::path::Path;

/// Bench key store unlocked by the built-in test provider.
pub fn test_keystore() -> KeyStoreSpec {
    KeyStoreSpec {
        path: Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("bench.p12"),
        alias: "dsig".to_owned(),
        provider: CredentialProvider::Test,
    }
}

/// A `MESURES`/`CRC` payload with one entry per `(key, value, checksum)`.
pub fn payload(entries: &[(&str, &str, &str)]) -> String {
    let mut text = String::from("# bench export\n[MESURES]\n");
    for (key, value, _) in entries {
        text.push_str(&format!("{key}={value}\n"));
    }
    text.push_str("[CRC]\n");
    for (key, _, crc) in entries {
        text.push_str(&format!("{key}={crc}\n"));
    }
    text
}
