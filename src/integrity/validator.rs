//! Per-entry checksum validation.
//!
//! Every measurement key is checked against its declared checksum and the
//! outcome recorded in a [`ValidationReport`]. Problems are logged one by
//! one and never stop the batch; whether a dirty report blocks signing is
//! decided by the caller.

use crate::integrity::checksum::try_checksum;
use crate::integrity::measurements::MeasurementSet;
use serde::Serialize;

/// Outcome for a single measurement key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    /// Declared checksum equals the computed one
    Match,
    /// Declared checksum differs from the computed one
    Mismatch { declared: String, computed: String },
    /// The checksum section has no entry for this key
    MissingChecksum,
    /// The checksum of the value could not be computed
    ChecksumUnavailable { declared: Option<String> },
}

/// One validated measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    pub key: String,
    pub value: String,
    #[serde(flatten)]
    pub status: EntryStatus,
}

/// Result of validating one measurement file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// File the measurements were read from
    pub file: String,
    /// Outcomes in measurement order
    pub entries: Vec<EntryOutcome>,
}

impl ValidationReport {
    /// True when every entry matched its declared checksum.
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| e.status == EntryStatus::Match)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, EntryStatus::Mismatch { .. }))
    }

    pub fn missing(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::MissingChecksum)
    }

    /// Number of entries that did not match.
    pub fn problem_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status != EntryStatus::Match)
            .count()
    }

    /// Multi-line summary for terminal output.
    pub fn format_cli(&self) -> String {
        let mut output = if self.is_clean() {
            format!("✓ PASS: {} entries verified\n  File: {}", self.entries.len(), self.file)
        } else {
            format!(
                "✗ FAIL: {} of {} entries failed\n  File: {}",
                self.problem_count(),
                self.entries.len(),
                self.file
            )
        };

        for entry in &self.entries {
            let line = match &entry.status {
                EntryStatus::Match => continue,
                EntryStatus::Mismatch { declared, computed } => format!(
                    "\n  {}: value '{}' declared {declared}, computed {computed}",
                    entry.key, entry.value
                ),
                EntryStatus::MissingChecksum => {
                    format!("\n  {}: no checksum entry", entry.key)
                }
                EntryStatus::ChecksumUnavailable { .. } => {
                    format!("\n  {}: checksum could not be computed", entry.key)
                }
            };
            output.push_str(&line);
        }
        output
    }
}

/// Check every measurement in `set` against its declared checksum.
///
/// `file` only labels log records and the report.
pub fn validate(set: &MeasurementSet, file: &str) -> ValidationReport {
    let mut report = ValidationReport {
        file: file.to_owned(),
        entries: Vec::with_capacity(set.len()),
    };

    for key in set.keys() {
        let value = set.measurement(key).unwrap_or_default();
        let declared = set.declared_checksum(key);

        let status = match (try_checksum(value), declared) {
            (_, None) => {
                tracing::error!(
                    file,
                    key,
                    "Missing checksum entry, the file is probably incomplete"
                );
                EntryStatus::MissingChecksum
            }
            (Ok(computed), Some(declared)) if computed == declared => EntryStatus::Match,
            (Ok(computed), Some(declared)) => {
                tracing::error!(
                    file,
                    key,
                    value,
                    declared,
                    computed = computed.as_str(),
                    "Checksum mismatch"
                );
                EntryStatus::Mismatch {
                    declared: declared.to_owned(),
                    computed,
                }
            }
            (Err(e), Some(declared)) => {
                tracing::error!(file, key, value, declared, error = %e, "Checksum unavailable");
                EntryStatus::ChecksumUnavailable {
                    declared: Some(declared.to_owned()),
                }
            }
        };

        report.entries.push(EntryOutcome {
            key: key.to_owned(),
            value: value.to_owned(),
            status,
        });
    }

    if report.is_clean() {
        tracing::info!(file, entries = report.entries.len(), "Checksums validated");
    } else {
        tracing::warn!(
            file,
            entries = report.entries.len(),
            problems = report.problem_count(),
            "Checksum validation found problems"
        );
    }

    report
}
