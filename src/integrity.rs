//! Measurement payload integrity.
//!
//! Field devices write their readings as a small sectioned text file. Each
//! reading appears twice: its raw value in the measurements section and a
//! weighted checksum of that value in the checksum section.
//!
//! ```text
//! [MESURES]
//! T1=25
//! [CRC]
//! T1=156
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use sealwatch::integrity::{self, MeasurementSet, SectionNames};
//!
//! # fn example() -> sealwatch::error::Result<()> {
//! let text = std::fs::read_to_string("reading.dat")?;
//! let set = MeasurementSet::parse(&text, SectionNames::default())?;
//! let report = integrity::validate(&set, "reading.dat");
//!
//! if !report.is_clean() {
//!     println!("{}", report.format_cli());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`checksum`]: the weighted, codepage-aware checksum formula
//! - [`measurements`]: the line-oriented payload parser
//! - [`validator`]: per-entry comparison and reporting

pub mod checksum;
pub mod measurements;
pub mod validator;

pub use checksum::{checksum, try_checksum};
pub use measurements::{MeasurementSet, SectionNames};
pub use validator::{EntryOutcome, EntryStatus, ValidationReport, validate};

use crate::error::{Result, SealwatchError};
use encoding_rs::Encoding;
use std::path::Path;

/// Decode and parse a measurement file written in `codepage`.
///
/// # Errors
///
/// Returns [`SealwatchError::Load`] if the file cannot be read.
pub fn load_file(
    path: &Path,
    codepage: &'static Encoding,
    sections: SectionNames,
) -> Result<MeasurementSet> {
    let bytes = std::fs::read(path)
        .map_err(|e| SealwatchError::Load(format!("{}: {e}", path.display())))?;
    let (text, had_errors) = codepage.decode_without_bom_handling(&bytes);
    if had_errors {
        tracing::warn!(
            file = %path.display(),
            codepage = codepage.name(),
            "Measurement file contains bytes outside the codepage"
        );
    }
    MeasurementSet::parse(&text, sections)
}
