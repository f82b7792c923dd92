//! File intake: readiness wait, copy with retry, validation and signing.
//!
//! Files land in `<watch_path>/<incoming>/<name>` while the device is still
//! writing them. Intake waits until the file can be opened, copies it to
//! `<watch_path>/<name>` (out of the device user's sight), validates the
//! copy and signs it, producing `<watch_path>/<name>.sig`.

use crate::error::{Result, SealwatchError};
use crate::integrity::ValidationReport;
use crate::node::NodeProfile;
use crate::signing::{SignatureEngine, SignatureVerification};
use crate::watcher::CancellationToken;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Chunk size used when copying out of the incoming area.
const COPY_CHUNK_SIZE: usize = 1024;

/// Timing of the readiness wait and the copy retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Copy attempts before giving up
    pub attempts: u32,
    /// Pause between readiness polls and between copy attempts
    pub delay: Duration,
    /// Give up waiting for readiness after this long; `None` waits forever
    pub readiness_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(500),
            readiness_timeout: None,
        }
    }
}

/// Opens source files for copying.
pub trait SourceOpener: Send {
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be opened.
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>>;
}

/// Opens files straight from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOpener;

impl SourceOpener for FsOpener {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(File::open(path)?))
    }
}

/// A source file that settled and its processing copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableFile {
    pub source: PathBuf,
    pub copy: PathBuf,
}

/// Everything intake produced for one file.
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub file: StableFile,
    pub report: ValidationReport,
    pub signature: PathBuf,
}

/// Moves files from the incoming area through validation to a signature.
pub struct FileIntake {
    watch_root: PathBuf,
    profile: Box<dyn NodeProfile>,
    engine: SignatureEngine,
    policy: RetryPolicy,
    gate_on_mismatch: bool,
    cancel: CancellationToken,
    opener: Box<dyn SourceOpener>,
}

impl FileIntake {
    pub fn new(
        watch_root: PathBuf,
        profile: Box<dyn NodeProfile>,
        engine: SignatureEngine,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            watch_root,
            profile,
            engine,
            policy,
            gate_on_mismatch: false,
            cancel,
            opener: Box::new(FsOpener),
        }
    }

    /// Refuse to sign files whose validation report is not clean.
    #[must_use]
    pub fn gate_on_mismatch(mut self, gate: bool) -> Self {
        self.gate_on_mismatch = gate;
        self
    }

    /// Replace the way source files are opened for copying.
    #[must_use]
    pub fn with_opener(mut self, opener: impl SourceOpener + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    /// Directory the node writes fresh files into.
    pub fn incoming_dir(&self) -> PathBuf {
        self.watch_root.join(self.profile.incoming_subdir())
    }

    /// Location of the processing copy for `name`.
    pub fn processing_path(&self, name: &str) -> PathBuf {
        self.watch_root.join(name)
    }

    /// Run one file through readiness, copy, validation and signing.
    ///
    /// Checksum problems are logged and, unless gating is enabled, do not
    /// prevent signing.
    ///
    /// # Errors
    ///
    /// Returns [`SealwatchError::Intake`] when the file never becomes ready,
    /// cannot be copied, or is refused by the gate;
    /// [`SealwatchError::Load`] when the copy cannot be parsed;
    /// [`SealwatchError::Cancelled`] on shutdown; and any signing error.
    pub fn process(&self, name: &str) -> Result<IntakeOutcome> {
        let file = StableFile {
            source: self.incoming_dir().join(name),
            copy: self.processing_path(name),
        };

        self.wait_until_readable(&file.source, name)?;
        self.copy_with_retry(&file.source, &file.copy, name)?;

        let report = self.profile.validate(&file.copy)?;
        if self.gate_on_mismatch && !report.is_clean() {
            return Err(SealwatchError::Intake(format!(
                "{} checksum problems in {name}, signing refused",
                report.problem_count()
            )));
        }

        let artifact = self.engine.sign(&file.copy)?;
        Ok(IntakeOutcome {
            file,
            report,
            signature: artifact.path,
        })
    }

    /// Verify the signature of an already processed file.
    ///
    /// # Errors
    ///
    /// Returns an error if the key store or either file cannot be read.
    pub fn verify(&self, name: &str) -> Result<SignatureVerification> {
        self.engine.verify(&self.processing_path(name))
    }

    fn wait_until_readable(&self, source: &Path, name: &str) -> Result<()> {
        let started = Instant::now();
        let mut polls: u64 = 0;

        while File::open(source).is_err() {
            if self
                .policy
                .readiness_timeout
                .is_some_and(|limit| started.elapsed() >= limit)
            {
                return Err(SealwatchError::Intake(format!(
                    "{name} was not readable after {polls} polls"
                )));
            }
            if polls == 0 {
                tracing::warn!(file = name, "Waiting for the file to be ready for reading");
            }
            polls += 1;
            if !self.cancel.sleep(self.policy.delay) {
                return Err(SealwatchError::Cancelled);
            }
        }

        if polls > 0 {
            tracing::debug!(file = name, polls, "File became readable");
        }
        Ok(())
    }

    fn copy_with_retry(&self, source: &Path, dest: &Path, name: &str) -> Result<()> {
        for attempt in 1..=self.policy.attempts {
            tracing::info!(file = name, attempt, "Attempt to open the file");

            match self.copy_once(source, dest) {
                Ok(bytes) => {
                    tracing::debug!(file = name, bytes, dest = %dest.display(), "Copied out of incoming area");
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(
                        file = name,
                        attempt,
                        error = %e,
                        "Error while copying the file, retrying"
                    );
                    if attempt < self.policy.attempts && !self.cancel.sleep(self.policy.delay) {
                        return Err(SealwatchError::Cancelled);
                    }
                }
            }
        }

        Err(SealwatchError::Intake(format!(
            "Error while copying file from unsigned area: {name} ({} attempts)",
            self.policy.attempts
        )))
    }

    /// Both handles are dropped on every path out of this function.
    fn copy_once(&self, source: &Path, dest: &Path) -> io::Result<u64> {
        let mut reader = BufReader::with_capacity(COPY_CHUNK_SIZE, self.opener.open(source)?);
        let mut writer = BufWriter::new(File::create(dest)?);
        let mut buffer = [0u8; COPY_CHUNK_SIZE];
        let mut total: u64 = 0;

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            writer.write_all(buffer.get(..bytes_read).unwrap_or_default())?;
            total += bytes_read as u64;
        }

        writer.flush()?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialProvider;
    use crate::integrity::checksum;
    use crate::node::TestNode;
    use crate::signing::{KeyStoreSpec, signature_path};
    use crate::signing::keystore::fixture_store;
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Fails the first `failures` opens, then behaves like [`FsOpener`].
    struct FlakyOpener {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    impl SourceOpener for FlakyOpener {
        fn open(&self, path: &Path) -> io::Result<Box<dyn Read>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked by device"));
            }
            FsOpener.open(path)
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 5,
            delay: Duration::from_millis(10),
            readiness_timeout: Some(Duration::from_millis(200)),
        }
    }

    fn setup() -> (TempDir, FileIntake) {
        let dir = TempDir::new().unwrap();
        let engine = SignatureEngine::new(KeyStoreSpec {
            path: fixture_store("bench.p12"),
            alias: "dsig".to_owned(),
            provider: CredentialProvider::Test,
        });

        let root = dir.path().join("node");
        fs::create_dir_all(root.join("testpath")).unwrap();
        let intake = FileIntake::new(
            root,
            Box::new(TestNode),
            engine,
            fast_policy(),
            CancellationToken::new(),
        );
        (dir, intake)
    }

    fn payload(crc: &str) -> String {
        format!("[MESURES]\nT1=25\n[CRC]\nT1={crc}\n")
    }

    fn drop_file(intake: &FileIntake, name: &str, contents: &str) {
        fs::write(intake.incoming_dir().join(name), contents).unwrap();
    }

    #[test]
    fn test_process_signs_valid_file() {
        let (_dir, intake) = setup();
        drop_file(&intake, "report.dat", &payload(&checksum("25")));

        let outcome = intake.process("report.dat").unwrap();

        assert!(outcome.report.is_clean());
        assert_eq!(outcome.file.copy, intake.processing_path("report.dat"));
        assert_eq!(
            fs::read(&outcome.file.copy).unwrap(),
            fs::read(&outcome.file.source).unwrap()
        );
        assert_eq!(outcome.signature, signature_path(&outcome.file.copy));
        assert!(intake.verify("report.dat").unwrap().passed);
    }

    #[test]
    fn test_mismatch_still_signed_by_default() {
        let (_dir, intake) = setup();
        drop_file(&intake, "bad.dat", &payload("1"));

        let outcome = intake.process("bad.dat").unwrap();
        assert_eq!(outcome.report.mismatches().count(), 1);
        assert!(outcome.signature.exists());
    }

    #[test]
    fn test_mismatch_refused_when_gated() {
        let (_dir, intake) = setup();
        let intake = intake.gate_on_mismatch(true);
        drop_file(&intake, "bad.dat", &payload("1"));

        let err = intake.process("bad.dat").unwrap_err();
        assert!(matches!(err, SealwatchError::Intake(_)));
        assert!(!signature_path(&intake.processing_path("bad.dat")).exists());
    }

    #[test]
    fn test_carriage_return_payload_is_gated() {
        let (_dir, intake) = setup();
        let intake = intake.gate_on_mismatch(true);
        drop_file(&intake, "cr.dat", "[MESURES]\rT1=25\r[CRC]\rT1=999\r");

        let err = intake.process("cr.dat").unwrap_err();
        assert!(matches!(err, SealwatchError::Intake(_)));
        assert!(!signature_path(&intake.processing_path("cr.dat")).exists());
    }

    #[test]
    fn test_copy_recovers_after_transient_failures() {
        let (_dir, intake) = setup();
        let calls = Arc::new(AtomicU32::new(0));
        let intake = intake.with_opener(FlakyOpener {
            failures: 3,
            calls: Arc::clone(&calls),
        });
        let contents = payload(&checksum("25")).repeat(200);
        drop_file(&intake, "slow.dat", &contents);

        let outcome = intake.process("slow.dat").unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(fs::read_to_string(&outcome.file.copy).unwrap(), contents);
        assert!(outcome.signature.exists());
    }

    #[test]
    fn test_copy_gives_up_after_all_attempts() {
        let (_dir, intake) = setup();
        let calls = Arc::new(AtomicU32::new(0));
        let intake = intake.with_opener(FlakyOpener {
            failures: 5,
            calls: Arc::clone(&calls),
        });
        drop_file(&intake, "locked.dat", &payload(&checksum("25")));

        let err = intake.process("locked.dat").unwrap_err();

        assert!(matches!(err, SealwatchError::Intake(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(!signature_path(&intake.processing_path("locked.dat")).exists());
    }

    #[test]
    fn test_readiness_wait_is_bounded() {
        let (_dir, intake) = setup();

        let started = Instant::now();
        let err = intake.process("never.dat").unwrap_err();

        assert!(matches!(err, SealwatchError::Intake(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_readiness_wait_sees_late_file() {
        let (_dir, intake) = setup();
        let target = intake.incoming_dir().join("late.dat");
        let contents = payload(&checksum("25"));

        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            fs::write(target, contents).unwrap();
        });

        let outcome = intake.process("late.dat");
        writer.join().unwrap();
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_cancelled_wait() {
        let (_dir, intake) = setup();
        let cancel = intake.cancel.clone();
        cancel.cancel();

        let err = intake.process("never.dat").unwrap_err();
        assert!(matches!(err, SealwatchError::Cancelled));
    }
}
