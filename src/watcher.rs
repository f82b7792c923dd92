//! Directory watcher
//!
//! Watches a node's incoming folder and turns every modified file into a
//! signed copy next to it.
//!
//! ## Architecture
//!
//! ```text
//! WatchLoop (caller's thread)
//!   │
//!   ├─> notify::Watcher (filesystem events)
//!   ├─> events filter (.sig, editor scratch files, directories)
//!   └─> SigningPipeline
//!         └─> FileIntake (readiness wait, copy, validate, sign)
//! ```
//!
//! ## Event Flow
//!
//! 1. Device writes `<watch_path>/<incoming>/<name>`
//! 2. `notify` emits a modification event
//! 3. Events of one batch are de-duplicated and filtered
//! 4. Intake waits until the file opens, then copies it to `<watch_path>/<name>`
//! 5. The copy is validated against its declared checksums
//! 6. `<watch_path>/<name>.sig` is written
//! 7. With forced validation, the fresh signature is verified again
//!
//! Files are handled strictly one after another on the loop's thread.

pub mod events;
pub mod intake;
pub mod service;

pub use events::{ChangeEvent, TEMP_FILE_MARKER, dedup_in_order, should_process};
pub use intake::{FileIntake, IntakeOutcome, RetryPolicy, SourceOpener, StableFile};
pub use service::{FileHandler, SigningPipeline, StopReason, WatchLoop};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Granularity of cancellable sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `false` if the token was cancelled before or during the sleep.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_completes() {
        let token = CancellationToken::new();
        assert!(token.sleep(Duration::from_millis(20)));
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
        assert!(!token.sleep(Duration::from_secs(60)));
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                token.cancel();
            })
        };

        let started = Instant::now();
        assert!(!token.sleep(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();
    }
}
