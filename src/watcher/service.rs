//! The watch loop.
//!
//! One subscription, one worker: events are drained in batches and every
//! qualifying file is processed to completion before the next one.

use anyhow::{Context as _, Result};
use notify::{RecursiveMode, Watcher as _};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::time::Duration;

use super::CancellationToken;
use super::events::{ChangeEvent, dedup_in_order, should_process};
use super::intake::FileIntake;

/// How long to block on the event channel before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Quiet period that closes a batch of events.
const BATCH_WINDOW: Duration = Duration::from_millis(100);

/// Receives the names of files that passed the event filter.
pub trait FileHandler {
    fn handle(&mut self, name: &str);
}

/// Intake followed by an optional re-verification of the fresh signature.
pub struct SigningPipeline {
    intake: FileIntake,
    force_validation: bool,
}

impl SigningPipeline {
    pub fn new(intake: FileIntake, force_validation: bool) -> Self {
        Self {
            intake,
            force_validation,
        }
    }

    pub fn intake(&self) -> &FileIntake {
        &self.intake
    }
}

impl FileHandler for SigningPipeline {
    fn handle(&mut self, name: &str) {
        match self.intake.process(name) {
            Ok(outcome) => tracing::info!(
                file = name,
                signature = %outcome.signature.display(),
                problems = outcome.report.problem_count(),
                "File signed"
            ),
            Err(e) => tracing::error!(file = name, error = %e, "File was not signed"),
        }

        if self.force_validation {
            match self.intake.verify(name) {
                Ok(result) if result.passed => {}
                Ok(result) => tracing::error!(file = name, message = %result.message, "Signature self-check failed"),
                Err(e) => tracing::error!(file = name, error = %e, "Cannot verify data integrity"),
            }
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested
    Interrupted,
    /// The watched directory went away
    Invalidated,
    /// The notification backend hung up
    Disconnected,
}

/// Watches one directory and feeds qualifying files to a [`FileHandler`].
pub struct WatchLoop<H: FileHandler> {
    dir: PathBuf,
    handler: H,
    cancel: CancellationToken,
}

impl<H: FileHandler> WatchLoop<H> {
    pub fn new(dir: PathBuf, handler: H, cancel: CancellationToken) -> Self {
        Self {
            dir,
            handler,
            cancel,
        }
    }

    /// Block until shutdown or until the subscription becomes invalid.
    ///
    /// Per-file failures are logged by the handler and never end the loop.
    /// The subscription is released before this returns.
    ///
    /// # Errors
    ///
    /// Returns error if the subscription cannot be established.
    pub fn run(mut self) -> Result<StopReason> {
        let dir = self
            .dir
            .canonicalize()
            .with_context(|| format!("Watch directory is not accessible: {}", self.dir.display()))?;

        let (event_tx, event_rx) = channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // The receiver is gone once the loop has returned.
            event_tx.send(res).ok();
        })
        .context("Failed to create watcher")?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch folder: {}", dir.display()))?;

        tracing::info!(dir = %dir.display(), "Watching for changes");

        let reason = loop {
            if self.cancel.is_cancelled() {
                tracing::warn!("Watcher interrupted. Closing");
                break StopReason::Interrupted;
            }

            match event_rx.recv_timeout(POLL_INTERVAL) {
                Ok(first) => {
                    let mut batch = Vec::new();
                    let mut next = Some(first);
                    while let Some(res) = next {
                        match res {
                            Ok(event) => batch.extend(ChangeEvent::from_notify(&event, &dir)),
                            Err(e) => tracing::warn!(error = %e, "Watch backend reported an error"),
                        }
                        next = event_rx.recv_timeout(BATCH_WINDOW).ok();
                    }
                    self.handle_batch(&dir, batch);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break StopReason::Disconnected,
            }

            if !rearm(&dir) {
                tracing::warn!(dir = %dir.display(), "Watcher is not valid anymore. Closing...");
                break StopReason::Invalidated;
            }
        };

        if let Err(e) = watcher.unwatch(&dir) {
            tracing::debug!(error = %e, "Watch already released");
        }
        drop(watcher);
        tracing::info!(?reason, "Watcher closed");
        Ok(reason)
    }

    /// Filter, de-duplicate and dispatch one batch of events in order.
    pub fn handle_batch(&mut self, dir: &Path, events: Vec<ChangeEvent>) {
        for name in dedup_in_order(events) {
            if self.cancel.is_cancelled() {
                return;
            }
            if should_process(dir, &name) {
                self.handler.handle(&name);
            } else {
                tracing::trace!(file = %name, "Ignoring change");
            }
        }
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}

/// The subscription stays valid while the watched directory exists.
fn rearm(dir: &Path) -> bool {
    dir.is_dir()
}
