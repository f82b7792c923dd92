//! # Sealwatch - Signing watcher for measurement files
//!
//! Field devices drop measurement files into an incoming folder. Sealwatch
//! waits until each file is fully written, copies it out of the incoming
//! area, checks the weighted checksum declared for every measurement and
//! writes a detached `SHA1withRSA` signature next to the copy.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sealwatch::config::ServiceConfig;
//! use sealwatch::node::NodeRegistry;
//! use sealwatch::signing::SignatureEngine;
//! use sealwatch::watcher::{CancellationToken, FileIntake, SigningPipeline, WatchLoop};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::load(&ServiceConfig::default_path()?)?;
//! config.validate()?;
//!
//! let profile = NodeRegistry::default().create(&config.node_type)?;
//! let engine = SignatureEngine::new(config.keystore_spec()?);
//! let cancel = CancellationToken::new();
//!
//! let intake = FileIntake::new(
//!     config.watch_path.clone(),
//!     profile,
//!     engine,
//!     config.retry_policy(),
//!     cancel.clone(),
//! );
//! let dir = intake.incoming_dir();
//! WatchLoop::new(dir, SigningPipeline::new(intake, config.force_validation), cancel).run()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`integrity`]: payload parsing, checksum codec and validation reports
//! - [`signing`]: PKCS#12 key store access, signing and verification
//! - [`watcher`]: watch loop, event filter and file intake
//! - [`node`]: node types and their incoming folder, codepage and layout
//! - [`credential`]: key store password providers
//! - [`config`]: persisted service configuration
//! - [`logging`]: tracing subscriber setup
//! - [`error`]: error types and handling utilities

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod credential;
pub mod error;
pub mod integrity;
pub mod logging;
pub mod node;
pub mod signing;
pub mod watcher;
