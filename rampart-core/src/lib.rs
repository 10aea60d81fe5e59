//! # Rampart Core
//!
//! Concurrent scan-job orchestration for an active web scanner.
//!
//! ## Overview
//!
//! - **Mode policy**: a pure gate deciding whether a scan may start in the
//!   current operating mode ([`orchestration::policy`])
//! - **Scan jobs**: one task per scan with a `Running`/`Paused`/`Stopped`/
//!   `Finished` state machine, a de-duplicated frontier and a result ledger
//! - **Registry**: monotonic ids, never reused
//! - **Events**: per-scan lifecycle events fanned out to isolated listeners
//!
//! The actual crawling/attacking lives behind [`orchestration::ScanEngine`].
//!
//! ## Feature Flags
//!
//! - `demo`: in-memory [`demo::DemoSite`] and [`demo::DemoEngine`]
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rampart_core::{
//!     config::OrchestratorConfig,
//!     demo::{DemoEngine, DemoSite},
//!     orchestration::ScanOrchestrator,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let site = Arc::new(DemoSite::generate(2, 2, 3));
//! let orchestrator = ScanOrchestrator::new(
//!     OrchestratorConfig::default(),
//!     Arc::new(DemoEngine::new(site)),
//! )?;
//!
//! let id = orchestrator.start_scan_all_in_scope()?;
//! orchestrator.pause_scan(id);
//! orchestrator.resume_scan(id);
//! println!("{:?}", orchestrator.get_scan(id));
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Programmatic API façade and its error body
pub mod api;

/// Orchestrator configuration knobs
pub mod config;

/// Error types
pub mod error;

/// Policy gate, scan jobs, registry, event bus and orchestrator
pub mod orchestration;

/// In-memory site and engine for demos and tests
#[cfg(feature = "demo")]
#[cfg_attr(docsrs, doc(cfg(feature = "demo")))]
pub mod demo;

pub use error::{Result, ScanError};
pub use orchestration::{ScanEngine, ScanOrchestrator};
