// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! # reportflow - Report-Generation Pipeline Orchestrator
//!
//! `reportflow` drives a multi-stage report-generation pipeline as a
//! sequence of externally-invoked programs, persisting intermediate
//! artifacts to a durable filesystem layout and surfacing structured
//! progress events.
//!
//! ## Features
//!
//! - **Stage sequencing** - Fixed-order stages with fail-fast semantics
//! - **Subprocess contract** - Timeouts, merged output capture, and
//!   exit-code interpretation that never raises out of a stage attempt
//! - **Bounded retries** - Narrow transient-failure detection with a
//!   fixed delay between attempts
//! - **Append-only artifacts** - Timestamped versions, manifest-indexed
//!   "latest" resolution, and a ready signal for downstream consumers
//! - **Supervised service** - Owned background process with a readiness
//!   probe and a shutdown hook on every exit path
//!
//! ## Quick Start
//!
//! ```bash
//! # Run the full pipeline
//! reportflow run "Acme Corp"
//!
//! # Run with a config file and a local storage root
//! reportflow run "Acme Corp" --config reportflow.yaml --output-root ./out
//!
//! # Inspect artifact storage
//! reportflow storage stats "Acme Corp"
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod events;
pub mod pipeline;
pub mod runner;
pub mod service;
pub mod storage;
pub mod upload;

// Re-export commonly used types
pub use errors::{ReportflowError, ReportflowResult};
pub use pipeline::{PipelineRun, RunOutcome, RunStatus};
pub use storage::{ArtifactKind, StorageLayout};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
