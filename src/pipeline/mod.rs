// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Pipeline sequencing
//!
//! Stage records, the retry policy, and the sequencer that drives one
//! company run from preprocessing through finalization.

mod retry;
mod sequencer;
mod stage;

pub use retry::{RetryDecision, RetryPolicy};
pub use sequencer::{PipelineRun, RunOutcome, RunStatus, TOTAL_STEPS};
pub use stage::{FailureMode, StageSpec, TransientSignature};
