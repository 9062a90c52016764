// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Retry policy
//!
//! Decides, after a failed stage attempt, whether to re-attempt and how
//! long to wait. A stage is retried only while it has budget left and
//! the captured output matches its transient-failure signature;
//! everything else is a terminal failure for that stage.

use std::time::Duration;

use crate::runner::StageResult;

use super::stage::StageSpec;

/// Decision for a failed stage attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-attempt after the given delay
    Retry { delay: Duration },
    /// Terminal failure for this stage
    GiveUp,
}

/// Fixed-delay retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(180))
    }
}

impl RetryPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Decide what to do after a failed attempt
    ///
    /// `attempt` is the 1-based number of the attempt that just
    /// finished. Successful results never reach this decision; the
    /// sequencer short-circuits on exit code 0.
    pub fn decide(&self, stage: &StageSpec, result: &StageResult, attempt: u32) -> RetryDecision {
        if result.success() {
            return RetryDecision::GiveUp;
        }

        if attempt <= stage.max_retries && stage.transient.matches(&result.output) {
            RetryDecision::Retry { delay: self.delay }
        } else {
            RetryDecision::GiveUp
        }
    }
}
