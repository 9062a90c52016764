// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 reportflow contributors

//! Progress event boundary
//!
//! The orchestrator reports progress through an [`EventSink`] rather
//! than logging directly, so the sequencer stays testable: tests swap
//! in a [`MemorySink`] and assert on the emitted event stream. The
//! default sink forwards to `tracing`, and stage output lines go to
//! stdout verbatim so the surrounding platform captures them as-is.

use std::sync::Mutex;

/// Structured progress events consumed by an [`EventSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Info(String),
    Warning(String),
    Error(String),
    Debug(String),
    /// Pipeline step progress: (index, total, description)
    Step(u32, u32, String),
    /// Terminal metric: (name, value, unit)
    Metric(String, i64, String),
    /// One verbatim line of captured stage output
    Line(String),
}

/// Sink for structured progress events
///
/// Implementations must be cheap to call; the runner forwards every
/// stage output line through [`EventSink::line`] as it is produced.
pub trait EventSink: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    fn debug(&self, message: &str);

    /// Report pipeline step progress
    fn step(&self, index: u32, total: u32, message: &str) {
        self.info(&format!("[STEP {index}/{total}] {message}"));
    }

    /// Report a terminal metric
    fn metric(&self, name: &str, value: i64, unit: &str) {
        self.info(&format!("Metric: {name}={value}{unit}"));
    }

    /// Forward one verbatim line of stage output
    fn line(&self, line: &str);
}

/// Default sink backed by `tracing`
///
/// Stage output lines bypass `tracing` and go straight to stdout,
/// unmodified and in order, matching how cloud platforms collect
/// subprocess output.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn step(&self, index: u32, total: u32, message: &str) {
        tracing::info!(step = index, total, "[STEP {index}/{total}] {message}");
    }

    fn metric(&self, name: &str, value: i64, unit: &str) {
        tracing::info!(metric = name, value, unit, "Metric: {name}={value}{unit}");
    }

    fn line(&self, line: &str) {
        println!("{line}");
    }
}

/// In-memory sink recording every event, for assertions in tests
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events in emission order
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Step indices in emission order
    pub fn step_indices(&self) -> Vec<u32> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                Event::Step(i, _, _) => Some(*i),
                _ => None,
            })
            .collect()
    }

    /// Captured stage output lines in emission order
    pub fn lines(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                Event::Line(l) => Some(l.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl EventSink for MemorySink {
    fn info(&self, message: &str) {
        self.push(Event::Info(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(Event::Warning(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Event::Error(message.to_string()));
    }

    fn debug(&self, message: &str) {
        self.push(Event::Debug(message.to_string()));
    }

    fn step(&self, index: u32, total: u32, message: &str) {
        self.push(Event::Step(index, total, message.to_string()));
    }

    fn metric(&self, name: &str, value: i64, unit: &str) {
        self.push(Event::Metric(name.to_string(), value, unit.to_string()));
    }

    fn line(&self, line: &str) {
        self.push(Event::Line(line.to_string()));
    }
}
